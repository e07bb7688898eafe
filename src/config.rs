use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const DB_ENV: &str = "CHECKLIST_DB";
pub const SERVICE_URL_ENV: &str = "CHECKLIST_SERVICE_URL";

const DATA_DIR_NAME: &str = ".checklist";
const DB_FILE_NAME: &str = "checklist.db";
const LOG_FILE_NAME: &str = "checklist.log";

/// Where tasks come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// The `tasks` table of the application database.
    Local,
    /// A JSON API rooted at this URL.
    Remote { base_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Holds drafts, and tasks for the local backend.
    pub db_path: PathBuf,
    pub log_path: PathBuf,
    pub backend: Backend,
}

impl Config {
    /// Flags win over environment variables, which win over defaults.
    pub fn resolve(db_flag: Option<PathBuf>, service_url_flag: Option<String>) -> Result<Self> {
        Self::resolve_with(db_flag, service_url_flag, |key| std::env::var(key).ok())
    }

    fn resolve_with(
        db_flag: Option<PathBuf>,
        service_url_flag: Option<String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        // Empty values, from a flag or the environment, count as unset.
        let db_path = match db_flag
            .filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
            .or_else(|| env(DB_ENV).filter(|v| !v.trim().is_empty()).map(PathBuf::from))
        {
            Some(path) => path,
            None => {
                let home = env("HOME").unwrap_or_else(|| ".".to_string());
                PathBuf::from(home).join(DATA_DIR_NAME).join(DB_FILE_NAME)
            }
        };

        let log_path = db_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(LOG_FILE_NAME);

        let backend = match service_url_flag
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env(SERVICE_URL_ENV).filter(|v| !v.trim().is_empty()))
        {
            Some(url) => Backend::Remote { base_url: url.trim().to_string() },
            None => Backend::Local,
        };

        Ok(Config { db_path, log_path, backend })
    }

    /// Creates the directory holding the database and log file.
    pub fn ensure_data_dir(&self) -> Result<()> {
        if let Some(dir) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        }
        Ok(())
    }
}
