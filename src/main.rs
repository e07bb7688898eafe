mod cli;
mod config;
mod detail;
mod drafts;
mod error;
mod logging;
mod models;
mod service;
mod ui;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use config::{Backend, Config};
use drafts::{DraftStore, SqliteDraftStore, SAVED_KEYS};
use models::Route;
use service::{LocalTaskService, NewTask};
use std::path::PathBuf;
use ui::run_detail_page;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "checklist", &mut std::io::stdout());
        }
        Commands::Open { task_id, user_id } => {
            let config = start(cli.db, cli.service_url)?;
            run_detail_page(&config, Route { task_id, user_id })?;
        }
        Commands::Add { title, user_id, body, description, priority, due } => {
            let config = start(cli.db, cli.service_url)?;
            let service = open_local_tasks(&config)?;
            let due_date = match due.as_deref() {
                Some(text) => match detail::parse_due_date(text) {
                    Some(date) => date,
                    None => bail!("Could not understand due date '{}'", text),
                },
                None => chrono::Local::now().naive_local(),
            };
            let task_id = service.add_task(&NewTask {
                user_id,
                title: title.clone(),
                created_task: body,
                description,
                priority_level: priority,
                due_date,
            })?;
            println!("Task '{}' created with id {} for user {}", title, task_id, user_id);
        }
        Commands::List { user_id } => {
            let config = start(cli.db, cli.service_url)?;
            let service = open_local_tasks(&config)?;
            let tasks = service.list_tasks(user_id)?;
            if tasks.is_empty() {
                println!("No tasks for user {}", user_id);
            }
            for task in tasks {
                println!(
                    "{:>4}  {} [P{}] due {}{}",
                    task.task_id,
                    task.title,
                    task.priority_level,
                    detail::short_date(&task.due_date),
                    if task.is_completed { " [done]" } else { "" }
                );
            }
        }
        Commands::Drafts { clear } => {
            let config = start(cli.db, cli.service_url)?;
            let mut store = SqliteDraftStore::open(&config.db_path)
                .with_context(|| format!("Failed to open draft store at {}", config.db_path.display()))?;
            if clear {
                for key in SAVED_KEYS {
                    store.remove(key)?;
                }
                log::info!("Cleared saved drafts");
                println!("Saved drafts cleared");
            } else {
                let entries = store.entries()?;
                if entries.is_empty() {
                    println!("No drafts saved");
                }
                for (key, value) in entries {
                    println!("{} = {}", key, value);
                }
            }
        }
    }

    Ok(())
}

/// Resolves configuration, creates the data directory and starts logging.
fn start(db: Option<PathBuf>, service_url: Option<String>) -> Result<Config> {
    let config = Config::resolve(db, service_url)?;
    config.ensure_data_dir()?;
    logging::init(&config.log_path)?;
    Ok(config)
}

fn open_local_tasks(config: &Config) -> Result<LocalTaskService> {
    if let Backend::Remote { base_url } = &config.backend {
        bail!("This command only works with the local database, not the task service at {}", base_url);
    }
    LocalTaskService::open(&config.db_path)
        .with_context(|| format!("Failed to open task database at {}", config.db_path.display()))
}
