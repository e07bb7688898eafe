use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Checklist task detail page", long_about = None)]
pub struct Cli {
    /// Path to the application database (drafts, and tasks for the local backend)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Load and update tasks through this JSON API instead of the local database
    #[arg(long, global = true, value_name = "URL")]
    pub service_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the detail page for a task
    Open {
        #[arg(value_name = "TASK_ID")]
        task_id: i64,
        /// Owner of the task
        #[arg(short, long = "user", value_name = "USER_ID")]
        user_id: i64,
    },
    /// Add a task to the local database
    Add {
        #[arg(value_name = "TITLE")]
        title: String,
        #[arg(short, long = "user", value_name = "USER_ID")]
        user_id: i64,
        /// Task text shown in the task entry
        #[arg(long, default_value = "")]
        body: String,
        #[arg(short, long = "desc", default_value = "")]
        description: String,
        #[arg(short, long, default_value_t = 0)]
        priority: i32,
        /// Due date, e.g. 2025-03-09 or 3/9/2025 (defaults to now)
        #[arg(long, value_name = "DATE")]
        due: Option<String>,
    },
    /// List a user's tasks from the local database
    List {
        #[arg(short, long = "user", value_name = "USER_ID")]
        user_id: i64,
    },
    /// Show saved drafts
    Drafts {
        /// Remove the drafts the page reloads on open
        #[arg(long)]
        clear: bool,
    },
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum, value_name = "SHELL")]
        shell: Shell,
    },
}
