use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to task service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("task service answered with status {0}")]
    Status(u16),

    #[error("task database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("task {task_id} for user {user_id} does not exist")]
    NotFound { user_id: i64, task_id: i64 },

    #[error("stored task has malformed {field}: {value}")]
    Malformed { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("draft store error: {0}")]
    Storage(#[from] rusqlite::Error),
}
