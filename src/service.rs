use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, StatusCode};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::error::ServiceError;
use crate::models::UserTask;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Backing store for tasks, as seen by the detail page.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// `Ok(None)` when no task matches `(user_id, task_id)`.
    async fn fetch_task(&self, user_id: i64, task_id: i64) -> Result<Option<UserTask>, ServiceError>;

    /// Replaces the stored task identified by `task.user_id` and `task.task_id`.
    async fn update_task(&self, task: &UserTask) -> Result<(), ServiceError>;
}

#[async_trait]
impl<T: TaskService + ?Sized> TaskService for Box<T> {
    async fn fetch_task(&self, user_id: i64, task_id: i64) -> Result<Option<UserTask>, ServiceError> {
        (**self).fetch_task(user_id, task_id).await
    }

    async fn update_task(&self, task: &UserTask) -> Result<(), ServiceError> {
        (**self).update_task(task).await
    }
}

/// Fields supplied when creating a task; the id and update stamp are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: i64,
    pub title: String,
    pub created_task: String,
    pub description: String,
    pub priority_level: i32,
    pub due_date: NaiveDateTime,
}

/// Tasks kept in the local SQLite database.
pub struct LocalTaskService {
    conn: Mutex<Connection>,
}

impl LocalTaskService {
    pub fn open(path: &Path) -> Result<Self, ServiceError> {
        Self::with_connection(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, ServiceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ServiceError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                task_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                created_task TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                priority_level INTEGER NOT NULL DEFAULT 0,
                due_date TEXT NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0,
                updated_date TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks (user_id)",
            [],
        )?;
        Ok(LocalTaskService { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock still holds a usable connection.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_task(&self, task: &NewTask) -> Result<i64, ServiceError> {
        let conn = self.lock();
        let now = chrono::Local::now().naive_local();
        conn.execute(
            "INSERT INTO tasks (user_id, title, created_task, description, priority_level, due_date, is_completed, updated_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![
                task.user_id,
                task.title,
                task.created_task,
                task.description,
                task.priority_level,
                format_timestamp(&task.due_date),
                format_timestamp(&now),
            ],
        )?;
        let task_id = conn.last_insert_rowid();
        log::info!("Created task {} for user {}", task_id, task.user_id);
        Ok(task_id)
    }

    pub fn list_tasks(&self, user_id: i64) -> Result<Vec<UserTask>, ServiceError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT task_id, user_id, title, created_task, description, priority_level, due_date, is_completed, updated_date
             FROM tasks WHERE user_id = ?1 ORDER BY is_completed, due_date, task_id",
        )?;
        let rows = stmt.query_map([user_id], TaskRow::read)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }
}

#[async_trait]
impl TaskService for LocalTaskService {
    async fn fetch_task(&self, user_id: i64, task_id: i64) -> Result<Option<UserTask>, ServiceError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT task_id, user_id, title, created_task, description, priority_level, due_date, is_completed, updated_date
                 FROM tasks WHERE user_id = ?1 AND task_id = ?2",
                [user_id, task_id],
                TaskRow::read,
            )
            .optional()?;

        row.map(TaskRow::into_task).transpose()
    }

    async fn update_task(&self, task: &UserTask) -> Result<(), ServiceError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE tasks SET title = ?1, created_task = ?2, description = ?3, priority_level = ?4,
                    due_date = ?5, is_completed = ?6, updated_date = ?7
             WHERE user_id = ?8 AND task_id = ?9",
            params![
                task.title,
                task.created_task,
                task.description,
                task.priority_level,
                format_timestamp(&task.due_date),
                task.is_completed,
                format_timestamp(&task.updated_date),
                task.user_id,
                task.task_id,
            ],
        )?;

        if changed == 0 {
            return Err(ServiceError::NotFound {
                user_id: task.user_id,
                task_id: task.task_id,
            });
        }
        Ok(())
    }
}

struct TaskRow {
    task_id: i64,
    user_id: i64,
    title: String,
    created_task: String,
    description: String,
    priority_level: i32,
    due_date: String,
    is_completed: bool,
    updated_date: String,
}

impl TaskRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(TaskRow {
            task_id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            created_task: row.get(3)?,
            description: row.get(4)?,
            priority_level: row.get(5)?,
            due_date: row.get(6)?,
            is_completed: row.get(7)?,
            updated_date: row.get(8)?,
        })
    }

    fn into_task(self) -> Result<UserTask, ServiceError> {
        Ok(UserTask {
            task_id: self.task_id,
            user_id: self.user_id,
            title: self.title,
            created_task: self.created_task,
            description: self.description,
            priority_level: self.priority_level,
            due_date: parse_timestamp("due_date", self.due_date)?,
            is_completed: self.is_completed,
            updated_date: parse_timestamp("updated_date", self.updated_date)?,
        })
    }
}

fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(field: &'static str, value: String) -> Result<NaiveDateTime, ServiceError> {
    NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT)
        .map_err(|_| ServiceError::Malformed { field, value })
}

/// Tasks served by a remote JSON API.
pub struct HttpTaskService {
    client: Client,
    base_url: String,
}

impl HttpTaskService {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        HttpTaskService {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn task_url(&self, user_id: i64, task_id: i64) -> String {
        format!("{}/users/{}/tasks/{}", self.base_url, user_id, task_id)
    }
}

#[async_trait]
impl TaskService for HttpTaskService {
    async fn fetch_task(&self, user_id: i64, task_id: i64) -> Result<Option<UserTask>, ServiceError> {
        let url = self.task_url(user_id, task_id);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(ServiceError::Status(status.as_u16())),
        }
    }

    async fn update_task(&self, task: &UserTask) -> Result<(), ServiceError> {
        let url = self.task_url(task.user_id, task.task_id);
        log::debug!("PUT {}", url);

        let response = self.client.put(&url).json(task).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ServiceError::Status(status.as_u16()))
        }
    }
}
