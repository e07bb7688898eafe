use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTask {
    pub task_id: i64,
    pub user_id: i64,
    pub title: String,
    pub created_task: String,
    pub description: String,
    pub priority_level: i32,
    pub due_date: NaiveDateTime,
    pub is_completed: bool,
    pub updated_date: NaiveDateTime,
}

/// Navigation parameters the detail page is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub task_id: i64,
    pub user_id: i64,
}

/// Everything the detail page shows. A renderer binds this to widgets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageView {
    pub page_title: String,
    pub title_label: String,
    pub task_entry: String,
    pub description_entry: String,
    pub priority_entry: String,
    pub due_date_entry: String,
    pub is_completed: bool,
    pub result_label: String,
    pub detail_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Task,
    Description,
    Priority,
    DueDate,
    Completed,
}

impl Field {
    pub const ORDER: [Field; 5] = [
        Field::Task,
        Field::Description,
        Field::Priority,
        Field::DueDate,
        Field::Completed,
    ];

    pub fn next(self) -> Field {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(i + 1) % Self::ORDER.len()]
    }

    pub fn previous(self) -> Field {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(i + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Task => "Task",
            Field::Description => "Description",
            Field::Priority => "Priority",
            Field::DueDate => "Due Date",
            Field::Completed => "Completed",
        }
    }
}

/// A modal message with a single dismiss button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub accept: String,
}

impl Alert {
    pub fn new(title: &str, message: &str, accept: &str) -> Self {
        Alert {
            title: title.to_string(),
            message: message.to_string(),
            accept: accept.to_string(),
        }
    }
}

/// A modal yes/no question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirm {
    pub title: String,
    pub message: String,
    pub accept: String,
    pub cancel: String,
}

impl Confirm {
    pub fn new(title: &str, message: &str, accept: &str, cancel: &str) -> Self {
        Confirm {
            title: title.to_string(),
            message: message.to_string(),
            accept: accept.to_string(),
            cancel: cancel.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    Alert(Alert),
    Confirm(Confirm),
}
