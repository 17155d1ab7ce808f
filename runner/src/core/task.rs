//! Task tracker data model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task. No other values are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Done,
    Blocked,
}

impl TaskStatus {
    /// Checkbox symbol used in the tracker file.
    pub fn symbol(self) -> char {
        match self {
            TaskStatus::Open => ' ',
            TaskStatus::Done => 'x',
            TaskStatus::Blocked => '!',
        }
    }

    /// Parse a checkbox symbol (`""`/`" "`, `x`/`X`, `!`).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "" => Some(TaskStatus::Open),
            "x" | "X" => Some(TaskStatus::Done),
            "!" => Some(TaskStatus::Blocked),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of delegated work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    /// Multi-line body; never starts or ends with a blank line.
    pub description: String,
    pub status: TaskStatus,
}

impl Task {
    /// Create an open task with an empty description.
    pub fn open(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Open,
        }
    }
}

/// Whole tracker file: free-form prelude followed by ordered tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskTrackerDocument {
    /// Text before the first task line, shown to the agent as context.
    pub prelude_text: String,
    /// Document order is scheduling order.
    pub tasks: Vec<Task>,
}

impl TaskTrackerDocument {
    /// Copy of this document with `tasks` replaced.
    pub fn with_tasks(&self, tasks: Vec<Task>) -> Self {
        Self {
            prelude_text: self.prelude_text.clone(),
            tasks,
        }
    }
}
