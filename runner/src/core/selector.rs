//! Deterministic task selection and status transitions.
//!
//! All functions are pure: transitions return a new task list and leave the
//! input untouched, including on error.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::document::DocumentError;
use crate::core::task::{Task, TaskStatus, TaskTrackerDocument};

static SEQUENTIAL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^TASK-(\d+)$").expect("sequential id regex"));

/// First open task in document order. No priorities, no dependencies.
pub fn pick_next_task(tasks: &[Task]) -> Option<&Task> {
    tasks.iter().find(|task| task.status == TaskStatus::Open)
}

pub fn mark_done(tasks: &[Task], task_id: &str) -> Result<Vec<Task>, DocumentError> {
    with_status(tasks, task_id, TaskStatus::Done)
}

pub fn mark_blocked(tasks: &[Task], task_id: &str) -> Result<Vec<Task>, DocumentError> {
    with_status(tasks, task_id, TaskStatus::Blocked)
}

fn with_status(
    tasks: &[Task],
    task_id: &str,
    status: TaskStatus,
) -> Result<Vec<Task>, DocumentError> {
    if !tasks.iter().any(|task| task.id == task_id) {
        return Err(DocumentError::NotFound {
            id: task_id.to_string(),
        });
    }
    Ok(tasks
        .iter()
        .map(|task| {
            if task.id == task_id {
                Task {
                    status,
                    ..task.clone()
                }
            } else {
                task.clone()
            }
        })
        .collect())
}

/// Next `TASK-<n>` id: one past the highest conforming id, or `TASK-1`.
///
/// Numbers too large for `u64` are treated as non-conforming.
pub fn next_task_id(tasks: &[Task]) -> Result<String, DocumentError> {
    let highest = tasks
        .iter()
        .filter_map(|task| {
            SEQUENTIAL_ID_RE
                .captures(task.id.trim())
                .and_then(|caps| caps[1].parse::<u64>().ok())
        })
        .max()
        .unwrap_or(0);
    let next = highest
        .checked_add(1)
        .ok_or_else(|| DocumentError::IdSpaceExhausted {
            id: format!("TASK-{highest}"),
        })?;
    Ok(format!("TASK-{next}"))
}

/// Append a new open task to `doc` and return it.
pub fn append_task(doc: &mut TaskTrackerDocument, title: &str) -> Result<Task, DocumentError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DocumentError::InvalidTitle {
            reason: "title must not be empty".to_string(),
        });
    }
    if title.contains('\n') || title.contains('\r') {
        return Err(DocumentError::InvalidTitle {
            reason: "title must be a single line".to_string(),
        });
    }
    let task = Task::open(next_task_id(&doc.tasks)?, title);
    doc.tasks.push(task.clone());
    Ok(task)
}
