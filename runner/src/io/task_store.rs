//! Whole-file load/save of the task tracker document.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::document::{parse_document, serialize_document};
use crate::core::selector::append_task;
use crate::core::task::{Task, TaskTrackerDocument};

/// Tracker file on disk. One process owns it at a time.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<TaskTrackerDocument> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read tasks file {}", self.path.display()))?;
        let doc = parse_document(&contents)
            .with_context(|| format!("parse tasks file {}", self.path.display()))?;
        debug!(tasks = doc.tasks.len(), "tasks file loaded");
        Ok(doc)
    }

    /// Like [`Self::load`], but an absent file is an empty document.
    pub fn load_or_default(&self) -> Result<TaskTrackerDocument> {
        if self.exists() {
            self.load()
        } else {
            Ok(TaskTrackerDocument::default())
        }
    }

    /// Atomically replace the file with the canonical rendering of `doc`.
    pub fn save(&self, doc: &TaskTrackerDocument) -> Result<()> {
        write_atomic(&self.path, &serialize_document(doc))
    }

    /// Append a new open task and persist immediately.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn add_task(&self, title: &str) -> Result<Task> {
        let mut doc = self.load_or_default()?;
        let task = append_task(&mut doc, title)?;
        self.save(&doc)?;
        debug!(task_id = %task.id, "task added");
        Ok(task)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("tasks file path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("md.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp tasks file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace tasks file {}", path.display()))?;
    Ok(())
}
