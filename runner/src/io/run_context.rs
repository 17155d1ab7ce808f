//! Per-attempt run metadata: ids, timestamps and output locations.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};

use crate::core::task::Task;
use crate::io::paths::encode_segment;

/// File name of the exported output schema inside the output directory.
pub const SCHEMA_FILE_NAME: &str = "agent_output.schema.json";

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Ephemeral metadata for one attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    pub task_id: String,
    /// 1-based.
    pub attempt: u32,
    pub output_path: PathBuf,
    pub schema_path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl RunContext {
    pub fn create(task: &Task, attempt: u32, output_dir: &Path) -> Self {
        Self::at(task, attempt, output_dir, Utc::now(), &generate_short_id())
    }

    fn at(
        task: &Task,
        attempt: u32,
        output_dir: &Path,
        timestamp: DateTime<Utc>,
        short_id: &str,
    ) -> Self {
        let run_id = format!("run-{}-{short_id}", timestamp.format(TIMESTAMP_FORMAT));
        let output_path = output_dir
            .join(encode_segment(&task.id))
            .join(format!("{run_id}.json"));
        Self {
            run_id,
            task_id: task.id.clone(),
            attempt,
            output_path,
            schema_path: output_dir.join(SCHEMA_FILE_NAME),
            timestamp,
        }
    }

    /// Creation timestamp as used in file names.
    pub fn timestamp_label(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// `<outputRoot>/logs/<agent>-<taskId>-<timestamp>.log`, where the output
    /// root sits two levels above the output file.
    pub fn log_path(&self, agent_name: &str) -> PathBuf {
        let output_root = self
            .output_path
            .parent()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new("."));
        output_root.join("logs").join(format!(
            "{}-{}-{}.log",
            encode_segment(agent_name),
            encode_segment(&self.task_id),
            self.timestamp_label()
        ))
    }
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}
