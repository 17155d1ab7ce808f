//! Prompt builder for a single-task agent attempt.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::contract::OutputContract;
use crate::core::task::{Task, TaskStatus, TaskTrackerDocument};

const RESOLVE_TEMPLATE: &str = include_str!("prompts/resolve.md");

/// Everything a prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub document: &'a TaskTrackerDocument,
    pub task: &'a Task,
    /// Output path as shown to the agent (workspace-relative).
    pub output_path: &'a str,
    pub contract: &'a OutputContract,
}

#[derive(Debug, Serialize)]
struct TaskContext<'a> {
    id: &'a str,
    title: &'a str,
    description: &'a str,
}

impl<'a> TaskContext<'a> {
    fn from_task(task: &'a Task) -> Self {
        Self {
            id: &task.id,
            title: &task.title,
            description: task.description.trim(),
        }
    }
}

/// Render the prompt handed to the agent on stdin.
///
/// Completed tasks are the `done` entries other than the current one, in
/// document order.
pub fn build_prompt(input: &PromptInputs<'_>) -> Result<String> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.add_template("resolve", RESOLVE_TEMPLATE)
        .context("load resolve prompt template")?;

    let completed: Vec<TaskContext<'_>> = input
        .document
        .tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Done && task.id != input.task.id)
        .map(TaskContext::from_task)
        .collect();

    let rendered = env
        .get_template("resolve")?
        .render(context! {
            prelude => input.document.prelude_text.trim(),
            completed => completed,
            task => TaskContext::from_task(input.task),
            output_path => input.output_path,
            contract => input.contract.render(),
        })
        .context("render resolve prompt")?;
    debug!(bytes = rendered.len(), "prompt rendered");
    Ok(rendered)
}
