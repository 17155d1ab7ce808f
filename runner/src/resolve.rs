//! Orchestration for `task-runner resolve`.
//!
//! One attempt resolves exactly one task:
//!
//! ```text
//! Idle -> TaskSelected -> PreflightChecked -> AgentInvoked -> OutputValidated
//!      -> DocumentUpdated -> Committed -> Done
//! ```
//!
//! Any failure after preflight and before the document is updated marks the
//! task blocked (best effort) and re-raises the original error. A non-success
//! outcome is committed first and raised afterwards so callers stop.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::commit_message::{format_body, format_title, human_message};
use crate::core::contract::{OutputContract, ValidationError};
use crate::core::document::DocumentError;
use crate::core::selector::{mark_blocked, mark_done, pick_next_task};
use crate::core::task::{Task, TaskStatus, TaskTrackerDocument};
use crate::core::types::{AgentOutput, AgentStatus};
use crate::exit_codes;
use crate::io::agent::{AgentError, CodeAgent, read_agent_output};
use crate::io::config::{Config, ConfigError, load_config};
use crate::io::git::{GitOps, PreflightError};
use crate::io::paths::display_relative;
use crate::io::prompt::{PromptInputs, build_prompt};
use crate::io::run_context::RunContext;
use crate::io::task_store::TaskStore;

/// Where the runner operates: the repository root and its config file.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config_path: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config_path: config_path.into(),
        }
    }

    /// Load the config scoped to the branch `git` is on.
    pub fn load_config<G: GitOps>(&self, git: &G) -> Result<Config> {
        let branch = git.current_branch_name()?;
        load_config(&self.config_path, &self.root, &branch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttemptState {
    Idle,
    TaskSelected,
    PreflightChecked,
    AgentInvoked,
    OutputValidated,
    DocumentUpdated,
    Committed,
    Done,
    Failed,
}

fn transition(state: &mut AttemptState, next: AttemptState) {
    debug!(from = ?*state, to = ?next, "attempt state");
    *state = next;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    NoOpenTask,
    Resolved { task_id: String, commit_sha: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunAllOutcome {
    /// Ids resolved successfully, in order.
    pub resolved: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("agent reported on task \"{actual}\" while resolving \"{expected}\"")]
    TaskMismatch { expected: String, actual: String },

    #[error("task {task_id} ended with status {status} (committed as {commit_sha}); stopping")]
    NonSuccessOutcome {
        task_id: String,
        status: AgentStatus,
        commit_sha: String,
    },

    #[error("blocked tasks present; resolve them before starting new work: {}", .ids.join(", "))]
    BlockedTasksPresent { ids: Vec<String> },
}

/// Error taxonomy used for exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Config,
    Document,
    Preflight,
    BlockedTasks,
    AgentInvocation,
    OutputValidation,
    TaskMismatch,
    NonSuccessOutcome,
    Other,
}

impl ErrorClass {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorClass::Config
            | ErrorClass::Document
            | ErrorClass::Preflight
            | ErrorClass::BlockedTasks
            | ErrorClass::Other => exit_codes::INVALID,
            ErrorClass::AgentInvocation
            | ErrorClass::OutputValidation
            | ErrorClass::TaskMismatch => exit_codes::FAILED,
            ErrorClass::NonSuccessOutcome => exit_codes::STOPPED,
        }
    }
}

/// Map an error chain to the outermost typed error it carries.
pub fn classify(err: &anyhow::Error) -> ErrorClass {
    for cause in err.chain() {
        if cause.is::<ConfigError>() {
            return ErrorClass::Config;
        }
        if cause.is::<DocumentError>() {
            return ErrorClass::Document;
        }
        if cause.is::<PreflightError>() {
            return ErrorClass::Preflight;
        }
        if cause.is::<AgentError>() {
            return ErrorClass::AgentInvocation;
        }
        if cause.is::<ValidationError>() {
            return ErrorClass::OutputValidation;
        }
        if let Some(orchestrator) = cause.downcast_ref::<OrchestratorError>() {
            return match orchestrator {
                OrchestratorError::TaskMismatch { .. } => ErrorClass::TaskMismatch,
                OrchestratorError::NonSuccessOutcome { .. } => ErrorClass::NonSuccessOutcome,
                OrchestratorError::BlockedTasksPresent { .. } => ErrorClass::BlockedTasks,
            };
        }
    }
    ErrorClass::Other
}

/// Refuse to start new work while earlier tasks are blocked.
pub fn ensure_no_blocked_tasks(doc: &TaskTrackerDocument) -> Result<(), OrchestratorError> {
    let ids: Vec<String> = doc
        .tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Blocked)
        .map(|task| task.id.clone())
        .collect();
    if ids.is_empty() {
        Ok(())
    } else {
        Err(OrchestratorError::BlockedTasksPresent { ids })
    }
}

/// Resolve the next open task, if any.
#[instrument(skip_all, fields(agent = %agent.name()))]
pub fn run_once<A: CodeAgent, G: GitOps>(
    workspace: &Workspace,
    agent: &A,
    git: &G,
) -> Result<AttemptOutcome> {
    let mut state = AttemptState::Idle;
    let cfg = workspace.load_config(git)?;
    let store = TaskStore::new(&cfg.tasks_file);
    let doc = store.load_or_default()?;

    let Some(task) = pick_next_task(&doc.tasks).cloned() else {
        info!(tasks_file = %cfg.tasks_file.display(), "no open tasks");
        return Ok(AttemptOutcome::NoOpenTask);
    };
    transition(&mut state, AttemptState::TaskSelected);
    info!(task_id = %task.id, title = %task.title, "task selected");

    git.ensure_clean_working_tree()?;
    transition(&mut state, AttemptState::PreflightChecked);

    let attempt = Attempt {
        workspace,
        cfg: &cfg,
        store: &store,
        doc: &doc,
        task: &task,
    };
    match attempt.run(agent, git, &mut state) {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            if state < AttemptState::DocumentUpdated {
                attempt.mark_blocked_best_effort(&err);
            }
            transition(&mut state, AttemptState::Failed);
            Err(err)
        }
    }
}

/// Keep resolving until no open task remains. The first error stops the batch.
#[instrument(skip_all, fields(agent = %agent.name()))]
pub fn run_all<A: CodeAgent, G: GitOps>(
    workspace: &Workspace,
    agent: &A,
    git: &G,
) -> Result<RunAllOutcome> {
    let mut outcome = RunAllOutcome::default();
    loop {
        match run_once(workspace, agent, git)? {
            AttemptOutcome::NoOpenTask => {
                info!(resolved = outcome.resolved.len(), "all tasks resolved");
                return Ok(outcome);
            }
            AttemptOutcome::Resolved { task_id, .. } => outcome.resolved.push(task_id),
        }
    }
}

/// Borrowed inputs of one attempt after preflight.
struct Attempt<'a> {
    workspace: &'a Workspace,
    cfg: &'a Config,
    store: &'a TaskStore,
    doc: &'a TaskTrackerDocument,
    task: &'a Task,
}

impl Attempt<'_> {
    fn run<A: CodeAgent, G: GitOps>(
        &self,
        agent: &A,
        git: &G,
        state: &mut AttemptState,
    ) -> Result<AttemptOutcome> {
        let task = self.task;
        let contract = AgentOutput::contract();
        let ctx = RunContext::create(task, 1, &self.cfg.output_dir);
        write_output_schema(&ctx.schema_path, &contract)?;

        let output_path = display_relative(&ctx.output_path, &self.workspace.root);
        let prompt = build_prompt(&PromptInputs {
            document: self.doc,
            task,
            output_path: &output_path,
            contract: &contract,
        })?;

        agent.run(&prompt, &ctx)?;
        transition(state, AttemptState::AgentInvoked);

        let output = read_agent_output(&ctx.output_path, &contract)?;
        transition(state, AttemptState::OutputValidated);

        if output.task_id != task.id {
            return Err(OrchestratorError::TaskMismatch {
                expected: task.id.clone(),
                actual: output.task_id,
            }
            .into());
        }

        let reason = human_message(task, &output);
        let tasks = if output.status.is_success() {
            mark_done(&self.doc.tasks, &task.id)?
        } else {
            mark_blocked(&self.doc.tasks, &task.id)?
        };
        self.store.save(&self.doc.with_tasks(tasks))?;
        transition(state, AttemptState::DocumentUpdated);
        info!(task_id = %task.id, status = %output.status, reason = %reason, "task document updated");

        let commit_sha = git.commit(&format_title(task, &output), &format_body(task, &output))?;
        transition(state, AttemptState::Committed);
        git.push()?;

        if !output.status.is_success() {
            return Err(OrchestratorError::NonSuccessOutcome {
                task_id: task.id.clone(),
                status: output.status,
                commit_sha,
            }
            .into());
        }

        transition(state, AttemptState::Done);
        info!(task_id = %task.id, commit = %commit_sha, "task resolved");
        Ok(AttemptOutcome::Resolved {
            task_id: task.id.clone(),
            commit_sha,
        })
    }

    /// Record the failure in the tracker. Secondary errors are logged, never raised.
    fn mark_blocked_best_effort(&self, err: &anyhow::Error) {
        warn!(task_id = %self.task.id, reason = %format!("{err:#}"), "attempt failed, marking task blocked");
        let result = mark_blocked(&self.doc.tasks, &self.task.id)
            .map_err(anyhow::Error::from)
            .and_then(|tasks| self.store.save(&self.doc.with_tasks(tasks)));
        if let Err(secondary) = result {
            warn!(task_id = %self.task.id, err = %format!("{secondary:#}"), "failed to mark task blocked");
        }
    }
}

fn write_output_schema(path: &Path, contract: &OutputContract) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output schema dir {}", parent.display()))?;
    }
    let mut buf =
        serde_json::to_string_pretty(&contract.json_schema()).context("serialize output schema")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write output schema {}", path.display()))
}
