//! Code agent seam and the subprocess-backed implementation.
//!
//! An agent receives the prompt on stdin and must write one JSON object to
//! the path in `OUTPUT_PATH` before exiting with code 0. Everything the child
//! prints goes to a per-attempt log file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::contract::OutputContract;
use crate::core::types::AgentOutput;
use crate::io::config::AgentCommand;
use crate::io::process::{ProcessError, run_with_log};
use crate::io::run_context::RunContext;

/// Environment variable carrying the output file path.
pub const OUTPUT_PATH_ENV: &str = "OUTPUT_PATH";
/// Environment variable carrying the output JSON Schema path.
pub const OUTPUT_SCHEMA_PATH_ENV: &str = "OUTPUT_SCHEMA_PATH";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{agent} agent exited with {}", describe_exit(.code, .signal))]
    Exit {
        agent: String,
        code: Option<i32>,
        signal: Option<i32>,
    },

    #[error("{agent} agent did not write output to {}", .path.display())]
    OutputMissing { agent: String, path: PathBuf },

    #[error("{agent} agent could not be run")]
    Invocation {
        agent: String,
        #[source]
        source: ProcessError,
    },
}

fn describe_exit(code: &Option<i32>, signal: &Option<i32>) -> String {
    let code = code.map_or_else(|| "null".to_string(), |c| c.to_string());
    match signal {
        Some(signal) => format!("code {code} (signal {signal})"),
        None => format!("code {code}"),
    }
}

/// Executes a prompt for one attempt. Implementations must not retry.
pub trait CodeAgent {
    fn name(&self) -> &str;

    /// Succeeds only when the agent exited cleanly and wrote `ctx.output_path`.
    fn run(&self, prompt: &str, ctx: &RunContext) -> Result<()>;
}

/// Agent launched from a registry command vector.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    command: AgentCommand,
    workdir: PathBuf,
}

impl CommandAgent {
    pub fn new(command: AgentCommand, workdir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            workdir: workdir.into(),
        }
    }
}

impl CodeAgent for CommandAgent {
    fn name(&self) -> &str {
        &self.command.name
    }

    #[instrument(skip_all, fields(agent = %self.command.name, task_id = %ctx.task_id, run_id = %ctx.run_id))]
    fn run(&self, prompt: &str, ctx: &RunContext) -> Result<()> {
        let log_path = ctx.log_path(self.name());
        for dir in [ctx.output_path.parent(), log_path.parent()]
            .into_iter()
            .flatten()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("create directory {}", dir.display()))?;
        }

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .current_dir(&self.workdir)
            .env(OUTPUT_PATH_ENV, &ctx.output_path)
            .env(OUTPUT_SCHEMA_PATH_ENV, &ctx.schema_path);

        info!(log = %log_path.display(), "invoking agent");
        let status = run_with_log(cmd, prompt.as_bytes(), &log_path).map_err(|source| {
            AgentError::Invocation {
                agent: self.name().to_string(),
                source,
            }
        })?;

        if !status.success() {
            warn!(exit_code = ?status.code(), "agent exited unsuccessfully");
            return Err(AgentError::Exit {
                agent: self.name().to_string(),
                code: status.code(),
                signal: exit_signal(&status),
            }
            .into());
        }
        if !ctx.output_path.exists() {
            return Err(AgentError::OutputMissing {
                agent: self.name().to_string(),
                path: ctx.output_path.clone(),
            }
            .into());
        }
        debug!("agent finished");
        Ok(())
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

/// Read and validate the output file written by an agent.
pub fn read_agent_output(path: &Path, contract: &OutputContract) -> Result<AgentOutput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read agent output {}", path.display()))?;
    let fields = contract
        .validate_str(&raw)
        .with_context(|| format!("validate agent output {}", path.display()))?;
    AgentOutput::from_validated(fields)
}
