//! Git adapter for the resolve loop.
//!
//! The orchestrator only needs four operations, exposed through [`GitOps`] so
//! tests can substitute a recording fake. [`Git`] is the real implementation
//! around `git` subprocess calls.

use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreflightError {
    #[error("working tree not clean; commit or stash changes first:\n{}", format_entries(.entries))]
    DirtyWorkingTree { entries: Vec<StatusEntry> },
}

fn format_entries(entries: &[StatusEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{} {}", entry.code, entry.path))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Git operations the orchestrator depends on.
pub trait GitOps {
    /// Current branch, or `detached-<short sha>` on a detached HEAD.
    fn current_branch_name(&self) -> Result<String>;

    fn ensure_clean_working_tree(&self) -> Result<()>;

    /// Stage everything and commit; returns the new HEAD sha.
    fn commit(&self, title: &str, body: &str) -> Result<String>;

    /// Push the current branch. A no-op unless pushing was enabled.
    fn push(&self) -> Result<()>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    push_enabled: bool,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>, push_enabled: bool) -> Self {
        Self {
            workdir: workdir.into(),
            push_enabled,
        }
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

impl GitOps for Git {
    #[instrument(skip_all)]
    fn current_branch_name(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            let sha = self.run_capture(&["rev-parse", "--short", "HEAD"])?;
            warn!("detached HEAD detected");
            return Ok(format!("detached-{}", sha.trim()));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    #[instrument(skip_all)]
    fn ensure_clean_working_tree(&self) -> Result<()> {
        let entries = self.status_porcelain()?;
        if entries.is_empty() {
            debug!("worktree is clean");
            return Ok(());
        }
        warn!(dirty_count = entries.len(), "worktree not clean");
        Err(PreflightError::DirtyWorkingTree { entries }.into())
    }

    #[instrument(skip_all, fields(title = %title))]
    fn commit(&self, title: &str, body: &str) -> Result<String> {
        self.run_checked(&["add", "-A"])?;
        self.run_checked(&["commit", "-m", title, "-m", body])?;
        let sha = self.run_capture(&["rev-parse", "HEAD"])?.trim().to_string();
        info!(sha = %sha, "committed");
        Ok(sha)
    }

    #[instrument(skip_all)]
    fn push(&self) -> Result<()> {
        if !self.push_enabled {
            debug!("push disabled, skipping");
            return Ok(());
        }
        self.run_checked(&["push"])?;
        info!("pushed");
        Ok(())
    }
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}
