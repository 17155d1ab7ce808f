//! Test-only fixtures and fakes for the agent and git seams.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tempfile::TempDir;

use crate::core::task::{Task, TaskStatus};
use crate::core::types::{AgentOutput, AgentStatus};
use crate::io::agent::{AgentError, CodeAgent};
use crate::io::config::{DEFAULT_AGENT, DEFAULT_CONFIG_PATH};
use crate::io::git::{GitOps, PreflightError, StatusEntry};
use crate::io::paths::encode_segment;
use crate::io::run_context::RunContext;
use crate::resolve::Workspace;

/// Create a task with an empty description.
pub fn task(id: &str, title: &str, status: TaskStatus) -> Task {
    Task {
        status,
        ..Task::open(id, title)
    }
}

/// A contract-valid output for `task_id`.
pub fn agent_output(task_id: &str, status: AgentStatus) -> AgentOutput {
    AgentOutput {
        task_id: task_id.to_string(),
        status,
        commit_message: format!("Resolve {task_id}\n\nApply the requested change."),
        changes_made: "Updated the relevant module.".to_string(),
        assumptions: "None".to_string(),
        decisions_taken: "Kept the change minimal.".to_string(),
        points_of_unclarity: "None".to_string(),
        tests_run: "cargo test".to_string(),
    }
}

/// What a [`ScriptedAgent`] does on its next call.
#[derive(Debug, Clone)]
pub enum AgentReply {
    /// Write this output as JSON and succeed.
    Output(AgentOutput),
    /// Write this text verbatim and succeed.
    Raw(String),
    /// Exit with this code without writing output.
    Exit(i32),
}

/// Shell agent that answers for the task named in its prompt.
///
/// `status` is written verbatim into the output JSON.
pub fn shell_agent_script(status: &str) -> String {
    format!(
        r#"id=$(awk 'prev == "Task:" {{ print $1; exit }} {{ prev = $0 }}')
echo "working on $id" >&2
echo "change for $id" > "work-$id.txt"
cat > "$OUTPUT_PATH" <<JSON
{{"taskId": "$id", "status": "{status}", "commitMessage": "Resolve $id", "changesMade": "Wrote work-$id.txt.", "assumptions": "None", "decisionsTaken": "None", "pointsOfUnclarity": "None", "testsRun": "None"}}
JSON
"#
    )
}

/// Agent that replays scripted replies and records the prompts it received.
#[derive(Debug)]
pub struct ScriptedAgent {
    replies: RefCell<VecDeque<AgentReply>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new(replies: Vec<AgentReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl CodeAgent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    fn run(&self, prompt: &str, ctx: &RunContext) -> Result<()> {
        self.prompts.borrow_mut().push(prompt.to_string());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted agent has no reply left"))?;
        let contents = match reply {
            AgentReply::Output(output) => serde_json::to_string_pretty(&output)?,
            AgentReply::Raw(raw) => raw,
            AgentReply::Exit(code) => {
                return Err(AgentError::Exit {
                    agent: self.name().to_string(),
                    code: Some(code),
                    signal: None,
                }
                .into());
            }
        };
        if let Some(parent) = ctx.output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&ctx.output_path, contents)?;
        Ok(())
    }
}

/// A commit captured by [`RecordingGit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub title: String,
    pub body: String,
    pub sha: String,
}

/// In-memory git double that records commits and pushes.
#[derive(Debug)]
pub struct RecordingGit {
    branch: String,
    dirty: bool,
    reject_commits: bool,
    commits: RefCell<Vec<RecordedCommit>>,
    pushes: Cell<usize>,
}

impl Default for RecordingGit {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGit {
    /// Clean tree on `main`.
    pub fn new() -> Self {
        Self {
            branch: "main".to_string(),
            dirty: false,
            reject_commits: false,
            commits: RefCell::new(Vec::new()),
            pushes: Cell::new(0),
        }
    }

    /// Tree with an untracked file, so preflight fails.
    pub fn dirty() -> Self {
        Self {
            dirty: true,
            ..Self::new()
        }
    }

    /// Clean tree whose commits always fail, as with a rejecting hook.
    pub fn rejecting_commits() -> Self {
        Self {
            reject_commits: true,
            ..Self::new()
        }
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.commits.borrow().clone()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.get()
    }
}

impl GitOps for RecordingGit {
    fn current_branch_name(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    fn ensure_clean_working_tree(&self) -> Result<()> {
        if self.dirty {
            return Err(PreflightError::DirtyWorkingTree {
                entries: vec![StatusEntry {
                    code: "??".to_string(),
                    path: "scratch.txt".to_string(),
                }],
            }
            .into());
        }
        Ok(())
    }

    fn commit(&self, title: &str, body: &str) -> Result<String> {
        if self.reject_commits {
            return Err(anyhow!("git commit failed: pre-commit hook rejected the change"));
        }
        let mut commits = self.commits.borrow_mut();
        let sha = format!("{:040x}", commits.len() + 1);
        commits.push(RecordedCommit {
            title: title.to_string(),
            body: body.to_string(),
            sha: sha.clone(),
        });
        Ok(sha)
    }

    fn push(&self) -> Result<()> {
        self.pushes.set(self.pushes.get() + 1);
        Ok(())
    }
}

/// Throwaway git repository on branch `main` with one initial commit.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("tempdir")?;
        let repo = Self { dir };
        repo.git(&["init", "-q"])?;
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"])?;
        repo.git(&["config", "user.email", "runner@example.com"])?;
        repo.git(&["config", "user.name", "Runner Test"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        repo.write("README.md", "# test repo\n")?;
        repo.commit_all("initial commit")?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.path(), DEFAULT_CONFIG_PATH)
    }

    /// Default tracker location for `branch`.
    pub fn tasks_path(&self, branch: &str) -> PathBuf {
        self.path()
            .join(".devagent/tracker")
            .join(encode_segment(branch))
            .join("tasks.md")
    }

    pub fn write(&self, rel: impl AsRef<Path>, contents: &str) -> Result<()> {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Install shell-script agents and a config registering them.
    ///
    /// Each script lands at `agents/<name>.sh`; the first agent is the default.
    pub fn install_agents(&self, agents: &[(&str, &str)]) -> Result<()> {
        let mut registry = serde_json::Map::new();
        for (name, script) in agents {
            let rel = format!("agents/{name}.sh");
            self.write(&rel, script)?;
            registry.insert(name.to_string(), json!({ "cmd": ["sh", rel] }));
        }
        let default = agents.first().map_or(DEFAULT_AGENT, |(name, _)| *name);
        let config = json!({ "agent": { "default": default, "registry": registry } });
        self.write(
            DEFAULT_CONFIG_PATH,
            &serde_json::to_string_pretty(&config).context("serialize config")?,
        )
    }

    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-q", "-m", message])?;
        Ok(())
    }

    pub fn commit_count(&self) -> Result<usize> {
        let out = self.git(&["rev-list", "--count", "HEAD"])?;
        out.trim().parse().context("parse commit count")
    }

    pub fn last_commit_message(&self) -> Result<String> {
        Ok(self
            .git(&["log", "-1", "--format=%B"])?
            .trim_end()
            .to_string())
    }

    /// Run git in the repo and return stdout.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
