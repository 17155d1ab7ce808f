//! Runner configuration stored in `.devagent/config.json`.
//!
//! All keys are optional. Relative paths resolve against the workspace root,
//! and the tracker file defaults to a folder scoped by the current branch.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::io::paths::{encode_segment, resolve_against};

/// Config path used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = ".devagent/config.json";
/// Agent used when neither the file nor the CLI names one.
pub const DEFAULT_AGENT: &str = "codex";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("branch name must not be empty")]
    EmptyBranch,

    #[error("{field} must be a non-empty string")]
    EmptyValue { field: &'static str },

    #[error("unknown agent \"{name}\" (available: {})", .available.join(", "))]
    UnknownAgent {
        name: String,
        available: Vec<String>,
    },

    #[error("agent \"{name}\" must have a non-empty command of non-blank strings")]
    InvalidCommand { name: String },
}

/// One registry entry: the command vector used to launch an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentRegistryEntry {
    pub cmd: Vec<String>,
}

impl AgentRegistryEntry {
    fn new(cmd: &[&str]) -> Self {
        Self {
            cmd: cmd.iter().map(|part| part.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Lowercased registry key of the default agent.
    pub default: String,
    pub registry: BTreeMap<String, AgentRegistryEntry>,
}

/// A registry entry resolved to something that can be spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl AgentConfig {
    /// Resolve a registry key to a spawnable command.
    pub fn command_for(&self, name: &str) -> Result<AgentCommand, ConfigError> {
        let key = normalize_key(name);
        let entry = self
            .registry
            .get(&key)
            .ok_or_else(|| self.unknown_agent(&key))?;
        let (program, args) = entry
            .cmd
            .split_first()
            .ok_or_else(|| ConfigError::InvalidCommand { name: key.clone() })?;
        Ok(AgentCommand {
            name: key,
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn unknown_agent(&self, name: &str) -> ConfigError {
        ConfigError::UnknownAgent {
            name: name.to_string(),
            available: self.registry.keys().cloned().collect(),
        }
    }
}

/// Fully resolved configuration for one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub agent: AgentConfig,
    pub tasks_file: PathBuf,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.default.trim().is_empty() {
            return Err(ConfigError::EmptyValue {
                field: "agent.default",
            });
        }
        if self.tasks_file.as_os_str().is_empty() {
            return Err(ConfigError::EmptyValue { field: "tasksFile" });
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyValue { field: "outputDir" });
        }
        for (name, entry) in &self.agent.registry {
            if entry.cmd.is_empty() || entry.cmd.iter().any(|part| part.trim().is_empty()) {
                return Err(ConfigError::InvalidCommand { name: name.clone() });
            }
        }
        if !self.agent.registry.contains_key(&self.agent.default) {
            return Err(self.agent.unknown_agent(&self.agent.default));
        }
        Ok(())
    }
}

/// On-disk shape. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FileConfig {
    agent: FileAgentConfig,
    tasks_file: Option<String>,
    output_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileAgentConfig {
    default: Option<String>,
    registry: BTreeMap<String, AgentRegistryEntry>,
}

/// Agents known without any configuration.
pub fn builtin_registry() -> BTreeMap<String, AgentRegistryEntry> {
    BTreeMap::from([
        (
            "codex".to_string(),
            AgentRegistryEntry::new(&[
                "codex",
                "exec",
                "--sandbox",
                "workspace-write",
                "--skip-git-repo-check",
                "-",
            ]),
        ),
        (
            "gemini".to_string(),
            AgentRegistryEntry::new(&["gemini", "--approval-mode", "auto_edit"]),
        ),
        (
            "claude".to_string(),
            AgentRegistryEntry::new(&[
                "claude",
                "--allowedTools",
                "Read,Write,Bash",
                "--output-format",
                "json",
                "-p",
                "--verbose",
            ]),
        ),
    ])
}

/// Overlay user entries on the built-ins, keyed by trimmed lowercase name.
///
/// Entries with a blank name are ignored.
pub fn merge_registry(
    user: &BTreeMap<String, AgentRegistryEntry>,
) -> BTreeMap<String, AgentRegistryEntry> {
    let mut merged = builtin_registry();
    for (name, entry) in user {
        let key = normalize_key(name);
        if key.is_empty() {
            continue;
        }
        merged.insert(key, entry.clone());
    }
    merged
}

/// Pick the agent for this run: the CLI override if given, else the default.
pub fn resolve_agent_name(
    requested: Option<&str>,
    agent: &AgentConfig,
) -> Result<String, ConfigError> {
    let name = requested
        .map(normalize_key)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| agent.default.clone());
    if agent.registry.contains_key(&name) {
        Ok(name)
    } else {
        Err(agent.unknown_agent(&name))
    }
}

fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<Option<String>, ConfigError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ConfigError::EmptyValue { field }),
        other => Ok(other),
    }
}

/// Load the branch-scoped config and create the directories it points at.
///
/// A missing file yields the defaults.
#[instrument(skip_all, fields(path = %path.display(), branch = %branch))]
pub fn load_config(path: &Path, root: &Path, branch: &str) -> Result<Config> {
    if branch.trim().is_empty() {
        return Err(ConfigError::EmptyBranch.into());
    }
    let path = resolve_against(root, path);
    let file: FileConfig = if path.exists() {
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?
    } else {
        debug!("config file missing, using defaults");
        FileConfig::default()
    };

    let config_dir = path.parent().unwrap_or(root).to_path_buf();
    let tasks_file = match non_empty(file.tasks_file, "tasksFile")? {
        Some(p) => resolve_against(root, p),
        None => config_dir
            .join("tracker")
            .join(encode_segment(branch))
            .join("tasks.md"),
    };
    let output_dir = match non_empty(file.output_dir, "outputDir")? {
        Some(p) => resolve_against(root, p),
        None => config_dir.join("output"),
    };
    let default = file
        .agent
        .default
        .map(|name| normalize_key(&name))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_AGENT.to_string());

    let cfg = Config {
        agent: AgentConfig {
            default,
            registry: merge_registry(&file.agent.registry),
        },
        tasks_file,
        output_dir,
    };
    cfg.validate()?;

    fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("create directory {}", cfg.output_dir.display()))?;
    if let Some(parent) = cfg.tasks_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    debug!(tasks_file = %cfg.tasks_file.display(), agent = %cfg.agent.default, "config loaded");
    Ok(cfg)
}
