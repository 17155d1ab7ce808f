//! I/O helpers for runner commands.

pub mod agent;
pub mod config;
pub mod git;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod run_context;
pub mod task_store;
