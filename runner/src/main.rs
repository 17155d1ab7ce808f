//! Task resolution runner.
//!
//! Reads the branch-scoped tracker file (`.devagent/tracker/<branch>/tasks.md`
//! by default), hands the first open task to a code agent, and commits the
//! outcome. `add-task` appends new work to the same file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use task_runner::core::selector::pick_next_task;
use task_runner::exit_codes;
use task_runner::io::agent::CommandAgent;
use task_runner::io::config::{DEFAULT_CONFIG_PATH, resolve_agent_name};
use task_runner::io::git::Git;
use task_runner::io::paths::display_relative;
use task_runner::io::task_store::TaskStore;
use task_runner::logging;
use task_runner::resolve::{
    AttemptOutcome, Workspace, classify, ensure_no_blocked_tasks, run_all, run_once,
};

#[derive(Parser)]
#[command(
    name = "task-runner",
    version,
    about = "Resolve tracked tasks one at a time with an external code agent"
)]
struct Cli {
    /// Log progress to stderr (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file, relative to the current directory.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the next open task, committing the outcome.
    Resolve {
        /// Keep going until no open task remains or one does not succeed.
        #[arg(long)]
        all: bool,
        /// Agent registry name; defaults to `agent.default` from the config.
        #[arg(long)]
        agent: Option<String>,
        /// Push after each commit.
        #[arg(long)]
        push: bool,
    },
    /// Append a new open task to the current branch's tracker.
    AddTask {
        /// Single-line task title.
        title: String,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(if cli.verbose { "info" } else { "warn" });
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(classify(&err).exit_code());
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let root = std::env::current_dir().context("resolve current directory")?;
    let workspace = Workspace::new(root, cli.config);
    match cli.command {
        Command::Resolve { all, agent, push } => {
            cmd_resolve(&workspace, all, agent.as_deref(), push)
        }
        Command::AddTask { title } => cmd_add_task(&workspace, &title),
    }
}

fn cmd_resolve(workspace: &Workspace, all: bool, agent: Option<&str>, push: bool) -> Result<i32> {
    let git = Git::new(&workspace.root, push);
    let cfg = workspace.load_config(&git)?;
    let doc = TaskStore::new(&cfg.tasks_file).load_or_default()?;
    ensure_no_blocked_tasks(&doc)?;
    if pick_next_task(&doc.tasks).is_none() {
        println!("no open tasks");
        return Ok(exit_codes::OK);
    }

    let name = resolve_agent_name(agent, &cfg.agent)?;
    let agent = CommandAgent::new(cfg.agent.command_for(&name)?, &workspace.root);

    if all {
        let outcome = run_all(workspace, &agent, &git)?;
        for task_id in &outcome.resolved {
            println!("resolved {task_id}");
        }
        return Ok(exit_codes::OK);
    }
    match run_once(workspace, &agent, &git)? {
        AttemptOutcome::NoOpenTask => println!("no open tasks"),
        AttemptOutcome::Resolved {
            task_id,
            commit_sha,
        } => println!("resolved {task_id} ({commit_sha})"),
    }
    Ok(exit_codes::OK)
}

fn cmd_add_task(workspace: &Workspace, title: &str) -> Result<i32> {
    let git = Git::new(&workspace.root, false);
    let cfg = workspace.load_config(&git)?;
    let store = TaskStore::new(&cfg.tasks_file);
    let task = store.add_task(title)?;
    println!(
        "added {} to {}",
        task.id,
        display_relative(store.path(), &workspace.root)
    );
    Ok(exit_codes::OK)
}
