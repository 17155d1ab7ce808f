//! CLI tests for `task-runner`.
//!
//! Spawns the binary inside a scratch git repository and checks stdout,
//! stderr and exit codes for each terminal outcome.

use std::fs;
use std::process::{Command, Output};

use task_runner::exit_codes;
use task_runner::test_support::{TestRepo, shell_agent_script};

fn runner(repo: &TestRepo, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_task-runner"))
        .current_dir(repo.path())
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("spawn task-runner")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Repo with one agent registered and committed alongside `tasks`.
fn repo_with(agent: &str, script: &str, tasks: &str) -> TestRepo {
    let repo = TestRepo::new().expect("repo");
    repo.install_agents(&[(agent, script)]).expect("agents");
    repo.write(repo.tasks_path("main"), tasks).expect("tasks");
    repo.commit_all("setup").expect("commit setup");
    repo
}

#[test]
fn add_task_appends_to_branch_tracker() {
    let repo = TestRepo::new().expect("repo");

    let output = runner(&repo, &["add-task", "Write docs"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "added TASK-1 to .devagent/tracker/main/tasks.md\n"
    );
    assert_eq!(
        fs::read_to_string(repo.tasks_path("main")).expect("tasks"),
        "- [ ] TASK-1: Write docs\n"
    );

    let output = runner(&repo, &["add-task", "Ship it"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).starts_with("added TASK-2 "));
}

#[test]
fn resolve_without_open_tasks_is_a_no_op() {
    let repo = TestRepo::new().expect("repo");

    let output = runner(&repo, &["resolve"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert_eq!(stdout(&output), "no open tasks\n");
    assert_eq!(repo.commit_count().expect("count"), 1);
}

#[test]
fn resolve_succeeds_and_reports_commit() {
    let script = shell_agent_script("success");
    let repo = repo_with("fake", &script, "- [ ] TASK-1: Add greeting\n");

    let output = runner(&repo, &["resolve"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    let head = repo.git(&["rev-parse", "HEAD"]).expect("head");
    assert_eq!(stdout(&output), format!("resolved TASK-1 ({})\n", head.trim()));
}

#[test]
fn blocked_tasks_refuse_new_work() {
    let script = shell_agent_script("success");
    let repo = repo_with(
        "fake",
        &script,
        "- [!] TASK-1: Stuck\n\n- [ ] TASK-2: Next\n",
    );

    let output = runner(&repo, &["resolve"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(stderr(&output).contains("blocked tasks present"), "{}", stderr(&output));
    assert!(!repo.path().join("work-TASK-2.txt").exists());
}

#[test]
fn unknown_agent_is_invalid_input() {
    let script = shell_agent_script("success");
    let repo = repo_with("fake", &script, "- [ ] TASK-1: Add greeting\n");

    let output = runner(&repo, &["resolve", "--agent", "nope"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(stderr(&output).contains("nope"), "{}", stderr(&output));
}

#[test]
fn failing_agent_exits_with_failed_code() {
    let repo = repo_with("broken", "exit 4\n", "- [ ] TASK-1: Add greeting\n");

    let output = runner(&repo, &["resolve"]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(
        stderr(&output).contains("broken agent exited with code 4"),
        "{}",
        stderr(&output)
    );
    assert!(
        fs::read_to_string(repo.tasks_path("main"))
            .expect("tasks")
            .starts_with("- [!] TASK-1: Add greeting")
    );
}

#[test]
fn non_success_outcome_exits_with_stopped_code() {
    let script = shell_agent_script("blocked");
    let repo = repo_with("stuck", &script, "- [ ] TASK-1: Add greeting\n");

    let output = runner(&repo, &["resolve", "--all"]);

    assert_eq!(output.status.code(), Some(exit_codes::STOPPED));
    assert!(stderr(&output).contains("ended with status blocked"), "{}", stderr(&output));
    assert_eq!(repo.commit_count().expect("count"), 3);
}
