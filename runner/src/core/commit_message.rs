//! Commit title/body construction from a task and its validated output.
//!
//! Pure string functions; git interaction lives in `io::git`.

use crate::core::task::Task;
use crate::core::types::{AgentOutput, AgentStatus};

const REVIEW_NOTICE: &str = "MACHINE-GENERATED COMMIT.\n\n\
This change was produced by an automated code agent and has not been reviewed by a human.\n\
Do not assume it is correct, complete or ready for production.\n\n\
Human review is required.";

/// Human-readable outcome: the agent's commit message, else a status fallback.
pub fn human_message(task: &Task, output: &AgentOutput) -> String {
    let commit_message = output.commit_message.trim();
    if !commit_message.is_empty() {
        return commit_message.to_string();
    }
    if output.status.is_success() {
        return task.title.clone();
    }
    format!("Task ended with status: {}", output.status)
}

/// `<id> [completed|blocked]: <subject>`.
pub fn format_title(task: &Task, output: &AgentOutput) -> String {
    let (subject, _) = split_commit_message(&output.commit_message);
    let subject = if subject.is_empty() {
        collapse_whitespace(&human_message(task, output))
    } else {
        subject
    };
    format!("{} [{}]: {}", task.id, status_label(output.status), subject)
        .trim()
        .to_string()
}

/// Agent body (or fallback message), agent notes, then the review notice.
pub fn format_body(task: &Task, output: &AgentOutput) -> String {
    let (subject, body) = split_commit_message(&output.commit_message);
    let message = if !body.is_empty() {
        body
    } else if subject.is_empty() {
        human_message(task, output)
    } else {
        String::new()
    };

    [
        message.trim().to_string(),
        "---".to_string(),
        format_notes(output),
        REVIEW_NOTICE.to_string(),
    ]
    .into_iter()
    .filter(|section| !section.is_empty())
    .collect::<Vec<_>>()
    .join("\n\n")
}

fn status_label(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Success => "completed",
        AgentStatus::Blocked | AgentStatus::Failed => "blocked",
    }
}

fn split_commit_message(message: &str) -> (String, String) {
    let trimmed = message.trim();
    match trimmed.split_once('\n') {
        Some((first, rest)) => (first.trim().to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_notes(output: &AgentOutput) -> String {
    let entries = [
        ("Changes made", &output.changes_made),
        ("Assumptions", &output.assumptions),
        ("Decisions taken", &output.decisions_taken),
        ("Points of unclarity", &output.points_of_unclarity),
        ("Tests run", &output.tests_run),
    ];
    let mut sections = vec!["Agent notes\n-----------".to_string()];
    for (label, content) in entries {
        let underline = "-".repeat(label.len());
        let content = content.trim();
        if content.is_empty() {
            sections.push(format!("{label}\n{underline}"));
        } else {
            sections.push(format!("{label}\n{underline}\n{content}"));
        }
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::TaskStatus;
    use crate::test_support::{agent_output, task};

    #[test]
    fn title_uses_commit_subject_and_status_label() {
        let t = task("TASK-4", "Add parser", TaskStatus::Open);
        let mut out = agent_output("TASK-4", AgentStatus::Success);
        out.commit_message = "Add parser module\n\nHandles task lines.".to_string();
        assert_eq!(format_title(&t, &out), "TASK-4 [completed]: Add parser module");

        out.status = AgentStatus::Failed;
        assert_eq!(format_title(&t, &out), "TASK-4 [blocked]: Add parser module");
    }

    #[test]
    fn empty_commit_message_falls_back_by_status() {
        let t = task("TASK-1", "Write docs", TaskStatus::Open);
        let mut out = agent_output("TASK-1", AgentStatus::Success);
        out.commit_message = "  ".to_string();
        assert_eq!(human_message(&t, &out), "Write docs");
        assert_eq!(format_title(&t, &out), "TASK-1 [completed]: Write docs");

        out.status = AgentStatus::Blocked;
        assert_eq!(human_message(&t, &out), "Task ended with status: blocked");
        assert!(format_body(&t, &out).starts_with("Task ended with status: blocked\n\n---"));
    }

    #[test]
    fn body_contains_agent_body_notes_and_notice() {
        let t = task("TASK-1", "Write docs", TaskStatus::Open);
        let mut out = agent_output("TASK-1", AgentStatus::Success);
        out.commit_message = "Write docs\n\nDocument the CLI flags.".to_string();
        out.tests_run = String::new();
        let body = format_body(&t, &out);

        assert!(body.starts_with("Document the CLI flags.\n\n---\n\nAgent notes"));
        assert!(body.contains("Changes made\n------------\n"));
        assert!(body.contains("Tests run\n---------\n\nMACHINE-GENERATED COMMIT."));
        assert!(body.ends_with("Human review is required."));
    }

    #[test]
    fn subject_only_message_has_no_leading_message_section() {
        let t = task("TASK-1", "Write docs", TaskStatus::Open);
        let mut out = agent_output("TASK-1", AgentStatus::Success);
        out.commit_message = "Write docs".to_string();
        assert!(format_body(&t, &out).starts_with("---\n\nAgent notes"));
    }
}
