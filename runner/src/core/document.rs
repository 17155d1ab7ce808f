//! Line-oriented parser and serializer for the task tracker file.
//!
//! ```text
//! Free-form prelude shown to the agent.
//!
//! - [ ] TASK-1: Open task title
//! Description lines follow the task line.
//!
//! - [x] TASK-2: Done task
//! - [!] TASK-3: Blocked task
//! ```
//!
//! Everything before the first task line is prelude. Non-task lines after a
//! task line belong to that task's description.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::core::task::{Task, TaskStatus, TaskTrackerDocument};

static TASK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-\s*\[\s*([^\]\s]?)\s*\]\s+(\S+):\s*(.*)$").expect("task line regex")
});

/// Errors raised while parsing or editing a tracker document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("unknown task status symbol '{symbol}' on line {line}")]
    UnknownStatusSymbol { symbol: String, line: usize },

    #[error("duplicate task id detected: {id} on line {line}")]
    DuplicateId { id: String, line: usize },

    #[error("task with id \"{id}\" not found")]
    NotFound { id: String },

    #[error("cannot number a new task: {id} is the highest representable id")]
    IdSpaceExhausted { id: String },

    #[error("invalid task title: {reason}")]
    InvalidTitle { reason: String },
}

struct TaskLine<'a> {
    symbol: &'a str,
    id: &'a str,
    title: &'a str,
}

fn match_task_line(line: &str) -> Option<TaskLine<'_>> {
    if line.trim().is_empty() {
        return None;
    }
    let caps = TASK_LINE_RE.captures(line)?;
    Some(TaskLine {
        symbol: caps.get(1).map_or("", |m| m.as_str()),
        id: caps.get(2).map_or("", |m| m.as_str()),
        title: caps.get(3).map_or("", |m| m.as_str()),
    })
}

/// Parse tracker file contents.
///
/// Fails on the first unknown checkbox symbol or duplicate id.
pub fn parse_document(content: &str) -> Result<TaskTrackerDocument, DocumentError> {
    let lines: Vec<&str> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let mut idx = 0;
    let mut prelude: Vec<&str> = Vec::new();
    while idx < lines.len() && match_task_line(lines[idx]).is_none() {
        prelude.push(lines[idx]);
        idx += 1;
    }
    while prelude.last().is_some_and(|line| line.trim().is_empty()) {
        prelude.pop();
    }

    let mut tasks: Vec<Task> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    while idx < lines.len() {
        let line_no = idx + 1;
        let Some(header) = match_task_line(lines[idx]) else {
            idx += 1;
            continue;
        };
        let status =
            TaskStatus::from_symbol(header.symbol).ok_or_else(|| DocumentError::UnknownStatusSymbol {
                symbol: header.symbol.to_string(),
                line: line_no,
            })?;
        let id = header.id.trim().to_string();
        let title = header.title.trim().to_string();
        idx += 1;

        let start = idx;
        while idx < lines.len() && match_task_line(lines[idx]).is_none() {
            idx += 1;
        }
        let description = normalize_description(&lines[start..idx]);

        if !seen.insert(id.clone()) {
            return Err(DocumentError::DuplicateId { id, line: line_no });
        }
        tasks.push(Task {
            id,
            title,
            description,
            status,
        });
    }

    Ok(TaskTrackerDocument {
        prelude_text: prelude.join("\n"),
        tasks,
    })
}

fn normalize_description(lines: &[&str]) -> String {
    let mut start = 0;
    let mut end = lines.len();
    while start < end && lines[start].trim().is_empty() {
        start += 1;
    }
    while end > start && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    lines[start..end]
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a document in canonical form (inverse of [`parse_document`]).
pub fn serialize_document(doc: &TaskTrackerDocument) -> String {
    let mut out = String::new();
    if !doc.prelude_text.is_empty() {
        out.push_str(&doc.prelude_text);
        out.push('\n');
        if !doc.tasks.is_empty() {
            out.push('\n');
        }
    }
    for (i, task) in doc.tasks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!(
            "- [{}] {}: {}\n",
            task.status.symbol(),
            task.id,
            task.title
        ));
        if !task.description.trim().is_empty() {
            for line in task.description.lines() {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::task;
    use proptest::prelude::*;

    const SAMPLE: &str = "# Project notes\n\nKeep changes small.\n\n\
- [ ] TASK-1: Add login form\n  Use the existing layout.\n\n  Validate inputs.\n\n\
- [x] TASK-2: Set up CI\n\
- [!] TASK-3: Migrate database\nNeeds credentials.\n";

    #[test]
    fn parses_prelude_tasks_and_descriptions() {
        let doc = parse_document(SAMPLE).expect("parse");
        assert_eq!(doc.prelude_text, "# Project notes\n\nKeep changes small.");
        assert_eq!(doc.tasks.len(), 3);

        assert_eq!(doc.tasks[0].id, "TASK-1");
        assert_eq!(doc.tasks[0].title, "Add login form");
        assert_eq!(doc.tasks[0].status, TaskStatus::Open);
        assert_eq!(
            doc.tasks[0].description,
            "Use the existing layout.\n\nValidate inputs."
        );

        assert_eq!(doc.tasks[1].status, TaskStatus::Done);
        assert_eq!(doc.tasks[1].description, "");
        assert_eq!(doc.tasks[2].status, TaskStatus::Blocked);
        assert_eq!(doc.tasks[2].description, "Needs credentials.");
    }

    #[test]
    fn accepts_uppercase_done_marker_and_crlf() {
        let doc = parse_document("- [X] TASK-9: Shipped\r\nnotes\r\n").expect("parse");
        assert_eq!(doc.tasks[0].status, TaskStatus::Done);
        assert_eq!(doc.tasks[0].description, "notes");
    }

    #[test]
    fn title_keeps_colons_after_the_id() {
        let doc = parse_document("- [ ] TASK-1: fix parser: handle colons\n").expect("parse");
        assert_eq!(doc.tasks[0].id, "TASK-1");
        assert_eq!(doc.tasks[0].title, "fix parser: handle colons");
    }

    #[test]
    fn ids_may_contain_colons() {
        let doc = parse_document("- [ ] api:v2: Bump client: pin 2.1\n").expect("parse");
        assert_eq!(doc.tasks[0].id, "api:v2");
        assert_eq!(doc.tasks[0].title, "Bump client: pin 2.1");

        let canonical = serialize_document(&doc);
        assert_eq!(canonical, "- [ ] api:v2: Bump client: pin 2.1\n");
        assert_eq!(parse_document(&canonical).expect("reparse"), doc);
    }

    #[test]
    fn unknown_status_symbol_is_fatal() {
        let err = parse_document("intro\n- [?] TASK-1: huh\n").unwrap_err();
        assert_eq!(
            err,
            DocumentError::UnknownStatusSymbol {
                symbol: "?".to_string(),
                line: 2,
            }
        );
    }

    #[test]
    fn duplicate_ids_are_fatal_regardless_of_status() {
        let err = parse_document("- [x] TASK-1: a\n- [!] TASK-1: b\n").unwrap_err();
        assert_eq!(
            err,
            DocumentError::DuplicateId {
                id: "TASK-1".to_string(),
                line: 2,
            }
        );
    }

    #[test]
    fn empty_input_yields_empty_document() {
        let doc = parse_document("").expect("parse");
        assert_eq!(doc, TaskTrackerDocument::default());
        assert_eq!(serialize_document(&doc), "");
    }

    #[test]
    fn serializes_canonical_layout() {
        let mut first = task("TASK-1", "First", TaskStatus::Open);
        first.description = "line one\nline two".to_string();
        let doc = TaskTrackerDocument {
            prelude_text: "Intro".to_string(),
            tasks: vec![first, task("TASK-2", "Second", TaskStatus::Blocked)],
        };
        assert_eq!(
            serialize_document(&doc),
            "Intro\n\n- [ ] TASK-1: First\nline one\nline two\n\n- [!] TASK-2: Second\n"
        );
    }

    #[test]
    fn non_canonical_input_normalizes_on_first_round_trip() {
        let doc = parse_document(SAMPLE).expect("parse");
        let canonical = serialize_document(&doc);
        assert_eq!(parse_document(&canonical).expect("reparse"), doc);
        assert_eq!(
            serialize_document(&parse_document(&canonical).expect("reparse")),
            canonical
        );
    }

    fn status_strategy() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Open),
            Just(TaskStatus::Done),
            Just(TaskStatus::Blocked),
        ]
    }

    fn task_strategy() -> impl Strategy<Value = (String, TaskStatus, Vec<String>)> {
        (
            "[A-Za-z][A-Za-z0-9 ,.]{0,30}",
            status_strategy(),
            prop::collection::vec("[a-z][a-z0-9 ]{0,20}", 0..4),
        )
    }

    proptest! {
        #[test]
        fn colon_ids_survive_round_trip(
            ids in prop::collection::vec("[a-z]{1,5}(:[a-z0-9]{1,5}){0,2}:?", 1..5),
            title in "[A-Za-z][A-Za-z0-9 :]{0,20}",
        ) {
            let tasks: Vec<Task> = ids
                .iter()
                .enumerate()
                .map(|(i, id)| Task::open(format!("{i}-{id}"), title.trim()))
                .collect();
            let doc = TaskTrackerDocument { prelude_text: String::new(), tasks };
            let parsed = parse_document(&serialize_document(&doc)).expect("parse");
            prop_assert_eq!(parsed, doc);
        }

        #[test]
        fn parse_inverts_serialize(
            prelude in prop::collection::vec("[A-Za-z#][A-Za-z0-9 ]{0,20}", 0..3),
            entries in prop::collection::vec(task_strategy(), 0..6),
        ) {
            let tasks: Vec<Task> = entries
                .into_iter()
                .enumerate()
                .map(|(i, (title, status, desc))| Task {
                    id: format!("TASK-{}", i + 1),
                    title: title.trim().to_string(),
                    description: desc.iter().map(|l| l.trim()).collect::<Vec<_>>().join("\n"),
                    status,
                })
                .collect();
            let doc = TaskTrackerDocument { prelude_text: prelude.join("\n"), tasks };
            let parsed = parse_document(&serialize_document(&doc)).expect("parse");
            prop_assert_eq!(parsed, doc);
        }

        #[test]
        fn any_repeated_id_is_rejected(
            first in status_strategy(),
            second in status_strategy(),
            filler in 0usize..3,
        ) {
            let mut text = format!("- [{}] DUP: one\n", first.symbol());
            for i in 0..filler {
                text.push_str(&format!("- [ ] OTHER-{i}: filler\n"));
            }
            text.push_str(&format!("- [{}] DUP: two\n", second.symbol()));
            prop_assert_eq!(
                parse_document(&text).unwrap_err(),
                DocumentError::DuplicateId { id: "DUP".to_string(), line: filler + 2 }
            );
        }
    }
}
