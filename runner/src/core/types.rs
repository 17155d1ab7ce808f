//! Agent result types and the contract that describes them.
//!
//! [`AgentOutput`] is the only data crossing the process boundary. Its shape is
//! declared once in [`AgentOutput::contract`]; the serde field names must match
//! the contract field names (checked by tests).

use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::contract::{ContractField, OutputContract};

/// Agent-declared outcome of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Success,
    Blocked,
    Failed,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Success => "success",
            AgentStatus::Blocked => "blocked",
            AgentStatus::Failed => "failed",
        }
    }

    pub fn is_success(self) -> bool {
        self == AgentStatus::Success
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated structured result of one agent invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutput {
    pub task_id: String,
    pub status: AgentStatus,
    pub commit_message: String,
    pub changes_made: String,
    pub assumptions: String,
    pub decisions_taken: String,
    pub points_of_unclarity: String,
    pub tests_run: String,
}

impl AgentOutput {
    /// The output contract agents are asked to satisfy.
    pub fn contract() -> OutputContract {
        OutputContract::new(vec![
            ContractField::string("taskId", "The task id exactly as given in the Task section."),
            ContractField::string("status", "Outcome of the attempt.")
                .one_of(&["success", "blocked", "failed"]),
            ContractField::string(
                "commitMessage",
                "Full commit message: imperative subject of at most 50 characters, a blank line, \
                 then a body wrapped near 72 characters explaining what changed and why.",
            )
            .max_lines(10),
            ContractField::string(
                "changesMade",
                "What changed in this task; concise but specific.",
            )
            .max_lines(20),
            ContractField::string(
                "assumptions",
                "Assumptions made, with context; write \"None\" if there were none.",
            )
            .max_lines(20),
            ContractField::string(
                "decisionsTaken",
                "Key decisions with their rationale and the trade-offs considered.",
            )
            .max_lines(20),
            ContractField::string(
                "pointsOfUnclarity",
                "Open questions or unclear areas; write \"None\" if there were none.",
            )
            .max_lines(20),
            ContractField::string(
                "testsRun",
                "Tests that were run and their outcome; say so explicitly if none ran.",
            )
            .max_lines(20),
        ])
    }

    /// Build from a map already checked by [`OutputContract::validate`].
    pub fn from_validated(fields: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(fields))
            .context("validated output does not match AgentOutput")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::agent_output;

    #[test]
    fn contract_fields_match_serialized_output_fields() {
        let sample = serde_json::to_value(agent_output("TASK-1", AgentStatus::Success))
            .expect("serialize");
        let mut serialized: Vec<String> = sample
            .as_object()
            .expect("object")
            .keys()
            .cloned()
            .collect();
        let mut declared: Vec<String> = AgentOutput::contract()
            .fields()
            .iter()
            .map(|field| field.name.clone())
            .collect();
        serialized.sort();
        declared.sort();
        assert_eq!(serialized, declared);
    }

    #[test]
    fn every_contract_field_is_required() {
        assert!(AgentOutput::contract().fields().iter().all(|f| f.required));
    }

    #[test]
    fn status_enum_matches_serde_names() {
        let contract = AgentOutput::contract();
        let allowed = contract
            .field("status")
            .and_then(|field| field.allowed.clone())
            .expect("status enum");
        for status in [AgentStatus::Success, AgentStatus::Blocked, AgentStatus::Failed] {
            let name = serde_json::to_value(status).expect("serialize");
            assert!(allowed.iter().any(|opt| name == opt.as_str()));
        }
    }

    #[test]
    fn from_validated_builds_typed_output() {
        let raw = serde_json::to_string(&agent_output("TASK-2", AgentStatus::Blocked))
            .expect("serialize");
        let fields = AgentOutput::contract().validate_str(&raw).expect("valid");
        let output = AgentOutput::from_validated(fields).expect("typed");
        assert_eq!(output.task_id, "TASK-2");
        assert_eq!(output.status, AgentStatus::Blocked);
    }
}
