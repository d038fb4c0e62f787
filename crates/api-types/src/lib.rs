//! Outbound records handed to reporting collaborators.

use colloquy_core::{JudgeResult, Message};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionStatus {
    Passed,
    Failed,
}

/// Evidence recorded for one assertion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub id: String,
    pub assertion_name: String,
    pub description: Option<String>,
    pub status: AssertionStatus,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AssertionResult {
    pub fn passed(&self) -> bool {
        self.status == AssertionStatus::Passed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorResult {
    pub name: String,
    pub status: ValidatorStatus,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl ValidatorResult {
    #[must_use]
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ValidatorStatus::Passed,
            details: Map::new(),
        }
    }

    #[must_use]
    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        let mut details = Map::new();
        details.insert("error".to_string(), Value::String(error.into()));
        Self {
            name: name.into(),
            status: ValidatorStatus::Failed,
            details,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    User,
    Agent,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParticipantKind,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: String,
    pub participants: Vec<String>,
    pub messages: Vec<Message>,
    pub assertions: Vec<AssertionResult>,
    pub validators: Vec<ValidatorResult>,
    pub judge_result: Option<JudgeResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub test_name: String,
    pub start_time: String,
    pub end_time: String,
    pub status: TestStatus,
    pub participants: Vec<Participant>,
    pub sessions: Vec<SessionReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_validator_carries_error_detail() {
        let result = ValidatorResult::failed("turn_taking", "Agent Bob sent two messages in a row.");

        assert_eq!(result.status, ValidatorStatus::Failed);
        assert_eq!(
            result.details.get("error").and_then(Value::as_str),
            Some("Agent Bob sent two messages in a row.")
        );
    }

    #[test]
    fn assertion_result_serializes_lowercase_status() {
        let result = AssertionResult {
            id: "assert_1".to_string(),
            assertion_name: "contains_text".to_string(),
            description: None,
            status: AssertionStatus::Failed,
            metadata: Map::new(),
        };

        let json = serde_json::to_value(&result).expect("serialize assertion result");

        assert_eq!(json["status"], "failed");
        assert_eq!(json["assertion_name"], "contains_text");
        assert!(json["description"].is_null());
        assert!(!result.passed());
    }

    #[test]
    fn participant_kind_serializes_as_type() {
        let participant = Participant {
            id: "user".to_string(),
            name: "User".to_string(),
            kind: ParticipantKind::User,
            metadata: Map::new(),
        };

        let json = serde_json::to_value(&participant).expect("serialize participant");

        assert_eq!(json["type"], "user");
    }
}
