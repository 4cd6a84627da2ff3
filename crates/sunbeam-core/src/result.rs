//! Outcome values returned by steps

use serde::{Deserialize, Serialize};

/// Outcome of a step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// The step did its work
    Completed,
    /// The step had nothing to do
    Skipped,
    /// The step could not complete; the plan stops here
    Failed,
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultType::Completed => write!(f, "completed"),
            ResultType::Skipped => write!(f, "skipped"),
            ResultType::Failed => write!(f, "failed"),
        }
    }
}

/// Answer of a step's skip check.
///
/// Historically the skip check answered with the same tri-state as `run`:
/// COMPLETED meant "go ahead" and SKIPPED meant "already done". The two
/// questions are kept apart here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDecision {
    /// The step has work to do, call `run`.
    Proceed,
    /// Nothing to do, `run` must not be called.
    AlreadySatisfied,
}

/// Immutable result of one step execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub result_type: ResultType,

    /// Human readable message, mandatory in practice for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Data handed back to the caller (credentials, URLs, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl StepResult {
    pub fn new(result_type: ResultType) -> Self {
        Self {
            result_type,
            message: None,
            payload: None,
        }
    }

    pub fn completed() -> Self {
        Self::new(ResultType::Completed)
    }

    pub fn skipped() -> Self {
        Self::new(ResultType::Skipped)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ResultType::Failed).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.result_type == ResultType::Failed
    }

    pub fn is_completed(&self) -> bool {
        self.result_type == ResultType::Completed
    }

    pub fn is_skipped(&self) -> bool {
        self.result_type == ResultType::Skipped
    }
}
