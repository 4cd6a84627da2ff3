//! Engine error types

use std::time::Duration;
use thiserror::Error;

/// A step could not decide whether it has work to do.
///
/// Returned from [`crate::Step::is_skip`]; the plan runner turns it into a
/// FAILED result instead of skipping the step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StepError {
    message: String,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Plan execution errors
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("{message}")]
    StepFailed { step: String, message: String },
}

impl PlanError {
    /// Name of the step that aborted the plan
    pub fn step(&self) -> &str {
        match self {
            PlanError::StepFailed { step, .. } => step,
        }
    }
}

/// Preflight errors
#[derive(Error, Debug)]
pub enum PreflightError {
    #[error("{message}")]
    CheckFailed { check: String, message: String },
}

/// Failures of the status-wait bridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The terminal condition was not met within the time budget.
    #[error("Timed out after {} while waiting for {what}", elapsed(.after))]
    Timeout { what: String, after: Duration },

    /// The remote side reported a state from which the wait cannot succeed.
    #[error("{0}")]
    Failed(String),
}

fn elapsed(after: &Duration) -> String {
    crate::progress::format_duration(*after)
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_keeps_sub_second_precision() {
        let err = WaitError::Timeout {
            what: "keystone".to_string(),
            after: Duration::from_millis(1500),
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 1.5s while waiting for keystone"
        );
    }
}
