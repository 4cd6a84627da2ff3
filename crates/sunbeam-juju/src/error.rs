//! Juju error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JujuError {
    #[error("Application {app} not found in model {model}")]
    ApplicationNotFound { app: String, model: String },

    #[error("Model {0} not found")]
    ModelNotFound(String),

    #[error("Leader for {app} not found in model {model}")]
    LeaderNotFound { app: String, model: String },

    #[error("Action {action} on {unit} failed: {message}")]
    ActionFailed {
        unit: String,
        action: String,
        message: String,
    },

    /// The wait ran out of time
    #[error("{0}")]
    Timeout(String),

    /// The wait observed a state it cannot recover from
    #[error("{0}")]
    Wait(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<sunbeam_core::WaitError> for JujuError {
    fn from(e: sunbeam_core::WaitError) -> Self {
        if e.is_timeout() {
            JujuError::Timeout(e.to_string())
        } else {
            JujuError::Wait(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, JujuError>;
