//! Terraform error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerraformError {
    /// terraform exited with a non-zero status; carries its stderr
    #[error("{0}")]
    CommandFailed(String),

    #[error("Unexpected terraform output: {0}")]
    InvalidOutput(String),

    #[error("Config error: {0}")]
    Config(#[from] sunbeam_config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TerraformError>;
