use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("{} is corrupted, delete it or restore from back-up.", .0.display())]
    Corrupted(PathBuf),

    #[error("Path not set.")]
    PathNotSet,

    #[error("No active deployment found.")]
    NoActiveDeployment,

    #[error("Active deployment {0} not found in configuration.")]
    ActiveDeploymentMissing(String),

    #[error("Deployment {0} not found in deployments.")]
    DeploymentNotFound(String),

    #[error("Deployment {0} already exists.")]
    DeploymentExists(String),

    #[error("Space for network {network} not configured in deployment {deployment}.")]
    SpaceNotConfigured { deployment: String, network: String },

    #[error("ConfigItem {0} not found")]
    ItemNotFound(String),

    #[error("Invalid config key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
