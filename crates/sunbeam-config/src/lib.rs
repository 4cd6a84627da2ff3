//! Sunbeam configuration
//!
//! - [`Settings`]: local tool settings (binaries, plan directory, timeouts)
//! - [`Deployment`] / [`DeploymentsConfig`]: the registry of known
//!   deployments stored in `deployments.yaml`
//! - [`ConfigStore`]: per-deployment key/value documents (stored Terraform
//!   variables, feature enablement, TLS provider record)

pub mod deployment;
pub mod deployments;
pub mod error;
pub mod settings;
pub mod store;

pub use deployment::{
    DatabaseTopology, Deployment, DeploymentType, JujuAccount, JujuController, Network,
    OPENSTACK_MODEL,
};
pub use deployments::{
    DeploymentSummary, DeploymentsConfig, DeploymentsListing, deployments_path,
    store_deployment_as_yaml,
};
pub use error::*;
pub use settings::Settings;
pub use store::ConfigStore;

use std::path::PathBuf;

/// Environment variable overriding the share directory
pub const SHARE_DIR_ENV: &str = "SUNBEAM_SHARE_DIR";

/// Directory holding the deployment registry and exported deployments
///
/// `~/.local/share/openstack`, unless `SUNBEAM_SHARE_DIR` is set.
pub fn share_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(SHARE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(".local").join("share").join("openstack"))
}

/// Sunbeam's configuration directory (`~/.config/sunbeam`)
pub fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("sunbeam"))
}
