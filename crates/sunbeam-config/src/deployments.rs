//! Deployment registry (`deployments.yaml`)

use crate::deployment::{Deployment, DeploymentType};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const DEPLOYMENTS_FILE: &str = "deployments.yaml";

/// Registry of deployments and the name of the active one
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentsConfig {
    #[serde(default)]
    pub active: Option<String>,

    #[serde(default)]
    pub deployments: Vec<Deployment>,

    #[serde(skip)]
    path: Option<PathBuf>,
}

/// Short view of a deployment used by `deployment list`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentSummary {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub deployment_type: DeploymentType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentsListing {
    pub active: Option<String>,
    pub deployments: Vec<DeploymentSummary>,
}

impl DeploymentsConfig {
    /// Load the registry from `path`.
    ///
    /// An empty document is an empty registry; anything other than a mapping
    /// is rejected as corrupted.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!("Loading deployment configuration from {:?}", path.display());
        let content = std::fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&content)?;
        let mut config = match value {
            serde_yaml::Value::Null => Self::default(),
            serde_yaml::Value::Mapping(_) => serde_yaml::from_value(value)?,
            _ => return Err(ConfigError::Corrupted(path.to_path_buf())),
        };
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn path(&self) -> Result<&Path> {
        self.path.as_deref().ok_or(ConfigError::PathNotSet)
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    /// Persist the registry.
    ///
    /// The document goes to a temporary file first so a failed write never
    /// truncates the existing registry.
    pub fn write(&self) -> Result<()> {
        let path = self.path()?;
        tracing::debug!("Writing deployment configuration to {:?}", path.display());
        let content = serde_yaml::to_string(self)?;

        let mut tmp = tempfile::NamedTempFile::new()?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        std::fs::copy(tmp.path(), path)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        Ok(())
    }

    pub fn get_deployment(&self, name: &str) -> Result<&Deployment> {
        self.deployments
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ConfigError::DeploymentNotFound(name.to_string()))
    }

    pub fn get_active(&self) -> Result<&Deployment> {
        let active = match self.active.as_deref() {
            Some(active) if !active.is_empty() => active,
            _ => return Err(ConfigError::NoActiveDeployment),
        };
        self.get_deployment(active)
            .map_err(|_| ConfigError::ActiveDeploymentMissing(active.to_string()))
    }

    /// Register a new deployment and make it the active one.
    pub fn add_deployment(&mut self, deployment: Deployment) -> Result<()> {
        if self.get_deployment(&deployment.name).is_ok() {
            return Err(ConfigError::DeploymentExists(deployment.name));
        }
        self.active = Some(deployment.name.clone());
        self.deployments.push(deployment);
        self.write()
    }

    pub fn update_deployment(&mut self, deployment: Deployment) -> Result<()> {
        let slot = self
            .deployments
            .iter_mut()
            .find(|d| d.name == deployment.name)
            .ok_or_else(|| ConfigError::DeploymentNotFound(deployment.name.clone()))?;
        *slot = deployment;
        self.write()
    }

    /// Make `name` the active deployment. Switching to the already active
    /// deployment does not touch the file.
    pub fn switch(&mut self, name: &str) -> Result<()> {
        if self.active.as_deref() == Some(name) {
            return Ok(());
        }
        self.get_deployment(name)?;
        self.active = Some(name.to_string());
        self.write()
    }

    pub fn list(&self) -> DeploymentsListing {
        DeploymentsListing {
            active: self.active.clone(),
            deployments: self
                .deployments
                .iter()
                .map(|d| DeploymentSummary {
                    name: d.name.clone(),
                    url: d.url.clone(),
                    deployment_type: d.deployment_type,
                })
                .collect(),
        }
    }
}

/// Path of the registry under `share_dir`, created empty (mode 0600) when
/// missing.
pub fn deployments_path(share_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(share_dir)?;
    let path = share_dir.join(DEPLOYMENTS_FILE);
    if !path.exists() {
        std::fs::write(&path, "{}")?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(path)
}

/// Export one deployment as `<share_dir>/<name>.yaml` and return the path.
pub fn store_deployment_as_yaml(share_dir: &Path, deployment: &Deployment) -> Result<PathBuf> {
    std::fs::create_dir_all(share_dir)?;
    let path = share_dir.join(format!("{}.yaml", deployment.name));
    std::fs::write(&path, serde_yaml::to_string(deployment)?)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    Ok(path)
}
