//! Local tool settings
//!
//! Read from `~/.config/sunbeam/settings.yaml` (or the file named by
//! `SUNBEAM_SETTINGS`). Every field is optional in the file; a missing file
//! yields the defaults. A few environment variables win over the file.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTINGS_ENV: &str = "SUNBEAM_SETTINGS";
pub const TERRAFORM_ENV: &str = "SUNBEAM_TERRAFORM";
pub const JUJU_ENV: &str = "SUNBEAM_JUJU";
pub const PLANS_DIR_ENV: &str = "SUNBEAM_PLANS_DIR";

const SETTINGS_FILE: &str = "settings.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Terraform executable
    pub terraform_bin: PathBuf,

    /// Juju executable
    pub juju_bin: PathBuf,

    /// Root of the per-deployment Terraform plan directories
    pub plans_dir: Option<PathBuf>,

    /// `-parallelism` passed to `terraform apply`
    pub terraform_parallelism: Option<u32>,

    /// Default time budget for feature waits
    pub feature_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            terraform_bin: PathBuf::from("terraform"),
            juju_bin: PathBuf::from("juju"),
            plans_dir: None,
            terraform_parallelism: None,
            feature_timeout_secs: 1200,
        }
    }
}

impl Settings {
    /// Load settings from the default location and apply env overrides.
    pub fn load() -> Result<Self> {
        let path = match std::env::var(SETTINGS_ENV) {
            Ok(path) => PathBuf::from(path),
            Err(_) => crate::config_dir()?.join(SETTINGS_FILE),
        };
        let mut settings = Self::load_from(&path)?;
        settings.apply_env();
        Ok(settings)
    }

    /// Load settings from `path`. A missing or empty file gives the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Settings file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings = serde_yaml::from_str(&content)?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Ok(bin) = std::env::var(TERRAFORM_ENV) {
            self.terraform_bin = PathBuf::from(bin);
        }
        if let Ok(bin) = std::env::var(JUJU_ENV) {
            self.juju_bin = PathBuf::from(bin);
        }
        if let Ok(dir) = std::env::var(PLANS_DIR_ENV) {
            self.plans_dir = Some(PathBuf::from(dir));
        }
    }

    /// Directory under which the plans of every deployment live
    pub fn plans_root(&self) -> Result<PathBuf> {
        match &self.plans_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(crate::share_dir()?.join("etc")),
        }
    }

    pub fn feature_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.feature_timeout_secs)
    }
}
