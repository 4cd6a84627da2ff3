//! Deployment model

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model hosting the OpenStack control plane
pub const OPENSTACK_MODEL: &str = "openstack";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    Local,
    Maas,
}

impl std::fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentType::Local => write!(f, "local"),
            DeploymentType::Maas => write!(f, "maas"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseTopology {
    #[default]
    Single,
    Multi,
}

/// Networks a deployment may bind to a space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Management,
    Data,
    Storage,
    Public,
    Internal,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Management => "management",
            Network::Data => "data",
            Network::Storage => "storage",
            Network::Public => "public",
            Network::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JujuAccount {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JujuController {
    pub name: String,
    #[serde(default)]
    pub api_endpoints: Vec<String>,
    #[serde(default)]
    pub ca_cert: String,
    #[serde(default)]
    pub is_external: bool,
}

/// A known deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub deployment_type: DeploymentType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub juju_account: Option<JujuAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub juju_controller: Option<JujuController>,

    /// HTTP address of the cluster daemon hosting Terraform state. When
    /// absent, plans keep their state in a local backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusterd_address: Option<String>,

    /// Network name to space name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spaces: BTreeMap<String, String>,

    #[serde(default)]
    pub database_topology: DatabaseTopology,
}

impl Deployment {
    pub fn new(name: impl Into<String>, url: impl Into<String>, deployment_type: DeploymentType) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            deployment_type,
            juju_account: None,
            juju_controller: None,
            clusterd_address: None,
            spaces: BTreeMap::new(),
            database_topology: DatabaseTopology::default(),
        }
    }

    /// Model hosting the infrastructure (observability stack, machines)
    pub fn infrastructure_model(&self) -> &'static str {
        match self.deployment_type {
            DeploymentType::Local => "controller",
            DeploymentType::Maas => "openstack-machines",
        }
    }

    /// Model hosting the hypervisors and other machine charms
    pub fn openstack_machines_model(&self) -> &'static str {
        self.infrastructure_model()
    }

    pub fn get_space(&self, network: Network) -> Result<&str> {
        self.spaces
            .get(network.as_str())
            .map(String::as_str)
            .ok_or_else(|| ConfigError::SpaceNotConfigured {
                deployment: self.name.clone(),
                network: network.as_str().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_shape() {
        let yaml = r#"
name: lab
url: http://10.0.0.2:5240/MAAS
type: maas
juju_controller:
  name: lab-controller
  api_endpoints: ["10.0.0.3:17070"]
spaces:
  management: mgmt
"#;
        let deployment: Deployment = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(deployment.deployment_type, DeploymentType::Maas);
        assert_eq!(deployment.infrastructure_model(), "openstack-machines");
        assert_eq!(deployment.get_space(Network::Management).unwrap(), "mgmt");
        assert!(deployment.juju_account.is_none());

        let out = serde_yaml::to_string(&deployment).unwrap();
        assert!(out.contains("type: maas"));
        assert!(!out.contains("juju_account"));
    }

    #[test]
    fn test_missing_space() {
        let deployment = Deployment::new("local", "local", DeploymentType::Local);
        let err = deployment.get_space(Network::Storage).unwrap_err();
        assert!(err.to_string().contains("storage"));
    }
}
