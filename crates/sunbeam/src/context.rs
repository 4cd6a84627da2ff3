//! Per-command deployment context
//!
//! Resolves the active deployment and hands out the collaborators steps need:
//! the config store, Terraform plans and a juju connection.

use anyhow::{Context, anyhow, bail};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use sunbeam_config::{ConfigStore, Deployment, DeploymentsConfig, Settings, deployments_path};
use sunbeam_juju::{JujuCli, JujuHelper};
use sunbeam_terraform::{Backend, Provisioner, TerraformHelper};

/// Plan name to the directory holding it
const PLANS: &[(&str, &str)] = &[
    ("openstack-plan", "deploy-openstack"),
    ("hypervisor-plan", "deploy-openstack-hypervisor"),
    ("cos-plan", "deploy-cos"),
    ("grafana-agent-plan", "deploy-grafana-agent"),
    ("consul-client-plan", "deploy-consul-client"),
    ("caas-plan", "caas-setup"),
];

pub struct DeploymentContext {
    pub deployment: Deployment,
    pub settings: Settings,
    pub share_dir: PathBuf,
}

impl DeploymentContext {
    /// Context for the active deployment in `share_dir`
    pub fn load(settings: Settings, share_dir: PathBuf) -> anyhow::Result<Self> {
        let path = deployments_path(&share_dir)?;
        let config = DeploymentsConfig::load(&path)?;
        let deployment = config.get_active()?.clone();
        tracing::debug!("Active deployment: {}", deployment.name);
        Ok(Self {
            deployment,
            settings,
            share_dir,
        })
    }

    /// Config store of this deployment
    pub fn get_client(&self) -> ConfigStore {
        ConfigStore::new(self.share_dir.join(&self.deployment.name))
    }

    fn backend(&self) -> Backend {
        match &self.deployment.clusterd_address {
            Some(address) => Backend::Http {
                clusterd_address: address.clone(),
            },
            None => Backend::Local,
        }
    }

    fn terraform_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        if let Some(account) = &self.deployment.juju_account {
            env.insert("JUJU_USERNAME".to_string(), account.user.clone());
            env.insert("JUJU_PASSWORD".to_string(), account.password.clone());
        }
        if let Some(controller) = &self.deployment.juju_controller {
            env.insert(
                "JUJU_CONTROLLER_ADDRESSES".to_string(),
                controller.api_endpoints.join(","),
            );
            env.insert("JUJU_CA_CERT".to_string(), controller.ca_cert.clone());
        }
        env
    }

    /// Terraform helper for a known plan
    pub fn get_tfhelper(&self, plan: &str) -> anyhow::Result<Arc<dyn Provisioner>> {
        self.get_tfhelper_with_env(plan, HashMap::new())
    }

    /// Terraform helper for a known plan with `extra_env` on top of the
    /// juju credentials
    pub fn get_tfhelper_with_env(
        &self,
        plan: &str,
        extra_env: HashMap<String, String>,
    ) -> anyhow::Result<Arc<dyn Provisioner>> {
        let dir = PLANS
            .iter()
            .find(|(name, _)| *name == plan)
            .map(|(_, dir)| *dir)
            .ok_or_else(|| anyhow!("Unknown Terraform plan {}", plan))?;
        let path = self
            .settings
            .plans_root()?
            .join(&self.deployment.name)
            .join(dir);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create plan directory {}", path.display()))?;

        let mut env = self.terraform_env();
        env.extend(extra_env);

        let helper = TerraformHelper::new(path, plan)
            .with_terraform(&self.settings.terraform_bin)
            .with_env(env)
            .with_parallelism(self.settings.terraform_parallelism)
            .with_backend(self.backend());
        Ok(Arc::new(helper))
    }

    /// Juju helper bound to the deployment's controller
    pub fn get_connected_controller(&self) -> anyhow::Result<JujuHelper> {
        if self.deployment.juju_account.is_none() {
            bail!(
                "No juju account configured for deployment {}.",
                self.deployment.name
            );
        }
        let Some(controller) = &self.deployment.juju_controller else {
            bail!(
                "No juju controller configured for deployment {}.",
                self.deployment.name
            );
        };
        let cli = JujuCli::new(&self.settings.juju_bin, &controller.name);
        Ok(JujuHelper::new(Arc::new(cli)))
    }
}
