//! Container as a Service (Magnum)
//!
//! Needs the Secrets and Orchestration features. Once enabled, `configure
//! caas` applies `caas-plan` with the cloud admin credentials to prepare the
//! cloud for cluster templates.

use crate::context::DeploymentContext;
use crate::features::openstack::{
    OpenStackFeature, disable_control_plane, enable_control_plane,
};
use crate::features::{Feature, require_enabled};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sunbeam_config::{DatabaseTopology, Deployment};
use sunbeam_core::{ProgressSink, Step, StepResult};
use sunbeam_terraform::{Provisioner, TerraformInitStep};

const MAGNUM_CHANNEL: &str = "2023.2/candidate";
pub const CONFIGURE_PLAN: &str = "caas-plan";

#[derive(Clone)]
pub struct CaasFeature {
    timeout: Duration,
}

impl CaasFeature {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl OpenStackFeature for CaasFeature {
    fn display_name(&self) -> &str {
        "Container as a Service"
    }

    fn application_names(&self, deployment: &Deployment) -> Vec<String> {
        let mut apps = vec!["magnum".to_string(), "magnum-mysql-router".to_string()];
        if deployment.database_topology == DatabaseTopology::Multi {
            apps.push("magnum-mysql".to_string());
        }
        apps
    }

    async fn tfvars_on_enable(&self, _deployment: &Deployment) -> anyhow::Result<Map<String, Value>> {
        let mut tfvars = Map::new();
        tfvars.insert("magnum-channel".into(), json!(MAGNUM_CHANNEL));
        tfvars.insert("enable-magnum".into(), json!(true));
        Ok(tfvars)
    }

    fn tfvars_on_disable(&self, _deployment: &Deployment) -> Map<String, Value> {
        let mut tfvars = Map::new();
        tfvars.insert("enable-magnum".into(), json!(false));
        tfvars
    }

    fn application_timeout_on_enable(&self) -> Duration {
        self.timeout
    }

    fn application_timeout_on_disable(&self) -> Duration {
        self.timeout
    }

    fn horizon_plugin(&self) -> Option<&str> {
        Some("magnum")
    }
}

#[async_trait]
impl Feature for CaasFeature {
    fn name(&self) -> &str {
        "caas"
    }

    async fn pre_enable(&self, ctx: &DeploymentContext) -> anyhow::Result<()> {
        let store = ctx.get_client();
        require_enabled(
            &store,
            "secrets",
            "OpenStack CaaS feature requires Secrets feature to be enabled",
        )
        .await?;
        require_enabled(
            &store,
            "orchestration",
            "OpenStack Container as a Service feature requires Orchestration feature to be enabled",
        )
        .await
    }

    async fn run_enable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        enable_control_plane(ctx, Arc::new(self.clone()), progress, show_hints).await
    }

    async fn run_disable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        disable_control_plane(ctx, Arc::new(self.clone()), progress, show_hints).await
    }
}

/// Apply the CaaS setup plan.
pub struct CaasConfigureStep {
    tfhelper: Arc<dyn Provisioner>,
}

impl CaasConfigureStep {
    pub fn new(tfhelper: Arc<dyn Provisioner>) -> Self {
        Self { tfhelper }
    }
}

#[async_trait]
impl Step for CaasConfigureStep {
    fn name(&self) -> &str {
        "Configure Container as a Service"
    }

    fn description(&self) -> &str {
        "Configuring Cloud for Container as a Service use"
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        progress.update("applying caas setup");
        match self.tfhelper.apply(&[]).await {
            Ok(()) => StepResult::completed(),
            Err(e) => {
                tracing::error!("Error configuring Container as a Service feature: {}", e);
                StepResult::failed(e.to_string())
            }
        }
    }
}

/// Terraform environment built from the admin openrc variables
pub fn admin_env(creds: &Map<String, Value>) -> HashMap<String, String> {
    creds
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

pub fn configure_plan(tfhelper: Arc<dyn Provisioner>) -> Vec<Box<dyn Step>> {
    vec![
        Box::new(TerraformInitStep::new(tfhelper.clone())),
        Box::new(CaasConfigureStep::new(tfhelper)),
    ]
}
