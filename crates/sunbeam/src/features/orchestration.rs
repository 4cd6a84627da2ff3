//! OpenStack Orchestration service (Heat)

use crate::context::DeploymentContext;
use crate::features::Feature;
use crate::features::openstack::{
    OpenStackFeature, disable_control_plane, enable_control_plane,
};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use sunbeam_config::{DatabaseTopology, Deployment};
use sunbeam_core::ProgressSink;

#[derive(Clone)]
pub struct OrchestrationFeature {
    timeout: Duration,
}

impl OrchestrationFeature {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl OpenStackFeature for OrchestrationFeature {
    fn display_name(&self) -> &str {
        "Orchestration"
    }

    fn application_names(&self, deployment: &Deployment) -> Vec<String> {
        let mut apps = vec!["heat".to_string(), "heat-mysql-router".to_string()];
        if deployment.database_topology == DatabaseTopology::Multi {
            apps.push("heat-mysql".to_string());
        }
        apps
    }

    async fn tfvars_on_enable(&self, _deployment: &Deployment) -> anyhow::Result<Map<String, Value>> {
        let mut tfvars = Map::new();
        tfvars.insert("enable-heat".into(), json!(true));
        Ok(tfvars)
    }

    fn tfvars_on_disable(&self, _deployment: &Deployment) -> Map<String, Value> {
        let mut tfvars = Map::new();
        tfvars.insert("enable-heat".into(), json!(false));
        tfvars
    }

    fn application_timeout_on_enable(&self) -> Duration {
        self.timeout
    }

    fn application_timeout_on_disable(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Feature for OrchestrationFeature {
    fn name(&self) -> &str {
        "orchestration"
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
