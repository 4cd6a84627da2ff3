//! OpenStack Secrets service (Barbican)

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

const BARBICAN_CHANNEL: &str = "2023.1/candidate";

#[derive(Clone)]
pub struct SecretsFeature {
    timeout: Duration,
}

impl SecretsFeature {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl OpenStackFeature for SecretsFeature {
    fn display_name(&self) -> &str {
        "Secrets"
    }

    fn application_names(&self, deployment: &Deployment) -> Vec<String> {
        let mut apps = vec!["barbican".to_string(), "barbican-mysql-router".to_string()];
        if deployment.database_topology == DatabaseTopology::Multi {
            apps.push("barbican-mysql".to_string());
        }
        apps
    }

    async fn tfvars_on_enable(&self, _deployment: &Deployment) -> anyhow::Result<Map<String, Value>> {
        let mut tfvars = Map::new();
        tfvars.insert("enable-barbican".into(), json!(true));
        tfvars.insert("barbican-channel".into(), json!(BARBICAN_CHANNEL));
        Ok(tfvars)
    }

    fn tfvars_on_disable(&self, _deployment: &Deployment) -> Map<String, Value> {
        let mut tfvars = Map::new();
        tfvars.insert("enable-barbican".into(), json!(false));
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
impl Feature for SecretsFeature {
    fn name(&self) -> &str {
        "secrets"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::openstack::{
        DisableOpenStackApplicationStep, EnableOpenStackApplicationStep, OPENSTACK_CONFIG_KEY,
    };
    use crate::testing::{FakeJuju, FakeProvisioner, app, jhelper};
    use sunbeam_config::{ConfigStore, DeploymentType, OPENSTACK_MODEL};
    use sunbeam_core::{RecordingProgress, Step};

    fn deployment(topology: DatabaseTopology) -> Deployment {
        let mut deployment = Deployment::new("lab", "local", DeploymentType::Local);
        deployment.database_topology = topology;
        deployment
    }

    #[test]
    fn test_multi_node_database_adds_mysql() {
        let feature = SecretsFeature::new(Duration::from_secs(60));
        assert_eq!(
            feature.application_names(&deployment(DatabaseTopology::Single)),
            vec!["barbican", "barbican-mysql-router"]
        );
        assert_eq!(
            feature.application_names(&deployment(DatabaseTopology::Multi)),
            vec!["barbican", "barbican-mysql-router", "barbican-mysql"]
        );
    }

    #[tokio::test]
    async fn test_enable_then_disable_toggles_barbican() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(temp_dir.path());
        let fake = Arc::new(FakeJuju::default().with_apps(
            OPENSTACK_MODEL,
            vec![app("barbican", "active"), app("barbican-mysql-router", "active")],
        ));
        let tf = Arc::new(FakeProvisioner::new("openstack-plan"));
        let feature = Arc::new(SecretsFeature::new(Duration::from_secs(60)));
        let d = deployment(DatabaseTopology::Single);

        let mut enable = EnableOpenStackApplicationStep::new(
            d.clone(),
            store.clone(),
            tf.clone(),
            jhelper(&fake),
            feature.clone(),
        );
        assert_eq!(enable.name(), "Enable OpenStack Secrets");
        assert!(enable.run(&RecordingProgress::new()).await.is_completed());
        assert_eq!(tf.tfvars()["barbican-channel"], json!(BARBICAN_CHANNEL));

        fake.applications.lock().unwrap().insert(OPENSTACK_MODEL.to_string(), Vec::new());
        let mut disable = DisableOpenStackApplicationStep::new(
            d,
            store.clone(),
            tf.clone(),
            jhelper(&fake),
            feature,
        );
        assert!(disable.run(&RecordingProgress::new()).await.is_completed());
        assert_eq!(
            store.read_config(OPENSTACK_CONFIG_KEY).await.unwrap()["enable-barbican"],
            json!(false)
        );
        assert_eq!(tf.calls(), vec!["apply", "apply"]);
    }
}
