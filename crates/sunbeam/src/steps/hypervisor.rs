use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use sunbeam_config::ConfigStore;
use sunbeam_core::{ProgressSink, SkipDecision, Step, StepError, StepResult};
use sunbeam_juju::{JujuError, JujuHelper};
use sunbeam_terraform::Provisioner;

pub const HYPERVISOR_APP: &str = "openstack-hypervisor";
pub const HYPERVISOR_CONFIG_KEY: &str = "TerraformVarsHypervisor";
const HYPERVISOR_APPLY_TIMEOUT: Duration = Duration::from_secs(1800);

/// Re-apply the hypervisor plan with updated variables.
pub struct ReapplyHypervisorTerraformPlanStep {
    store: ConfigStore,
    tfhelper: Arc<dyn Provisioner>,
    jhelper: JujuHelper,
    model: String,
    extra_tfvars: Map<String, Value>,
}

impl ReapplyHypervisorTerraformPlanStep {
    pub fn new(
        store: ConfigStore,
        tfhelper: Arc<dyn Provisioner>,
        jhelper: JujuHelper,
        model: &str,
        extra_tfvars: Map<String, Value>,
    ) -> Self {
        Self {
            store,
            tfhelper,
            jhelper,
            model: model.to_string(),
            extra_tfvars,
        }
    }
}

#[async_trait]
impl Step for ReapplyHypervisorTerraformPlanStep {
    fn name(&self) -> &str {
        "Reapply OpenStack Hypervisor Terraform plan"
    }

    fn description(&self) -> &str {
        "Reapply OpenStack Hypervisor Terraform plan"
    }

    /// Nothing to reapply until a hypervisor is deployed
    async fn is_skip(&mut self, _progress: &dyn ProgressSink) -> Result<SkipDecision, StepError> {
        match self.jhelper.get_application(HYPERVISOR_APP, &self.model).await {
            Ok(app) if !app.units.is_empty() => Ok(SkipDecision::Proceed),
            Ok(_) | Err(JujuError::ApplicationNotFound { .. }) => {
                tracing::debug!("No {} units in {}", HYPERVISOR_APP, self.model);
                Ok(SkipDecision::AlreadySatisfied)
            }
            Err(e) => Err(StepError::new(e.to_string())),
        }
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        progress.update("deploying services");
        if let Err(e) = self
            .tfhelper
            .update_tfvars_and_apply(
                &self.store,
                HYPERVISOR_CONFIG_KEY,
                self.extra_tfvars.clone(),
                &[],
            )
            .await
        {
            tracing::error!("Error reapplying hypervisor plan: {}", e);
            return StepResult::failed(e.to_string());
        }

        // Units may report blocked/waiting until a relation settles.
        match self
            .jhelper
            .wait_until_desired_status(
                &self.model,
                &[HYPERVISOR_APP.to_string()],
                &["active", "unknown"],
                HYPERVISOR_APPLY_TIMEOUT,
                progress,
            )
            .await
        {
            Ok(()) => StepResult::completed(),
            Err(e) => StepResult::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeJuju, FakeProvisioner, app, jhelper};
    use serde_json::json;
    use sunbeam_core::RecordingProgress;

    fn offer(url: Value) -> Map<String, Value> {
        let mut vars = Map::new();
        vars.insert("masakari-offer-url".to_string(), url);
        vars
    }

    #[tokio::test]
    async fn test_reapply_merges_stored_vars() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(temp_dir.path());
        store
            .update_config(HYPERVISOR_CONFIG_KEY, &json!({"openstack-model": "openstack"}))
            .await
            .unwrap();
        let fake = Arc::new(FakeJuju::default().with_apps("controller", vec![app(HYPERVISOR_APP, "active")]));
        let tf = Arc::new(FakeProvisioner::new("hypervisor-plan"));
        let progress = RecordingProgress::new();
        let mut step = ReapplyHypervisorTerraformPlanStep::new(
            store.clone(),
            tf.clone(),
            jhelper(&fake),
            "controller",
            offer(json!("admin/openstack.masakari")),
        );

        assert_eq!(step.is_skip(&progress).await.unwrap(), SkipDecision::Proceed);
        assert!(step.run(&progress).await.is_completed());
        assert_eq!(tf.calls(), vec!["apply"]);
        assert_eq!(
            Value::Object(tf.tfvars()),
            json!({"openstack-model": "openstack", "masakari-offer-url": "admin/openstack.masakari"})
        );
    }

    #[tokio::test]
    async fn test_skip_without_hypervisor() {
        let temp_dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeJuju::default().with_apps("controller", Vec::new()));
        let mut step = ReapplyHypervisorTerraformPlanStep::new(
            ConfigStore::new(temp_dir.path()),
            Arc::new(FakeProvisioner::new("hypervisor-plan")),
            jhelper(&fake),
            "controller",
            offer(Value::Null),
        );

        assert_eq!(
            step.is_skip(&RecordingProgress::new()).await.unwrap(),
            SkipDecision::AlreadySatisfied
        );
    }

    #[tokio::test]
    async fn test_apply_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeJuju::default().with_apps("controller", vec![app(HYPERVISOR_APP, "active")]));
        let mut step = ReapplyHypervisorTerraformPlanStep::new(
            ConfigStore::new(temp_dir.path()),
            Arc::new(FakeProvisioner::new("hypervisor-plan").failing("Error: state locked")),
            jhelper(&fake),
            "controller",
            offer(Value::Null),
        );

        let result = step.run(&RecordingProgress::new()).await;
        assert!(result.is_failed());
        assert_eq!(result.message.as_deref(), Some("Error: state locked"));
    }
}
