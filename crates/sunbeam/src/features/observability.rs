//! Observability: the COS stack, grafana-agent on the hypervisors and the
//! grafana-agent-k8s side in the control plane.

use crate::context::DeploymentContext;
use crate::features::Feature;
use crate::features::openstack::{
    DisableOpenStackApplicationStep, EnableOpenStackApplicationStep, OpenStackFeature,
};
use crate::utils::object;
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use sunbeam_config::{ConfigStore, Deployment};
use sunbeam_core::{ProgressSink, Step, StepResult, run_plan};
use sunbeam_juju::JujuHelper;
use sunbeam_terraform::{Provisioner, TerraformInitStep};

pub const OBSERVABILITY_MODEL: &str = "observability";
pub const COS_PLAN: &str = "cos-plan";
pub const GRAFANA_AGENT_PLAN: &str = "grafana-agent-plan";
pub const COS_CONFIG_KEY: &str = "TerraformVarsPluginObservabilityPlanCos";
pub const GRAFANA_AGENT_CONFIG_KEY: &str = "TerraformVarsPluginObservabilityPlanGrafanaAgent";
const GRAFANA_AGENT_APP: &str = "grafana-agent";
const PRINCIPAL_APP: &str = "openstack-hypervisor";
const MICROK8S_CLOUD: &str = "sunbeam-microk8s";
const CREDENTIAL_SUFFIX: &str = "-creds";
const DEFAULT_STORAGECLASS: &str = "microk8s-hostpath";

/// Deploy Observability Stack using Terraform
pub struct DeployObservabilityStackStep {
    store: ConfigStore,
    tfhelper: Arc<dyn Provisioner>,
    jhelper: JujuHelper,
    timeout: Duration,
}

impl DeployObservabilityStackStep {
    pub fn new(
        store: ConfigStore,
        tfhelper: Arc<dyn Provisioner>,
        jhelper: JujuHelper,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            tfhelper,
            jhelper,
            timeout,
        }
    }
}

#[async_trait]
impl Step for DeployObservabilityStackStep {
    fn name(&self) -> &str {
        "Deploy Observability Stack"
    }

    fn description(&self) -> &str {
        "Deploying Observability Stack"
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        let tfvars = object(json!({
            "model": OBSERVABILITY_MODEL,
            "cloud": MICROK8S_CLOUD,
            "credential": format!("{}{}", MICROK8S_CLOUD, CREDENTIAL_SUFFIX),
            "config": {"workload-storage": DEFAULT_STORAGECLASS},
        }));

        progress.update("deploying services");
        if let Err(e) = self
            .tfhelper
            .update_tfvars_and_apply(&self.store, COS_CONFIG_KEY, tfvars, &[])
            .await
        {
            tracing::error!("Error deploying Observability Stack: {}", e);
            return StepResult::failed(e.to_string());
        }

        let apps = match self.jhelper.get_application_names(OBSERVABILITY_MODEL).await {
            Ok(apps) => apps,
            Err(e) => return StepResult::failed(e.to_string()),
        };
        tracing::debug!("Application monitored for readiness: {:?}", apps);
        match self
            .jhelper
            .wait_until_active(OBSERVABILITY_MODEL, &apps, self.timeout, progress)
            .await
        {
            Ok(()) => StepResult::completed(),
            Err(e) => {
                tracing::debug!("Failed to deploy Observability Stack: {}", e);
                StepResult::failed(e.to_string())
            }
        }
    }
}

/// Deploy Grafana Agent using Terraform
pub struct DeployGrafanaAgentStep {
    store: ConfigStore,
    tfhelper: Arc<dyn Provisioner>,
    cos: Arc<dyn Provisioner>,
    jhelper: JujuHelper,
    model: String,
    timeout: Duration,
}

impl DeployGrafanaAgentStep {
    pub fn new(
        store: ConfigStore,
        tfhelper: Arc<dyn Provisioner>,
        cos: Arc<dyn Provisioner>,
        jhelper: JujuHelper,
        model: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            tfhelper,
            cos,
            jhelper,
            model: model.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl Step for DeployGrafanaAgentStep {
    fn name(&self) -> &str {
        "Deploy Grafana Agent"
    }

    fn description(&self) -> &str {
        "Deploy Grafana Agent"
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        let tfvars = object(json!({
            "principal-application-model": self.model,
            "cos-state-backend": self.cos.backend().name(),
            "cos-state-config": self.cos.backend_config(),
            "principal-application": PRINCIPAL_APP,
        }));

        progress.update("deploying services");
        if let Err(e) = self
            .tfhelper
            .update_tfvars_and_apply(&self.store, GRAFANA_AGENT_CONFIG_KEY, tfvars, &[])
            .await
        {
            tracing::error!("Error deploying grafana agent: {}", e);
            return StepResult::failed(e.to_string());
        }

        match self
            .jhelper
            .wait_application_ready(
                GRAFANA_AGENT_APP,
                &self.model,
                &["active", "blocked"],
                self.timeout,
                progress,
            )
            .await
        {
            Ok(()) => StepResult::completed(),
            Err(e) => {
                tracing::debug!("Failed to deploy grafana agent: {}", e);
                StepResult::failed(e.to_string())
            }
        }
    }
}

/// Remove Observability Stack using Terraform
pub struct RemoveObservabilityStackStep {
    tfhelper: Arc<dyn Provisioner>,
    jhelper: JujuHelper,
    timeout: Duration,
}

impl RemoveObservabilityStackStep {
    pub fn new(tfhelper: Arc<dyn Provisioner>, jhelper: JujuHelper, timeout: Duration) -> Self {
        Self {
            tfhelper,
            jhelper,
            timeout,
        }
    }
}

#[async_trait]
impl Step for RemoveObservabilityStackStep {
    fn name(&self) -> &str {
        "Remove Observability Stack"
    }

    fn description(&self) -> &str {
        "Removing Observability Stack"
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        progress.update("destroying services");
        if let Err(e) = self.tfhelper.destroy().await {
            tracing::error!("Error destroying Observability Stack: {}", e);
            return StepResult::failed(e.to_string());
        }
        match self
            .jhelper
            .wait_model_gone(OBSERVABILITY_MODEL, self.timeout, progress)
            .await
        {
            Ok(()) => StepResult::completed(),
            Err(e) => StepResult::failed(e.to_string()),
        }
    }
}

/// Remove Grafana Agent using Terraform
pub struct RemoveGrafanaAgentStep {
    tfhelper: Arc<dyn Provisioner>,
    jhelper: JujuHelper,
    model: String,
    timeout: Duration,
}

impl RemoveGrafanaAgentStep {
    pub fn new(
        tfhelper: Arc<dyn Provisioner>,
        jhelper: JujuHelper,
        model: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            tfhelper,
            jhelper,
            model: model.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl Step for RemoveGrafanaAgentStep {
    fn name(&self) -> &str {
        "Remove Grafana Agent"
    }

    fn description(&self) -> &str {
        "Removing Grafana Agent"
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        progress.update("destroying services");
        if let Err(e) = self.tfhelper.destroy().await {
            tracing::error!("Error destroying grafana agent: {}", e);
            return StepResult::failed(e.to_string());
        }
        match self
            .jhelper
            .wait_application_gone(
                &[GRAFANA_AGENT_APP.to_string()],
                &self.model,
                self.timeout,
                progress,
            )
            .await
        {
            Ok(()) => StepResult::completed(),
            Err(e) => StepResult::failed(e.to_string()),
        }
    }
}

/// grafana-agent-k8s in the control plane, fed by the COS offers
pub struct GrafanaAgentK8s {
    cos: Arc<dyn Provisioner>,
    timeout: Duration,
}

impl GrafanaAgentK8s {
    pub fn new(cos: Arc<dyn Provisioner>, timeout: Duration) -> Self {
        Self { cos, timeout }
    }
}

#[async_trait]
impl OpenStackFeature for GrafanaAgentK8s {
    fn display_name(&self) -> &str {
        "Observability"
    }

    fn application_names(&self, _deployment: &Deployment) -> Vec<String> {
        vec![GRAFANA_AGENT_APP.to_string()]
    }

    async fn tfvars_on_enable(&self, _deployment: &Deployment) -> anyhow::Result<Map<String, Value>> {
        let output = self.cos.output().await?;
        let offer = |key: &str| {
            output
                .get(key)
                .cloned()
                .ok_or_else(|| anyhow!("{} missing from {} output", key, COS_PLAN))
        };
        let dashboard = offer("grafana-dashboard-offer-url")?;
        let logging = offer("loki-logging-offer-url")?;
        let remote_write = offer("prometheus-receive-remote-write-offer-url")?;
        Ok(object(json!({
            "enable-observability": true,
            "grafana-dashboard-offer-url": dashboard,
            "logging-offer-url": logging,
            "receive-remote-write-offer-url": remote_write,
        })))
    }

    fn tfvars_on_disable(&self, _deployment: &Deployment) -> Map<String, Value> {
        object(json!({
            "enable-observability": false,
            "grafana-dashboard-offer-url": null,
            "logging-offer-url": null,
            "receive-remote-write-offer-url": null,
        }))
    }

    fn application_timeout_on_enable(&self) -> Duration {
        self.timeout
    }

    fn application_timeout_on_disable(&self) -> Duration {
        self.timeout
    }
}

pub struct ObservabilityFeature;

impl ObservabilityFeature {
    /// COS, grafana-agent-k8s and grafana-agent plans, in order
    pub fn enable_plans(
        &self,
        ctx: &DeploymentContext,
        jhelper: &JujuHelper,
    ) -> anyhow::Result<Vec<Vec<Box<dyn Step>>>> {
        let timeout = ctx.settings.feature_timeout();
        let store = ctx.get_client();
        let cos = ctx.get_tfhelper(COS_PLAN)?;
        let openstack = ctx.get_tfhelper("openstack-plan")?;
        let agent = ctx.get_tfhelper(GRAFANA_AGENT_PLAN)?;
        let feature = Arc::new(GrafanaAgentK8s::new(cos.clone(), timeout));

        let cos_plan: Vec<Box<dyn Step>> = vec![
            Box::new(TerraformInitStep::new(cos.clone())),
            Box::new(DeployObservabilityStackStep::new(
                store.clone(),
                cos.clone(),
                jhelper.clone(),
                timeout,
            )),
        ];
        let grafana_agent_k8s_plan: Vec<Box<dyn Step>> = vec![
            Box::new(TerraformInitStep::new(openstack.clone())),
            Box::new(EnableOpenStackApplicationStep::new(
                ctx.deployment.clone(),
                store.clone(),
                openstack,
                jhelper.clone(),
                feature,
            )),
        ];
        let grafana_agent_plan: Vec<Box<dyn Step>> = vec![
            Box::new(TerraformInitStep::new(agent.clone())),
            Box::new(DeployGrafanaAgentStep::new(
                store,
                agent,
                cos,
                jhelper.clone(),
                ctx.deployment.infrastructure_model(),
                timeout,
            )),
        ];
        Ok(vec![cos_plan, grafana_agent_k8s_plan, grafana_agent_plan])
    }

    /// Reverse of [`Self::enable_plans`]
    pub fn disable_plans(
        &self,
        ctx: &DeploymentContext,
        jhelper: &JujuHelper,
    ) -> anyhow::Result<Vec<Vec<Box<dyn Step>>>> {
        let timeout = ctx.settings.feature_timeout();
        let store = ctx.get_client();
        let cos = ctx.get_tfhelper(COS_PLAN)?;
        let openstack = ctx.get_tfhelper("openstack-plan")?;
        let agent = ctx.get_tfhelper(GRAFANA_AGENT_PLAN)?;
        let feature = Arc::new(GrafanaAgentK8s::new(cos.clone(), timeout));

        let grafana_agent_k8s_plan: Vec<Box<dyn Step>> = vec![
            Box::new(TerraformInitStep::new(openstack.clone())),
            Box::new(DisableOpenStackApplicationStep::new(
                ctx.deployment.clone(),
                store,
                openstack,
                jhelper.clone(),
                feature,
            )),
        ];
        let grafana_agent_plan: Vec<Box<dyn Step>> = vec![
            Box::new(TerraformInitStep::new(agent.clone())),
            Box::new(RemoveGrafanaAgentStep::new(
                agent,
                jhelper.clone(),
                ctx.deployment.infrastructure_model(),
                timeout,
            )),
        ];
        let cos_plan: Vec<Box<dyn Step>> = vec![
            Box::new(TerraformInitStep::new(cos.clone())),
            Box::new(RemoveObservabilityStackStep::new(cos, jhelper.clone(), timeout)),
        ];
        Ok(vec![grafana_agent_k8s_plan, grafana_agent_plan, cos_plan])
    }
}

async fn run_plans(
    plans: Vec<Vec<Box<dyn Step>>>,
    progress: &dyn ProgressSink,
    show_hints: bool,
) -> anyhow::Result<()> {
    for plan in plans {
        run_plan(plan, progress, show_hints).await?;
    }
    Ok(())
}

#[async_trait]
impl Feature for ObservabilityFeature {
    fn name(&self) -> &str {
        "observability"
    }

    async fn run_enable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        let jhelper = ctx.get_connected_controller()?;
        run_plans(self.enable_plans(ctx, &jhelper)?, progress, show_hints).await?;
        println!("Observability enabled.");
        Ok(())
    }

    async fn run_disable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        let jhelper = ctx.get_connected_controller()?;
        run_plans(self.disable_plans(ctx, &jhelper)?, progress, show_hints).await?;
        println!("Observability disabled.");
        Ok(())
    }
}

/// URL of the Grafana dashboard, read from the grafana leader
pub async fn dashboard_url(jhelper: &JujuHelper) -> anyhow::Result<String> {
    let app = "grafana";
    let unit = jhelper
        .get_leader_unit(app, OBSERVABILITY_MODEL)
        .await
        .map_err(|_| anyhow!("Unable to get {} leader", app))?;
    let output = jhelper
        .run_action(&unit, OBSERVABILITY_MODEL, "get-admin-password", Map::new())
        .await?;
    if output.return_code() > 1 {
        bail!("Unable to retrieve URL from Grafana service");
    }
    match output.get_str("url") {
        Some(url) if !url.is_empty() => Ok(url.to_string()),
        _ => bail!("No URL provided by Grafana service"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeJuju, FakeProvisioner, app, jhelper};
    use sunbeam_config::{DeploymentType, Settings};
    use sunbeam_core::RecordingProgress;
    use sunbeam_terraform::Backend;

    fn cos_outputs() -> Value {
        json!({
            "grafana-dashboard-offer-url": "admin/observability.grafana-dashboards",
            "loki-logging-offer-url": "admin/observability.loki-logging",
            "prometheus-receive-remote-write-offer-url": "admin/observability.prometheus",
        })
    }

    #[tokio::test]
    async fn test_grafana_agent_k8s_tfvars() {
        let cos = Arc::new(FakeProvisioner::new(COS_PLAN).with_outputs(cos_outputs()));
        let feature = GrafanaAgentK8s::new(cos, Duration::from_secs(60));
        let deployment = Deployment::new("lab", "local", DeploymentType::Local);

        let tfvars = feature.tfvars_on_enable(&deployment).await.unwrap();
        assert_eq!(tfvars["enable-observability"], json!(true));
        assert_eq!(tfvars["logging-offer-url"], json!("admin/observability.loki-logging"));

        let disabled = feature.tfvars_on_disable(&deployment);
        assert_eq!(disabled["receive-remote-write-offer-url"], Value::Null);
    }

    #[tokio::test]
    async fn test_missing_cos_output() {
        let cos = Arc::new(FakeProvisioner::new(COS_PLAN));
        let feature = GrafanaAgentK8s::new(cos, Duration::from_secs(60));
        let deployment = Deployment::new("lab", "local", DeploymentType::Local);

        let err = feature.tfvars_on_enable(&deployment).await.unwrap_err();
        assert!(err.to_string().contains("grafana-dashboard-offer-url"));
    }

    #[tokio::test]
    async fn test_grafana_agent_reads_cos_backend() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut cos = FakeProvisioner::new(COS_PLAN);
        cos.backend = Backend::Http {
            clusterd_address: "https://10.0.0.2:7000".to_string(),
        };
        let agent = Arc::new(FakeProvisioner::new(GRAFANA_AGENT_PLAN));
        let fake = Arc::new(
            FakeJuju::default().with_apps("controller", vec![app(GRAFANA_AGENT_APP, "active")]),
        );
        let mut step = DeployGrafanaAgentStep::new(
            ConfigStore::new(temp_dir.path()),
            agent.clone(),
            Arc::new(cos),
            jhelper(&fake),
            "controller",
            Duration::from_secs(60),
        );

        assert!(step.run(&RecordingProgress::new()).await.is_completed());
        let tfvars = agent.tfvars();
        assert_eq!(tfvars["cos-state-backend"], json!("http"));
        assert_eq!(
            tfvars["cos-state-config"]["address"],
            json!("https://10.0.0.2:7000/1.0/terraformstate/cos-plan")
        );
        assert_eq!(tfvars["principal-application"], json!(PRINCIPAL_APP));
    }

    #[tokio::test]
    async fn test_remove_stack_waits_for_model() {
        let fake = Arc::new(FakeJuju::default());
        let cos = Arc::new(FakeProvisioner::new(COS_PLAN));
        let mut step = RemoveObservabilityStackStep::new(
            cos.clone(),
            jhelper(&fake),
            Duration::from_secs(60),
        );

        assert!(step.run(&RecordingProgress::new()).await.is_completed());
        assert_eq!(cos.calls(), vec!["destroy"]);
    }

    #[test]
    fn test_plan_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ctx = DeploymentContext {
            deployment: Deployment::new("lab", "local", DeploymentType::Local),
            settings: Settings {
                plans_dir: Some(temp_dir.path().join("plans")),
                ..Settings::default()
            },
            share_dir: temp_dir.path().to_path_buf(),
        };
        let fake = Arc::new(FakeJuju::default());
        let names = |plans: Vec<Vec<Box<dyn Step>>>| -> Vec<String> {
            plans
                .iter()
                .flatten()
                .map(|s| s.name().to_string())
                .filter(|n| n != "Initialize Terraform")
                .collect()
        };

        let enable = ObservabilityFeature.enable_plans(&ctx, &jhelper(&fake)).unwrap();
        assert_eq!(
            names(enable),
            vec![
                "Deploy Observability Stack",
                "Enable OpenStack Observability",
                "Deploy Grafana Agent"
            ]
        );
        let disable = ObservabilityFeature.disable_plans(&ctx, &jhelper(&fake)).unwrap();
        assert_eq!(
            names(disable),
            vec![
                "Disable OpenStack Observability",
                "Remove Grafana Agent",
                "Remove Observability Stack"
            ]
        );
    }

    #[tokio::test]
    async fn test_dashboard_url() {
        let fake = Arc::new(
            FakeJuju::default()
                .with_apps(OBSERVABILITY_MODEL, vec![app("grafana", "active")])
                .with_action("get-admin-password", json!({"url": "http://10.20.21.1/grafana"})),
        );
        assert_eq!(
            dashboard_url(&jhelper(&fake)).await.unwrap(),
            "http://10.20.21.1/grafana"
        );

        let failing = Arc::new(
            FakeJuju::default()
                .with_apps(OBSERVABILITY_MODEL, vec![app("grafana", "active")])
                .with_action("get-admin-password", json!({"return-code": 2})),
        );
        assert_eq!(
            dashboard_url(&jhelper(&failing)).await.unwrap_err().to_string(),
            "Unable to retrieve URL from Grafana service"
        );
    }
}
