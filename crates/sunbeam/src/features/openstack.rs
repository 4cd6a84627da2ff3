//! Features that add applications to the OpenStack control plane
//!
//! The control plane lives in `openstack-plan`; a feature toggles its part
//! of the plan through Terraform variables and waits for the applications it
//! owns.

use crate::context::DeploymentContext;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use sunbeam_config::{ConfigStore, Deployment, OPENSTACK_MODEL};
use sunbeam_core::{ProgressSink, Step, StepResult, run_plan};
use sunbeam_juju::JujuHelper;
use sunbeam_terraform::{Provisioner, TerraformInitStep};

pub const OPENSTACK_CONFIG_KEY: &str = "TerraformVarsOpenstack";
pub const APPLICATION_TIMEOUT: Duration = Duration::from_secs(1200);
const HORIZON_PLUGINS_VAR: &str = "horizon-plugins";

#[async_trait]
pub trait OpenStackFeature: Send + Sync {
    /// Display name, e.g. `Observability`
    fn display_name(&self) -> &str;

    /// Applications the control plane plan runs for this feature
    fn application_names(&self, deployment: &Deployment) -> Vec<String>;

    async fn tfvars_on_enable(&self, deployment: &Deployment) -> anyhow::Result<Map<String, Value>>;

    fn tfvars_on_disable(&self, deployment: &Deployment) -> Map<String, Value>;

    fn application_timeout_on_enable(&self) -> Duration {
        APPLICATION_TIMEOUT
    }

    fn application_timeout_on_disable(&self) -> Duration {
        APPLICATION_TIMEOUT
    }

    /// Dashboard plugin shipped with the service, if any
    fn horizon_plugin(&self) -> Option<&str> {
        None
    }
}

/// Stored horizon plugins with `plugin` added or removed, sorted.
fn horizon_plugins(stored: &Map<String, Value>, plugin: &str, enable: bool) -> Value {
    let mut plugins: BTreeSet<String> = stored
        .get(HORIZON_PLUGINS_VAR)
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if enable {
        plugins.insert(plugin.to_string());
    } else {
        plugins.remove(plugin);
    }
    json!(plugins)
}

/// Apply `tfvars` to the control plane plan, keeping the stored horizon
/// plugin list in step with the feature.
async fn apply_control_plane(
    store: &ConfigStore,
    tfhelper: &dyn Provisioner,
    feature: &dyn OpenStackFeature,
    mut tfvars: Map<String, Value>,
    enable: bool,
) -> anyhow::Result<()> {
    if let Some(plugin) = feature.horizon_plugin() {
        let stored = store.read_config_or_default(OPENSTACK_CONFIG_KEY).await?;
        tfvars.insert(
            HORIZON_PLUGINS_VAR.to_string(),
            horizon_plugins(&stored, plugin, enable),
        );
    }
    tfhelper
        .update_tfvars_and_apply(store, OPENSTACK_CONFIG_KEY, tfvars, &[])
        .await?;
    Ok(())
}

/// `[TerraformInitStep, Enable/DisableOpenStackApplicationStep]` on the
/// control plane plan.
pub fn control_plane_plan(
    ctx: &DeploymentContext,
    jhelper: &JujuHelper,
    feature: Arc<dyn OpenStackFeature>,
    enable: bool,
) -> anyhow::Result<Vec<Box<dyn Step>>> {
    let tfhelper = ctx.get_tfhelper("openstack-plan")?;
    let apply: Box<dyn Step> = if enable {
        Box::new(EnableOpenStackApplicationStep::new(
            ctx.deployment.clone(),
            ctx.get_client(),
            tfhelper.clone(),
            jhelper.clone(),
            feature,
        ))
    } else {
        Box::new(DisableOpenStackApplicationStep::new(
            ctx.deployment.clone(),
            ctx.get_client(),
            tfhelper.clone(),
            jhelper.clone(),
            feature,
        ))
    };
    Ok(vec![Box::new(TerraformInitStep::new(tfhelper)), apply])
}

/// Run the control plane plan that turns `feature` on.
pub async fn enable_control_plane(
    ctx: &DeploymentContext,
    feature: Arc<dyn OpenStackFeature>,
    progress: &dyn ProgressSink,
    show_hints: bool,
) -> anyhow::Result<()> {
    let jhelper = ctx.get_connected_controller()?;
    let display = feature.display_name().to_string();
    run_plan(control_plane_plan(ctx, &jhelper, feature, true)?, progress, show_hints).await?;
    println!("OpenStack {} application enabled.", display);
    Ok(())
}

/// Run the control plane plan that turns `feature` off.
pub async fn disable_control_plane(
    ctx: &DeploymentContext,
    feature: Arc<dyn OpenStackFeature>,
    progress: &dyn ProgressSink,
    show_hints: bool,
) -> anyhow::Result<()> {
    let jhelper = ctx.get_connected_controller()?;
    let display = feature.display_name().to_string();
    run_plan(control_plane_plan(ctx, &jhelper, feature, false)?, progress, show_hints).await?;
    println!("OpenStack {} application disabled.", display);
    Ok(())
}

/// Apply the control plane plan with the feature's variables set.
pub struct EnableOpenStackApplicationStep {
    deployment: Deployment,
    store: ConfigStore,
    tfhelper: Arc<dyn Provisioner>,
    jhelper: JujuHelper,
    feature: Arc<dyn OpenStackFeature>,
    name: String,
    description: String,
}

impl EnableOpenStackApplicationStep {
    pub fn new(
        deployment: Deployment,
        store: ConfigStore,
        tfhelper: Arc<dyn Provisioner>,
        jhelper: JujuHelper,
        feature: Arc<dyn OpenStackFeature>,
    ) -> Self {
        let display = feature.display_name().to_string();
        Self {
            deployment,
            store,
            tfhelper,
            jhelper,
            feature,
            name: format!("Enable OpenStack {}", display),
            description: format!("Enabling OpenStack {} application", display),
        }
    }
}

#[async_trait]
impl Step for EnableOpenStackApplicationStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        let tfvars = match self.feature.tfvars_on_enable(&self.deployment).await {
            Ok(tfvars) => tfvars,
            Err(e) => return StepResult::failed(e.to_string()),
        };

        progress.update("deploying services");
        if let Err(e) = apply_control_plane(
            &self.store,
            self.tfhelper.as_ref(),
            self.feature.as_ref(),
            tfvars,
            true,
        )
        .await
        {
            tracing::error!("Error enabling {}: {}", self.feature.display_name(), e);
            return StepResult::failed(e.to_string());
        }

        let apps = self.feature.application_names(&self.deployment);
        if apps.is_empty() {
            return StepResult::completed();
        }
        tracing::debug!("Application monitored for readiness: {:?}", apps);
        match self
            .jhelper
            .wait_until_active(
                OPENSTACK_MODEL,
                &apps,
                self.feature.application_timeout_on_enable(),
                progress,
            )
            .await
        {
            Ok(()) => StepResult::completed(),
            Err(e) => {
                tracing::warn!("{}", e);
                StepResult::failed(e.to_string())
            }
        }
    }
}

/// Apply the control plane plan with the feature's variables cleared.
pub struct DisableOpenStackApplicationStep {
    deployment: Deployment,
    store: ConfigStore,
    tfhelper: Arc<dyn Provisioner>,
    jhelper: JujuHelper,
    feature: Arc<dyn OpenStackFeature>,
    name: String,
    description: String,
}

impl DisableOpenStackApplicationStep {
    pub fn new(
        deployment: Deployment,
        store: ConfigStore,
        tfhelper: Arc<dyn Provisioner>,
        jhelper: JujuHelper,
        feature: Arc<dyn OpenStackFeature>,
    ) -> Self {
        let display = feature.display_name().to_string();
        Self {
            deployment,
            store,
            tfhelper,
            jhelper,
            feature,
            name: format!("Disable OpenStack {}", display),
            description: format!("Disabling OpenStack {} application", display),
        }
    }
}

#[async_trait]
impl Step for DisableOpenStackApplicationStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        let tfvars = self.feature.tfvars_on_disable(&self.deployment);
        progress.update("removing services");
        if let Err(e) = apply_control_plane(
            &self.store,
            self.tfhelper.as_ref(),
            self.feature.as_ref(),
            tfvars,
            false,
        )
        .await
        {
            tracing::error!("Error disabling {}: {}", self.feature.display_name(), e);
            return StepResult::failed(e.to_string());
        }

        let apps = self.feature.application_names(&self.deployment);
        if apps.is_empty() {
            return StepResult::completed();
        }
        match self
            .jhelper
            .wait_application_gone(
                &apps,
                OPENSTACK_MODEL,
                self.feature.application_timeout_on_disable(),
                progress,
            )
            .await
        {
            Ok(()) => StepResult::completed(),
            Err(e) => StepResult::failed(e.to_string()),
        }
    }
}
