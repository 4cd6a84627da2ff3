//! Instance recovery: Masakari in the control plane, Consul servers per
//! network space and Consul clients on the hypervisors.

use crate::context::DeploymentContext;
use crate::features::Feature;
use crate::features::openstack::{
    DisableOpenStackApplicationStep, EnableOpenStackApplicationStep, OpenStackFeature,
};
use crate::steps::hypervisor::ReapplyHypervisorTerraformPlanStep;
use crate::steps::juju::RemoveSaasApplicationsStep;
use crate::utils::object;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use sunbeam_config::{ConfigStore, DatabaseTopology, Deployment, Network, OPENSTACK_MODEL};
use sunbeam_core::{ProgressSink, Step, StepResult, run_plan};
use sunbeam_juju::JujuHelper;
use sunbeam_terraform::{Provisioner, TerraformInitStep};

pub const CONSUL_CLIENT_PLAN: &str = "consul-client-plan";
pub const CONSUL_CLIENT_CONFIG_KEY: &str = "TerraformVarsFeatureConsulPlanConsulClient";
const PRINCIPAL_APP: &str = "openstack-hypervisor";

/// Networks a Consul server can watch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsulServerNetwork {
    Management,
    Tenant,
    Storage,
}

impl ConsulServerNetwork {
    pub const ALL: [ConsulServerNetwork; 3] = [
        ConsulServerNetwork::Management,
        ConsulServerNetwork::Tenant,
        ConsulServerNetwork::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsulServerNetwork::Management => "management",
            ConsulServerNetwork::Tenant => "tenant",
            ConsulServerNetwork::Storage => "storage",
        }
    }

    /// Deployment network the server binds to
    pub fn network(&self) -> Network {
        match self {
            ConsulServerNetwork::Management => Network::Management,
            ConsulServerNetwork::Tenant => Network::Data,
            ConsulServerNetwork::Storage => Network::Storage,
        }
    }

    /// Serf LAN node port exposed by the server
    pub fn server_serf_lan_port(&self) -> u16 {
        match self {
            ConsulServerNetwork::Management => 30301,
            ConsulServerNetwork::Tenant => 30311,
            ConsulServerNetwork::Storage => 30321,
        }
    }

    /// Serf LAN port of the client on the hypervisor
    pub fn client_serf_lan_port(&self) -> u16 {
        match self {
            ConsulServerNetwork::Management => 8301,
            ConsulServerNetwork::Tenant => 8311,
            ConsulServerNetwork::Storage => 8321,
        }
    }

    fn key(&self) -> String {
        format!("consul-{}", self.as_str())
    }

    fn enable_var(&self) -> String {
        format!("enable-consul-{}", self.as_str())
    }
}

/// Networks that get their own Consul server.
///
/// Storage is skipped when it shares the management space, tenant when it
/// shares either of them.
pub fn consul_servers_to_enable(deployment: &Deployment) -> Vec<ConsulServerNetwork> {
    let management = deployment.get_space(Network::Management).ok();
    let storage = deployment.get_space(Network::Storage).ok();
    let tenant = deployment.get_space(Network::Data).ok();

    let mut enabled = Vec::new();
    if management.is_some() {
        enabled.push(ConsulServerNetwork::Management);
    }
    if let Some(space) = tenant
        && Some(space) != management
        && Some(space) != storage
    {
        enabled.push(ConsulServerNetwork::Tenant);
    }
    if let Some(space) = storage
        && Some(space) != management
    {
        enabled.push(ConsulServerNetwork::Storage);
    }
    enabled
}

pub fn consul_client_application_names(deployment: &Deployment) -> Vec<String> {
    consul_servers_to_enable(deployment)
        .iter()
        .map(|net| format!("consul-client-{}", net.as_str()))
        .collect()
}

fn disable_tfvars() -> Map<String, Value> {
    object(json!({
        "enable-masakari": false,
        "enable-consul-management": false,
        "enable-consul-tenant": false,
        "enable-consul-storage": false,
    }))
}

/// Deploy Consul Client using Terraform
pub struct DeployConsulClientStep {
    deployment: Deployment,
    store: ConfigStore,
    tfhelper: Arc<dyn Provisioner>,
    openstack_tfhelper: Arc<dyn Provisioner>,
    jhelper: JujuHelper,
    timeout: Duration,
}

impl DeployConsulClientStep {
    pub fn new(
        deployment: Deployment,
        store: ConfigStore,
        tfhelper: Arc<dyn Provisioner>,
        openstack_tfhelper: Arc<dyn Provisioner>,
        jhelper: JujuHelper,
        timeout: Duration,
    ) -> Self {
        Self {
            deployment,
            store,
            tfhelper,
            openstack_tfhelper,
            jhelper,
            timeout,
        }
    }

    fn tfvars(&self) -> sunbeam_config::Result<Map<String, Value>> {
        let mut tfvars = object(json!({
            "principal-application-model": self.deployment.openstack_machines_model(),
            "principal-application": PRINCIPAL_APP,
            "openstack-state-backend": self.openstack_tfhelper.backend().name(),
            "openstack-state-config": self.openstack_tfhelper.backend_config(),
        }));

        let enabled = consul_servers_to_enable(&self.deployment);
        let mut config_map = Map::new();
        let mut bindings_map = Map::new();
        for net in ConsulServerNetwork::ALL {
            let enable = enabled.contains(&net);
            tfvars.insert(net.enable_var(), json!(enable));
            if !enable {
                continue;
            }
            config_map.insert(net.key(), json!({"serf-lan-port": net.client_serf_lan_port()}));
            let management = self.deployment.get_space(Network::Management)?;
            let space = self.deployment.get_space(net.network())?;
            bindings_map.insert(
                net.key(),
                json!([
                    {"space": management},
                    {"endpoint": "consul", "space": space},
                ]),
            );
        }
        tfvars.insert("consul-config-map".into(), Value::Object(config_map));
        tfvars.insert("consul-endpoint-bindings-map".into(), Value::Object(bindings_map));
        Ok(tfvars)
    }
}

#[async_trait]
impl Step for DeployConsulClientStep {
    fn name(&self) -> &str {
        "Deploy Consul Client"
    }

    fn description(&self) -> &str {
        "Deploy Consul Client"
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        let tfvars = match self.tfvars() {
            Ok(tfvars) => tfvars,
            Err(e) => return StepResult::failed(e.to_string()),
        };

        progress.update("deploying services");
        if let Err(e) = self
            .tfhelper
            .update_tfvars_and_apply(&self.store, CONSUL_CLIENT_CONFIG_KEY, tfvars, &[])
            .await
        {
            tracing::error!("Error deploying consul client: {}", e);
            return StepResult::failed(e.to_string());
        }

        let apps = consul_client_application_names(&self.deployment);
        tracing::debug!("Application monitored for readiness: {:?}", apps);
        match self
            .jhelper
            .wait_until_active(
                self.deployment.openstack_machines_model(),
                &apps,
                self.timeout,
                progress,
            )
            .await
        {
            Ok(()) => StepResult::completed(),
            Err(e) => {
                tracing::debug!("Failed to deploy consul client: {}", e);
                StepResult::failed(e.to_string())
            }
        }
    }
}

/// Remove Consul Client using Terraform
pub struct RemoveConsulClientStep {
    deployment: Deployment,
    store: ConfigStore,
    tfhelper: Arc<dyn Provisioner>,
    jhelper: JujuHelper,
    timeout: Duration,
}

impl RemoveConsulClientStep {
    pub fn new(
        deployment: Deployment,
        store: ConfigStore,
        tfhelper: Arc<dyn Provisioner>,
        jhelper: JujuHelper,
        timeout: Duration,
    ) -> Self {
        Self {
            deployment,
            store,
            tfhelper,
            jhelper,
            timeout,
        }
    }
}

#[async_trait]
impl Step for RemoveConsulClientStep {
    fn name(&self) -> &str {
        "Remove Consul Client"
    }

    fn description(&self) -> &str {
        "Removing Consul Client"
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        progress.update("destroying services");
        if let Err(e) = self.tfhelper.destroy().await {
            tracing::error!("Error destroying consul client: {}", e);
            return StepResult::failed(e.to_string());
        }

        let apps = consul_client_application_names(&self.deployment);
        tracing::debug!("Application monitored for removal: {:?}", apps);
        if let Err(e) = self
            .jhelper
            .wait_application_gone(
                &apps,
                self.deployment.openstack_machines_model(),
                self.timeout,
                progress,
            )
            .await
        {
            return StepResult::failed(e.to_string());
        }

        let tfvars = Value::Object(disable_tfvars());
        match self.store.update_config(CONSUL_CLIENT_CONFIG_KEY, &tfvars).await {
            Ok(()) => StepResult::completed(),
            Err(e) => StepResult::failed(e.to_string()),
        }
    }
}

pub struct InstanceRecoveryFeature {
    timeout: Duration,
}

impl InstanceRecoveryFeature {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Masakari and Consul servers, then the Consul clients
    pub fn enable_plan(
        self: &Arc<Self>,
        ctx: &DeploymentContext,
        jhelper: &JujuHelper,
    ) -> anyhow::Result<Vec<Box<dyn Step>>> {
        let store = ctx.get_client();
        let openstack = ctx.get_tfhelper("openstack-plan")?;
        let consul_client = ctx.get_tfhelper(CONSUL_CLIENT_PLAN)?;
        Ok(vec![
            Box::new(TerraformInitStep::new(openstack.clone())),
            Box::new(EnableOpenStackApplicationStep::new(
                ctx.deployment.clone(),
                store.clone(),
                openstack.clone(),
                jhelper.clone(),
                self.clone(),
            )),
            Box::new(TerraformInitStep::new(consul_client.clone())),
            Box::new(DeployConsulClientStep::new(
                ctx.deployment.clone(),
                store,
                consul_client,
                openstack,
                jhelper.clone(),
                self.timeout,
            )),
        ])
    }

    /// Point the hypervisors at the Masakari offer (or away from it with `null`)
    pub fn hypervisor_plan(
        &self,
        ctx: &DeploymentContext,
        jhelper: &JujuHelper,
        masakari_offer_url: Value,
    ) -> anyhow::Result<Vec<Box<dyn Step>>> {
        let hypervisor = ctx.get_tfhelper("hypervisor-plan")?;
        let mut extra_tfvars = Map::new();
        extra_tfvars.insert("masakari-offer-url".into(), masakari_offer_url);
        Ok(vec![
            Box::new(TerraformInitStep::new(hypervisor.clone())),
            Box::new(ReapplyHypervisorTerraformPlanStep::new(
                ctx.get_client(),
                hypervisor,
                jhelper.clone(),
                ctx.deployment.openstack_machines_model(),
                extra_tfvars,
            )),
        ])
    }

    pub fn disable_plan(
        self: &Arc<Self>,
        ctx: &DeploymentContext,
        jhelper: &JujuHelper,
    ) -> anyhow::Result<Vec<Box<dyn Step>>> {
        let store = ctx.get_client();
        let openstack = ctx.get_tfhelper("openstack-plan")?;
        let consul_client = ctx.get_tfhelper(CONSUL_CLIENT_PLAN)?;
        let machines_model = ctx.deployment.openstack_machines_model();

        let mut plan = self.hypervisor_plan(ctx, jhelper, Value::Null)?;
        let reapply = plan.pop();
        plan.push(Box::new(TerraformInitStep::new(consul_client.clone())));
        plan.push(Box::new(RemoveConsulClientStep::new(
            ctx.deployment.clone(),
            store.clone(),
            consul_client,
            jhelper.clone(),
            self.timeout,
        )));
        plan.extend(reapply);
        plan.push(Box::new(RemoveSaasApplicationsStep::new(
            jhelper.clone(),
            machines_model,
            OPENSTACK_MODEL,
            vec!["masakari".to_string()],
        )));
        plan.push(Box::new(TerraformInitStep::new(openstack.clone())));
        plan.push(Box::new(DisableOpenStackApplicationStep::new(
            ctx.deployment.clone(),
            store,
            openstack,
            jhelper.clone(),
            self.clone(),
        )));
        Ok(plan)
    }
}

#[async_trait]
impl OpenStackFeature for InstanceRecoveryFeature {
    fn display_name(&self) -> &str {
        "Instance Recovery"
    }

    fn application_names(&self, deployment: &Deployment) -> Vec<String> {
        let mut apps = vec!["masakari".to_string(), "masakari-mysql-router".to_string()];
        apps.extend(consul_servers_to_enable(deployment).iter().map(|net| net.key()));
        if deployment.database_topology == DatabaseTopology::Multi {
            apps.push("masakari-mysql".to_string());
        }
        apps
    }

    async fn tfvars_on_enable(&self, deployment: &Deployment) -> anyhow::Result<Map<String, Value>> {
        let enabled = consul_servers_to_enable(deployment);
        let mut tfvars = Map::new();
        let mut config_map = Map::new();
        for net in ConsulServerNetwork::ALL {
            let enable = enabled.contains(&net);
            tfvars.insert(net.enable_var(), json!(enable));
            if enable {
                config_map.insert(
                    net.key(),
                    json!({
                        "expose-gossip-and-rpc-ports": true,
                        "serflan-node-port": net.server_serf_lan_port(),
                    }),
                );
            }
        }
        tfvars.insert("consul-config-map".into(), Value::Object(config_map));
        tfvars.insert("enable-masakari".into(), json!(true));
        Ok(tfvars)
    }

    fn tfvars_on_disable(&self, _deployment: &Deployment) -> Map<String, Value> {
        disable_tfvars()
    }

    fn application_timeout_on_enable(&self) -> Duration {
        self.timeout
    }

    fn application_timeout_on_disable(&self) -> Duration {
        self.timeout
    }
}

/// Handle passed to [`Feature`]; plans need the shared `Arc`.
pub struct InstanceRecovery(pub Arc<InstanceRecoveryFeature>);

#[async_trait]
impl Feature for InstanceRecovery {
    fn name(&self) -> &str {
        "instance-recovery"
    }

    async fn pre_enable(&self, ctx: &DeploymentContext) -> anyhow::Result<()> {
        if ctx.deployment.database_topology == DatabaseTopology::Single {
            println!("WARNING: This feature is meant for multi-node deployment only.");
        }
        Ok(())
    }

    async fn run_enable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        let jhelper = ctx.get_connected_controller()?;
        run_plan(self.0.enable_plan(ctx, &jhelper)?, progress, show_hints).await?;

        let output = ctx.get_tfhelper("openstack-plan")?.output().await?;
        let offer = output.get("masakari-offer-url").cloned().unwrap_or(Value::Null);
        run_plan(self.0.hypervisor_plan(ctx, &jhelper, offer)?, progress, show_hints).await?;
        println!("OpenStack {} application enabled.", self.0.display_name());
        Ok(())
    }

    async fn run_disable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        let jhelper = ctx.get_connected_controller()?;
        run_plan(self.0.disable_plan(ctx, &jhelper)?, progress, show_hints).await?;
        println!("OpenStack {} application disabled.", self.0.display_name());
        Ok(())
    }
}
