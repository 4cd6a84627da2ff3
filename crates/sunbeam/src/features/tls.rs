//! TLS for the OpenStack endpoints
//!
//! Only one certificate provider can be active; the provider in use is
//! recorded under [`CERTIFICATE_KEY`].

use crate::context::DeploymentContext;
use crate::features::Feature;
use crate::features::openstack::{OpenStackFeature, control_plane_plan};
use crate::steps::certificates::{
    APPLICATION as SELF_SIGNED_APP, DeployCertificatesProviderApplicationStep,
    RemoveCertificatesProviderApplicationStep,
};
use crate::steps::keystone::{AddCACertsToKeystoneStep, RemoveCACertsFromKeystoneStep};
use crate::utils::{validate_ca_certificate, validate_ca_chain};
use anyhow::bail;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use sunbeam_config::{ConfigStore, Deployment};
use sunbeam_core::{ProgressSink, Step, run_plan};
use sunbeam_juju::JujuHelper;

pub const CERTIFICATE_KEY: &str = "TlsProvider";
const MANUAL_TLS_APP: &str = "manual-tls-certificates";

/// Endpoint group served over TLS
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Endpoint {
    Public,
    Internal,
    Rgw,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Public, Endpoint::Internal, Endpoint::Rgw];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Public => "public",
            Endpoint::Internal => "internal",
            Endpoint::Rgw => "rgw",
        }
    }

    fn tfvar(&self) -> String {
        format!("enable-tls-for-{}-endpoint", self.as_str())
    }
}

/// Control plane side of a certificate provider: traefik pointed at it
struct TlsControlPlane {
    provider_app: &'static str,
    applications: Vec<String>,
    endpoints: Vec<Endpoint>,
}

#[async_trait]
impl OpenStackFeature for TlsControlPlane {
    fn display_name(&self) -> &str {
        "TLS"
    }

    fn application_names(&self, _deployment: &Deployment) -> Vec<String> {
        self.applications.clone()
    }

    async fn tfvars_on_enable(&self, _deployment: &Deployment) -> anyhow::Result<Map<String, Value>> {
        let mut tfvars = Map::new();
        tfvars.insert("traefik-to-tls-provider".into(), json!(self.provider_app));
        for endpoint in Endpoint::ALL {
            tfvars.insert(endpoint.tfvar(), json!(self.endpoints.contains(&endpoint)));
        }
        Ok(tfvars)
    }

    fn tfvars_on_disable(&self, _deployment: &Deployment) -> Map<String, Value> {
        let mut tfvars = Map::new();
        tfvars.insert("traefik-to-tls-provider".into(), Value::Null);
        for endpoint in Endpoint::ALL {
            tfvars.insert(endpoint.tfvar(), json!(false));
        }
        tfvars
    }
}

/// Fails when another provider is already recorded
async fn check_provider(store: &ConfigStore, name: &str) -> anyhow::Result<()> {
    let record = store.read_config_or_default(CERTIFICATE_KEY).await?;
    match record.get("provider").and_then(Value::as_str) {
        Some(provider) if !provider.is_empty() && provider != name => {
            bail!("Certificate provider already set to '{}'", provider)
        }
        _ => Ok(()),
    }
}

fn endpoint_names(endpoints: &[Endpoint]) -> Vec<&'static str> {
    endpoints.iter().map(Endpoint::as_str).collect()
}

/// TLS with certificates signed by a third party CA
pub struct TlsCaFeature {
    ca: String,
    chain: String,
    endpoints: Vec<Endpoint>,
}

impl TlsCaFeature {
    pub fn new(ca: String, chain: String, endpoints: Vec<Endpoint>) -> Self {
        Self {
            ca,
            chain,
            endpoints,
        }
    }

    fn control_plane(&self) -> Arc<TlsControlPlane> {
        Arc::new(TlsControlPlane {
            provider_app: MANUAL_TLS_APP,
            applications: vec![MANUAL_TLS_APP.to_string()],
            endpoints: self.endpoints.clone(),
        })
    }

    pub fn enable_plan(
        &self,
        ctx: &DeploymentContext,
        jhelper: &JujuHelper,
    ) -> anyhow::Result<Vec<Box<dyn Step>>> {
        control_plane_plan(ctx, jhelper, self.control_plane(), true)
    }

    pub fn disable_plan(
        &self,
        ctx: &DeploymentContext,
        jhelper: &JujuHelper,
    ) -> anyhow::Result<Vec<Box<dyn Step>>> {
        control_plane_plan(ctx, jhelper, self.control_plane(), false)
    }
}

#[async_trait]
impl Feature for TlsCaFeature {
    fn name(&self) -> &str {
        "tls.ca"
    }

    async fn pre_enable(&self, ctx: &DeploymentContext) -> anyhow::Result<()> {
        validate_ca_certificate(&self.ca)?;
        validate_ca_chain(&self.chain)?;
        check_provider(&ctx.get_client(), self.name()).await
    }

    async fn run_enable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        let jhelper = ctx.get_connected_controller()?;
        run_plan(self.enable_plan(ctx, &jhelper)?, progress, show_hints).await?;
        println!("TLS enabled.");
        Ok(())
    }

    async fn post_enable(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        let jhelper = ctx.get_connected_controller()?;
        let plan: Vec<Box<dyn Step>> = vec![Box::new(AddCACertsToKeystoneStep::new(
            jhelper,
            self.name(),
            &self.ca,
            &self.chain,
        ))];
        run_plan(plan, progress, show_hints).await?;

        let record = json!({
            "provider": self.name(),
            "ca": self.ca,
            "chain": self.chain,
            "endpoints": endpoint_names(&self.endpoints),
        });
        ctx.get_client().update_config(CERTIFICATE_KEY, &record).await?;
        Ok(())
    }

    async fn run_disable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        let jhelper = ctx.get_connected_controller()?;
        run_plan(self.disable_plan(ctx, &jhelper)?, progress, show_hints).await?;
        println!("TLS disabled.");
        Ok(())
    }

    async fn post_disable(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        let jhelper = ctx.get_connected_controller()?;
        let plan: Vec<Box<dyn Step>> =
            vec![Box::new(RemoveCACertsFromKeystoneStep::new(jhelper, self.name()))];
        run_plan(plan, progress, show_hints).await?;
        ctx.get_client()
            .update_config(CERTIFICATE_KEY, &json!({}))
            .await?;
        Ok(())
    }
}

/// TLS with self-signed certificates from the tls operator
pub struct TlsSelfSignedFeature {
    endpoints: Vec<Endpoint>,
    channel: Option<String>,
}

impl TlsSelfSignedFeature {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: Option<String>) -> Self {
        self.channel = channel;
        self
    }

    fn control_plane(&self) -> Arc<TlsControlPlane> {
        Arc::new(TlsControlPlane {
            provider_app: SELF_SIGNED_APP,
            applications: Vec::new(),
            endpoints: self.endpoints.clone(),
        })
    }

    pub fn enable_plan(
        &self,
        ctx: &DeploymentContext,
        jhelper: &JujuHelper,
    ) -> anyhow::Result<Vec<Box<dyn Step>>> {
        let mut plan: Vec<Box<dyn Step>> = vec![Box::new(
            DeployCertificatesProviderApplicationStep::new(
                jhelper.clone(),
                ctx.deployment.infrastructure_model(),
            )
            .with_channel(self.channel.clone()),
        )];
        plan.extend(control_plane_plan(ctx, jhelper, self.control_plane(), true)?);
        Ok(plan)
    }

    pub fn disable_plan(
        &self,
        ctx: &DeploymentContext,
        jhelper: &JujuHelper,
    ) -> anyhow::Result<Vec<Box<dyn Step>>> {
        let mut plan = control_plane_plan(ctx, jhelper, self.control_plane(), false)?;
        plan.push(Box::new(RemoveCertificatesProviderApplicationStep::new(
            jhelper.clone(),
            ctx.deployment.infrastructure_model(),
        )));
        Ok(plan)
    }
}

#[async_trait]
impl Feature for TlsSelfSignedFeature {
    fn name(&self) -> &str {
        "tls.self-signed"
    }

    async fn pre_enable(&self, ctx: &DeploymentContext) -> anyhow::Result<()> {
        check_provider(&ctx.get_client(), self.name()).await
    }

    async fn run_enable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        let jhelper = ctx.get_connected_controller()?;
        run_plan(self.enable_plan(ctx, &jhelper)?, progress, show_hints).await?;
        println!("TLS enabled.");
        Ok(())
    }

    async fn post_enable(
        &self,
        ctx: &DeploymentContext,
        _progress: &dyn ProgressSink,
        _show_hints: bool,
    ) -> anyhow::Result<()> {
        let record = json!({
            "provider": self.name(),
            "endpoints": endpoint_names(&self.endpoints),
        });
        ctx.get_client().update_config(CERTIFICATE_KEY, &record).await?;
        Ok(())
    }

    async fn run_disable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()> {
        let jhelper = ctx.get_connected_controller()?;
        run_plan(self.disable_plan(ctx, &jhelper)?, progress, show_hints).await?;
        println!("TLS disabled.");
        Ok(())
    }

    async fn post_disable(
        &self,
        ctx: &DeploymentContext,
        _progress: &dyn ProgressSink,
        _show_hints: bool,
    ) -> anyhow::Result<()> {
        ctx.get_client()
            .update_config(CERTIFICATE_KEY, &json!({}))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeJuju, context, jhelper};
    use sunbeam_config::DeploymentType;

    #[tokio::test]
    async fn test_control_plane_tfvars() {
        let deployment = Deployment::new("lab", "local", DeploymentType::Local);
        let feature = TlsCaFeature::new(String::new(), String::new(), vec![Endpoint::Public]);
        let control_plane = feature.control_plane();

        let tfvars = control_plane.tfvars_on_enable(&deployment).await.unwrap();
        assert_eq!(tfvars["traefik-to-tls-provider"], json!("manual-tls-certificates"));
        assert_eq!(tfvars["enable-tls-for-public-endpoint"], json!(true));
        assert_eq!(tfvars["enable-tls-for-internal-endpoint"], json!(false));
        assert_eq!(tfvars["enable-tls-for-rgw-endpoint"], json!(false));

        let tfvars = control_plane.tfvars_on_disable(&deployment);
        assert_eq!(tfvars["traefik-to-tls-provider"], Value::Null);
        assert_eq!(control_plane.application_names(&deployment), vec![MANUAL_TLS_APP]);
    }

    #[tokio::test]
    async fn test_pre_enable_rejects_invalid_ca() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ctx = context(temp_dir.path());
        let feature = TlsCaFeature::new("not base64!".to_string(), String::new(), Vec::new());

        let err = feature.pre_enable(&ctx).await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid CA certificate"));
    }

    #[tokio::test]
    async fn test_provider_conflict() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ctx = context(temp_dir.path());
        ctx.get_client()
            .update_config(CERTIFICATE_KEY, &json!({"provider": "tls.ca"}))
            .await
            .unwrap();

        let err = TlsSelfSignedFeature::new(Vec::new())
            .pre_enable(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Certificate provider already set to 'tls.ca'");
    }

    #[tokio::test]
    async fn test_same_or_cleared_provider_is_accepted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(temp_dir.path());

        check_provider(&store, "tls.ca").await.unwrap();
        store
            .update_config(CERTIFICATE_KEY, &json!({"provider": "tls.ca"}))
            .await
            .unwrap();
        check_provider(&store, "tls.ca").await.unwrap();
        store.update_config(CERTIFICATE_KEY, &json!({})).await.unwrap();
        check_provider(&store, "tls.self-signed").await.unwrap();
    }

    #[test]
    fn test_self_signed_plans() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ctx = context(temp_dir.path());
        let fake = Arc::new(FakeJuju::default());
        let feature = TlsSelfSignedFeature::new(vec![Endpoint::Public, Endpoint::Internal]);

        let names = |plan: Vec<Box<dyn Step>>| {
            plan.iter().map(|s| s.name().to_string()).collect::<Vec<_>>()
        };
        assert_eq!(
            names(feature.enable_plan(&ctx, &jhelper(&fake)).unwrap()),
            vec!["Deploy tls operator", "Initialize Terraform", "Enable OpenStack TLS"]
        );
        assert_eq!(
            names(feature.disable_plan(&ctx, &jhelper(&fake)).unwrap()),
            vec!["Initialize Terraform", "Disable OpenStack TLS", "Remove tls operator"]
        );
    }
}
