//! Optional features
//!
//! A feature is enabled by running one or more plans; the outcome is recorded
//! in the deployment's config store under [`FEATURES_KEY`].

pub mod caas;
pub mod instance_recovery;
pub mod observability;
pub mod openstack;
pub mod orchestration;
pub mod secrets;
pub mod tls;

use crate::context::DeploymentContext;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use sunbeam_config::ConfigStore;
use sunbeam_core::ProgressSink;

pub const FEATURES_KEY: &str = "Features";

/// Known features and their descriptions
pub const FEATURES: &[(&str, &str)] = &[
    ("observability", "Observability stack and Grafana agent"),
    ("instance-recovery", "Instance recovery with Masakari and Consul"),
    ("tls.ca", "TLS using certificates signed by a third party CA"),
    ("tls.self-signed", "TLS using self-signed certificates"),
    ("secrets", "OpenStack Secrets service (Barbican)"),
    ("orchestration", "OpenStack Orchestration service (Heat)"),
    ("caas", "Container as a Service (Magnum)"),
];

#[async_trait]
pub trait Feature: Send + Sync {
    /// Key of the feature in [`FEATURES`]
    fn name(&self) -> &str;

    async fn pre_enable(&self, _ctx: &DeploymentContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run_enable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()>;

    async fn post_enable(
        &self,
        _ctx: &DeploymentContext,
        _progress: &dyn ProgressSink,
        _show_hints: bool,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run_disable_plans(
        &self,
        ctx: &DeploymentContext,
        progress: &dyn ProgressSink,
        show_hints: bool,
    ) -> anyhow::Result<()>;

    async fn post_disable(
        &self,
        _ctx: &DeploymentContext,
        _progress: &dyn ProgressSink,
        _show_hints: bool,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Enablement state of every feature recorded so far
pub async fn enabled_features(store: &ConfigStore) -> anyhow::Result<BTreeMap<String, bool>> {
    let stored = store.read_config_or_default(FEATURES_KEY).await?;
    Ok(stored
        .into_iter()
        .map(|(name, value)| (name, value.as_bool().unwrap_or(false)))
        .collect())
}

pub async fn is_enabled(store: &ConfigStore, name: &str) -> anyhow::Result<bool> {
    Ok(enabled_features(store)
        .await?
        .get(name)
        .copied()
        .unwrap_or(false))
}

/// Fails with `message` unless feature `name` is enabled.
pub async fn require_enabled(store: &ConfigStore, name: &str, message: &str) -> anyhow::Result<()> {
    if !is_enabled(store, name).await? {
        anyhow::bail!("{}", message);
    }
    Ok(())
}

pub async fn set_enabled(store: &ConfigStore, name: &str, enabled: bool) -> anyhow::Result<()> {
    let mut stored = store.read_config_or_default(FEATURES_KEY).await?;
    stored.insert(name.to_string(), json!(enabled));
    store.update_config(FEATURES_KEY, &Value::Object(stored)).await?;
    Ok(())
}

pub async fn enable(
    feature: &dyn Feature,
    ctx: &DeploymentContext,
    progress: &dyn ProgressSink,
    show_hints: bool,
) -> anyhow::Result<()> {
    feature.pre_enable(ctx).await?;
    feature.run_enable_plans(ctx, progress, show_hints).await?;
    set_enabled(&ctx.get_client(), feature.name(), true).await?;
    feature.post_enable(ctx, progress, show_hints).await?;
    tracing::info!("Enabled feature {}", feature.name());
    Ok(())
}

pub async fn disable(
    feature: &dyn Feature,
    ctx: &DeploymentContext,
    progress: &dyn ProgressSink,
    show_hints: bool,
) -> anyhow::Result<()> {
    feature.run_disable_plans(ctx, progress, show_hints).await?;
    set_enabled(&ctx.get_client(), feature.name(), false).await?;
    feature.post_disable(ctx, progress, show_hints).await?;
    tracing::info!("Disabled feature {}", feature.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enablement_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(temp_dir.path());

        assert!(!is_enabled(&store, "observability").await.unwrap());
        set_enabled(&store, "observability", true).await.unwrap();
        set_enabled(&store, "tls.ca", false).await.unwrap();

        assert!(is_enabled(&store, "observability").await.unwrap());
        let all = enabled_features(&store).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("tls.ca"), Some(&false));
    }

    #[tokio::test]
    async fn test_require_enabled() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(temp_dir.path());

        let err = require_enabled(&store, "secrets", "Secrets must be enabled")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Secrets must be enabled");

        set_enabled(&store, "secrets", false).await.unwrap();
        assert!(require_enabled(&store, "secrets", "x").await.is_err());

        set_enabled(&store, "secrets", true).await.unwrap();
        require_enabled(&store, "secrets", "x").await.unwrap();
    }
}
