//! Provisioner trait

use crate::backend::Backend;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sunbeam_config::ConfigStore;

/// A Terraform plan that can be initialised, applied and destroyed
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Plan name (e.g. `openstack-plan`)
    fn plan_name(&self) -> &str;

    fn backend(&self) -> &Backend;

    /// Backend settings other plans need to read this plan's state
    fn backend_config(&self) -> Map<String, Value> {
        self.backend().config(self.plan_name())
    }

    async fn init(&self) -> Result<()>;

    async fn apply(&self, extra_args: &[String]) -> Result<()>;

    async fn destroy(&self) -> Result<()>;

    /// Plan outputs, flattened to `name -> value`
    async fn output(&self) -> Result<Map<String, Value>>;

    /// Refresh the state from the running resources
    async fn sync(&self) -> Result<()>;

    async fn write_tfvars(&self, vars: &Map<String, Value>) -> Result<()>;

    /// Merge `overrides` into the variables stored under `config_key`,
    /// persist them, write the variables file and apply the plan.
    async fn update_tfvars_and_apply(
        &self,
        store: &ConfigStore,
        config_key: &str,
        overrides: Map<String, Value>,
        extra_args: &[String],
    ) -> Result<()> {
        let mut tfvars = store.read_config_or_default(config_key).await?;
        tfvars.extend(overrides);
        store
            .update_config(config_key, &Value::Object(tfvars.clone()))
            .await?;
        self.write_tfvars(&tfvars).await?;
        self.apply(extra_args).await
    }
}
