//! Juju API surface used by Sunbeam

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Status of one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    pub name: String,
    pub workload: String,
    pub agent: String,
    pub leader: bool,
    pub machine: Option<String>,
}

/// Status of one application and its units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStatus {
    pub name: String,
    pub status: String,
    pub units: Vec<UnitStatus>,
}

impl ApplicationStatus {
    pub fn leader(&self) -> Option<&UnitStatus> {
        self.units.iter().find(|u| u.leader)
    }
}

/// Results of an action run on a unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionOutput(pub Map<String, Value>);

impl ActionOutput {
    /// `return-code` reported by the action, 0 when absent
    pub fn return_code(&self) -> i64 {
        self.0
            .get("return-code")
            .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Parameters of `juju deploy`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployOptions {
    pub name: String,
    pub charm: String,
    pub model: String,
    pub channel: Option<String>,
    pub revision: Option<u32>,
    pub base: Option<String>,
    pub to: Vec<String>,
    pub config: BTreeMap<String, String>,
}

/// Orchestrator operations
#[async_trait]
pub trait JujuApi: Send + Sync {
    async fn model_exists(&self, model: &str) -> Result<bool>;

    async fn application_statuses(&self, model: &str) -> Result<Vec<ApplicationStatus>>;

    /// Names of the SAAS (consumed offers) in `model`
    async fn saas_names(&self, model: &str) -> Result<Vec<String>>;

    /// Machine ids in `model`
    async fn machines(&self, model: &str) -> Result<Vec<String>>;

    async fn deploy(&self, options: &DeployOptions) -> Result<()>;

    async fn remove_application(&self, model: &str, name: &str) -> Result<()>;

    async fn remove_saas(&self, model: &str, name: &str) -> Result<()>;

    async fn run_action(
        &self,
        model: &str,
        unit: &str,
        action: &str,
        params: &Map<String, Value>,
    ) -> Result<ActionOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_return_code() {
        let output: ActionOutput = serde_json::from_value(json!({"return-code": 2})).unwrap();
        assert_eq!(output.return_code(), 2);

        let output: ActionOutput = serde_json::from_value(json!({"return-code": "1"})).unwrap();
        assert_eq!(output.return_code(), 1);

        assert_eq!(ActionOutput::default().return_code(), 0);
    }
}
