//! juju CLI wrapper
//!
//! Implements [`JujuApi`] by running the juju client against
//! `<controller>:<model>` and parsing its JSON output.

use crate::api::{ActionOutput, ApplicationStatus, DeployOptions, JujuApi, UnitStatus};
use crate::error::{JujuError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// juju CLI wrapper bound to one controller
#[derive(Debug, Clone)]
pub struct JujuCli {
    juju: PathBuf,
    controller: String,
}

impl JujuCli {
    pub fn new(juju: impl Into<PathBuf>, controller: impl Into<String>) -> Self {
        Self {
            juju: juju.into(),
            controller: controller.into(),
        }
    }

    fn target(&self, model: &str) -> String {
        format!("{}:{}", self.controller, model)
    }

    /// Run a juju command and return stdout
    async fn run_command(&self, args: &[String]) -> Result<String> {
        let mut cmd = Command::new(&self.juju);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("Running: {} {}", self.juju.display(), args.join(" "));

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JujuError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn status(&self, model: &str) -> Result<StatusDocument> {
        let args = vec![
            "status".to_string(),
            "-m".into(),
            self.target(model),
            "--format".into(),
            "json".into(),
        ];
        match self.run_command(&args).await {
            Ok(stdout) => Ok(serde_json::from_str(&stdout)?),
            Err(JujuError::CommandFailed(stderr)) if stderr.contains("not found") => {
                Err(JujuError::ModelNotFound(model.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct StatusDocument {
    #[serde(default)]
    applications: BTreeMap<String, ApplicationEntry>,
    #[serde(default, rename = "application-endpoints")]
    application_endpoints: BTreeMap<String, Value>,
    #[serde(default)]
    machines: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ApplicationEntry {
    #[serde(default, rename = "application-status")]
    application_status: StatusEntry,
    #[serde(default)]
    units: BTreeMap<String, UnitEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct UnitEntry {
    #[serde(default, rename = "workload-status")]
    workload_status: StatusEntry,
    #[serde(default, rename = "juju-status")]
    juju_status: StatusEntry,
    #[serde(default)]
    leader: bool,
    #[serde(default)]
    machine: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusEntry {
    #[serde(default)]
    current: String,
}

impl StatusDocument {
    fn into_statuses(self) -> Vec<ApplicationStatus> {
        self.applications
            .into_iter()
            .map(|(name, app)| ApplicationStatus {
                name,
                status: app.application_status.current,
                units: app
                    .units
                    .into_iter()
                    .map(|(unit, entry)| UnitStatus {
                        name: unit,
                        workload: entry.workload_status.current,
                        agent: entry.juju_status.current,
                        leader: entry.leader,
                        machine: entry.machine,
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Render an action parameter as `key=value`
fn action_param(key: &str, value: &Value) -> String {
    match value {
        Value::String(s) => format!("{}={}", key, s),
        other => format!("{}={}", key, other),
    }
}

/// Extract the results of `unit` from `juju run --format json`
fn parse_action_output(unit: &str, action: &str, stdout: &str) -> Result<ActionOutput> {
    let doc: Map<String, Value> = serde_json::from_str(stdout)?;
    let entry = doc.get(unit).ok_or_else(|| JujuError::ActionFailed {
        unit: unit.to_string(),
        action: action.to_string(),
        message: "no result reported".to_string(),
    })?;
    let status = entry.get("status").and_then(Value::as_str).unwrap_or("completed");
    if status != "completed" {
        let message = entry
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(status)
            .to_string();
        return Err(JujuError::ActionFailed {
            unit: unit.to_string(),
            action: action.to_string(),
            message,
        });
    }
    let results = match entry.get("results") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    Ok(ActionOutput(results))
}

#[async_trait]
impl JujuApi for JujuCli {
    async fn model_exists(&self, model: &str) -> Result<bool> {
        let args = vec![
            "show-model".to_string(),
            self.target(model),
            "--format".into(),
            "json".into(),
        ];
        match self.run_command(&args).await {
            Ok(_) => Ok(true),
            Err(JujuError::CommandFailed(stderr)) if stderr.contains("not found") => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn application_statuses(&self, model: &str) -> Result<Vec<ApplicationStatus>> {
        Ok(self.status(model).await?.into_statuses())
    }

    async fn saas_names(&self, model: &str) -> Result<Vec<String>> {
        Ok(self
            .status(model)
            .await?
            .application_endpoints
            .into_keys()
            .collect())
    }

    async fn machines(&self, model: &str) -> Result<Vec<String>> {
        Ok(self.status(model).await?.machines.into_keys().collect())
    }

    async fn deploy(&self, options: &DeployOptions) -> Result<()> {
        let mut args = vec![
            "deploy".to_string(),
            options.charm.clone(),
            options.name.clone(),
            "-m".into(),
            self.target(&options.model),
        ];
        if let Some(channel) = &options.channel {
            args.push("--channel".into());
            args.push(channel.clone());
        }
        if let Some(revision) = options.revision {
            args.push("--revision".into());
            args.push(revision.to_string());
        }
        if let Some(base) = &options.base {
            args.push("--base".into());
            args.push(base.clone());
        }
        if !options.to.is_empty() {
            args.push("--to".into());
            args.push(options.to.join(","));
        }
        for (key, value) in &options.config {
            args.push("--config".into());
            args.push(format!("{}={}", key, value));
        }
        self.run_command(&args).await?;
        Ok(())
    }

    async fn remove_application(&self, model: &str, name: &str) -> Result<()> {
        let args = vec![
            "remove-application".to_string(),
            name.to_string(),
            "-m".into(),
            self.target(model),
            "--no-prompt".into(),
        ];
        self.run_command(&args).await?;
        Ok(())
    }

    async fn remove_saas(&self, model: &str, name: &str) -> Result<()> {
        let args = vec![
            "remove-saas".to_string(),
            name.to_string(),
            "-m".into(),
            self.target(model),
        ];
        self.run_command(&args).await?;
        Ok(())
    }

    async fn run_action(
        &self,
        model: &str,
        unit: &str,
        action: &str,
        params: &Map<String, Value>,
    ) -> Result<ActionOutput> {
        let mut args = vec![
            "run".to_string(),
            unit.to_string(),
            action.to_string(),
            "-m".into(),
            self.target(model),
            "--format".into(),
            "json".into(),
        ];
        args.extend(params.iter().map(|(k, v)| action_param(k, v)));
        let stdout = self.run_command(&args).await?;
        parse_action_output(unit, action, &stdout)
    }
}
