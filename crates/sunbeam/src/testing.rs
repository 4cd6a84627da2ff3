//! Fakes shared by the unit tests of steps and features

use crate::context::DeploymentContext;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sunbeam_config::{Deployment, DeploymentType, Settings};
use sunbeam_juju::{
    ActionOutput, ApplicationStatus, DeployOptions, JujuApi, JujuError, JujuHelper, UnitStatus,
};
use sunbeam_terraform::{Backend, Provisioner, TerraformError};

/// Context for a local deployment `lab` rooted in `dir`
pub fn context(dir: &Path) -> DeploymentContext {
    DeploymentContext {
        deployment: Deployment::new("lab", "local", DeploymentType::Local),
        settings: Settings {
            plans_dir: Some(dir.join("plans")),
            ..Settings::default()
        },
        share_dir: dir.to_path_buf(),
    }
}

pub fn app(name: &str, workload: &str) -> ApplicationStatus {
    ApplicationStatus {
        name: name.to_string(),
        status: workload.to_string(),
        units: vec![UnitStatus {
            name: format!("{}/0", name),
            workload: workload.to_string(),
            agent: "idle".to_string(),
            leader: true,
            machine: Some("0".to_string()),
        }],
    }
}

/// Juju with a fixed set of applications per model
#[derive(Default)]
pub struct FakeJuju {
    pub applications: Mutex<HashMap<String, Vec<ApplicationStatus>>>,
    pub machines: Vec<String>,
    pub saas: Vec<String>,
    /// Action name to its output
    pub actions: HashMap<String, Value>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeJuju {
    pub fn with_apps(mut self, model: &str, apps: Vec<ApplicationStatus>) -> Self {
        self.applications
            .get_mut()
            .unwrap()
            .insert(model.to_string(), apps);
        self
    }

    pub fn with_action(mut self, action: &str, output: Value) -> Self {
        self.actions.insert(action.to_string(), output);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl JujuApi for FakeJuju {
    async fn model_exists(&self, model: &str) -> sunbeam_juju::Result<bool> {
        Ok(self.applications.lock().unwrap().contains_key(model))
    }

    async fn application_statuses(
        &self,
        model: &str,
    ) -> sunbeam_juju::Result<Vec<ApplicationStatus>> {
        self.applications
            .lock()
            .unwrap()
            .get(model)
            .cloned()
            .ok_or_else(|| JujuError::ModelNotFound(model.to_string()))
    }

    async fn saas_names(&self, _model: &str) -> sunbeam_juju::Result<Vec<String>> {
        Ok(self.saas.clone())
    }

    async fn machines(&self, _model: &str) -> sunbeam_juju::Result<Vec<String>> {
        Ok(self.machines.clone())
    }

    async fn deploy(&self, options: &DeployOptions) -> sunbeam_juju::Result<()> {
        self.record(format!("deploy {} to {}", options.name, options.to.join(",")));
        // Deployed applications settle immediately.
        self.applications
            .lock()
            .unwrap()
            .entry(options.model.clone())
            .or_default()
            .push(app(&options.name, "active"));
        Ok(())
    }

    async fn remove_application(&self, model: &str, name: &str) -> sunbeam_juju::Result<()> {
        self.record(format!("remove-application {}", name));
        if let Some(apps) = self.applications.lock().unwrap().get_mut(model) {
            apps.retain(|a| a.name != name);
        }
        Ok(())
    }

    async fn remove_saas(&self, _model: &str, name: &str) -> sunbeam_juju::Result<()> {
        self.record(format!("remove-saas {}", name));
        Ok(())
    }

    async fn run_action(
        &self,
        _model: &str,
        unit: &str,
        action: &str,
        params: &Map<String, Value>,
    ) -> sunbeam_juju::Result<ActionOutput> {
        self.record(format!("{} {} {}", action, unit, Value::Object(params.clone())));
        let output = self.actions.get(action).cloned().unwrap_or(Value::Object(Map::new()));
        Ok(serde_json::from_value(output).unwrap())
    }
}

pub fn jhelper(fake: &Arc<FakeJuju>) -> JujuHelper {
    JujuHelper::new(fake.clone())
        .with_intervals(Duration::from_millis(10), Duration::from_millis(10))
}

/// Terraform plan recording what it was asked to do
pub struct FakeProvisioner {
    pub plan: String,
    pub backend: Backend,
    pub outputs: Map<String, Value>,
    pub fail: Option<String>,
    pub tfvars: Mutex<Option<Map<String, Value>>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeProvisioner {
    pub fn new(plan: &str) -> Self {
        Self {
            plan: plan.to_string(),
            backend: Backend::Local,
            outputs: Map::new(),
            fail: None,
            tfvars: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_outputs(mut self, outputs: Value) -> Self {
        if let Value::Object(map) = outputs {
            self.outputs = map;
        }
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tfvars(&self) -> Map<String, Value> {
        self.tfvars.lock().unwrap().clone().unwrap_or_default()
    }

    fn call(&self, name: &str) -> sunbeam_terraform::Result<()> {
        self.calls.lock().unwrap().push(name.to_string());
        match &self.fail {
            Some(message) => Err(TerraformError::CommandFailed(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    fn plan_name(&self) -> &str {
        &self.plan
    }

    fn backend(&self) -> &Backend {
        &self.backend
    }

    async fn init(&self) -> sunbeam_terraform::Result<()> {
        self.call("init")
    }

    async fn apply(&self, extra_args: &[String]) -> sunbeam_terraform::Result<()> {
        let mut name = "apply".to_string();
        for arg in extra_args {
            name.push(' ');
            name.push_str(arg);
        }
        self.call(&name)
    }

    async fn destroy(&self) -> sunbeam_terraform::Result<()> {
        self.call("destroy")
    }

    async fn output(&self) -> sunbeam_terraform::Result<Map<String, Value>> {
        self.call("output")?;
        Ok(self.outputs.clone())
    }

    async fn sync(&self) -> sunbeam_terraform::Result<()> {
        self.call("sync")
    }

    async fn write_tfvars(&self, vars: &Map<String, Value>) -> sunbeam_terraform::Result<()> {
        *self.tfvars.lock().unwrap() = Some(vars.clone());
        Ok(())
    }
}
