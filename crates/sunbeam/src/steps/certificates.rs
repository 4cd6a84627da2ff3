//! Self-signed certificates provider on the infrastructure machines

use async_trait::async_trait;
use std::time::Duration;
use sunbeam_core::{ProgressSink, SkipDecision, Step, StepError, StepResult};
use sunbeam_juju::{DeployOptions, JujuError, JujuHelper};

pub const APPLICATION: &str = "tls-operator";
pub const CHARM: &str = "sunbeam-ssc";
pub const CHARM_BASE: &str = "ubuntu@22.04";
pub const CERTIFICATES_APP_TIMEOUT: Duration = Duration::from_secs(1200);

async fn application_exists(jhelper: &JujuHelper, model: &str) -> Result<bool, StepError> {
    match jhelper.get_application(APPLICATION, model).await {
        Ok(_) => Ok(true),
        Err(JujuError::ApplicationNotFound { .. }) => Ok(false),
        Err(e) => Err(StepError::new(e.to_string())),
    }
}

pub struct DeployCertificatesProviderApplicationStep {
    jhelper: JujuHelper,
    model: String,
    channel: Option<String>,
}

impl DeployCertificatesProviderApplicationStep {
    pub fn new(jhelper: JujuHelper, model: &str) -> Self {
        Self {
            jhelper,
            model: model.to_string(),
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: Option<String>) -> Self {
        self.channel = channel;
        self
    }
}

#[async_trait]
impl Step for DeployCertificatesProviderApplicationStep {
    fn name(&self) -> &str {
        "Deploy tls operator"
    }

    fn description(&self) -> &str {
        "Deploying TLS Operator"
    }

    async fn is_skip(&mut self, _progress: &dyn ProgressSink) -> Result<SkipDecision, StepError> {
        if application_exists(&self.jhelper, &self.model).await? {
            return Ok(SkipDecision::AlreadySatisfied);
        }
        Ok(SkipDecision::Proceed)
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        progress.update("fetching infra machines");
        let machines = match self.jhelper.get_machines(&self.model).await {
            Ok(machines) => machines,
            Err(e) => return StepResult::failed(e.to_string()),
        };
        let Some(machine) = machines.first() else {
            return StepResult::failed(format!("No machines found in {} model", self.model));
        };

        progress.update("deploying application");
        let options = DeployOptions {
            name: APPLICATION.to_string(),
            charm: CHARM.to_string(),
            model: self.model.clone(),
            channel: self.channel.clone(),
            base: Some(CHARM_BASE.to_string()),
            to: vec![machine.clone()],
            ..Default::default()
        };
        if let Err(e) = self.jhelper.deploy(&options).await {
            return StepResult::failed(e.to_string());
        }

        let apps = match self.jhelper.get_application_names(&self.model).await {
            Ok(apps) => apps,
            Err(e) => return StepResult::failed(e.to_string()),
        };
        match self
            .jhelper
            .wait_until_active(&self.model, &apps, CERTIFICATES_APP_TIMEOUT, progress)
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

pub struct RemoveCertificatesProviderApplicationStep {
    jhelper: JujuHelper,
    model: String,
}

impl RemoveCertificatesProviderApplicationStep {
    pub fn new(jhelper: JujuHelper, model: &str) -> Self {
        Self {
            jhelper,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Step for RemoveCertificatesProviderApplicationStep {
    fn name(&self) -> &str {
        "Remove tls operator"
    }

    fn description(&self) -> &str {
        "Removing TLS Operator"
    }

    async fn is_skip(&mut self, _progress: &dyn ProgressSink) -> Result<SkipDecision, StepError> {
        if application_exists(&self.jhelper, &self.model).await? {
            return Ok(SkipDecision::Proceed);
        }
        Ok(SkipDecision::AlreadySatisfied)
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        progress.update("removing application");
        if let Err(e) = self.jhelper.remove_application(APPLICATION, &self.model).await {
            return StepResult::failed(e.to_string());
        }
        match self
            .jhelper
            .wait_application_gone(
                &[APPLICATION.to_string()],
                &self.model,
                CERTIFICATES_APP_TIMEOUT,
                progress,
            )
            .await
        {
            Ok(()) => StepResult::completed(),
            Err(e) => StepResult::failed(e.to_string()),
        }
    }
}
