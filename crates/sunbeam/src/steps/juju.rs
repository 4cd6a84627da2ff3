use async_trait::async_trait;
use sunbeam_core::{ProgressSink, SkipDecision, Step, StepError, StepResult};
use sunbeam_juju::{JujuError, JujuHelper};

/// Remove consumed offers of `offering_model` from `model`.
pub struct RemoveSaasApplicationsStep {
    jhelper: JujuHelper,
    model: String,
    offering_model: String,
    saas_apps_to_delete: Vec<String>,
    name: String,
    description: String,
}

impl RemoveSaasApplicationsStep {
    pub fn new(
        jhelper: JujuHelper,
        model: &str,
        offering_model: &str,
        saas_apps_to_delete: Vec<String>,
    ) -> Self {
        Self {
            jhelper,
            model: model.to_string(),
            offering_model: offering_model.to_string(),
            saas_apps_to_delete,
            name: format!("Purge SAAS Offers: {}", model),
            description: format!("Purging SAAS Offers from {}", model),
        }
    }

    async fn pending(&self) -> Result<Vec<String>, JujuError> {
        let present = match self.jhelper.get_saas_names(&self.model).await {
            Ok(names) => names,
            Err(JujuError::ModelNotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(self
            .saas_apps_to_delete
            .iter()
            .filter(|name| present.contains(name))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Step for RemoveSaasApplicationsStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn is_skip(&mut self, _progress: &dyn ProgressSink) -> Result<SkipDecision, StepError> {
        let pending = self
            .pending()
            .await
            .map_err(|e| StepError::new(e.to_string()))?;
        if pending.is_empty() {
            tracing::debug!(
                "No SAAS from {} to remove in {}",
                self.offering_model,
                self.model
            );
            return Ok(SkipDecision::AlreadySatisfied);
        }
        Ok(SkipDecision::Proceed)
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        let pending = match self.pending().await {
            Ok(pending) => pending,
            Err(e) => return StepResult::failed(e.to_string()),
        };
        progress.update(&format!("removing {}", pending.join(", ")));
        match self.jhelper.remove_saas(&self.model, &pending).await {
            Ok(()) => StepResult::completed(),
            Err(e) => StepResult::failed(e.to_string()),
        }
    }
}
