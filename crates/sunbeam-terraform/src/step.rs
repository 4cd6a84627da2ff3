use crate::provisioner::Provisioner;
use async_trait::async_trait;
use std::sync::Arc;
use sunbeam_core::{ProgressSink, Step, StepResult};

/// Initialize Terraform with required providers.
pub struct TerraformInitStep {
    tfhelper: Arc<dyn Provisioner>,
}

impl TerraformInitStep {
    pub fn new(tfhelper: Arc<dyn Provisioner>) -> Self {
        Self { tfhelper }
    }
}

#[async_trait]
impl Step for TerraformInitStep {
    fn name(&self) -> &str {
        "Initialize Terraform"
    }

    fn description(&self) -> &str {
        "Initializing Terraform from provider mirror"
    }

    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult {
        progress.update(&format!("terraform init ({})", self.tfhelper.plan_name()));
        match self.tfhelper.init().await {
            Ok(()) => StepResult::completed(),
            Err(e) => StepResult::failed(e.to_string()),
        }
    }
}
