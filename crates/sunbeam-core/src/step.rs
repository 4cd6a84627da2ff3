//! Step trait definition

use crate::error::StepError;
use crate::progress::ProgressSink;
use crate::result::{SkipDecision, StepResult};
use async_trait::async_trait;

/// One idempotent unit of orchestration work
///
/// Concrete steps (deploy, remove, init, wait, ...) are independent types
/// composed into plans. A step is built fresh for each plan run and is owned
/// by the plan that runs it.
#[async_trait]
pub trait Step: Send {
    /// Short name, used as the key in [`crate::PlanResults`]
    fn name(&self) -> &str;

    /// Human description shown while the step runs
    fn description(&self) -> &str;

    /// Decide whether the step has anything to do.
    ///
    /// Must only read remote or local state. An `Err` aborts the plan with a
    /// FAILED result.
    async fn is_skip(&mut self, _progress: &dyn ProgressSink) -> Result<SkipDecision, StepError> {
        Ok(SkipDecision::Proceed)
    }

    /// Perform the work.
    ///
    /// Every expected failure of a collaborator is reported as a FAILED
    /// result. Re-running after a partial failure must be safe.
    async fn run(&mut self, progress: &dyn ProgressSink) -> StepResult;
}
