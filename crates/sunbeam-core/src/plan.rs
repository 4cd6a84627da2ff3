//! Plan runner
//!
//! Executes an ordered list of steps. The order given by the caller is the
//! execution order; the runner never reorders, retries or runs steps in
//! parallel.

use crate::error::PlanError;
use crate::progress::ProgressSink;
use crate::result::{SkipDecision, StepResult};
use crate::step::Step;
use std::time::{Duration, Instant};

/// Result of one executed (or skipped) step
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub name: String,
    pub result: StepResult,
    pub duration: Duration,
}

/// Ordered results of a plan run
#[derive(Debug, Clone, Default)]
pub struct PlanResults {
    records: Vec<StepRecord>,
}

impl PlanResults {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, result: StepResult, duration: Duration) {
        self.records.push(StepRecord {
            name: name.to_string(),
            result,
            duration,
        });
    }

    /// Result of the last step run under `name`
    pub fn get(&self, name: &str) -> Option<&StepResult> {
        self.records
            .iter()
            .rev()
            .find(|r| r.name == name)
            .map(|r| &r.result)
    }

    /// Message of the named step's result, if any
    pub fn message(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|r| r.message.as_deref())
    }

    /// Payload of the named step's result, if any
    pub fn payload(&self, name: &str) -> Option<&serde_json::Value> {
        self.get(name).and_then(|r| r.payload.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Run `steps` in order, stopping at the first failure.
///
/// A step whose skip check answers [`SkipDecision::AlreadySatisfied`] is
/// recorded as skipped and its `run` is never called. A failing skip check
/// counts as a failed step.
pub async fn run_plan(
    steps: Vec<Box<dyn Step>>,
    progress: &dyn ProgressSink,
    show_hints: bool,
) -> Result<PlanResults, PlanError> {
    let mut results = PlanResults::new();

    for mut step in steps {
        let name = step.name().to_string();
        let description = step.description().to_string();
        tracing::debug!("Starting step {:?}", name);
        progress.step_started(&name, &description);
        let start = Instant::now();

        let result = match step.is_skip(progress).await {
            Ok(SkipDecision::AlreadySatisfied) => {
                tracing::info!("Skipping step {:?}", name);
                progress.step_skipped(&name);
                results.push(&name, StepResult::skipped(), start.elapsed());
                continue;
            }
            Ok(SkipDecision::Proceed) => step.run(progress).await,
            Err(e) => {
                tracing::debug!("Skip check of step {:?} failed: {}", name, e);
                StepResult::failed(e.message())
            }
        };

        let duration = start.elapsed();
        tracing::debug!("Finished step {:?}. Result: {}", name, result.result_type);

        if result.is_failed() {
            let message = result
                .message
                .clone()
                .unwrap_or_else(|| format!("{} failed", description));
            progress.step_failed(&name, &message, duration);
            if show_hints {
                progress.detail(&format!("{}: {}", name, description));
                if let Some(payload) = &result.payload {
                    progress.detail(&payload.to_string());
                }
            }
            return Err(PlanError::StepFailed {
                step: name,
                message,
            });
        }

        if result.is_skipped() {
            progress.step_skipped(&name);
        } else {
            progress.step_completed(&name, duration);
        }
        results.push(&name, result, duration);
    }

    Ok(results)
}
