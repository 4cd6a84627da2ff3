//! Preflight checks
//!
//! Preconditions verified before any step of a command runs. Checks only
//! read the environment; the first failing check aborts the command.

use crate::error::PreflightError;
use crate::progress::ProgressSink;

/// Pass/fail precondition
pub trait PreflightCheck {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// `true` when the precondition holds. On `false`, [`Self::message`]
    /// explains what is missing.
    fn check(&mut self) -> bool;

    fn message(&self) -> Option<&str>;
}

/// Run `checks` in order, stopping at the first failure.
pub fn run_preflight_checks(
    checks: &mut [Box<dyn PreflightCheck>],
    progress: &dyn ProgressSink,
) -> Result<(), PreflightError> {
    for check in checks.iter_mut() {
        tracing::debug!("Starting pre-flight check {}", check.name());
        if !check.check() {
            let message = check
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} failed", check.description()));
            tracing::warn!("Pre-flight check {} failed: {}", check.name(), message);
            progress.detail(&message);
            return Err(PreflightError::CheckFailed {
                check: check.name().to_string(),
                message,
            });
        }
    }
    Ok(())
}
