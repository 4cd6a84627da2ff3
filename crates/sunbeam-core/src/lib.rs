//! Sunbeam Core
//!
//! The plan/step execution engine shared by every Sunbeam command.
//!
//! A feature (observability, instance recovery, TLS, ...) is expressed as one
//! or more ordered lists of [`Step`]s. The [`run_plan`] runner executes them
//! one after another, honoring skip decisions and stopping at the first
//! failure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  sunbeam CLI                     │
//! │        (enable / disable / deployment ...)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │ preflight checks, Vec<Box<dyn Step>>
//! ┌─────────────────▼───────────────────────────────┐
//! │                 sunbeam-core                     │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │  run_plan    │  │  wait bridge │             │
//! │  └──────────────┘  └──────────────┘             │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │     ProgressSink (console / recording)    │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │   terraform   │ │     juju      │
//! │  (provision)  │ │  (wait/act)   │
//! └───────────────┘ └───────────────┘
//! ```

pub mod error;
pub mod plan;
pub mod preflight;
pub mod progress;
pub mod result;
pub mod step;
pub mod wait;

// Re-exports
pub use error::{PlanError, PreflightError, StepError, WaitError};
pub use plan::{PlanResults, StepRecord, run_plan};
pub use preflight::{PreflightCheck, run_preflight_checks};
pub use progress::{ConsoleProgress, ProgressEvent, ProgressSink, RecordingProgress, format_duration};
pub use result::{ResultType, SkipDecision, StepResult};
pub use step::Step;
pub use wait::{StatusObserver, StatusWatch, WaitOptions, wait_until};
