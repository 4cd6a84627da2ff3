//! Sunbeam Juju
//!
//! Orchestration collaborator of the plan engine: the [`JujuApi`] trait, its
//! CLI-backed implementation [`JujuCli`] and the [`JujuHelper`] used by steps
//! to act on applications and wait for them to settle.

pub mod api;
pub mod cli;
pub mod error;
pub mod helper;

pub use api::{ActionOutput, ApplicationStatus, DeployOptions, JujuApi, UnitStatus};
pub use cli::JujuCli;
pub use error::{JujuError, Result};
pub use helper::{ApplicationStatusObserver, JujuHelper, RemovalObserver};
