//! Sunbeam Terraform
//!
//! Provisioning collaborator of the plan engine. [`TerraformHelper`] drives
//! the `terraform` binary for one plan directory; steps depend on the
//! [`Provisioner`] trait so they can be exercised without terraform.

pub mod backend;
pub mod error;
pub mod helper;
pub mod provisioner;
pub mod step;

pub use backend::{Backend, write_backend_tf};
pub use error::{Result, TerraformError};
pub use helper::TerraformHelper;
pub use provisioner::Provisioner;
pub use step::TerraformInitStep;
