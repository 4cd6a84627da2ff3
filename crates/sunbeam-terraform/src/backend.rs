//! Terraform state backends
//!
//! Plans either keep their state next to the plan (`local`) or in the
//! cluster daemon through Terraform's `http` backend.

use crate::error::Result;
use serde_json::{Map, Value, json};
use std::path::Path;

const BACKEND_FILE: &str = "backend.tf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Local,
    Http { clusterd_address: String },
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Http { .. } => "http",
        }
    }

    /// Backend settings for `plan`. Empty for the local backend.
    pub fn config(&self, plan: &str) -> Map<String, Value> {
        let mut config = Map::new();
        if let Backend::Http { clusterd_address } = self {
            let address = clusterd_address.trim_end_matches('/');
            config.insert(
                "address".into(),
                json!(format!("{}/1.0/terraformstate/{}", address, plan)),
            );
            config.insert("update_method".into(), json!("PUT"));
            config.insert(
                "lock_address".into(),
                json!(format!("{}/1.0/terraformlock/{}", address, plan)),
            );
            config.insert("lock_method".into(), json!("PUT"));
            config.insert(
                "unlock_address".into(),
                json!(format!("{}/1.0/terraformunlock/{}", address, plan)),
            );
            config.insert("unlock_method".into(), json!("PUT"));
            config.insert("skip_cert_verification".into(), json!(true));
        }
        config
    }
}

/// Render the `backend.tf` document for an http backend configuration
fn render_http_backend(config: &Map<String, Value>) -> String {
    let width = config.keys().map(String::len).max().unwrap_or(0);
    let mut out = String::from("\nterraform {\n  backend \"http\" {\n");
    for (key, value) in config {
        out.push_str(&format!("    {:<width$} = {}\n", key, value, width = width));
    }
    out.push_str("  }\n}\n");
    out
}

/// Write `backend.tf` into `plan_dir` when it differs from what is there.
///
/// Returns `true` when the file changed, in which case the next
/// `terraform init` needs `-reconfigure`. The local backend never writes.
pub fn write_backend_tf(plan_dir: &Path, backend: &Backend, plan: &str) -> Result<bool> {
    if *backend == Backend::Local {
        return Ok(false);
    }
    let rendered = render_http_backend(&backend.config(plan));
    let path = plan_dir.join(BACKEND_FILE);
    let current = if path.exists() {
        Some(std::fs::read_to_string(&path)?)
    } else {
        None
    };
    if current.as_deref() == Some(rendered.as_str()) {
        return Ok(false);
    }
    std::fs::write(&path, rendered)?;
    tracing::debug!("Updated {}", path.display());
    Ok(true)
}
