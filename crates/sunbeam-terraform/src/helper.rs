//! terraform CLI wrapper
//!
//! Runs the terraform binary inside a plan directory. Every invocation logs
//! to its own `terraform-<op>-<timestamp>.log` file in the plan directory.

use crate::backend::{Backend, write_backend_tf};
use crate::error::{Result, TerraformError};
use crate::provisioner::Provisioner;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const TFVARS_FILE: &str = "terraform.tfvars.json";

/// Terraform plan living in a directory on disk
#[derive(Debug, Clone)]
pub struct TerraformHelper {
    path: PathBuf,
    plan: String,
    terraform: PathBuf,
    env: HashMap<String, String>,
    parallelism: Option<u32>,
    backend: Backend,
}

impl TerraformHelper {
    pub fn new(path: impl AsRef<Path>, plan: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            plan: plan.into(),
            terraform: PathBuf::from("terraform"),
            env: HashMap::new(),
            parallelism: None,
            backend: Backend::Local,
        }
    }

    pub fn with_terraform(mut self, terraform: impl Into<PathBuf>) -> Self {
        self.terraform = terraform.into();
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_parallelism(mut self, parallelism: Option<u32>) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn command(&self, op: &str) -> Command {
        let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let log_path = self.path.join(format!("terraform-{}-{}.log", op, timestamp));

        let mut cmd = Command::new(&self.terraform);
        cmd.current_dir(&self.path);
        cmd.env("TF_LOG_PATH", log_path);
        if std::env::var_os("TF_LOG").is_none() {
            cmd.env("TF_LOG", "INFO");
        }
        cmd.envs(&self.env);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run terraform with `args` and return stdout
    async fn run(&self, op: &str, args: &[String]) -> Result<String> {
        let mut cmd = self.command(op);
        cmd.args(args);

        tracing::debug!("Running: {} {}", self.terraform.display(), args.join(" "));

        let output = cmd.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::error!("terraform {} failed for {}", op, self.plan);
            tracing::warn!("{}", stderr);
            return Err(TerraformError::CommandFailed(stderr));
        }

        tracing::debug!("Command finished. stderr={}", stderr);
        Ok(stdout)
    }

    fn parallelism_arg(&self) -> Option<String> {
        self.parallelism.map(|p| format!("-parallelism={}", p))
    }
}

/// Flatten `terraform output -json` into `name -> value`
fn parse_output(stdout: &str) -> Result<Map<String, Value>> {
    let raw: Map<String, Value> = serde_json::from_str(stdout)?;
    raw.into_iter()
        .map(|(key, entry)| match entry {
            Value::Object(mut fields) => match fields.remove("value") {
                Some(value) => Ok((key, value)),
                None => Err(TerraformError::InvalidOutput(format!("{} has no value", key))),
            },
            _ => Err(TerraformError::InvalidOutput(format!("{} is not an object", key))),
        })
        .collect()
}

#[async_trait]
impl Provisioner for TerraformHelper {
    fn plan_name(&self) -> &str {
        &self.plan
    }

    fn backend(&self) -> &Backend {
        &self.backend
    }

    async fn init(&self) -> Result<()> {
        let reconfigure = write_backend_tf(&self.path, &self.backend, &self.plan)?;
        let mut args = vec!["init".to_string(), "-upgrade".into(), "-no-color".into()];
        if reconfigure {
            tracing::debug!("Backend updated, running terraform init -reconfigure");
            args.push("-reconfigure".into());
        }
        self.run("init", &args).await?;
        Ok(())
    }

    async fn apply(&self, extra_args: &[String]) -> Result<()> {
        let mut args = vec!["apply".to_string()];
        args.extend(extra_args.iter().cloned());
        args.push("-auto-approve".into());
        args.push("-no-color".into());
        args.extend(self.parallelism_arg());
        self.run("apply", &args).await?;
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        let mut args = vec![
            "destroy".to_string(),
            "-auto-approve".into(),
            "-no-color".into(),
        ];
        args.extend(self.parallelism_arg());
        self.run("destroy", &args).await?;
        Ok(())
    }

    async fn output(&self) -> Result<Map<String, Value>> {
        let args = ["output".to_string(), "-json".into(), "-no-color".into()];
        let stdout = self.run("output", &args).await?;
        parse_output(&stdout)
    }

    async fn sync(&self) -> Result<()> {
        let args = [
            "apply".to_string(),
            "-refresh-only".into(),
            "-auto-approve".into(),
        ];
        self.run("sync", &args).await?;
        Ok(())
    }

    async fn write_tfvars(&self, vars: &Map<String, Value>) -> Result<()> {
        let path = self.path.join(TFVARS_FILE);
        tokio::fs::write(&path, serde_json::to_string(vars)?).await?;
        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }
}
