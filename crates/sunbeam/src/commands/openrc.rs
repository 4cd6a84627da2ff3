use crate::checks::{DaemonGroupCheck, VerifyBootstrappedCheck};
use crate::context::DeploymentContext;
use crate::steps::keystone::RetrieveAdminCredentialsStep;
use anyhow::anyhow;
use serde_json::{Map, Value};
use sunbeam_core::{ConsoleProgress, PreflightCheck, Step, run_plan, run_preflight_checks};

/// Render credentials as shell `export` lines
pub fn format_openrc(creds: &Map<String, Value>) -> String {
    let mut out = String::from("# openrc for access to OpenStack\n");
    for (key, value) in creds {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push_str(&format!("export {}={}\n", key, value));
    }
    out
}

pub async fn handle(ctx: &DeploymentContext, show_hints: bool) -> anyhow::Result<()> {
    let mut checks: Vec<Box<dyn PreflightCheck>> = vec![
        Box::new(DaemonGroupCheck::new()),
        Box::new(VerifyBootstrappedCheck::new(&ctx.deployment)),
    ];
    let progress = ConsoleProgress::new();
    run_preflight_checks(&mut checks, &progress)?;

    let jhelper = ctx.get_connected_controller()?;
    let step = RetrieveAdminCredentialsStep::new(jhelper);
    let name = step.name().to_string();
    let results = run_plan(vec![Box::new(step)], &progress, show_hints).await?;

    let creds = results
        .payload(&name)
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("Unable to retrieve openrc from Keystone service"))?;
    print!("{}", format_openrc(creds));
    Ok(())
}
