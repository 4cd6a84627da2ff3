use crate::checks::{DaemonGroupCheck, VerifyBootstrappedCheck};
use crate::context::DeploymentContext;
use crate::features::{self, caas};
use crate::steps::keystone::RetrieveAdminCredentialsStep;
use anyhow::{anyhow, bail};
use serde_json::Value;
use sunbeam_core::{ConsoleProgress, PreflightCheck, Step, run_plan, run_preflight_checks};

/// Prepare the cloud for Container as a Service use
pub async fn caas(ctx: &DeploymentContext, show_hints: bool) -> anyhow::Result<()> {
    let mut checks: Vec<Box<dyn PreflightCheck>> = vec![
        Box::new(DaemonGroupCheck::new()),
        Box::new(VerifyBootstrappedCheck::new(&ctx.deployment)),
    ];
    let progress = ConsoleProgress::new();
    run_preflight_checks(&mut checks, &progress)?;

    if !features::is_enabled(&ctx.get_client(), "caas").await? {
        bail!("Container as a Service is not enabled. Run `sunbeam enable caas` first.");
    }

    let jhelper = ctx.get_connected_controller()?;
    let step = RetrieveAdminCredentialsStep::new(jhelper);
    let name = step.name().to_string();
    let results = run_plan(vec![Box::new(step)], &progress, show_hints).await?;
    let creds = results
        .payload(&name)
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("Unable to retrieve openrc from Keystone service"))?;

    let tfhelper = ctx.get_tfhelper_with_env(caas::CONFIGURE_PLAN, caas::admin_env(creds))?;
    let result = run_plan(caas::configure_plan(tfhelper), &progress, show_hints).await;
    progress.print_summary("configure caas");
    result?;
    Ok(())
}
