use crate::checks::{DaemonGroupCheck, VerifyBootstrappedCheck};
use crate::context::DeploymentContext;
use crate::features::{self, observability};
use anyhow::bail;
use sunbeam_core::{ConsoleProgress, PreflightCheck, run_preflight_checks};

/// Print the URL of the Grafana dashboard
pub async fn dashboard_url(ctx: &DeploymentContext) -> anyhow::Result<()> {
    let mut checks: Vec<Box<dyn PreflightCheck>> = vec![
        Box::new(DaemonGroupCheck::new()),
        Box::new(VerifyBootstrappedCheck::new(&ctx.deployment)),
    ];
    run_preflight_checks(&mut checks, &ConsoleProgress::new())?;

    if !features::is_enabled(&ctx.get_client(), "observability").await? {
        bail!("Observability is not enabled. Run `sunbeam enable observability` first.");
    }

    let jhelper = ctx.get_connected_controller()?;
    let url = observability::dashboard_url(&jhelper).await?;
    println!("{}", url);
    Ok(())
}
