use crate::checks::{DaemonGroupCheck, VerifyBootstrappedCheck};
use crate::context::DeploymentContext;
use crate::features::{self, FEATURES, Feature};
use colored::Colorize;
use sunbeam_core::{ConsoleProgress, PreflightCheck, run_preflight_checks};

fn preflight(ctx: &DeploymentContext) -> anyhow::Result<()> {
    let mut checks: Vec<Box<dyn PreflightCheck>> = vec![
        Box::new(DaemonGroupCheck::new()),
        Box::new(VerifyBootstrappedCheck::new(&ctx.deployment)),
    ];
    run_preflight_checks(&mut checks, &ConsoleProgress::new())?;
    Ok(())
}

pub async fn list(ctx: &DeploymentContext) -> anyhow::Result<()> {
    let enabled = features::enabled_features(&ctx.get_client()).await?;

    println!(
        "{}",
        format!("{:<20} {:<8} {}", "FEATURE", "ENABLED", "DESCRIPTION").bold()
    );
    println!("{}", "─".repeat(72).dimmed());
    for (name, description) in FEATURES {
        let status = if enabled.get(*name).copied().unwrap_or(false) {
            format!("{:<8}", "yes").green()
        } else {
            format!("{:<8}", "no").dimmed()
        };
        println!("{:<20} {} {}", name, status, description);
    }
    Ok(())
}

pub async fn enable(
    feature: &dyn Feature,
    ctx: &DeploymentContext,
    show_hints: bool,
) -> anyhow::Result<()> {
    preflight(ctx)?;
    let progress = ConsoleProgress::new();
    let result = features::enable(feature, ctx, &progress, show_hints).await;
    progress.print_summary(&format!("enable {}", feature.name()));
    result
}

pub async fn disable(
    feature: &dyn Feature,
    ctx: &DeploymentContext,
    show_hints: bool,
) -> anyhow::Result<()> {
    preflight(ctx)?;
    let progress = ConsoleProgress::new();
    let result = features::disable(feature, ctx, &progress, show_hints).await;
    progress.print_summary(&format!("disable {}", feature.name()));
    result
}
