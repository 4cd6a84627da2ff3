use crate::checks::LocalShareCheck;
use crate::commands::Format;
use anyhow::Context;
use colored::Colorize;
use serde_json::Value;
use std::path::Path;
use sunbeam_config::{Deployment, DeploymentsConfig, deployments_path, store_deployment_as_yaml};
use sunbeam_core::{ConsoleProgress, PreflightCheck, run_preflight_checks};

fn load_registry(share_dir: &Path) -> anyhow::Result<DeploymentsConfig> {
    let mut checks: Vec<Box<dyn PreflightCheck>> =
        vec![Box::new(LocalShareCheck::new(share_dir.to_path_buf()))];
    run_preflight_checks(&mut checks, &ConsoleProgress::new())?;

    let path = deployments_path(share_dir)?;
    Ok(DeploymentsConfig::load(&path)?)
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub async fn list(share_dir: &Path, format: Format) -> anyhow::Result<()> {
    let registry = load_registry(share_dir)?;
    let listing = registry.list();

    match format {
        Format::Yaml => print!("{}", serde_yaml::to_string(&listing)?),
        Format::Table => {
            println!(
                "{}",
                format!("{:<20} {:<40} {:<8}", "DEPLOYMENT", "ENDPOINT", "TYPE").bold()
            );
            println!("{}", "─".repeat(70).dimmed());
            for deployment in &listing.deployments {
                let is_active = listing.active.as_deref() == Some(deployment.name.as_str());
                let name = if is_active {
                    format!("{:<20}", format!("{}*", deployment.name)).green()
                } else {
                    format!("{:<20}", deployment.name).normal()
                };
                println!(
                    "{} {:<40} {:<8}",
                    name,
                    deployment.url,
                    deployment.deployment_type.to_string()
                );
            }
        }
    }
    Ok(())
}

pub async fn show(share_dir: &Path, name: &str, format: Format) -> anyhow::Result<()> {
    let registry = load_registry(share_dir)?;
    let deployment = registry.get_deployment(name)?;

    match format {
        Format::Yaml => print!("{}", serde_yaml::to_string(deployment)?),
        Format::Table => {
            if let Value::Object(fields) = serde_json::to_value(deployment)? {
                for (key, value) in fields {
                    let value = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    println!("{} {}", format!("{:<20}", capitalize(&key)).bold(), value);
                }
            }
        }
    }
    Ok(())
}

pub async fn switch(share_dir: &Path, name: &str) -> anyhow::Result<()> {
    let mut registry = load_registry(share_dir)?;
    registry.switch(name)?;
    println!("Deployment switched to {}.", name);
    Ok(())
}

pub async fn import(share_dir: &Path, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read deployment file {}", file.display()))?;
    let deployment: Deployment = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid deployment file {}", file.display()))?;

    let path = deployments_path(share_dir)?;
    let mut registry = DeploymentsConfig::load(&path)?;
    let name = deployment.name.clone();
    registry.add_deployment(deployment)?;
    tracing::info!("Imported deployment {} from {}", name, file.display());
    println!("Deployment '{}' imported.", name);
    Ok(())
}

pub async fn export(share_dir: &Path, name: &str) -> anyhow::Result<()> {
    let registry = load_registry(share_dir)?;
    let deployment = registry.get_deployment(name)?;
    let stored = store_deployment_as_yaml(share_dir, deployment)?;
    println!("Deployment exported to '{}'", stored.display());
    Ok(())
}
