mod checks;
mod commands;
mod context;
mod features;
mod steps;
#[cfg(test)]
mod testing;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::Format;
use context::DeploymentContext;
use features::Feature;
use features::caas::CaasFeature;
use features::instance_recovery::{InstanceRecovery, InstanceRecoveryFeature};
use features::observability::ObservabilityFeature;
use features::orchestration::OrchestrationFeature;
use features::secrets::SecretsFeature;
use features::tls::{Endpoint, TlsCaFeature, TlsSelfSignedFeature};
use std::path::PathBuf;
use std::sync::Arc;
use sunbeam_config::Settings;
use sunbeam_core::PlanError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sunbeam")]
#[command(about = "Deploy and operate OpenStack with Juju and Terraform", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Display hints for failed steps
    #[arg(long, global = true, env = "SUNBEAM_SHOW_HINTS")]
    show_hints: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage deployments
    Deployment {
        #[command(subcommand)]
        command: DeploymentCommands,
    },
    /// Enable a feature
    Enable {
        #[command(subcommand)]
        feature: EnableCommands,
    },
    /// Disable a feature
    Disable {
        #[command(subcommand)]
        feature: DisableCommands,
    },
    /// Inspect features
    Feature {
        #[command(subcommand)]
        command: FeatureCommands,
    },
    /// Configure the cloud for an enabled feature
    Configure {
        #[command(subcommand)]
        command: ConfigureCommands,
    },
    /// Print admin credentials as an openrc file
    Openrc,
    /// Observability helpers
    Observability {
        #[command(subcommand)]
        command: ObservabilityCommands,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum DeploymentCommands {
    /// List deployments
    List {
        #[arg(short, long, value_enum, default_value = "table")]
        format: Format,
    },
    /// Show a deployment
    Show {
        name: String,
        #[arg(short, long, value_enum, default_value = "table")]
        format: Format,
    },
    /// Make a deployment the active one
    Switch { name: String },
    /// Import a deployment from a YAML file
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Export a deployment to <share dir>/<name>.yaml
    Export { name: String },
}

#[derive(Subcommand)]
enum EnableCommands {
    /// Observability stack and Grafana agent
    Observability,
    /// Instance recovery with Masakari and Consul
    InstanceRecovery,
    /// OpenStack Secrets service (Barbican)
    Secrets,
    /// OpenStack Orchestration service (Heat)
    Orchestration,
    /// Container as a Service (Magnum)
    Caas,
    /// TLS for OpenStack endpoints
    Tls {
        #[command(subcommand)]
        provider: EnableTlsCommands,
    },
}

#[derive(Subcommand)]
enum EnableTlsCommands {
    /// Certificates signed by a third party CA
    Ca {
        /// Base64 encoded CA certificate
        #[arg(long)]
        ca: String,
        /// Base64 encoded CA chain
        #[arg(long, default_value = "")]
        ca_chain: String,
        /// Endpoints served over TLS
        #[arg(long, value_enum, value_delimiter = ',', default_value = "public")]
        endpoints: Vec<Endpoint>,
    },
    /// Self-signed certificates
    SelfSigned {
        /// Endpoints served over TLS
        #[arg(long, value_enum, value_delimiter = ',', default_value = "public")]
        endpoints: Vec<Endpoint>,
        /// Charm channel of the tls operator
        #[arg(long)]
        channel: Option<String>,
    },
}

#[derive(Subcommand)]
enum DisableCommands {
    /// Observability stack and Grafana agent
    Observability,
    /// Instance recovery with Masakari and Consul
    InstanceRecovery,
    /// OpenStack Secrets service (Barbican)
    Secrets,
    /// OpenStack Orchestration service (Heat)
    Orchestration,
    /// Container as a Service (Magnum)
    Caas,
    /// TLS for OpenStack endpoints
    Tls {
        #[command(subcommand)]
        provider: DisableTlsCommands,
    },
}

#[derive(Subcommand)]
enum DisableTlsCommands {
    /// Certificates signed by a third party CA
    Ca,
    /// Self-signed certificates
    SelfSigned,
}

#[derive(Subcommand)]
enum FeatureCommands {
    /// List features and whether they are enabled
    List,
}

#[derive(Subcommand)]
enum ConfigureCommands {
    /// Prepare the cloud for Container as a Service use
    Caas,
}

#[derive(Subcommand)]
enum ObservabilityCommands {
    /// Print the Grafana dashboard URL
    DashboardUrl,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn load_context() -> anyhow::Result<DeploymentContext> {
    let settings = Settings::load()?;
    DeploymentContext::load(settings, sunbeam_config::share_dir()?)
}

fn enable_feature(command: EnableCommands, ctx: &DeploymentContext) -> Box<dyn Feature> {
    match command {
        EnableCommands::Observability => Box::new(ObservabilityFeature),
        EnableCommands::InstanceRecovery => Box::new(InstanceRecovery(Arc::new(
            InstanceRecoveryFeature::new(ctx.settings.feature_timeout()),
        ))),
        EnableCommands::Secrets => Box::new(SecretsFeature::new(ctx.settings.feature_timeout())),
        EnableCommands::Orchestration => {
            Box::new(OrchestrationFeature::new(ctx.settings.feature_timeout()))
        }
        EnableCommands::Caas => Box::new(CaasFeature::new(ctx.settings.feature_timeout())),
        EnableCommands::Tls {
            provider:
                EnableTlsCommands::Ca {
                    ca,
                    ca_chain,
                    endpoints,
                },
        } => Box::new(TlsCaFeature::new(ca, ca_chain, endpoints)),
        EnableCommands::Tls {
            provider: EnableTlsCommands::SelfSigned { endpoints, channel },
        } => Box::new(TlsSelfSignedFeature::new(endpoints).with_channel(channel)),
    }
}

fn disable_feature(command: DisableCommands, ctx: &DeploymentContext) -> Box<dyn Feature> {
    match command {
        DisableCommands::Observability => Box::new(ObservabilityFeature),
        DisableCommands::InstanceRecovery => Box::new(InstanceRecovery(Arc::new(
            InstanceRecoveryFeature::new(ctx.settings.feature_timeout()),
        ))),
        DisableCommands::Secrets => Box::new(SecretsFeature::new(ctx.settings.feature_timeout())),
        DisableCommands::Orchestration => {
            Box::new(OrchestrationFeature::new(ctx.settings.feature_timeout()))
        }
        DisableCommands::Caas => Box::new(CaasFeature::new(ctx.settings.feature_timeout())),
        DisableCommands::Tls {
            provider: DisableTlsCommands::Ca,
        } => Box::new(TlsCaFeature::new(String::new(), String::new(), Vec::new())),
        DisableCommands::Tls {
            provider: DisableTlsCommands::SelfSigned,
        } => Box::new(TlsSelfSignedFeature::new(Vec::new())),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Version => {
            println!("sunbeam {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Deployment { command } => {
            let share_dir = sunbeam_config::share_dir()?;
            match command {
                DeploymentCommands::List { format } => {
                    commands::deployment::list(&share_dir, format).await?
                }
                DeploymentCommands::Show { name, format } => {
                    commands::deployment::show(&share_dir, &name, format).await?
                }
                DeploymentCommands::Switch { name } => {
                    commands::deployment::switch(&share_dir, &name).await?
                }
                DeploymentCommands::Import { file } => {
                    commands::deployment::import(&share_dir, &file).await?
                }
                DeploymentCommands::Export { name } => {
                    commands::deployment::export(&share_dir, &name).await?
                }
            }
        }
        Commands::Enable { feature } => {
            let ctx = load_context()?;
            let feature = enable_feature(feature, &ctx);
            commands::feature::enable(feature.as_ref(), &ctx, cli.show_hints).await?;
        }
        Commands::Disable { feature } => {
            let ctx = load_context()?;
            let feature = disable_feature(feature, &ctx);
            commands::feature::disable(feature.as_ref(), &ctx, cli.show_hints).await?;
        }
        Commands::Feature {
            command: FeatureCommands::List,
        } => {
            let ctx = load_context()?;
            commands::feature::list(&ctx).await?;
        }
        Commands::Configure {
            command: ConfigureCommands::Caas,
        } => {
            let ctx = load_context()?;
            commands::configure::caas(&ctx, cli.show_hints).await?;
        }
        Commands::Openrc => {
            let ctx = load_context()?;
            commands::openrc::handle(&ctx, cli.show_hints).await?;
        }
        Commands::Observability {
            command: ObservabilityCommands::DashboardUrl,
        } => {
            let ctx = load_context()?;
            commands::observability::dashboard_url(&ctx).await?;
        }
    }
    Ok(())
}

/// Line to print for a failed command. Plan failures were already reported
/// by the step progress output.
fn error_report(err: &anyhow::Error) -> Option<String> {
    if err.downcast_ref::<PlanError>().is_some() {
        return None;
    }
    Some(format!("{} {}", "Error:".red().bold(), err))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        if let Some(report) = error_report(&e) {
            eprintln!("{}", report);
        }
        std::process::exit(1);
    }
}
