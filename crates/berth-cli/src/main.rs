//! Berth - artifact deployment CLI
//!
//! Usage:
//!   berth deploy production          # Upload, register, create-or-update
//!   berth environments               # List environments
//!   berth terminate production       # Terminate a running environment
//!   berth version create|delete ...  # Manage registered versions
//!   berth upload ./dist              # Upload an artifact bundle only

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use berth_core::config::{ProjectConfig, load_project_config};
use berth_core::lifecycle::DeployOutcome;
use berth_core::orchestration::Deployer;
use berth_core::provider::RuntimeEnvironment;

#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Artifact deployment orchestrator", long_about = None)]
struct Cli {
    /// Path to berth.toml
    #[arg(long, short, default_value = "berth.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy an artifact to a named environment
    Deploy(DeployArgs),

    /// Terminate a running environment
    Terminate {
        /// Environment name
        name: String,

        /// Skip the confirmation prompt (for CI/CD)
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List environments under the application
    Environments {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Manage registered application versions
    Version(VersionArgs),

    /// Upload an artifact bundle without deploying it
    Upload {
        /// Artifact path (file or directory)
        path: PathBuf,
    },
}

#[derive(Args)]
struct DeployArgs {
    /// Environment name as declared in berth.toml
    name: String,

    /// Artifact path; overrides project.artifact from berth.toml
    #[arg(long, short)]
    artifact: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args)]
struct VersionArgs {
    #[command(subcommand)]
    command: VersionSubcommand,
}

#[derive(Subcommand)]
enum VersionSubcommand {
    /// Upload and register the current artifact as a new version
    Create {
        /// Artifact path; overrides project.artifact from berth.toml
        #[arg(long, short)]
        artifact: Option<PathBuf>,
    },

    /// Delete a registered version and its backing artifact
    Delete {
        /// Version label, e.g. "hello-20240102030405"
        label: String,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "berth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("{} {:#}", style("error:").red().bold(), err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_project_config(&cli.config)?;

    match cli.command {
        Commands::Deploy(args) => run_deploy(config, args).await,
        Commands::Terminate { name, yes } => run_terminate(config, &name, yes).await,
        Commands::Environments { format } => run_environments(config, format).await,
        Commands::Version(args) => run_version(config, args).await,
        Commands::Upload { path } => run_upload(config, &path).await,
    }
}

fn resolve_artifact(config: &ProjectConfig, override_path: Option<PathBuf>) -> Result<PathBuf> {
    override_path
        .or_else(|| config.project.artifact.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("no artifact path: pass --artifact or set project.artifact in berth.toml")
        })
}

async fn run_deploy(config: ProjectConfig, args: DeployArgs) -> Result<()> {
    let artifact = resolve_artifact(&config, args.artifact)?;
    let deployer = Deployer::new(config)?;

    println!(
        "Deploying {} to '{}'",
        style(deployer.version().as_str()).cyan(),
        args.name
    );

    let mut progress = |_attempt: u32| {
        print!(".");
        let _ = std::io::stdout().flush();
    };
    let report = deployer
        .deploy_environment(&args.name, &artifact, &mut progress)
        .await;
    println!();
    let report = report?;

    match args.format {
        OutputFormat::Table => {
            let action = match report.outcome {
                DeployOutcome::Created => "Launched new environment",
                DeployOutcome::Updated => "Updated environment",
            };
            println!(
                "{} '{}' at version {}",
                style(action).green(),
                report.environment,
                report.label
            );
            println!(
                "  artifact {} ({} bytes, blake3 {})",
                report.artifact.key,
                report.artifact.bytes,
                &report.artifact.digest[..16.min(report.artifact.digest.len())]
            );
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "environment": report.environment,
                "label": report.label,
                "outcome": match report.outcome {
                    DeployOutcome::Created => "created",
                    DeployOutcome::Updated => "updated",
                },
                "artifact": {
                    "key": report.artifact.key,
                    "bytes": report.artifact.bytes,
                    "digest": report.artifact.digest,
                },
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

async fn run_terminate(config: ProjectConfig, name: &str, yes: bool) -> Result<()> {
    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Terminate environment '{}'?", name))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Termination cancelled.");
            return Ok(());
        }
    }

    let deployer = Deployer::new(config)?;
    if deployer.terminate_environment(name).await? {
        println!("{} termination of '{}'", style("Requested").green(), name);
    } else {
        println!("No running environment named '{}'", name);
    }
    Ok(())
}

async fn run_environments(config: ProjectConfig, format: OutputFormat) -> Result<()> {
    let deployer = Deployer::new(config)?;
    let environments = deployer.describe_environments().await?;

    match format {
        OutputFormat::Table => print_environment_table(&environments),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&environments)?),
    }
    Ok(())
}

async fn run_version(config: ProjectConfig, args: VersionArgs) -> Result<()> {
    match args.command {
        VersionSubcommand::Create { artifact } => {
            let artifact = resolve_artifact(&config, artifact)?;
            let deployer = Deployer::new(config)?;
            let upload = deployer.upload_artifact(&artifact).await?;
            let label = deployer.create_version().await?;
            println!(
                "{} version {} ({})",
                style("Registered").green(),
                label,
                upload.key
            );
        }
        VersionSubcommand::Delete { label } => {
            let deployer = Deployer::new(config)?;
            deployer.delete_version(&label).await?;
            println!("{} version {}", style("Deleted").green(), label);
        }
    }
    Ok(())
}

async fn run_upload(config: ProjectConfig, path: &std::path::Path) -> Result<()> {
    let deployer = Deployer::new(config)?;
    let upload = deployer.upload_artifact(path).await?;
    println!(
        "{} {} ({} bytes, blake3 {})",
        style("Uploaded").green(),
        upload.key,
        upload.bytes,
        upload.digest
    );
    Ok(())
}

fn print_environment_table(environments: &[RuntimeEnvironment]) {
    if environments.is_empty() {
        println!("No environments found.");
        return;
    }

    println!(
        "{:<20} {:<14} {:<12} {:<28} Cname",
        "Name", "Id", "Status", "Version"
    );
    println!("{}", "-".repeat(90));

    for env in environments {
        println!(
            "{:<20} {:<14} {:<12} {:<28} {}",
            truncate(&env.name, 20),
            truncate(&env.environment_id, 14),
            env.status.to_string(),
            env.version_label.as_deref().unwrap_or("-"),
            env.cname.as_deref().unwrap_or("-"),
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}
