//! shipyard: compile a cluster document into provisioning files, compose
//! manifests and reverse-proxy configs, and optionally roll them out.
//!
//! # Usage
//!
//! ```text
//! shipyard generate --config cluster.yml
//! shipyard apply --config cluster.yml --destroy-on-failure
//! shipyard destroy
//! shipyard init --org acme --repo shop
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod commands;
mod project;
mod ready;
mod shell;

#[derive(Parser)]
#[command(
    name = "shipyard",
    about = "Shipyard: declarative cluster config compiler",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads the cluster document.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Cluster document.
    #[arg(short, long, default_value = "cluster.yml")]
    pub config: PathBuf,
    /// Output directory (default: `output_dir` from the settings file).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Settings file.
    #[arg(short, long, default_value = shipyard_core::settings::SETTINGS_FILE)]
    pub settings: PathBuf,
    /// Downgrade duplicate proxy routes to a warning.
    #[arg(long)]
    pub allow_override: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every artifact into the output directory.
    ///
    /// Addresses come from the provisioning state when it exists.
    Generate {
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Provision the cluster and deploy the manifests to every server.
    Apply {
        #[command(flatten)]
        project: ProjectArgs,
        /// Tear the cluster down again when any step fails.
        #[arg(long)]
        destroy_on_failure: bool,
    },
    /// Destroy everything the provisioner created.
    Destroy {
        /// Output directory (default: `output_dir` from the settings file).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Settings file.
        #[arg(short, long, default_value = shipyard_core::settings::SETTINGS_FILE)]
        settings: PathBuf,
    },
    /// Write a scaffold settings file.
    Init {
        /// Directory to write shipyard.toml into.
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Default image organization.
        #[arg(long)]
        org: Option<String>,
        /// Default image repository.
        #[arg(long)]
        repo: Option<String>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "shipyard=debug" } else { "shipyard=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .init();

    match cli.command {
        Commands::Generate { project } => commands::generate::generate(&project).await,
        Commands::Apply {
            project,
            destroy_on_failure,
        } => commands::apply::apply(&project, destroy_on_failure).await,
        Commands::Destroy { output, settings } => {
            commands::destroy::destroy(output.as_deref(), &settings).await
        }
        Commands::Init {
            path,
            org,
            repo,
            force,
        } => commands::init::init(&path, org.as_deref(), repo.as_deref(), force),
    }
}
