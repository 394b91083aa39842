// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand, ValueEnum};
use humantime_serde::re::humantime;
use rollwright::output::OutputMode;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rollwright")]
#[command(about = "Build, publish and roll out workloads to Kubernetes with automatic rollback")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Normal)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Normal,
    Quiet,
    Json,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Normal => OutputMode::Normal,
            OutputFormat::Quiet => OutputMode::Quiet,
            OutputFormat::Json => OutputMode::Json,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new rollwright.yml configuration file
    Init {
        /// Project name
        #[arg(long)]
        project: Option<String>,

        /// Image repository to publish to
        #[arg(long)]
        repository: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Check manifests without touching the cluster
    Validate {
        /// Manifest files (defaults to those listed in the configuration)
        manifests: Vec<PathBuf>,

        /// Print the Kubernetes objects each manifest renders to
        #[arg(long)]
        render: bool,
    },

    /// Build, publish and roll out every configured manifest
    Deploy {
        /// Target destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,

        /// Deploy the configured image without building or publishing it
        #[arg(long)]
        skip_build: bool,

        /// Per-workload rollout timeout, e.g. "90s" or "5m"
        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,

        /// Leave failed rollouts in place instead of rolling back
        #[arg(long)]
        no_rollback: bool,

        /// Simulate the rollout against an in-memory cluster
        #[arg(long)]
        dry_run: bool,
    },

    /// Roll a workload back to its previous successful spec
    Rollback {
        workload: String,

        /// Target destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,

        /// How long to wait for the previous spec to become ready
        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,
    },

    /// Show rollout history and live status of a workload
    Status {
        workload: String,

        /// Target destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,

        /// Also query the cluster for current readiness
        #[arg(long)]
        live: bool,
    },
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let duration = humantime::parse_duration(s).map_err(|e| e.to_string())?;
    if duration.is_zero() {
        return Err("duration must be positive".to_string());
    }
    Ok(duration)
}
