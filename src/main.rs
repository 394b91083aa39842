// ABOUTME: Entry point for the rollwright CLI application.
// ABOUTME: Parses arguments, installs logging, and maps errors to exit codes.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{DeployOptions, StatusOptions};
use rollwright::config::{self, Config};
use rollwright::error::Result;
use rollwright::output::{Output, OutputMode};
use std::env;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // --verbose wins; otherwise RUST_LOG, falling back to warnings only
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode: OutputMode = cli.output.into();

    match run(cli, mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Output::new(mode).error(&e.to_string());
            ExitCode::from(e.exit_code())
        }
    }
}

/// Load config from the working directory, applying destination overrides.
fn load_config(destination: Option<&str>) -> Result<Config> {
    let cwd = env::current_dir()?;
    let config = Config::discover(&cwd)?;
    match destination {
        Some(dest) => config.for_destination(dest),
        None => Ok(config),
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let output = Output::new(mode);

    match cli.command {
        Commands::Init {
            project,
            repository,
            force,
        } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, project.as_deref(), repository.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Validate { manifests, render } => {
            commands::validate(&manifests, render, &output)
        }
        Commands::Deploy {
            destination,
            skip_build,
            timeout,
            no_rollback,
            dry_run,
        } => {
            let config = load_config(destination.as_deref())?;
            let options = DeployOptions {
                destination,
                skip_build,
                timeout,
                no_rollback,
                dry_run,
            };
            commands::deploy(config, options, output).await
        }
        Commands::Rollback {
            workload,
            destination,
            timeout,
        } => {
            let config = load_config(destination.as_deref())?;
            commands::rollback(config, &workload, destination.as_deref(), timeout, output).await
        }
        Commands::Status {
            workload,
            destination,
            live,
        } => {
            let config = load_config(destination.as_deref())?;
            let options = StatusOptions { destination, live };
            commands::status(config, &workload, options, &output).await
        }
    }
}
