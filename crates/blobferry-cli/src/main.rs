//! blobferry CLI - manifest-driven object replication
//!
//! Provides commands for:
//! - Running a replication job from a manifest
//! - Checking a manifest without touching any store
//! - Viewing and validating the job configuration

use std::path::PathBuf;

use anyhow::Result;
use blobferry_core::config::{JobConfig, LoggingConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod connection;
mod output;

use commands::{check_manifest::CheckManifestCommand, config::ConfigCommand, run::RunCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "blobferry",
    version,
    about = "Replicate objects between stores from a manifest"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate job config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replicate the objects listed in a manifest
    Run(RunCommand),
    /// Parse a manifest and report its entry count or first error
    CheckManifest(CheckManifestCommand),
    /// View and validate the job configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Filter directive for `-v` count, falling back to the configured level
fn log_filter(verbose: u8, logging: &LoggingConfig) -> String {
    match verbose {
        0 => logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn init_tracing(verbose: u8, logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(verbose, logging)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(JobConfig::default_path);
    let logging = JobConfig::load_or_default(&config_path).logging;
    init_tracing(cli.verbose, &logging);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Run(cmd) => cmd.execute(&config_path, format).await,
        Commands::CheckManifest(cmd) => cmd.execute(format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
    }
}
