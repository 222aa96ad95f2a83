//! Run command - replicate the objects listed in a manifest
//!
//! Provides the `blobferry run` CLI command which:
//! 1. Loads the job configuration and applies command-line overrides
//! 2. Resolves the source and destination connection references
//! 3. Runs the replication job, cancelling it on Ctrl+C or SIGTERM
//! 4. Prints the report and exits non-zero unless the job completed

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use blobferry_core::config::JobConfig;
use blobferry_core::domain::JobStatus;
use blobferry_core::manifest::ManifestReader;
use blobferry_sync::ReplicationJob;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::connection::{open_destination, open_source};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Manifest file (`<source>,<key-suffix>,<size>` per line)
    #[arg(long, short)]
    pub manifest: PathBuf,

    /// Process up to N entries at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Fetch and plan every entry without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Override the destination key prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Parse the whole manifest before any transfer
    #[arg(long)]
    pub validate_first: bool,
}

impl RunCommand {
    /// Folds the command-line overrides into `config`
    pub fn apply_overrides(&self, config: &mut JobConfig) {
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if let Some(prefix) = &self.prefix {
            config.destination_key_prefix = prefix.clone();
        }
        if self.validate_first {
            config.validate_manifest_first = true;
        }
    }

    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        // Step 1: Load config and apply overrides
        let mut config = JobConfig::load(config_path)
            .with_context(|| format!("Failed to load job config {}", config_path.display()))?;
        self.apply_overrides(&mut config);

        let errors = config.validate();
        if !errors.is_empty() {
            for e in &errors {
                formatter.error(&e.to_string());
            }
            bail!("job configuration has {} error(s)", errors.len());
        }

        info!(
            config_path = %config_path.display(),
            manifest = %self.manifest.display(),
            concurrency = config.concurrency,
            dry_run = config.dry_run,
            "Loaded job configuration"
        );

        // Step 2: Resolve stores
        let source = open_source(&config.source_connection_ref)
            .context("Failed to resolve source connection")?;
        let destination = open_destination(&config.destination_connection_ref)
            .await
            .context("Failed to resolve destination connection")?;

        // Step 3: Open manifest
        let manifest = ManifestReader::open(&self.manifest)
            .await
            .with_context(|| format!("Failed to open manifest {}", self.manifest.display()))?;

        if config.dry_run {
            formatter.info("Dry run mode - no objects will be written");
        }

        // Step 4: Run with signal-driven cancellation
        let job = ReplicationJob::new(config, source, destination);
        let cancel = CancellationToken::new();
        let signal_task = tokio::spawn(shutdown_signal(cancel.clone()));

        let report = job
            .run(manifest, cancel)
            .await
            .context("Failed to create staging area")?;
        signal_task.abort();

        // Step 5: Report
        formatter.report(&report);

        match report.status() {
            JobStatus::Completed => Ok(()),
            status => bail!("job {} {}", report.job_id(), status),
        }
    }
}

/// Cancels `token` on Ctrl+C or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), cancelling job");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling job");
        }
    }

    token.cancel();
}
