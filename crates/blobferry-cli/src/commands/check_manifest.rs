//! Check-manifest command - parse a manifest without touching any store
//!
//! Reads every line, reports the entry count on success or the first
//! malformed line on failure.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use blobferry_core::domain::ManifestRecord;
use blobferry_core::manifest::ManifestReader;
use clap::Args;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct CheckManifestCommand {
    /// Manifest file to check
    pub manifest: PathBuf,
}

impl CheckManifestCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let reader = ManifestReader::open(&self.manifest)
            .await
            .with_context(|| format!("Failed to open manifest {}", self.manifest.display()))?;

        match reader.read_all().await {
            Ok(records) => {
                let total_bytes = total_bytes(&records);
                info!(entries = records.len(), total_bytes, "Manifest is valid");

                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": true,
                        "manifest": self.manifest.display().to_string(),
                        "entries": records.len(),
                        "total_bytes": total_bytes,
                    }));
                } else {
                    formatter.success(&format!(
                        "{}: {} entries, {} bytes",
                        self.manifest.display(),
                        records.len(),
                        total_bytes
                    ));
                }
                Ok(())
            }
            Err(e) => {
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "manifest": self.manifest.display().to_string(),
                        "kind": e.kind(),
                        "line": e.line(),
                        "error": e.to_string(),
                    }));
                } else {
                    formatter.error(&e.to_string());
                }
                bail!("manifest {} is invalid", self.manifest.display())
            }
        }
    }
}

/// Sum of the expected sizes, saturating at `u64::MAX`
fn total_bytes(records: &[ManifestRecord]) -> u64 {
    records
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.entry.expected_size_bytes()))
}
