//! Config command - view and validate the job configuration
//!
//! Provides the `blobferry config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports every error

use std::path::Path;

use anyhow::{bail, Context, Result};
use blobferry_core::config::JobConfig;
use clap::Subcommand;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
        }
    }
}

/// Shows the configuration, falling back to defaults when the file is missing
fn execute_show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config = JobConfig::load_or_default(config_path);

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let config = match JobConfig::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            let message = format!("Cannot load {}: {e:#}", config_path.display());
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                formatter.error(&message);
            }
            bail!("configuration is invalid");
        }
    };

    let errors = config.validate();
    if format.is_json() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        formatter.success(&format!("{} is valid", config_path.display()));
    } else {
        for e in &errors {
            formatter.error(&e.to_string());
        }
    }

    if !errors.is_empty() {
        bail!("configuration has {} error(s)", errors.len());
    }
    Ok(())
}
