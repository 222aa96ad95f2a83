//! Configuration module for blobferry.
//!
//! Provides the typed job configuration that maps to the YAML configuration
//! file, with loading, validation, defaults, and a builder pattern for
//! programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::planner::SizeComparison;
use crate::ports::destination_store::TransferOptions;

// ---------------------------------------------------------------------------
// JobConfig and sub-sections
// ---------------------------------------------------------------------------

/// Configuration of one replication job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Opaque reference the caller resolves into a source store.
    pub source_connection_ref: String,
    /// Opaque reference the caller resolves into a destination store.
    pub destination_connection_ref: String,
    /// Container (or bucket) holding the source objects.
    pub source_container: String,
    /// Bucket the objects are written to.
    pub destination_bucket: String,
    /// Prepended verbatim to every manifest key suffix.
    pub destination_key_prefix: String,
    pub overwrite_existing: bool,
    pub server_side_encrypt: bool,
    pub compress_before_upload: bool,
    /// Canned ACL applied to written objects.
    pub destination_acl: Option<String>,
    /// Which local size is compared with the destination size.
    pub size_comparison: SizeComparison,
    /// What to do when two manifest entries map to the same key.
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Maximum number of entries processed at once (1 = sequential).
    pub concurrency: usize,
    /// Parse the whole manifest before touching either store.
    pub validate_manifest_first: bool,
    /// Fetch and plan every entry but never write.
    pub dry_run: bool,
    /// Parent directory for staging areas; the OS temp dir when unset.
    pub staging_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
}

/// Policy for manifest entries sharing a destination key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Fail the job at the second occurrence.
    #[default]
    Reject,
    /// Process every occurrence in manifest order; the last write wins.
    Overwrite,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl JobConfig {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: JobConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`JobConfig::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/blobferry/job.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("blobferry")
            .join("job.yaml")
    }

    /// The pass-through flags forwarded to every put.
    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            overwrite_existing: self.overwrite_existing,
            server_side_encrypt: self.server_side_encrypt,
            canonical_acl: self.destination_acl.clone(),
            compress_before_upload: self.compress_before_upload,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            source_connection_ref: String::new(),
            destination_connection_ref: String::new(),
            source_container: String::new(),
            destination_bucket: String::new(),
            destination_key_prefix: String::new(),
            overwrite_existing: false,
            server_side_encrypt: false,
            compress_before_upload: false,
            destination_acl: None,
            size_comparison: SizeComparison::default(),
            duplicate_keys: DuplicateKeyPolicy::default(),
            concurrency: 1,
            validate_manifest_first: false,
            dry_run: false,
            staging_dir: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"logging.level"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

/// Upper bound for `concurrency`.
pub const MAX_CONCURRENCY: usize = 64;

impl JobConfig {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- stores ---
        if self.source_container.trim().is_empty() {
            errors.push(ValidationError {
                field: "source_container".into(),
                message: "must not be empty".into(),
            });
        }
        if self.destination_bucket.trim().is_empty() {
            errors.push(ValidationError {
                field: "destination_bucket".into(),
                message: "must not be empty".into(),
            });
        }
        if let Some(acl) = &self.destination_acl {
            if acl.trim().is_empty() {
                errors.push(ValidationError {
                    field: "destination_acl".into(),
                    message: "must not be empty when set".into(),
                });
            }
        }

        // --- execution ---
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            errors.push(ValidationError {
                field: "concurrency".into(),
                message: format!("must be in range 1..={MAX_CONCURRENCY}"),
            });
        }
        if self.duplicate_keys == DuplicateKeyPolicy::Overwrite && self.concurrency > 1 {
            errors.push(ValidationError {
                field: "duplicate_keys".into(),
                message: format!(
                    "'overwrite' requires concurrency 1 (got {})",
                    self.concurrency
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// JobConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`JobConfig`] programmatically.
///
/// Starts from [`JobConfig::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use blobferry_core::config::JobConfigBuilder;
///
/// let config = JobConfigBuilder::new()
///     .source_container("raw-exports")
///     .destination_bucket("landing")
///     .destination_key_prefix("2024/")
///     .concurrency(4)
///     .build_validated()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    /// Create a new builder initialised with [`JobConfig::default`] values.
    pub fn new() -> Self {
        Self {
            config: JobConfig::default(),
        }
    }

    // --- stores ---

    pub fn source_connection_ref(mut self, reference: impl Into<String>) -> Self {
        self.config.source_connection_ref = reference.into();
        self
    }

    pub fn destination_connection_ref(mut self, reference: impl Into<String>) -> Self {
        self.config.destination_connection_ref = reference.into();
        self
    }

    pub fn source_container(mut self, container: impl Into<String>) -> Self {
        self.config.source_container = container.into();
        self
    }

    pub fn destination_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.destination_bucket = bucket.into();
        self
    }

    pub fn destination_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.destination_key_prefix = prefix.into();
        self
    }

    // --- transfer options ---

    pub fn overwrite_existing(mut self, overwrite: bool) -> Self {
        self.config.overwrite_existing = overwrite;
        self
    }

    pub fn server_side_encrypt(mut self, encrypt: bool) -> Self {
        self.config.server_side_encrypt = encrypt;
        self
    }

    pub fn compress_before_upload(mut self, compress: bool) -> Self {
        self.config.compress_before_upload = compress;
        self
    }

    pub fn destination_acl(mut self, acl: impl Into<String>) -> Self {
        self.config.destination_acl = Some(acl.into());
        self
    }

    // --- execution ---

    pub fn size_comparison(mut self, comparison: SizeComparison) -> Self {
        self.config.size_comparison = comparison;
        self
    }

    pub fn duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.config.duplicate_keys = policy;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn validate_manifest_first(mut self, eager: bool) -> Self {
        self.config.validate_manifest_first = eager;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn staging_dir(mut self, dir: PathBuf) -> Self {
        self.config.staging_dir = Some(dir);
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`JobConfig`].
    pub fn build(self) -> JobConfig {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<JobConfig, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for JobConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
