//! Domain error types
//!
//! [`DomainError`] covers validation failures and invalid state transitions
//! of domain values. [`ReplicationError`] is the job-level failure taxonomy:
//! every variant is fatal to the job that raised it and carries enough
//! context (manifest line, source identifier, destination key) for the
//! caller to decide on its own retry policy.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A destination key suffix was empty
    #[error("Destination key suffix must not be empty")]
    EmptyKeySuffix,

    /// A source identifier was empty
    #[error("Source identifier must not be empty")]
    EmptySourceIdentifier,

    /// A destination URI component was invalid
    #[error("Invalid destination URI: {0}")]
    InvalidUri(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// Failure that terminates a replication job
///
/// Transferred objects are never rolled back when one of these is raised;
/// the report that carries it also carries the URIs written so far.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    /// A manifest line did not have the expected shape
    #[error("Malformed manifest line {line}: {reason} (content: {content:?})")]
    MalformedManifest {
        /// 1-based line number in the manifest
        line: usize,
        /// Raw line content, trailing newline stripped
        content: String,
        /// What was wrong with the line
        reason: String,
    },

    /// The manifest source itself could not be read
    #[error("Failed to read manifest at line {line}: {message}")]
    ManifestIo {
        /// 1-based line number that was being read
        line: usize,
        /// Underlying I/O error
        message: String,
    },

    /// The source object could not be read
    #[error("Failed to fetch '{source_identifier}' (manifest line {line}): {message}")]
    Fetch {
        line: usize,
        source_identifier: String,
        message: String,
    },

    /// The local staging resource could not be created or written
    #[error("Failed to stage '{source_identifier}' (manifest line {line}): {message}")]
    Staging {
        line: usize,
        source_identifier: String,
        message: String,
    },

    /// The destination lookup for an object failed
    #[error("Failed to stat destination '{destination_key}' (manifest line {line}): {message}")]
    Stat {
        line: usize,
        destination_key: String,
        message: String,
    },

    /// The destination rejected the write
    #[error(
        "Failed to put '{source_identifier}' to '{destination_key}' (manifest line {line}): {message}"
    )]
    Put {
        line: usize,
        source_identifier: String,
        destination_key: String,
        message: String,
    },

    /// Two manifest lines map to the same destination key
    #[error(
        "Destination key '{destination_key}' on manifest line {line} was already used on line {first_line}"
    )]
    DuplicateDestinationKey {
        line: usize,
        first_line: usize,
        destination_key: String,
    },

    /// A worker task ended without reporting an outcome
    #[error("Transfer task aborted: {0}")]
    TaskAborted(String),
}

impl ReplicationError {
    /// Short, stable name of the error kind (used in reports and logs)
    pub fn kind(&self) -> &'static str {
        match self {
            ReplicationError::MalformedManifest { .. } => "malformed_manifest",
            ReplicationError::ManifestIo { .. } => "manifest_io",
            ReplicationError::Fetch { .. } => "fetch",
            ReplicationError::Staging { .. } => "staging",
            ReplicationError::Stat { .. } => "stat",
            ReplicationError::Put { .. } => "put",
            ReplicationError::DuplicateDestinationKey { .. } => "duplicate_destination_key",
            ReplicationError::TaskAborted(_) => "task_aborted",
        }
    }

    /// Manifest line the error refers to, if any
    pub fn line(&self) -> Option<usize> {
        match self {
            ReplicationError::MalformedManifest { line, .. }
            | ReplicationError::ManifestIo { line, .. }
            | ReplicationError::Fetch { line, .. }
            | ReplicationError::Staging { line, .. }
            | ReplicationError::Stat { line, .. }
            | ReplicationError::Put { line, .. }
            | ReplicationError::DuplicateDestinationKey { line, .. } => Some(*line),
            ReplicationError::TaskAborted(_) => None,
        }
    }

    /// Returns true if the error was raised while reading the manifest
    pub fn is_manifest_error(&self) -> bool {
        matches!(
            self,
            ReplicationError::MalformedManifest { .. } | ReplicationError::ManifestIo { .. }
        )
    }
}
