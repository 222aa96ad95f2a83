//! Blobferry Sync - Replication job engine
//!
//! Provides:
//! - Per-entry fetch, plan, and put execution with guaranteed staging release
//! - A fail-fast replication job, sequential or on a bounded worker pool
//! - Cooperative cancellation at step boundaries
//! - Local-directory and in-memory object stores
//!
//! ## Modules
//!
//! - [`executor`] - Processes one manifest entry end to end
//! - [`collector`] - Thread-safe accumulation of written URIs
//! - [`job`] - Drives a manifest through the executor and builds the report
//! - [`filesystem`] - Directory tree as an object store (atomic writes)
//! - [`memory`] - In-process object store with call counters

pub mod collector;
pub mod executor;
pub mod filesystem;
pub mod job;
pub mod memory;

pub use collector::ResultCollector;
pub use executor::{TaskOutcome, TransferExecutor};
pub use filesystem::LocalDirStore;
pub use job::ReplicationJob;
pub use memory::MemoryStore;

use thiserror::Error;

/// Errors raised by the object store adapters in this crate
#[derive(Debug, Error)]
pub enum StoreError {
    /// The source object does not exist
    #[error("Object not found: {container}/{identifier}")]
    NotFound {
        container: String,
        identifier: String,
    },

    /// A write would replace an existing object and overwriting is disabled
    #[error("Object already exists: {bucket}/{key}")]
    ObjectExists { bucket: String, key: String },

    /// A bucket or key cannot be mapped onto the store
    #[error("Invalid object name: {0}")]
    InvalidName(String),

    /// A failure injected by [`MemoryStore`] for testing
    #[error("Injected failure: {0}")]
    Injected(String),

    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
