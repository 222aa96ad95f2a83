//! Domain entities and business logic
//!
//! This module contains the core domain types for blobferry:
//! - Newtypes for job identifiers, destination keys and URIs
//! - Manifest entries
//! - Transfer tasks and their state machine
//! - Job status and the replication report
//! - Domain-specific error types

pub mod entry;
pub mod errors;
pub mod newtypes;
pub mod report;
pub mod task;

// Re-export commonly used types
pub use entry::{ManifestEntry, ManifestRecord};
pub use errors::{DomainError, ReplicationError};
pub use newtypes::*;
pub use report::{JobStatus, ReplicationReport};
pub use task::{TaskState, TransferTask};
