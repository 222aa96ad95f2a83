//! TransferTask domain entity
//!
//! A [`TransferTask`] wraps one [`ManifestEntry`] with the transient state it
//! goes through while a job processes it. Tasks are owned by the job for
//! their whole lifetime and discarded when the job completes.
//!
//! ## State Machine
//!
//! ```text
//!                  fetch ok                  put ok
//!   ┌─────────┐ ────────────► ┌─────────┐ ───────────► ┌─────────────┐
//!   │ Pending │               │ Staged  │              │ Transferred │
//!   └─────────┘               └─────────┘              └─────────────┘
//!     │     │                   │     │
//!     │     │ planned skip      │     │ size match
//!     │     └───────────────────┼──►┌─────────┐
//!     │                         │   │ Skipped │
//!     │                         │   └─────────┘
//!     │ fetch error             │ stat/put error
//!     ▼                         ▼
//!   ┌───────────────────────────────┐
//!   │            Failed             │
//!   └───────────────────────────────┘
//! ```

use std::fmt;

use super::entry::ManifestEntry;
use super::errors::DomainError;
use super::newtypes::DestinationKey;

/// State of a transfer task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TaskState {
    /// Not yet started
    #[default]
    Pending,
    /// Source object materialized in a staging resource
    Staged,
    /// Destination already matches; nothing written
    Skipped,
    /// Destination written
    Transferred,
    /// Task failed with a reason
    Failed(String),
}

impl TaskState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Skipped | TaskState::Transferred | TaskState::Failed(_)
        )
    }

    /// Returns the state name as a string (without failure details)
    pub fn name(&self) -> &'static str {
        match self {
            TaskState::Pending => "Pending",
            TaskState::Staged => "Staged",
            TaskState::Skipped => "Skipped",
            TaskState::Transferred => "Transferred",
            TaskState::Failed(_) => "Failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Staged => write!(f, "staged"),
            TaskState::Skipped => write!(f, "skipped"),
            TaskState::Transferred => write!(f, "transferred"),
            TaskState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// One manifest entry being processed by a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    line: usize,
    entry: ManifestEntry,
    destination_key: DestinationKey,
    state: TaskState,
}

impl TransferTask {
    /// Creates a pending task for `entry`, read from manifest line `line`
    pub fn new(line: usize, entry: ManifestEntry, key_prefix: &str) -> Self {
        let destination_key = entry.destination_key(key_prefix);
        Self {
            line,
            entry,
            destination_key,
            state: TaskState::Pending,
        }
    }

    /// 1-based manifest line number
    pub fn line(&self) -> usize {
        self.line
    }

    /// The manifest entry this task processes
    pub fn entry(&self) -> &ManifestEntry {
        &self.entry
    }

    /// Computed destination key (`prefix + suffix`)
    pub fn destination_key(&self) -> &DestinationKey {
        &self.destination_key
    }

    /// Current state
    pub fn state(&self) -> &TaskState {
        &self.state
    }

    fn transition(&mut self, allowed: &[&str], to: TaskState) -> Result<(), DomainError> {
        if !allowed.contains(&self.state.name()) {
            return Err(DomainError::InvalidState {
                from: self.state.name().to_string(),
                to: to.name().to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Pending → Staged
    pub fn mark_staged(&mut self) -> Result<(), DomainError> {
        self.transition(&["Pending"], TaskState::Staged)
    }

    /// Pending | Staged → Skipped
    pub fn mark_skipped(&mut self) -> Result<(), DomainError> {
        self.transition(&["Pending", "Staged"], TaskState::Skipped)
    }

    /// Staged → Transferred
    pub fn mark_transferred(&mut self) -> Result<(), DomainError> {
        self.transition(&["Staged"], TaskState::Transferred)
    }

    /// Pending | Staged → Failed
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        self.transition(&["Pending", "Staged"], TaskState::Failed(reason.into()))
    }
}
