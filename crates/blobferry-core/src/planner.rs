//! Skip-or-transfer decisions
//!
//! The planner compares the size recorded in the manifest (or the encoded
//! size of the staged object, see [`SizeComparison`]) with the size the
//! destination reports. Equal sizes mean the object is already replicated.
//!
//! This is a size-equality heuristic, not a content check: two different
//! objects of the same length are indistinguishable here and the second
//! one is skipped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::newtypes::DestinationKey;
use crate::ports::destination_store::{DestinationStore, ObjectStat};

/// Which local size is compared with the destination's stored size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeComparison {
    /// The manifest's `expected_size_bytes`
    #[default]
    Manifest,
    /// The staged object's size after the destination's upload encoding
    Encoded,
}

impl std::fmt::Display for SizeComparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manifest => write!(f, "manifest"),
            Self::Encoded => write!(f, "encoded"),
        }
    }
}

/// Why an object needs to be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferReason {
    /// No object at the destination key
    DestinationAbsent,
    /// The destination object has a different size
    SizeMismatch { expected: u64, actual: u64 },
}

impl std::fmt::Display for TransferReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DestinationAbsent => write!(f, "destination absent"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch (expected {expected}, found {actual})")
            }
        }
    }
}

/// Outcome of planning one manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Transfer(TransferReason),
    /// Destination already holds an object of the expected size
    Skip,
}

impl SyncDecision {
    /// Returns true if the object must be written
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Transfer(_))
    }
}

/// Stateless skip-or-transfer planner
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncPlanner;

impl SyncPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Decides from an already known destination state
    pub fn decide(&self, expected_size: u64, existing: Option<ObjectStat>) -> SyncDecision {
        match existing {
            None => SyncDecision::Transfer(TransferReason::DestinationAbsent),
            Some(stat) if stat.size_bytes == expected_size => SyncDecision::Skip,
            Some(stat) => SyncDecision::Transfer(TransferReason::SizeMismatch {
                expected: expected_size,
                actual: stat.size_bytes,
            }),
        }
    }

    /// Looks up `key` at the destination and decides
    ///
    /// Issues exactly one [`DestinationStore::stat`] call.
    pub async fn plan(
        &self,
        destination: &dyn DestinationStore,
        bucket: &str,
        key: &DestinationKey,
        expected_size: u64,
    ) -> anyhow::Result<SyncDecision> {
        let existing = destination.stat(bucket, key).await?;
        let decision = self.decide(expected_size, existing);
        debug!(
            key = %key,
            expected = expected_size,
            found = ?existing.map(|s| s.size_bytes),
            ?decision,
            "Planned entry"
        );
        Ok(decision)
    }
}
