//! Manifest entries
//!
//! A [`ManifestEntry`] is one transfer record: which source object to copy,
//! the suffix of its destination key, and the size the destination copy is
//! expected to have. Entries are immutable once parsed.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::DestinationKey;

/// One transfer record from a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    source_identifier: String,
    destination_key_suffix: String,
    expected_size_bytes: u64,
}

impl ManifestEntry {
    /// Creates a new entry
    ///
    /// # Errors
    /// Returns [`DomainError::EmptySourceIdentifier`] or
    /// [`DomainError::EmptyKeySuffix`] when the respective field is empty.
    pub fn new(
        source_identifier: impl Into<String>,
        destination_key_suffix: impl Into<String>,
        expected_size_bytes: u64,
    ) -> Result<Self, DomainError> {
        let source_identifier = source_identifier.into();
        let destination_key_suffix = destination_key_suffix.into();

        if source_identifier.is_empty() {
            return Err(DomainError::EmptySourceIdentifier);
        }
        if destination_key_suffix.is_empty() {
            return Err(DomainError::EmptyKeySuffix);
        }

        Ok(Self {
            source_identifier,
            destination_key_suffix,
            expected_size_bytes,
        })
    }

    /// Identifier of the object in the source container
    pub fn source_identifier(&self) -> &str {
        &self.source_identifier
    }

    /// Destination key without the configured prefix
    pub fn destination_key_suffix(&self) -> &str {
        &self.destination_key_suffix
    }

    /// Size in bytes the destination copy is expected to have
    pub fn expected_size_bytes(&self) -> u64 {
        self.expected_size_bytes
    }

    /// Computes the destination key under the given prefix
    pub fn destination_key(&self, prefix: &str) -> DestinationKey {
        DestinationKey::join(prefix, &self.destination_key_suffix)
    }
}

/// A manifest entry together with the 1-based line it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    /// 1-based line number, for diagnostics
    pub line: usize,
    /// The parsed entry
    pub entry: ManifestEntry,
}
