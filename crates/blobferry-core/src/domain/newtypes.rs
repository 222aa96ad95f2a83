//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for identifiers and computed object names.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// JobId
// ============================================================================

/// Identifier for one replication job run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Create a new random JobId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a JobId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid JobId: {e}")))
    }
}

// ============================================================================
// DestinationKey
// ============================================================================

/// Object key at the destination: `prefix + destination_key_suffix`
///
/// Computed from job configuration and a manifest entry, never stored in
/// the manifest itself. The prefix is used verbatim; no separator is
/// inserted between prefix and suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationKey(String);

impl DestinationKey {
    /// Join a configured prefix and a manifest key suffix
    ///
    /// # Errors
    /// Returns [`DomainError::EmptyKeySuffix`] if `suffix` is empty
    pub fn new(prefix: &str, suffix: &str) -> Result<Self, DomainError> {
        if suffix.is_empty() {
            return Err(DomainError::EmptyKeySuffix);
        }
        Ok(Self::join(prefix, suffix))
    }

    /// Join without validation; callers guarantee a non-empty suffix
    pub(crate) fn join(prefix: &str, suffix: &str) -> Self {
        Self(format!("{prefix}{suffix}"))
    }

    /// Returns the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DestinationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DestinationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// DestinationUri
// ============================================================================

/// URI of an object written by a job: `<scheme>://<bucket>/<key>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationUri(String);

impl DestinationUri {
    /// Build a URI from its components
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidUri`] if the scheme or bucket is empty,
    /// or if the scheme contains characters other than ASCII alphanumerics,
    /// `+`, `-` and `.`.
    pub fn new(scheme: &str, bucket: &str, key: &DestinationKey) -> Result<Self, DomainError> {
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(DomainError::InvalidUri(format!("bad scheme '{scheme}'")));
        }
        if bucket.is_empty() {
            return Err(DomainError::InvalidUri("bucket must not be empty".into()));
        }
        Ok(Self(format!("{scheme}://{bucket}/{key}")))
    }

    /// Returns the URI as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DestinationUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for DestinationUri {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
