//! Destination store port (driven/secondary port)
//!
//! The store objects are replicated *into*. The engine only asks two
//! questions of it: how large is the object at `key` (if it exists), and
//! please write this staged file to `key`.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific; the executor classifies them into the job's
//!   error taxonomy.
//! - [`TransferOptions`] is forwarded untouched. Interpreting the flags
//!   (refusing to overwrite, compressing, encryption headers, ACLs) is the
//!   adapter's job.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::domain::newtypes::DestinationKey;
use crate::ports::staging::StagingHandle;

/// What the destination knows about an existing object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStat {
    /// Stored size in bytes
    pub size_bytes: u64,
}

/// Pass-through policy flags for [`DestinationStore::put`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Replace an existing object. When false, the adapter must refuse to
    /// write over an object that already exists.
    pub overwrite_existing: bool,
    /// Ask the destination to encrypt the object at rest
    pub server_side_encrypt: bool,
    /// Canned ACL to apply to the written object
    pub canonical_acl: Option<String>,
    /// Compress (gzip) the object before upload
    pub compress_before_upload: bool,
}

/// Port trait for the store objects are written to
#[async_trait::async_trait]
pub trait DestinationStore: Send + Sync {
    /// URI scheme for objects in this store (e.g. `s3`, `file`)
    fn scheme(&self) -> &str;

    /// Looks up the object at `key`
    ///
    /// # Returns
    /// `None` if the object does not exist. Absence is not an error.
    async fn stat(&self, bucket: &str, key: &DestinationKey) -> anyhow::Result<Option<ObjectStat>>;

    /// Writes the staged object to `key`
    async fn put(
        &self,
        staged: &StagingHandle,
        bucket: &str,
        key: &DestinationKey,
        options: &TransferOptions,
    ) -> anyhow::Result<()>;

    /// Size the staged object will have once stored under `options`
    ///
    /// The default matches stores that write [`codec::upload_body`]. The
    /// gzip copy it may produce is kept on the handle for the later put.
    async fn encoded_len(
        &self,
        staged: &StagingHandle,
        options: &TransferOptions,
    ) -> anyhow::Result<u64> {
        Ok(codec::upload_body(staged, options).await?.len())
    }
}
