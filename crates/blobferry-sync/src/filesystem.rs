//! Local directory object store (secondary/driven adapter)
//!
//! Implements [`SourceStore`] and [`DestinationStore`] over a directory
//! tree. Each top-level directory under the root is a bucket (or source
//! container), and an object key maps to a relative path inside it.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: objects are written to a temporary file in the target
//!   directory and renamed into place, so a reader never sees a partial
//!   object.
//! - **No clobbering**: with `overwrite_existing` off the rename refuses to
//!   replace an existing object.
//! - **Compression**: `compress_before_upload` stores the gzip body.
//! - **Encryption / ACLs**: a plain filesystem has no equivalent; the flags
//!   are accepted and logged.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use blobferry_core::{
    codec,
    domain::DestinationKey,
    ports::{DestinationStore, ObjectStat, SourceStore, StagingArea, StagingHandle, TransferOptions},
};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn};

use crate::StoreError;

/// Chunk size for streaming source files into staging
const COPY_CHUNK_SIZE: usize = 64 * 1024;

// ============================================================================
// LocalDirStore
// ============================================================================

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    /// Creates a store rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps `bucket/name` to a path under the root
    ///
    /// Rejects names that are empty or would escape the bucket directory.
    pub fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf, StoreError> {
        let bucket_path = relative(bucket)?;
        if bucket_path.components().count() != 1 {
            return Err(StoreError::InvalidName(format!(
                "bucket '{bucket}' must be a single path segment"
            )));
        }
        Ok(self.root.join(bucket_path).join(relative(name)?))
    }
}

/// Validates an object name and turns it into a relative path
///
/// Every `/`-separated segment must be non-empty and neither `.` nor `..`,
/// so two distinct keys never map onto the same file.
fn relative(name: &str) -> Result<PathBuf, StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName(format!("'{name}' is empty")));
    }
    let mut clean = PathBuf::new();
    for segment in name.split('/') {
        match segment {
            "" | "." | ".." => {
                return Err(StoreError::InvalidName(format!(
                    "'{name}' must be a relative path without empty, '.' or '..' segments"
                )))
            }
            part => clean.push(part),
        }
    }
    Ok(clean)
}

// ============================================================================
// SourceStore
// ============================================================================

#[async_trait::async_trait]
impl SourceStore for LocalDirStore {
    #[instrument(skip(self, staging))]
    async fn fetch(
        &self,
        container: &str,
        identifier: &str,
        staging: &StagingArea,
    ) -> anyhow::Result<StagingHandle> {
        let path = self.object_path(container, identifier)?;
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    container: container.to_string(),
                    identifier: identifier.to_string(),
                }
                .into())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("opening {}", path.display()));
            }
        };

        let handle = staging.acquire(identifier)?;
        let mut writer = handle.writer().await?;
        let mut buf = vec![0u8; COPY_CHUNK_SIZE];
        loop {
            let n = file
                .read(&mut buf)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            if n == 0 {
                break;
            }
            writer.write_chunk(&buf[..n]).await?;
        }
        let bytes = writer.finish().await?;

        debug!(bytes, "Staged local object");
        Ok(handle)
    }
}

// ============================================================================
// DestinationStore
// ============================================================================

#[async_trait::async_trait]
impl DestinationStore for LocalDirStore {
    fn scheme(&self) -> &str {
        "file"
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn stat(&self, bucket: &str, key: &DestinationKey) -> anyhow::Result<Option<ObjectStat>> {
        let path = self.object_path(bucket, key.as_str())?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("object not found");
                return Ok(None);
            }
            Err(e) => return Err(e).with_context(|| format!("stat {}", path.display())),
        };

        if !metadata.is_file() {
            anyhow::bail!("{} exists but is not a file", path.display());
        }
        Ok(Some(ObjectStat {
            size_bytes: metadata.len(),
        }))
    }

    #[instrument(skip(self, staged, options), fields(key = %key))]
    async fn put(
        &self,
        staged: &StagingHandle,
        bucket: &str,
        key: &DestinationKey,
        options: &TransferOptions,
    ) -> anyhow::Result<()> {
        let target = self.object_path(bucket, key.as_str())?;
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StoreError::InvalidName(key.to_string()))?;

        if options.server_side_encrypt {
            debug!("server-side encryption requested; not applicable to local files");
        }
        if let Some(acl) = &options.canonical_acl {
            debug!(acl = %acl, "canned ACL requested; not applicable to local files");
        }

        let body = codec::upload_body(staged, options).await?;
        tokio::fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;

        // Write to a temporary file in the same directory so rename is atomic
        // (same filesystem).
        let overwrite = options.overwrite_existing;
        let bytes = body.len();
        let source = body.path().to_path_buf();
        let destination = target.clone();
        let persisted = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::Builder::new()
                .prefix(".blobferry-")
                .suffix(".tmp")
                .tempfile_in(&parent)?;
            let mut input = std::fs::File::open(&source)?;
            std::io::copy(&mut input, &mut tmp)?;
            tmp.as_file().sync_all()?;

            let result = if overwrite {
                tmp.persist(&destination)
            } else {
                tmp.persist_noclobber(&destination)
            };
            result.map(|_| ()).map_err(|e| e.error)
        })
        .await?;

        match persisted {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::ObjectExists {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e).with_context(|| format!("writing {}", target.display())),
        }

        if options.compress_before_upload {
            debug!(bytes, "wrote gzip object");
        } else {
            debug!(bytes, "wrote object");
        }
        Ok(())
    }
}

impl LocalDirStore {
    /// Ensures the root directory exists
    pub async fn ensure_root(&self) -> anyhow::Result<()> {
        if !self.root.exists() {
            warn!(root = %self.root.display(), "Store root missing, creating it");
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating {}", self.root.display()))
    }
}

// ============================================================================
// Unit tests
// ============================================================================
