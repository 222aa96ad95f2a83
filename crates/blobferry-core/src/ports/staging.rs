//! Local staging of source objects
//!
//! Every object is materialized locally before it is written to the
//! destination. A [`StagingArea`] is a private directory owned by one job;
//! it hands out [`StagingHandle`]s, each backed by one temporary file.
//!
//! A handle removes its file when dropped, so release happens exactly once
//! on every exit path (success, skip, error, cancellation) without the
//! executor having to remember it. The area keeps counters of acquired and
//! released handles so callers can assert that nothing leaked.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tempfile::{TempDir, TempPath};
use thiserror::Error;

use crate::codec;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

/// Local resource failure while staging an object
#[derive(Debug, Error)]
#[error("Staging failed at {path}: {source}")]
pub struct StagingError {
    /// File or directory being created or written
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl StagingError {
    pub(crate) fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Per-job directory of staged objects
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    counters: Arc<Counters>,
}

impl StagingArea {
    /// Creates a staging area under the OS temporary directory
    pub fn temporary() -> Result<Self, StagingError> {
        let dir = tempfile::Builder::new()
            .prefix("blobferry-")
            .tempdir()
            .map_err(|e| StagingError::new(std::env::temp_dir(), e))?;
        Ok(Self::from_dir(dir))
    }

    /// Creates a staging area as a fresh subdirectory of `parent`
    ///
    /// `parent` is created if missing. Each call yields a distinct
    /// directory, so independent jobs can share the same `parent`.
    pub fn in_dir(parent: &Path) -> Result<Self, StagingError> {
        std::fs::create_dir_all(parent).map_err(|e| StagingError::new(parent, e))?;
        let dir = tempfile::Builder::new()
            .prefix("blobferry-")
            .tempdir_in(parent)
            .map_err(|e| StagingError::new(parent, e))?;
        Ok(Self::from_dir(dir))
    }

    fn from_dir(dir: TempDir) -> Self {
        debug!(path = %dir.path().display(), "Created staging area");
        Self {
            dir,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Directory holding the staged files
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Creates an empty staging file for the object `label`
    pub fn acquire(&self, label: &str) -> Result<StagingHandle, StagingError> {
        let file = tempfile::Builder::new()
            .prefix("stage-")
            .tempfile_in(self.dir.path())
            .map_err(|e| StagingError::new(self.dir.path(), e))?;

        self.counters.acquired.fetch_add(1, Ordering::AcqRel);
        let path = file.into_temp_path();
        trace!(label, path = %path.display(), "Staging handle acquired");

        Ok(StagingHandle {
            path: Some(path),
            label: label.to_string(),
            counters: Arc::clone(&self.counters),
            gzipped: OnceCell::new(),
        })
    }

    /// Number of handles handed out so far
    pub fn acquired(&self) -> u64 {
        self.counters.acquired.load(Ordering::Acquire)
    }

    /// Number of handles dropped so far
    pub fn released(&self) -> u64 {
        self.counters.released.load(Ordering::Acquire)
    }

    /// Handles acquired but not yet released
    pub fn outstanding(&self) -> u64 {
        self.acquired().saturating_sub(self.released())
    }
}

/// One staged object: a temporary file removed on drop
///
/// A gzip copy, if one was requested, lives next to it and is removed
/// with it.
#[derive(Debug)]
pub struct StagingHandle {
    path: Option<TempPath>,
    label: String,
    counters: Arc<Counters>,
    gzipped: OnceCell<Encoded>,
}

#[derive(Debug)]
struct Encoded {
    path: TempPath,
    len: u64,
}

impl StagingHandle {
    /// Path of the staged file
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    /// Identifier of the object this handle stages (for diagnostics)
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Replaces the staged content with `data`
    pub async fn write_bytes(&self, data: &[u8]) -> Result<(), StagingError> {
        tokio::fs::write(self.path(), data)
            .await
            .map_err(|e| StagingError::new(self.path(), e))
    }

    /// Opens the staged file for streaming writes (truncating it)
    pub async fn writer(&self) -> Result<StagingWriter, StagingError> {
        let file = tokio::fs::File::create(self.path())
            .await
            .map_err(|e| StagingError::new(self.path(), e))?;
        Ok(StagingWriter {
            file,
            path: self.path().to_path_buf(),
            written: 0,
        })
    }

    /// Reads the staged content
    pub async fn read_bytes(&self) -> Result<Vec<u8>, StagingError> {
        tokio::fs::read(self.path())
            .await
            .map_err(|e| StagingError::new(self.path(), e))
    }

    /// Size of the staged content in bytes
    pub async fn len(&self) -> Result<u64, StagingError> {
        tokio::fs::metadata(self.path())
            .await
            .map(|m| m.len())
            .map_err(|e| StagingError::new(self.path(), e))
    }

    /// Path and size of a gzip copy of the staged content
    ///
    /// Compressed on first call (on the blocking pool) and reused after
    /// that. Write the content before asking for the copy.
    pub async fn gzipped(&self) -> Result<(&Path, u64), StagingError> {
        let encoded = self
            .gzipped
            .get_or_try_init(|| async {
                let source = self.path().to_path_buf();
                let dir = source.parent().map(Path::to_path_buf).unwrap_or_default();
                let path = tempfile::Builder::new()
                    .prefix("gzip-")
                    .tempfile_in(&dir)
                    .map_err(|e| StagingError::new(&dir, e))?
                    .into_temp_path();

                let target = path.to_path_buf();
                let len = tokio::task::spawn_blocking(move || codec::gzip_file(&source, &target))
                    .await
                    .map_err(|e| StagingError::new(self.path(), std::io::Error::other(e)))?
                    .map_err(|e| StagingError::new(self.path(), e))?;

                trace!(label = %self.label, len, "Gzip copy staged");
                Ok::<_, StagingError>(Encoded { path, len })
            })
            .await?;
        Ok((&*encoded.path, encoded.len))
    }
}

impl Drop for StagingHandle {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.display().to_string();
            if let Err(e) = path.close() {
                // The file may already be gone if the area was torn down first.
                trace!(path = %shown, error = %e, "Staging file removal failed");
            }
        }
        self.counters.released.fetch_add(1, Ordering::AcqRel);
        trace!(label = %self.label, "Staging handle released");
    }
}

/// Streaming writer into a staging file
pub struct StagingWriter {
    file: tokio::fs::File,
    path: PathBuf,
    written: u64,
}

impl StagingWriter {
    /// Appends a chunk
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StagingError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| StagingError::new(&self.path, e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes to disk and returns the number of bytes written
    pub async fn finish(mut self) -> Result<u64, StagingError> {
        self.file
            .flush()
            .await
            .map_err(|e| StagingError::new(&self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| StagingError::new(&self.path, e))?;
        Ok(self.written)
    }
}
