//! Upload body encoding
//!
//! Stores that honor `compress_before_upload` write a gzip copy of the
//! staged object instead of the object itself. [`upload_body`] picks the
//! file to write so adapters and the default
//! [`DestinationStore::encoded_len`](crate::ports::DestinationStore::encoded_len)
//! agree on the exact bytes that get stored.
//!
//! Bodies are files, never in-memory buffers. The gzip copy is produced
//! once per staging handle and shared by the size check and the put.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::trace;

use crate::ports::destination_store::TransferOptions;
use crate::ports::staging::{StagingError, StagingHandle};

/// Content-Encoding value for compressed uploads
pub const GZIP_ENCODING: &str = "gzip";

/// Gzip-compresses the file at `source` into `target`, streaming
///
/// Returns the size of the compressed file. Blocking.
pub fn gzip_file(source: &Path, target: &Path) -> std::io::Result<u64> {
    let mut input = BufReader::new(File::open(source)?);
    let output = BufWriter::new(File::create(target)?);

    let mut encoder = GzEncoder::new(output, Compression::default());
    std::io::copy(&mut input, &mut encoder)?;
    let file = encoder
        .finish()?
        .into_inner()
        .map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(file.metadata()?.len())
}

/// The file a store writes for one staged object
#[derive(Debug, Clone, Copy)]
pub struct UploadBody<'a> {
    path: &'a Path,
    len: u64,
    content_encoding: Option<&'static str>,
}

impl UploadBody<'_> {
    /// File holding the exact bytes to store
    pub fn path(&self) -> &Path {
        self.path
    }

    /// Stored size in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `Content-Encoding` of the body, if any
    pub fn content_encoding(&self) -> Option<&'static str> {
        self.content_encoding
    }

    /// Opens the body for streaming reads
    pub async fn open(&self) -> Result<tokio::fs::File, StagingError> {
        tokio::fs::File::open(self.path)
            .await
            .map_err(|e| StagingError::new(self.path, e))
    }

    /// Reads the whole body
    pub async fn read_bytes(&self) -> Result<Vec<u8>, StagingError> {
        tokio::fs::read(self.path)
            .await
            .map_err(|e| StagingError::new(self.path, e))
    }
}

/// Returns the body a store should write for `staged` under `options`
///
/// The staged file itself when compression is off; its gzip copy otherwise.
pub async fn upload_body<'a>(
    staged: &'a StagingHandle,
    options: &TransferOptions,
) -> Result<UploadBody<'a>, StagingError> {
    if !options.compress_before_upload {
        return Ok(UploadBody {
            path: staged.path(),
            len: staged.len().await?,
            content_encoding: None,
        });
    }

    let (path, len) = staged.gzipped().await?;
    trace!(path = %path.display(), encoded = len, "Using gzip upload body");
    Ok(UploadBody {
        path,
        len,
        content_encoding: Some(GZIP_ENCODING),
    })
}
