//! Manifest reader
//!
//! A manifest is plain text, one transfer record per line:
//!
//! ```text
//! <source-identifier>,<destination-key-suffix>,<size-in-bytes>
//! ```
//!
//! There is no header row and no escaping: a field can never contain the
//! delimiter. Lines are read lazily, so a malformed line only aborts a job
//! when the reader reaches it. Use [`ManifestReader::read_all`] to validate a
//! whole manifest before doing any store I/O.

use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::domain::{ManifestEntry, ManifestRecord, ReplicationError};

/// Field delimiter. Not escapable.
pub const DELIMITER: char = ',';

/// Number of fields every line must have
const FIELD_COUNT: usize = 3;

/// Parses one manifest line (trailing newline already stripped)
///
/// # Errors
/// Returns [`ReplicationError::MalformedManifest`] if the line does not split
/// into exactly three fields, if the size is not a non-negative integer, or
/// if the source identifier or key suffix is empty.
pub fn parse_line(line_number: usize, content: &str) -> Result<ManifestEntry, ReplicationError> {
    let malformed = |reason: String| ReplicationError::MalformedManifest {
        line: line_number,
        content: content.to_string(),
        reason,
    };

    let fields: Vec<&str> = content.split(DELIMITER).collect();
    if fields.len() != FIELD_COUNT {
        return Err(malformed(format!(
            "expected {FIELD_COUNT} fields, found {}",
            fields.len()
        )));
    }

    let size = fields[2]
        .parse::<u64>()
        .map_err(|e| malformed(format!("size '{}' is not a non-negative integer: {e}", fields[2])))?;

    ManifestEntry::new(fields[0], fields[1], size).map_err(|e| malformed(e.to_string()))
}

/// Lazy reader over a manifest stream
///
/// Finite, and restartable only by re-opening the source.
pub struct ManifestReader<R> {
    reader: R,
    line_number: usize,
    buf: String,
    done: bool,
}

impl ManifestReader<BufReader<tokio::fs::File>> {
    /// Opens a manifest file
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        debug!(path = %path.display(), "Opened manifest");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> ManifestReader<R> {
    /// Wraps any buffered async reader
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buf: String::new(),
            done: false,
        }
    }

    /// Number of lines consumed so far
    pub fn lines_read(&self) -> usize {
        self.line_number
    }

    /// Reads and parses the next record
    ///
    /// Returns `None` at end of input. After the first error the reader is
    /// exhausted and keeps returning `None`.
    pub async fn next_record(&mut self) -> Option<Result<ManifestRecord, ReplicationError>> {
        if self.done {
            return None;
        }

        self.buf.clear();
        let read = match self.reader.read_line(&mut self.buf).await {
            Ok(n) => n,
            Err(e) => {
                self.done = true;
                return Some(Err(ReplicationError::ManifestIo {
                    line: self.line_number + 1,
                    message: e.to_string(),
                }));
            }
        };

        if read == 0 {
            self.done = true;
            return None;
        }

        self.line_number += 1;
        let content = self.buf.strip_suffix('\n').unwrap_or(&self.buf);
        let content = content.strip_suffix('\r').unwrap_or(content);

        match parse_line(self.line_number, content) {
            Ok(entry) => Some(Ok(ManifestRecord {
                line: self.line_number,
                entry,
            })),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    /// Reads the whole manifest, stopping at the first bad line
    pub async fn read_all(mut self) -> Result<Vec<ManifestRecord>, ReplicationError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await {
            records.push(record?);
        }
        Ok(records)
    }
}
