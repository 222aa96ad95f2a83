//! Result collection
//!
//! Workers append to a shared [`ResultCollector`] as each entry finishes.
//! Appends are serialized by a mutex, so concurrent workers never lose or
//! duplicate an entry. Order is completion order, which matches manifest
//! order only when the job runs sequentially.

use blobferry_core::domain::DestinationUri;
use tokio::sync::Mutex;

use crate::executor::TaskOutcome;

#[derive(Debug, Default)]
struct Collected {
    uris: Vec<DestinationUri>,
    bytes: u64,
    skipped: u64,
}

/// Totals gathered by a [`ResultCollector`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectedResults {
    /// URIs written, in completion order
    pub uris: Vec<DestinationUri>,
    /// Staged bytes of the written objects
    pub bytes: u64,
    /// Entries skipped because the destination already matched
    pub skipped: u64,
}

/// Shared accumulator for task outcomes
#[derive(Debug, Default)]
pub struct ResultCollector {
    inner: Mutex<Collected>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one task
    ///
    /// Only transfers contribute a URI. Cancelled tasks are not recorded.
    pub async fn record(&self, outcome: &TaskOutcome) {
        let mut inner = self.inner.lock().await;
        match outcome {
            TaskOutcome::Transferred { uri, bytes } => {
                inner.uris.push(uri.clone());
                inner.bytes += bytes;
            }
            TaskOutcome::Skipped => inner.skipped += 1,
            TaskOutcome::Cancelled => {}
        }
    }

    /// Number of URIs collected so far
    pub async fn len(&self) -> usize {
        self.inner.lock().await.uris.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Takes everything collected so far, leaving the collector empty
    pub async fn take(&self) -> CollectedResults {
        let mut inner = self.inner.lock().await;
        let taken = std::mem::take(&mut *inner);
        CollectedResults {
            uris: taken.uris,
            bytes: taken.bytes,
            skipped: taken.skipped,
        }
    }
}
