//! Transfer executor
//!
//! Processes one [`TransferTask`]: stage the source object, ask the planner
//! whether the destination needs it, then put it or skip it.
//!
//! ## Design Decisions
//!
//! - **Fetch before plan**: the object is staged before the destination is
//!   consulted, so the `encoded` size comparison can look at the staged
//!   bytes.
//! - **Scoped staging**: the [`StagingHandle`] lives in this function's
//!   scope and is dropped on every return path (transfer, skip, error,
//!   cancellation).
//! - **Step-boundary cancellation**: the token is checked before each of
//!   fetch, stat, and put. A step that has started runs to completion, so a
//!   put is never abandoned half-written.
//!
//! [`StagingHandle`]: blobferry_core::ports::StagingHandle

use std::sync::Arc;

use blobferry_core::{
    domain::{DestinationUri, DomainError, ReplicationError, TransferTask},
    planner::{SizeComparison, SyncDecision, SyncPlanner},
    ports::{DestinationStore, SourceStore, StagingArea, StagingError, TransferOptions},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

// ============================================================================
// TaskOutcome
// ============================================================================

/// How a task that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The object was written (or would have been, in a dry run)
    Transferred { uri: DestinationUri, bytes: u64 },
    /// The destination already held an object of the expected size
    Skipped,
    /// Cancellation was observed at a step boundary
    Cancelled,
}

// ============================================================================
// TransferExecutor
// ============================================================================

/// Runs fetch, plan, and put for individual tasks
///
/// Holds no per-task state, so one executor is shared by every worker of a
/// job.
pub struct TransferExecutor {
    source: Arc<dyn SourceStore>,
    destination: Arc<dyn DestinationStore>,
    planner: SyncPlanner,
    source_container: String,
    destination_bucket: String,
    options: TransferOptions,
    size_comparison: SizeComparison,
    dry_run: bool,
}

impl TransferExecutor {
    /// Creates an executor between two stores
    pub fn new(
        source: Arc<dyn SourceStore>,
        destination: Arc<dyn DestinationStore>,
        source_container: impl Into<String>,
        destination_bucket: impl Into<String>,
        options: TransferOptions,
    ) -> Self {
        Self {
            source,
            destination,
            planner: SyncPlanner::new(),
            source_container: source_container.into(),
            destination_bucket: destination_bucket.into(),
            options,
            size_comparison: SizeComparison::Manifest,
            dry_run: false,
        }
    }

    /// Sets which local size is compared against the destination
    pub fn with_size_comparison(mut self, comparison: SizeComparison) -> Self {
        self.size_comparison = comparison;
        self
    }

    /// Plans every task but never calls put
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Returns the put options forwarded to the destination
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Processes one task
    ///
    /// On error the task is marked failed and the error carries the
    /// manifest line, source identifier, and destination key.
    #[instrument(
        skip(self, task, staging, cancel),
        fields(
            line = task.line(),
            source = %task.entry().source_identifier(),
            key = %task.destination_key()
        )
    )]
    pub async fn execute(
        &self,
        task: &mut TransferTask,
        staging: &StagingArea,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome, ReplicationError> {
        if cancel.is_cancelled() {
            return Ok(TaskOutcome::Cancelled);
        }

        let line = task.line();
        let source_identifier = task.entry().source_identifier().to_string();
        let key = task.destination_key().clone();
        let expected = task.entry().expected_size_bytes();

        // Step 1: stage the source object
        let staged = match self
            .source
            .fetch(&self.source_container, &source_identifier, staging)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                let err = classify_fetch_error(line, &source_identifier, &e);
                return fail(task, err);
            }
        };
        task.mark_staged().map_err(aborted)?;
        debug!(path = %staged.path().display(), "Source object staged");

        if cancel.is_cancelled() {
            return Ok(TaskOutcome::Cancelled);
        }

        // Step 2: decide
        let compared = match self.size_comparison {
            SizeComparison::Manifest => expected,
            SizeComparison::Encoded => {
                match self.destination.encoded_len(&staged, &self.options).await {
                    Ok(len) => len,
                    Err(e) => {
                        let err = ReplicationError::Staging {
                            line,
                            source_identifier,
                            message: format!("{e:#}"),
                        };
                        return fail(task, err);
                    }
                }
            }
        };

        let decision = match self
            .planner
            .plan(
                self.destination.as_ref(),
                &self.destination_bucket,
                &key,
                compared,
            )
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                let err = ReplicationError::Stat {
                    line,
                    destination_key: key.to_string(),
                    message: format!("{e:#}"),
                };
                return fail(task, err);
            }
        };

        let reason = match decision {
            SyncDecision::Skip => {
                task.mark_skipped().map_err(aborted)?;
                info!(size = compared, "Skipping, destination size matches");
                return Ok(TaskOutcome::Skipped);
            }
            SyncDecision::Transfer(reason) => reason,
        };

        let uri = DestinationUri::new(self.destination.scheme(), &self.destination_bucket, &key)
            .map_err(aborted)?;

        if self.dry_run {
            task.mark_transferred().map_err(aborted)?;
            info!(%reason, %uri, "Dry run, would transfer");
            return Ok(TaskOutcome::Transferred { uri, bytes: 0 });
        }

        if cancel.is_cancelled() {
            return Ok(TaskOutcome::Cancelled);
        }

        // Step 3: write
        let bytes = match staged.len().await {
            Ok(len) => len,
            Err(e) => {
                let err = ReplicationError::Staging {
                    line,
                    source_identifier,
                    message: e.to_string(),
                };
                return fail(task, err);
            }
        };

        if let Err(e) = self
            .destination
            .put(&staged, &self.destination_bucket, &key, &self.options)
            .await
        {
            let err = ReplicationError::Put {
                line,
                source_identifier,
                destination_key: key.to_string(),
                message: format!("{e:#}"),
            };
            return fail(task, err);
        }

        task.mark_transferred().map_err(aborted)?;
        info!(%reason, %uri, bytes, "Transferred");
        Ok(TaskOutcome::Transferred { uri, bytes })
    }
}

/// Maps a source failure onto the error taxonomy
///
/// A [`StagingError`] anywhere in the chain means the local side failed.
fn classify_fetch_error(
    line: usize,
    source_identifier: &str,
    error: &anyhow::Error,
) -> ReplicationError {
    let message = format!("{error:#}");
    if error.chain().any(|cause| cause.is::<StagingError>()) {
        ReplicationError::Staging {
            line,
            source_identifier: source_identifier.to_string(),
            message,
        }
    } else {
        ReplicationError::Fetch {
            line,
            source_identifier: source_identifier.to_string(),
            message,
        }
    }
}

fn fail(task: &mut TransferTask, err: ReplicationError) -> Result<TaskOutcome, ReplicationError> {
    task.mark_failed(err.kind()).map_err(aborted)?;
    Err(err)
}

fn aborted(err: DomainError) -> ReplicationError {
    ReplicationError::TaskAborted(err.to_string())
}
