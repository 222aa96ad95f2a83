//! Replication job
//!
//! A [`ReplicationJob`] drives every record of one manifest through the
//! [`TransferExecutor`] and turns the outcome into a [`ReplicationReport`].
//!
//! ## Lifecycle
//!
//! ```text
//! NotStarted ──run()──► Running ──┬──► Completed   every entry transferred or skipped
//!                                 ├──► Failed      first task or manifest error
//!                                 └──► Cancelled   external cancellation signal
//! ```
//!
//! ## Scheduling
//!
//! With `concurrency == 1` entries are processed one at a time in manifest
//! order. With `concurrency > 1` up to that many entries are in flight on a
//! bounded worker pool and the result list is in completion order.
//!
//! Either way the job is fail-fast: after the first error no new entry is
//! dispatched, in-flight workers stop at their next step boundary, and the
//! job waits for them before reporting. Objects already written are not
//! rolled back.

use std::collections::HashMap;
use std::sync::Arc;

use blobferry_core::{
    config::{DuplicateKeyPolicy, JobConfig, MAX_CONCURRENCY},
    domain::{
        DestinationKey, JobId, ManifestRecord, ReplicationError, ReplicationReport, TransferTask,
    },
    manifest::ManifestReader,
    ports::{DestinationStore, SourceStore, StagingArea, StagingError},
};
use tokio::io::AsyncBufRead;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collector::ResultCollector;
use crate::executor::{TaskOutcome, TransferExecutor};

// ============================================================================
// Records
// ============================================================================

/// Manifest records, read lazily or validated up front
enum Records<R> {
    Lazy(ManifestReader<R>),
    Eager(std::vec::IntoIter<ManifestRecord>),
}

impl<R: AsyncBufRead + Unpin> Records<R> {
    async fn next(&mut self) -> Option<Result<ManifestRecord, ReplicationError>> {
        match self {
            Records::Lazy(reader) => reader.next_record().await,
            Records::Eager(records) => records.next().map(Ok),
        }
    }
}

// ============================================================================
// KeyLedger
// ============================================================================

/// Tracks which manifest line first used each destination key
struct KeyLedger {
    policy: DuplicateKeyPolicy,
    seen: HashMap<DestinationKey, usize>,
}

impl KeyLedger {
    fn new(policy: DuplicateKeyPolicy) -> Self {
        Self {
            policy,
            seen: HashMap::new(),
        }
    }

    fn admit(&mut self, line: usize, key: &DestinationKey) -> Result<(), ReplicationError> {
        match self.seen.get(key) {
            None => {
                self.seen.insert(key.clone(), line);
                Ok(())
            }
            Some(&first_line) => match self.policy {
                DuplicateKeyPolicy::Reject => Err(ReplicationError::DuplicateDestinationKey {
                    line,
                    first_line,
                    destination_key: key.to_string(),
                }),
                DuplicateKeyPolicy::Overwrite => {
                    debug!(line, first_line, key = %key, "Duplicate key, last write wins");
                    Ok(())
                }
            },
        }
    }
}

/// Why the dispatch loop stopped early
enum Halt {
    Failed(ReplicationError),
    Cancelled,
}

// ============================================================================
// ReplicationJob
// ============================================================================

/// One manifest-driven replication between a source and a destination store
///
/// The job holds no mutable state; `run` may be called again (for example to
/// confirm that a second pass transfers nothing).
pub struct ReplicationJob {
    id: JobId,
    config: JobConfig,
    executor: Arc<TransferExecutor>,
}

impl ReplicationJob {
    /// Creates a job from a configuration and two resolved stores
    pub fn new(
        config: JobConfig,
        source: Arc<dyn SourceStore>,
        destination: Arc<dyn DestinationStore>,
    ) -> Self {
        let executor = TransferExecutor::new(
            source,
            destination,
            config.source_container.clone(),
            config.destination_bucket.clone(),
            config.transfer_options(),
        )
        .with_size_comparison(config.size_comparison)
        .with_dry_run(config.dry_run);

        Self {
            id: JobId::new(),
            config,
            executor: Arc::new(executor),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Effective worker count
    ///
    /// Duplicate keys with last-write-wins only have a defined outcome when
    /// entries are processed in manifest order.
    pub fn workers(&self) -> usize {
        if self.config.duplicate_keys == DuplicateKeyPolicy::Overwrite {
            return 1;
        }
        self.config.concurrency.clamp(1, MAX_CONCURRENCY)
    }

    /// Runs the job with a fresh staging area
    ///
    /// The staging area is created under `staging_dir` (or the OS temporary
    /// directory) and removed when the job returns.
    pub async fn run<R>(
        &self,
        manifest: ManifestReader<R>,
        cancel: CancellationToken,
    ) -> Result<ReplicationReport, StagingError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let staging = match &self.config.staging_dir {
            Some(dir) => StagingArea::in_dir(dir)?,
            None => StagingArea::temporary()?,
        };
        Ok(self
            .run_with_staging(manifest, Arc::new(staging), cancel)
            .await)
    }

    /// Runs the job using a caller-provided staging area
    #[tracing::instrument(skip_all, fields(job_id = %self.id))]
    pub async fn run_with_staging<R>(
        &self,
        manifest: ManifestReader<R>,
        staging: Arc<StagingArea>,
        cancel: CancellationToken,
    ) -> ReplicationReport
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let mut report = ReplicationReport::started(self.id, self.config.dry_run);
        let collector = Arc::new(ResultCollector::new());
        let workers = self.workers();

        info!(
            source = %self.config.source_container,
            bucket = %self.config.destination_bucket,
            prefix = %self.config.destination_key_prefix,
            workers,
            dry_run = self.config.dry_run,
            "Starting replication job"
        );

        let halt = match self.prepare(manifest).await {
            Err(e) => Some(Halt::Failed(e)),
            Ok(records) if workers == 1 => {
                self.run_sequential(records, &staging, &collector, &mut report, &cancel)
                    .await
            }
            Ok(records) => {
                self.run_pooled(records, workers, &staging, &collector, &mut report, &cancel)
                    .await
            }
        };

        let collected = collector.take().await;
        report.extend_transferred(collected.uris, collected.bytes);
        report.record_skips(collected.skipped);

        match halt {
            None => report.complete(),
            Some(Halt::Failed(e)) => {
                error!(kind = e.kind(), error = %e, "Replication job failed");
                report.fail(e);
            }
            Some(Halt::Cancelled) => {
                warn!("Replication job cancelled");
                report.cancel();
            }
        }

        info!(
            status = %report.status(),
            entries = report.entries_read(),
            transferred = report.transferred(),
            skipped = report.skipped(),
            bytes = report.bytes_written(),
            staged = staging.acquired(),
            "Replication job finished"
        );
        report
    }

    /// Optionally validates the whole manifest before any store I/O
    async fn prepare<R>(
        &self,
        manifest: ManifestReader<R>,
    ) -> Result<Records<R>, ReplicationError>
    where
        R: AsyncBufRead + Unpin,
    {
        if !self.config.validate_manifest_first {
            return Ok(Records::Lazy(manifest));
        }

        let records = manifest.read_all().await?;
        let mut ledger = KeyLedger::new(self.config.duplicate_keys);
        for record in &records {
            let key = record
                .entry
                .destination_key(&self.config.destination_key_prefix);
            ledger.admit(record.line, &key)?;
        }
        debug!(entries = records.len(), "Manifest validated");
        Ok(Records::Eager(records.into_iter()))
    }

    /// Reads the next record and wraps it in a task
    async fn next_task<R>(
        &self,
        records: &mut Records<R>,
        ledger: &mut KeyLedger,
    ) -> Option<Result<TransferTask, ReplicationError>>
    where
        R: AsyncBufRead + Unpin,
    {
        let record = match records.next().await? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };
        let task = TransferTask::new(
            record.line,
            record.entry,
            &self.config.destination_key_prefix,
        );
        Some(
            ledger
                .admit(task.line(), task.destination_key())
                .map(|()| task),
        )
    }

    async fn run_sequential<R>(
        &self,
        mut records: Records<R>,
        staging: &StagingArea,
        collector: &ResultCollector,
        report: &mut ReplicationReport,
        cancel: &CancellationToken,
    ) -> Option<Halt>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut ledger = KeyLedger::new(self.config.duplicate_keys);
        loop {
            if cancel.is_cancelled() {
                return Some(Halt::Cancelled);
            }

            let mut task = match self.next_task(&mut records, &mut ledger).await? {
                Ok(task) => task,
                Err(e) => return Some(Halt::Failed(e)),
            };
            report.record_entry();

            match self.executor.execute(&mut task, staging, cancel).await {
                Ok(TaskOutcome::Cancelled) => return Some(Halt::Cancelled),
                Ok(outcome) => collector.record(&outcome).await,
                Err(e) => return Some(Halt::Failed(e)),
            }
        }
    }

    async fn run_pooled<R>(
        &self,
        mut records: Records<R>,
        workers: usize,
        staging: &Arc<StagingArea>,
        collector: &Arc<ResultCollector>,
        report: &mut ReplicationReport,
        cancel: &CancellationToken,
    ) -> Option<Halt>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut ledger = KeyLedger::new(self.config.duplicate_keys);
        let stop = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut pool: JoinSet<Result<TaskOutcome, ReplicationError>> = JoinSet::new();
        let mut halt: Option<Halt> = None;

        loop {
            // Wait for a free slot, reaping finished workers meanwhile.
            let permit = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                Some(joined) = pool.join_next() => {
                    if let Some(h) = absorb(joined) {
                        halt = Some(h);
                        stop.cancel();
                    }
                    continue;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let mut task = match self.next_task(&mut records, &mut ledger).await {
                None => break,
                Some(Ok(task)) => task,
                Some(Err(e)) => {
                    halt = Some(Halt::Failed(e));
                    stop.cancel();
                    break;
                }
            };
            report.record_entry();

            let executor = Arc::clone(&self.executor);
            let staging = Arc::clone(staging);
            let collector = Arc::clone(collector);
            let token = stop.clone();
            pool.spawn(async move {
                let _permit = permit;
                let outcome = executor.execute(&mut task, &staging, &token).await?;
                collector.record(&outcome).await;
                Ok(outcome)
            });
        }

        // Drain: in-flight workers finish their current step.
        while let Some(joined) = pool.join_next().await {
            match absorb(joined) {
                Some(h) if halt.is_none() => {
                    halt = Some(h);
                    stop.cancel();
                }
                Some(Halt::Failed(e)) => {
                    warn!(error = %e, "Additional failure while stopping");
                }
                _ => {}
            }
        }

        if halt.is_none() && cancel.is_cancelled() {
            halt = Some(Halt::Cancelled);
        }
        halt
    }
}

/// Interprets a finished worker
fn absorb(joined: Result<Result<TaskOutcome, ReplicationError>, JoinError>) -> Option<Halt> {
    match joined {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(Halt::Failed(e)),
        Err(e) => Some(Halt::Failed(ReplicationError::TaskAborted(e.to_string()))),
    }
}
