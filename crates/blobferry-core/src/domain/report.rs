//! Job status and replication report
//!
//! [`JobStatus`] is the top-level job state machine
//! (`NotStarted → Running → Completed | Failed | Cancelled`).
//! [`ReplicationReport`] is what a job hands back to its caller: the
//! destination URIs actually written, a few counters, and the failure cause
//! when the job did not complete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::errors::ReplicationError;
use super::newtypes::{DestinationUri, JobId};

/// Lifecycle state of a replication job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Constructed, not yet run
    #[default]
    NotStarted,
    /// Processing manifest entries
    Running,
    /// Every manifest entry was transferred or skipped
    Completed,
    /// Aborted on the first task-level error
    Failed,
    /// Stopped by an external cancellation signal
    Cancelled,
}

impl JobStatus {
    /// Returns true if the job has reached a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Returns true if the job completed successfully
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::NotStarted => write!(f, "not started"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

fn serialize_failure<S: Serializer>(
    failure: &Option<ReplicationError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match failure {
        Some(err) => serde_json::json!({
            "kind": err.kind(),
            "line": err.line(),
            "message": err.to_string(),
        })
        .serialize(serializer),
        None => serializer.serialize_none(),
    }
}

/// Outcome of one replication job
///
/// `uris` holds one entry per object actually written, in completion order.
/// Skipped objects are counted but never listed. When the job failed or was
/// cancelled, `uris` is the partial result at the moment it stopped; the
/// entries not attempted are the manifest minus this list.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationReport {
    job_id: JobId,
    status: JobStatus,
    dry_run: bool,
    uris: Vec<DestinationUri>,
    entries_read: u64,
    skipped: u64,
    bytes_written: u64,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_failure")]
    failure: Option<ReplicationError>,
}

impl ReplicationReport {
    /// Creates a report for a job that is starting now
    pub fn started(job_id: JobId, dry_run: bool) -> Self {
        Self {
            job_id,
            status: JobStatus::Running,
            dry_run,
            uris: Vec::new(),
            entries_read: 0,
            skipped: 0,
            bytes_written: 0,
            started_at: Utc::now(),
            finished_at: None,
            failure: None,
        }
    }

    // --- Getters ---

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// True when the job planned transfers without writing anything
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Destination URIs written by the job
    pub fn uris(&self) -> &[DestinationUri] {
        &self.uris
    }

    /// Number of manifest entries handed to the executor
    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    pub fn transferred(&self) -> u64 {
        self.uris.len() as u64
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// The error that stopped the job, if it failed
    pub fn failure(&self) -> Option<&ReplicationError> {
        self.failure.as_ref()
    }

    /// Duration of the job (so far or total)
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }

    // --- Recording ---

    pub fn record_entry(&mut self) {
        self.entries_read += 1;
    }

    pub fn record_skips(&mut self, count: u64) {
        self.skipped += count;
    }

    /// Appends the URIs collected by the job and the bytes they carried
    pub fn extend_transferred(&mut self, uris: Vec<DestinationUri>, bytes: u64) {
        self.uris.extend(uris);
        self.bytes_written += bytes;
    }

    // --- Terminal transitions ---

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: ReplicationError) {
        self.status = JobStatus::Failed;
        self.failure = Some(error);
        self.finished_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.finished_at = Some(Utc::now());
    }

    /// Converts the report into the plain result a scheduler expects
    ///
    /// A cancelled job is reported as `Ok` with its partial list; callers
    /// that need to tell cancellation apart should check [`Self::status`].
    pub fn into_result(self) -> Result<Vec<DestinationUri>, ReplicationError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.uris),
        }
    }
}
