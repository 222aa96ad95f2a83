//! End-to-end behavior of the replication job over in-memory stores

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use blobferry_core::{
    config::{DuplicateKeyPolicy, JobConfigBuilder},
    domain::{JobStatus, ReplicationError, ReplicationReport},
    manifest::ManifestReader,
    planner::SizeComparison,
    ports::StagingArea,
};
use blobferry_sync::{MemoryStore, ReplicationJob};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    source: Arc<MemoryStore>,
    destination: Arc<MemoryStore>,
    staging: Arc<StagingArea>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_stores(MemoryStore::new(), MemoryStore::new().with_scheme("s3"))
    }

    fn with_stores(source: MemoryStore, destination: MemoryStore) -> Self {
        Self {
            source: Arc::new(source),
            destination: Arc::new(destination),
            staging: Arc::new(StagingArea::temporary().unwrap()),
        }
    }

    fn builder() -> JobConfigBuilder {
        JobConfigBuilder::new()
            .source_container("container")
            .destination_bucket("bucket")
    }

    fn job(&self, builder: JobConfigBuilder) -> ReplicationJob {
        let config = builder.build_validated().expect("valid config");
        ReplicationJob::new(config, self.source.clone(), self.destination.clone())
    }

    async fn run(&self, builder: JobConfigBuilder, manifest: &str) -> ReplicationReport {
        self.run_with_cancel(builder, manifest, CancellationToken::new())
            .await
    }

    async fn run_with_cancel(
        &self,
        builder: JobConfigBuilder,
        manifest: &str,
        cancel: CancellationToken,
    ) -> ReplicationReport {
        self.job(builder)
            .run_with_staging(
                ManifestReader::new(manifest.as_bytes()),
                Arc::clone(&self.staging),
                cancel,
            )
            .await
    }

    /// Seeds `count` source objects `obj-N.csv` of `size` bytes and returns
    /// the matching manifest
    async fn seed(&self, count: usize, size: usize) -> String {
        let mut manifest = String::new();
        for i in 1..=count {
            let name = format!("obj-{i}.csv");
            self.source.insert("container", &name, vec![b'x'; size]).await;
            manifest.push_str(&format!("{name},out/{name},{size}\n"));
        }
        manifest
    }
}

fn uris(report: &ReplicationReport) -> Vec<String> {
    report.uris().iter().map(|u| u.to_string()).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn absent_destination_is_transferred() {
    let fx = Fixture::new();
    fx.source
        .insert("container", "photo.jpg", vec![0; 2048])
        .await;

    let report = fx
        .run(Fixture::builder(), "photo.jpg,img/photo.jpg,2048\n")
        .await;

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(uris(&report), vec!["s3://bucket/img/photo.jpg"]);
    assert_eq!(report.bytes_written(), 2048);
    assert_eq!(
        fx.destination.get("bucket", "img/photo.jpg").await.unwrap().len(),
        2048
    );
}

#[tokio::test]
async fn matching_size_is_skipped_without_put() {
    let fx = Fixture::new();
    fx.source.insert("container", "a.csv", vec![0; 100]).await;
    fx.destination.insert("bucket", "data/a.csv", vec![1; 100]).await;

    let report = fx.run(Fixture::builder(), "a.csv,data/a.csv,100").await;

    assert_eq!(report.status(), JobStatus::Completed);
    assert!(report.uris().is_empty());
    assert_eq!(report.skipped(), 1);
    assert_eq!(fx.destination.put_calls(), 0);
    assert_eq!(fx.destination.get("bucket", "data/a.csv").await.unwrap(), vec![1; 100]);
}

#[tokio::test]
async fn size_mismatch_is_transferred_with_overwrite() {
    let fx = Fixture::new();
    fx.source.insert("container", "a.csv", vec![0; 100]).await;
    fx.destination.insert("bucket", "data/a.csv", vec![1; 50]).await;

    let report = fx
        .run(
            Fixture::builder().overwrite_existing(true),
            "a.csv,data/a.csv,100",
        )
        .await;

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(uris(&report), vec!["s3://bucket/data/a.csv"]);
    assert_eq!(fx.destination.get("bucket", "data/a.csv").await.unwrap(), vec![0; 100]);
    let options = fx.destination.options_for("bucket", "data/a.csv").await.unwrap();
    assert!(options.overwrite_existing);
}

#[tokio::test]
async fn size_mismatch_without_overwrite_fails_put() {
    let fx = Fixture::new();
    fx.source.insert("container", "a.csv", vec![0; 100]).await;
    fx.destination.insert("bucket", "data/a.csv", vec![1; 50]).await;

    let report = fx.run(Fixture::builder(), "a.csv,data/a.csv,100").await;

    assert_eq!(report.status(), JobStatus::Failed);
    assert!(matches!(
        report.failure(),
        Some(ReplicationError::Put { line: 1, .. })
    ));
    assert_eq!(fx.destination.get("bucket", "data/a.csv").await.unwrap(), vec![1; 50]);
}

#[tokio::test]
async fn malformed_line_fails_before_any_io() {
    let fx = Fixture::new();

    let report = fx.run(Fixture::builder(), "onlytwofields,5\n").await;

    assert_eq!(report.status(), JobStatus::Failed);
    match report.failure() {
        Some(ReplicationError::MalformedManifest { line, content, .. }) => {
            assert_eq!(*line, 1);
            assert_eq!(content, "onlytwofields,5");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(fx.source.fetch_calls(), 0);
    assert_eq!(fx.destination.stat_calls(), 0);
    assert_eq!(report.entries_read(), 0);
}

#[tokio::test]
async fn fetch_error_stops_job_with_partial_result() {
    let fx = Fixture::new();
    let manifest = fx.seed(5, 10).await;
    fx.source.fail_fetch_for("obj-3.csv").await;

    let report = fx.run(Fixture::builder(), &manifest).await;

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(
        uris(&report),
        vec!["s3://bucket/out/obj-1.csv", "s3://bucket/out/obj-2.csv"]
    );
    match report.failure() {
        Some(ReplicationError::Fetch {
            line,
            source_identifier,
            ..
        }) => {
            assert_eq!(*line, 3);
            assert_eq!(source_identifier, "obj-3.csv");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    // Entries 4 and 5 were never attempted.
    assert_eq!(fx.source.fetch_calls(), 3);
    assert_eq!(fx.destination.len().await, 2);
    assert_eq!(fx.staging.outstanding(), 0);

    let err = report.into_result().unwrap_err();
    assert_eq!(err.kind(), "fetch");
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn second_run_transfers_nothing() {
    let fx = Fixture::new();
    let manifest = fx.seed(3, 64).await;

    let first = fx.run(Fixture::builder(), &manifest).await;
    assert_eq!(first.transferred(), 3);

    let second = fx.run(Fixture::builder(), &manifest).await;
    assert_eq!(second.status(), JobStatus::Completed);
    assert!(second.uris().is_empty());
    assert_eq!(second.skipped(), 3);
    assert_eq!(fx.destination.put_calls(), 3);
}

#[tokio::test]
async fn staging_released_exactly_once_on_abort() {
    let fx = Fixture::new();
    let manifest = fx.seed(4, 8).await;
    fx.destination.fail_put_for("out/obj-2.csv").await;

    let report = fx.run(Fixture::builder(), &manifest).await;

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(fx.staging.acquired(), 2);
    assert_eq!(fx.staging.released(), 2);
    assert_eq!(fx.staging.outstanding(), 0);
}

#[tokio::test]
async fn staging_failure_is_reported_as_staging() {
    let fx = Fixture::new();
    let manifest = fx.seed(2, 8).await;
    fx.source.fail_staging_for("obj-2.csv").await;

    let report = fx.run(Fixture::builder(), &manifest).await;

    assert_eq!(report.failure().map(|e| e.kind()), Some("staging"));
    assert_eq!(report.transferred(), 1);
}

#[tokio::test]
async fn transfer_options_are_forwarded() {
    let fx = Fixture::new();
    let manifest = fx.seed(1, 8).await;

    let builder = Fixture::builder()
        .server_side_encrypt(true)
        .destination_acl("bucket-owner-full-control");
    fx.run(builder, &manifest).await;

    let options = fx
        .destination
        .options_for("bucket", "out/obj-1.csv")
        .await
        .unwrap();
    assert!(options.server_side_encrypt);
    assert_eq!(
        options.canonical_acl.as_deref(),
        Some("bucket-owner-full-control")
    );
    assert!(!options.overwrite_existing);
}

#[tokio::test]
async fn key_prefix_is_prepended() {
    let fx = Fixture::new();
    fx.source.insert("container", "a.csv", vec![0; 3]).await;

    let report = fx
        .run(
            Fixture::builder().destination_key_prefix("2024/06/"),
            "a.csv,a.csv,3",
        )
        .await;

    assert_eq!(uris(&report), vec!["s3://bucket/2024/06/a.csv"]);
}

// ============================================================================
// Manifest validation and duplicate keys
// ============================================================================

#[tokio::test]
async fn lazy_parsing_fails_at_bad_line() {
    let fx = Fixture::new();
    let mut manifest = fx.seed(2, 4).await;
    manifest.push_str("broken-line\n");

    let report = fx.run(Fixture::builder(), &manifest).await;

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.failure().and_then(|e| e.line()), Some(3));
    assert_eq!(report.transferred(), 2);
}

#[tokio::test]
async fn eager_validation_fails_before_any_transfer() {
    let fx = Fixture::new();
    let mut manifest = fx.seed(2, 4).await;
    manifest.push_str("a.csv,b.csv,not-a-number\n");

    let report = fx
        .run(Fixture::builder().validate_manifest_first(true), &manifest)
        .await;

    assert_eq!(report.status(), JobStatus::Failed);
    assert!(report.failure().unwrap().is_manifest_error());
    assert_eq!(fx.source.fetch_calls(), 0);
    assert!(report.uris().is_empty());
}

#[tokio::test]
async fn duplicate_key_rejected() {
    let fx = Fixture::new();
    fx.source.insert("container", "a.csv", vec![0; 1]).await;
    fx.source.insert("container", "b.csv", vec![0; 2]).await;
    let manifest = "a.csv,same.csv,1\nb.csv,other.csv,2\nb.csv,same.csv,2\n";

    let report = fx.run(Fixture::builder(), manifest).await;

    assert_eq!(
        report.failure(),
        Some(&ReplicationError::DuplicateDestinationKey {
            line: 3,
            first_line: 1,
            destination_key: "same.csv".into(),
        })
    );
    assert_eq!(report.transferred(), 2);
}

#[tokio::test]
async fn duplicate_key_rejected_up_front_when_eager() {
    let fx = Fixture::new();
    fx.source.insert("container", "a.csv", vec![0; 1]).await;
    let manifest = "a.csv,same.csv,1\na.csv,same.csv,1\n";

    let report = fx
        .run(Fixture::builder().validate_manifest_first(true), manifest)
        .await;

    assert_eq!(
        report.failure().map(|e| e.kind()),
        Some("duplicate_destination_key")
    );
    assert_eq!(fx.source.fetch_calls(), 0);
}

#[tokio::test]
async fn duplicate_key_overwrite_last_write_wins() {
    let fx = Fixture::new();
    fx.source.insert("container", "first.csv", b"one".to_vec()).await;
    fx.source.insert("container", "second.csv", b"second".to_vec()).await;
    let manifest = "first.csv,same.csv,3\nsecond.csv,same.csv,6\n";

    let builder = Fixture::builder()
        .duplicate_keys(DuplicateKeyPolicy::Overwrite)
        .overwrite_existing(true);
    let report = fx.run(builder, manifest).await;

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.transferred(), 2);
    assert_eq!(
        fx.destination.get("bucket", "same.csv").await.unwrap(),
        b"second"
    );
}

// ============================================================================
// Dry run and size comparison
// ============================================================================

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let fx = Fixture::new();
    let manifest = fx.seed(3, 16).await;
    fx.destination
        .insert("bucket", "out/obj-2.csv", vec![b'x'; 16])
        .await;

    let report = fx.run(Fixture::builder().dry_run(true), &manifest).await;

    assert!(report.is_dry_run());
    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(
        uris(&report),
        vec!["s3://bucket/out/obj-1.csv", "s3://bucket/out/obj-3.csv"]
    );
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.bytes_written(), 0);
    assert_eq!(fx.destination.put_calls(), 0);
    assert_eq!(fx.destination.len().await, 1);
}

#[tokio::test]
async fn encoded_comparison_recognizes_compressed_objects() {
    let fx = Fixture::new();
    let content = "id,name\n1,alpha\n".repeat(64).into_bytes();
    let size = content.len();
    fx.source.insert("container", "a.csv", content).await;
    let manifest = format!("a.csv,a.csv.gz,{size}\n");

    let builder = || {
        Fixture::builder()
            .compress_before_upload(true)
            .size_comparison(SizeComparison::Encoded)
    };
    let first = fx.run(builder(), &manifest).await;
    assert_eq!(first.transferred(), 1);

    let second = fx.run(builder(), &manifest).await;
    assert_eq!(second.skipped(), 1);
    assert_eq!(fx.destination.put_calls(), 1);
}

#[tokio::test]
async fn manifest_comparison_retransfers_compressed_objects() {
    let fx = Fixture::new();
    let content = "id,name\n1,alpha\n".repeat(64).into_bytes();
    let size = content.len();
    fx.source.insert("container", "a.csv", content).await;
    let manifest = format!("a.csv,a.csv.gz,{size}\n");

    let builder = || {
        Fixture::builder()
            .compress_before_upload(true)
            .overwrite_existing(true)
    };
    fx.run(builder(), &manifest).await;
    let second = fx.run(builder(), &manifest).await;

    // The stored gzip body never matches the raw manifest size.
    assert_eq!(second.transferred(), 1);
    assert_eq!(fx.destination.put_calls(), 2);
}

// ============================================================================
// Worker pool
// ============================================================================

#[tokio::test]
async fn pool_transfers_every_entry_once() {
    let fx = Fixture::with_stores(
        MemoryStore::new().with_latency(Duration::from_millis(5)),
        MemoryStore::new().with_scheme("s3"),
    );
    let manifest = fx.seed(20, 32).await;

    let report = fx.run(Fixture::builder().concurrency(4), &manifest).await;

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.entries_read(), 20);
    let written: HashSet<_> = uris(&report).into_iter().collect();
    assert_eq!(written.len(), 20);
    assert_eq!(report.bytes_written(), 20 * 32);
    assert!(fx.source.max_in_flight() > 1);
    assert!(fx.source.max_in_flight() <= 4);
    assert_eq!(fx.staging.outstanding(), 0);
}

#[tokio::test]
async fn pool_stops_dispatching_after_failure() {
    let fx = Fixture::with_stores(
        MemoryStore::new().with_latency(Duration::from_millis(5)),
        MemoryStore::new().with_scheme("s3"),
    );
    let manifest = fx.seed(30, 8).await;
    fx.source.fail_fetch_for("obj-5.csv").await;

    let report = fx.run(Fixture::builder().concurrency(3), &manifest).await;

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.failure().and_then(|e| e.line()), Some(5));
    assert!(fx.source.fetch_calls() < 30);
    assert!(report.transferred() < 30);
    assert_eq!(fx.staging.outstanding(), 0);
    for uri in report.uris() {
        let key = uri.as_str().trim_start_matches("s3://bucket/");
        assert!(fx.destination.get("bucket", key).await.is_some());
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn cancelled_before_start() {
    let fx = Fixture::new();
    let manifest = fx.seed(3, 8).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = fx
        .run_with_cancel(Fixture::builder(), &manifest, cancel)
        .await;

    assert_eq!(report.status(), JobStatus::Cancelled);
    assert!(report.failure().is_none());
    assert_eq!(fx.source.fetch_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_mid_run_keeps_completed_writes() {
    for concurrency in [1, 4] {
        let fx = Fixture::with_stores(
            MemoryStore::new().with_latency(Duration::from_millis(50)),
            MemoryStore::new().with_scheme("s3"),
        );
        let manifest = fx.seed(20, 8).await;
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            trigger.cancel();
        });

        let report = fx
            .run_with_cancel(Fixture::builder().concurrency(concurrency), &manifest, cancel)
            .await;

        assert_eq!(report.status(), JobStatus::Cancelled);
        assert!(report.transferred() < 20);
        assert_eq!(fx.staging.outstanding(), 0);
        assert_eq!(fx.destination.len().await as u64, report.transferred());
    }
}

#[tokio::test]
async fn run_creates_and_removes_staging_area() {
    let staging_root = tempfile::tempdir().unwrap();
    let source = Arc::new(MemoryStore::new());
    source.insert("container", "a.csv", vec![1; 4]).await;
    let destination = Arc::new(MemoryStore::new());

    let config = Fixture::builder()
        .staging_dir(staging_root.path().to_path_buf())
        .build();
    let job = ReplicationJob::new(config, source, destination);
    let report = job
        .run(
            ManifestReader::new("a.csv,a.csv,4\n".as_bytes()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(uris(&report), vec!["mem://bucket/a.csv"]);
    let leftovers = std::fs::read_dir(staging_root.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn report_serializes_for_callers() {
    let fx = Fixture::new();
    let manifest = fx.seed(1, 4).await;

    let report = fx.run(Fixture::builder(), &manifest).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["status"], "completed");
    assert_eq!(json["uris"][0], "s3://bucket/out/obj-1.csv");
    assert!(json["failure"].is_null());
}
