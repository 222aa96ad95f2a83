//! Full replication jobs against a mock endpoint

use std::sync::Arc;

use blobferry_core::{
    config::JobConfigBuilder,
    domain::{JobStatus, ReplicationError},
    manifest::ManifestReader,
    ports::StagingArea,
};
use blobferry_sync::ReplicationJob;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, ResponseTemplate};

use crate::common;

fn job(store: blobferry_http::HttpObjectStore) -> ReplicationJob {
    let store = Arc::new(store);
    let config = JobConfigBuilder::new()
        .source_container("raw")
        .destination_bucket("bucket")
        .build_validated()
        .unwrap();
    ReplicationJob::new(config, store.clone(), store)
}

#[tokio::test]
async fn test_job_uploads_absent_object() {
    let (server, store) = common::setup_store().await;
    common::mount_get(&server, "/raw/photo.jpg", &[9u8; 2048]).await;
    common::mount_head_status(&server, "/bucket/img/photo.jpg", 404).await;
    common::mount_put(&server, "/bucket/img/photo.jpg", 200).await;
    let staging = Arc::new(StagingArea::temporary().unwrap());

    let report = job(store)
        .run_with_staging(
            ManifestReader::new("photo.jpg,img/photo.jpg,2048\n".as_bytes()),
            Arc::clone(&staging),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(report.status(), JobStatus::Completed);
    let uris: Vec<_> = report.uris().iter().map(|u| u.to_string()).collect();
    assert_eq!(uris, vec!["s3://bucket/img/photo.jpg"]);
    assert_eq!(staging.outstanding(), 0);
}

#[tokio::test]
async fn test_job_skips_matching_object_without_put() {
    let (server, store) = common::setup_store().await;
    common::mount_get(&server, "/raw/a.csv", &[1u8; 100]).await;
    common::mount_head(&server, "/bucket/data/a.csv", 100).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = job(store)
        .run(
            ManifestReader::new("a.csv,data/a.csv,100\n".as_bytes()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.status(), JobStatus::Completed);
    assert!(report.uris().is_empty());
    assert_eq!(report.skipped(), 1);
}

#[tokio::test]
async fn test_job_put_rejection_is_put_error() {
    let (server, store) = common::setup_store().await;
    common::mount_get(&server, "/raw/a.csv", b"abc").await;
    common::mount_head_status(&server, "/bucket/a.csv", 404).await;
    common::mount_put(&server, "/bucket/a.csv", 403).await;

    let report = job(store)
        .run(
            ManifestReader::new("a.csv,a.csv,3\n".as_bytes()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    match report.failure() {
        Some(ReplicationError::Put {
            line,
            destination_key,
            message,
            ..
        }) => {
            assert_eq!(*line, 1);
            assert_eq!(destination_key, "a.csv");
            assert!(message.contains("Forbidden"));
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}
