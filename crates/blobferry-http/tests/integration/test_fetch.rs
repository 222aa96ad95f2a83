//! Source downloads into staging

use blobferry_core::ports::{SourceStore, StagingArea};
use blobferry_http::HttpStoreError;

use crate::common;

#[tokio::test]
async fn test_fetch_streams_body_into_staging() {
    let (server, store) = common::setup_store().await;
    let content: Vec<u8> = (0..1_048_576).map(|i| (i % 251) as u8).collect();
    common::mount_get(&server, "/raw/exports/big.bin", &content).await;
    let staging = StagingArea::temporary().unwrap();

    let handle = store
        .fetch("raw", "exports/big.bin", &staging)
        .await
        .expect("fetch failed");

    assert_eq!(handle.len().await.unwrap(), 1_048_576);
    assert_eq!(handle.read_bytes().await.unwrap(), content);
    assert_eq!(handle.label(), "exports/big.bin");
}

#[tokio::test]
async fn test_fetch_empty_object() {
    let (server, store) = common::setup_store().await;
    common::mount_get(&server, "/raw/empty.txt", &[]).await;
    let staging = StagingArea::temporary().unwrap();

    let handle = store.fetch("raw", "empty.txt", &staging).await.unwrap();
    assert_eq!(handle.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_fetch_missing_object_stages_nothing() {
    let (_server, store) = common::setup_store().await;
    let staging = StagingArea::temporary().unwrap();

    // Unmatched requests get a 404 from wiremock.
    let err = store.fetch("raw", "ghost.csv", &staging).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HttpStoreError>(),
        Some(HttpStoreError::NotFound(_))
    ));
    assert_eq!(staging.acquired(), 0);
}
