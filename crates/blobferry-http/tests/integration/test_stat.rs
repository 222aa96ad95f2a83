//! Destination lookups via HEAD

use blobferry_core::ports::{DestinationStore, ObjectStat};
use blobferry_http::HttpStoreError;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_stat_existing_object_reports_size() {
    let (server, store) = common::setup_store().await;
    common::mount_head(&server, "/landing/data/a.csv", 100).await;

    let stat = store
        .stat("landing", &common::key("data/a.csv"))
        .await
        .expect("stat failed");

    assert_eq!(stat, Some(ObjectStat { size_bytes: 100 }));
}

#[tokio::test]
async fn test_stat_missing_object_is_absent() {
    let (server, store) = common::setup_store().await;
    common::mount_head_status(&server, "/landing/data/a.csv", 404).await;

    let stat = store
        .stat("landing", &common::key("data/a.csv"))
        .await
        .expect("404 is not an error");

    assert_eq!(stat, None);
}

#[tokio::test]
async fn test_stat_forbidden_is_error() {
    let (server, store) = common::setup_store().await;
    common::mount_head_status(&server, "/landing/secret.csv", 403).await;

    let err = store
        .stat("landing", &common::key("secret.csv"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HttpStoreError>(),
        Some(HttpStoreError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_stat_sends_bearer_token() {
    let (server, store) = common::setup_store().await;
    Mock::given(method("HEAD"))
        .and(path("/landing/a.csv"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 3]))
        .expect(1)
        .mount(&server)
        .await;

    let stat = store.stat("landing", &common::key("a.csv")).await.unwrap();
    assert_eq!(stat.map(|s| s.size_bytes), Some(3));
}
