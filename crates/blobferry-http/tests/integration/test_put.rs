//! Destination writes and header mapping

use std::io::Read;

use blobferry_core::ports::{DestinationStore, StagingArea, StagingHandle, TransferOptions};
use blobferry_http::HttpStoreError;
use flate2::read::GzDecoder;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

async fn staged(area: &StagingArea, data: &[u8]) -> StagingHandle {
    let handle = area.acquire("upload").unwrap();
    handle.write_bytes(data).await.unwrap();
    handle
}

#[tokio::test]
async fn test_put_plain_object() {
    let (server, store) = common::setup_store().await;
    common::mount_put(&server, "/landing/data/a.csv", 200).await;
    let area = StagingArea::temporary().unwrap();
    let handle = staged(&area, b"a,b,c\n").await;

    store
        .put(&handle, "landing", &common::key("data/a.csv"), &TransferOptions::default())
        .await
        .expect("put failed");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.body, b"a,b,c\n");
    assert_eq!(
        request.headers.get("if-none-match").map(|v| v.to_str().unwrap()),
        Some("*")
    );
    assert!(request.headers.get("x-amz-server-side-encryption").is_none());
    assert!(request.headers.get("x-amz-acl").is_none());
    assert!(request.headers.get("content-encoding").is_none());
}

#[tokio::test]
async fn test_put_maps_options_to_headers() {
    let (server, store) = common::setup_store().await;
    Mock::given(method("PUT"))
        .and(path("/landing/a.csv.gz"))
        .and(header("x-amz-server-side-encryption", "AES256"))
        .and(header("x-amz-acl", "bucket-owner-full-control"))
        .and(header("content-encoding", "gzip"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let area = StagingArea::temporary().unwrap();
    let content = "id,value\n".repeat(100);
    let handle = staged(&area, content.as_bytes()).await;
    let options = TransferOptions {
        overwrite_existing: true,
        server_side_encrypt: true,
        canonical_acl: Some("bucket-owner-full-control".into()),
        compress_before_upload: true,
    };

    store
        .put(&handle, "landing", &common::key("a.csv.gz"), &options)
        .await
        .expect("put failed");

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    assert!(request.headers.get("if-none-match").is_none());

    let mut decoded = String::new();
    GzDecoder::new(request.body.as_slice())
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, content);
}

#[tokio::test]
async fn test_put_existing_object_without_overwrite() {
    let (server, store) = common::setup_store().await;
    common::mount_put(&server, "/landing/a.csv", 412).await;
    let area = StagingArea::temporary().unwrap();
    let handle = staged(&area, b"x").await;

    let err = store
        .put(&handle, "landing", &common::key("a.csv"), &TransferOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HttpStoreError>(),
        Some(HttpStoreError::ObjectExists(_))
    ));
}

#[tokio::test]
async fn test_put_server_error() {
    let (server, store) = common::setup_store().await;
    common::mount_put(&server, "/landing/a.csv", 503).await;
    let area = StagingArea::temporary().unwrap();
    let handle = staged(&area, b"x").await;

    let err = store
        .put(&handle, "landing", &common::key("a.csv"), &TransferOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HttpStoreError>(),
        Some(HttpStoreError::ServerError { .. })
    ));
}

#[tokio::test]
async fn test_put_streams_large_object_with_length() {
    let (server, store) = common::setup_store().await;
    common::mount_put(&server, "/landing/big.bin", 200).await;
    let area = StagingArea::temporary().unwrap();
    let content: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    let handle = staged(&area, &content).await;

    store
        .put(&handle, "landing", &common::key("big.bin"), &TransferOptions::default())
        .await
        .expect("put failed");

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    assert_eq!(
        request.headers.get("content-length").map(|v| v.to_str().unwrap().to_string()),
        Some(content.len().to_string())
    );
    assert_eq!(request.body, content);
}

#[tokio::test]
async fn test_put_sends_body_measured_by_encoded_len() {
    let (server, store) = common::setup_store().await;
    common::mount_put(&server, "/landing/a.csv", 200).await;
    let area = StagingArea::temporary().unwrap();
    let handle = staged(&area, "x,y\n".repeat(400).as_bytes()).await;
    let options = TransferOptions {
        compress_before_upload: true,
        ..Default::default()
    };

    let encoded = store.encoded_len(&handle, &options).await.unwrap();
    store
        .put(&handle, "landing", &common::key("a.csv"), &options)
        .await
        .expect("put failed");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body.len() as u64, encoded);
    // Staged file plus a single gzip copy shared by both calls.
    assert_eq!(std::fs::read_dir(area.path()).unwrap().count(), 2);
}
