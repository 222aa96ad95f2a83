//! Shared test helpers for object store integration tests
//!
//! Each helper mounts one endpoint on a wiremock server. `setup_store`
//! returns a store pointed at a fresh server.

use blobferry_core::domain::DestinationKey;
use blobferry_http::{client::ObjectClient, store::HttpObjectStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Token the test store authenticates with
pub const TEST_TOKEN: &str = "test-token";

/// Starts a mock server and returns a store that talks to it
pub async fn setup_store() -> (MockServer, HttpObjectStore) {
    let server = MockServer::start().await;
    let client = ObjectClient::new(&server.uri())
        .expect("mock server uri")
        .with_token(TEST_TOKEN);
    (server, HttpObjectStore::new(client))
}

pub fn key(k: &str) -> DestinationKey {
    DestinationKey::new("", k).unwrap()
}

/// Mounts `HEAD {object_path}` answering with an object of `size` bytes
pub async fn mount_head(server: &MockServer, object_path: &str, size: usize) {
    Mock::given(method("HEAD"))
        .and(path(object_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; size]))
        .mount(server)
        .await;
}

/// Mounts `HEAD {object_path}` answering with `status` and no body
pub async fn mount_head_status(server: &MockServer, object_path: &str, status: u16) {
    Mock::given(method("HEAD"))
        .and(path(object_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Mounts `GET {object_path}` returning `body`
pub async fn mount_get(server: &MockServer, object_path: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(object_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Mounts `PUT {object_path}` answering with `status`
pub async fn mount_put(server: &MockServer, object_path: &str, status: u16) {
    Mock::given(method("PUT"))
        .and(path(object_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
