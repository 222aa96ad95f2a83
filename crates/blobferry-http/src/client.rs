//! Object store HTTP client
//!
//! Thin wrapper around `reqwest::Client` that knows the endpoint, builds
//! path-style object URLs (`{endpoint}/{bucket}/{key}`) and attaches the
//! optional bearer token.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use blobferry_http::client::ObjectClient;
//! use reqwest::Method;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = ObjectClient::new("http://localhost:9000")?.with_token("secret");
//! let response = client.request(Method::HEAD, "landing", "img/photo.jpg")?.send().await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;
use url::Url;

use crate::HttpStoreError;

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client bound to one object store endpoint
#[derive(Debug, Clone)]
pub struct ObjectClient {
    /// The underlying HTTP client
    client: Client,
    /// Endpoint all object paths are resolved against
    endpoint: Url,
    /// Optional bearer token
    token: Option<String>,
}

impl ObjectClient {
    /// Creates a client for `endpoint` (e.g. `http://minio:9000`)
    pub fn new(endpoint: &str) -> Result<Self, HttpStoreError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Creates a client whose requests time out after `timeout`
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, HttpStoreError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| HttpStoreError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(HttpStoreError::InvalidEndpoint(endpoint.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            token: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns the endpoint URL
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Builds the URL of `bucket/key`
    ///
    /// Each key segment is percent-encoded on its own, so `/` in a key
    /// stays a path separator.
    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url, HttpStoreError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| HttpStoreError::InvalidEndpoint(self.endpoint.to_string()))?;
            segments.pop_if_empty().push(bucket);
            for part in key.split('/') {
                segments.push(part);
            }
        }
        Ok(url)
    }

    /// Creates a request for `bucket/key`, with credentials attached
    pub fn request(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
    ) -> Result<RequestBuilder, HttpStoreError> {
        let url = self.object_url(bucket, key)?;
        debug!(%method, %url, "Building object request");
        let builder = self.client.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }
}
