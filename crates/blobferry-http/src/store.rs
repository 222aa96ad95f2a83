//! HTTP object store adapter
//!
//! Implements [`SourceStore`] and [`DestinationStore`] against an
//! S3-compatible endpoint using path-style requests.
//!
//! ## Design Notes
//!
//! - `HEAD` answers `stat`; a 404 is a valid "absent" result, and the size
//!   comes from the `Content-Length` header.
//! - `GET` bodies are streamed chunk by chunk into the staging file, and
//!   `PUT` bodies are streamed from it (or from its gzip copy). Neither is
//!   buffered whole in memory.
//! - `PUT` maps [`TransferOptions`] onto headers:
//!   `x-amz-server-side-encryption`, `x-amz-acl`, `Content-Encoding`, and
//!   `If-None-Match: *` when overwriting is disabled. A 412 reply means the
//!   object already exists.

use blobferry_core::{
    codec,
    domain::DestinationKey,
    ports::{DestinationStore, ObjectStat, SourceStore, StagingArea, StagingHandle, TransferOptions},
};
use futures_util::StreamExt;
use reqwest::{
    header::{CONTENT_ENCODING, CONTENT_LENGTH, IF_NONE_MATCH},
    Body, Method, StatusCode,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};

use crate::{client::ObjectClient, HttpStoreError};

/// Header requesting server-side encryption
pub const SSE_HEADER: &str = "x-amz-server-side-encryption";

/// Header carrying the canned ACL
pub const ACL_HEADER: &str = "x-amz-acl";

/// Encryption algorithm requested when `server_side_encrypt` is set
pub const SSE_ALGORITHM: &str = "AES256";

/// Object store reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: ObjectClient,
}

impl HttpObjectStore {
    /// Wraps a configured client
    pub fn new(client: ObjectClient) -> Self {
        Self { client }
    }

    /// Returns the underlying client
    pub fn client(&self) -> &ObjectClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl SourceStore for HttpObjectStore {
    #[instrument(skip(self, staging))]
    async fn fetch(
        &self,
        container: &str,
        identifier: &str,
        staging: &StagingArea,
    ) -> anyhow::Result<StagingHandle> {
        let object = format!("{container}/{identifier}");
        let response = self
            .client
            .request(Method::GET, container, identifier)?
            .send()
            .await
            .map_err(HttpStoreError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpStoreError::from_status(status, object).into());
        }

        let handle = staging.acquire(identifier)?;
        let mut writer = handle.writer().await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(HttpStoreError::from)?;
            writer.write_chunk(&chunk).await?;
        }
        let bytes = writer.finish().await?;

        debug!(bytes, "Downloaded object");
        Ok(handle)
    }
}

#[async_trait::async_trait]
impl DestinationStore for HttpObjectStore {
    fn scheme(&self) -> &str {
        "s3"
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn stat(&self, bucket: &str, key: &DestinationKey) -> anyhow::Result<Option<ObjectStat>> {
        let response = self
            .client
            .request(Method::HEAD, bucket, key.as_str())?
            .send()
            .await
            .map_err(HttpStoreError::from)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("object not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(HttpStoreError::from_status(status, format!("{bucket}/{key}")).into());
        }

        let size_bytes = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                HttpStoreError::InvalidResponse(format!(
                    "missing or invalid Content-Length for {bucket}/{key}"
                ))
            })?;

        debug!(size_bytes, "object found");
        Ok(Some(ObjectStat { size_bytes }))
    }

    #[instrument(skip(self, staged, options), fields(key = %key))]
    async fn put(
        &self,
        staged: &StagingHandle,
        bucket: &str,
        key: &DestinationKey,
        options: &TransferOptions,
    ) -> anyhow::Result<()> {
        let body = codec::upload_body(staged, options).await?;
        let bytes = body.len();
        let file = body.open().await?;

        let mut request = self
            .client
            .request(Method::PUT, bucket, key.as_str())?
            .header(CONTENT_LENGTH, bytes)
            .body(Body::wrap_stream(ReaderStream::new(file)));
        if options.server_side_encrypt {
            request = request.header(SSE_HEADER, SSE_ALGORITHM);
        }
        if let Some(acl) = &options.canonical_acl {
            request = request.header(ACL_HEADER, acl.as_str());
        }
        if let Some(encoding) = body.content_encoding() {
            request = request.header(CONTENT_ENCODING, encoding);
        }
        if !options.overwrite_existing {
            request = request.header(IF_NONE_MATCH, "*");
        }

        let response = request.send().await.map_err(HttpStoreError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpStoreError::from_status(status, format!("{bucket}/{key}")).into());
        }

        debug!(bytes, "Uploaded object");
        Ok(())
    }
}
