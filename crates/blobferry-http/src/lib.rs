//! Blobferry HTTP - S3-compatible object store adapter
//!
//! Provides an async adapter for object stores that speak the path-style
//! S3 REST dialect (`/{bucket}/{key}`), such as MinIO or Ceph RGW:
//! - `HEAD` for existence and size
//! - `GET` streamed into a staging file
//! - `PUT` with encryption, ACL, and content-encoding headers
//!
//! ## Modules
//!
//! - [`client`] - HTTP client with endpoint and credential handling
//! - [`store`] - [`SourceStore`]/[`DestinationStore`] implementation
//!
//! [`SourceStore`]: blobferry_core::ports::SourceStore
//! [`DestinationStore`]: blobferry_core::ports::DestinationStore

pub mod client;
pub mod store;

pub use client::ObjectClient;
pub use store::HttpObjectStore;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to an object store endpoint
#[derive(Debug, Error)]
pub enum HttpStoreError {
    /// The endpoint URL cannot be used as a base for object paths
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Credentials are missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conditional write found an existing object
    #[error("Object already exists: {0}")]
    ObjectExists(String),

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {object}")]
    ServerError { status: StatusCode, object: String },

    /// Any other unexpected status
    #[error("Unexpected status {status} for {object}")]
    UnexpectedStatus { status: StatusCode, object: String },

    /// The response is missing data the adapter needs
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl HttpStoreError {
    /// Maps a non-success status onto an error for `object`
    pub fn from_status(status: StatusCode, object: impl Into<String>) -> Self {
        let object = object.into();
        match status {
            StatusCode::UNAUTHORIZED => HttpStoreError::Unauthorized(object),
            StatusCode::FORBIDDEN => HttpStoreError::Forbidden(object),
            StatusCode::NOT_FOUND => HttpStoreError::NotFound(object),
            StatusCode::PRECONDITION_FAILED => HttpStoreError::ObjectExists(object),
            s if s.is_server_error() => HttpStoreError::ServerError { status, object },
            _ => HttpStoreError::UnexpectedStatus { status, object },
        }
    }
}
