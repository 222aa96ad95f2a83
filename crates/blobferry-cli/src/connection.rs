//! Connection reference resolution
//!
//! The job configuration names its stores with opaque references. The CLI
//! understands two kinds, told apart by URL scheme:
//!
//! - `file:///srv/objects` - a [`LocalDirStore`] rooted at that directory
//! - `http://host:port` or `https://...` - an [`HttpObjectStore`] talking
//!   path-style S3 REST to that endpoint. A bearer token is read from
//!   `BLOBFERRY_HTTP_TOKEN` when set.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use blobferry_core::ports::{DestinationStore, SourceStore};
use blobferry_http::{client::ObjectClient, store::HttpObjectStore};
use blobferry_sync::LocalDirStore;
use tracing::debug;
use url::Url;

/// Environment variable holding the HTTP bearer token
pub const TOKEN_ENV: &str = "BLOBFERRY_HTTP_TOKEN";

/// A parsed connection reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    LocalDir(PathBuf),
    Http(Url),
}

impl Connection {
    pub fn parse(reference: &str) -> Result<Self> {
        if reference.trim().is_empty() {
            bail!("connection reference is empty");
        }
        let url = Url::parse(reference)
            .with_context(|| format!("invalid connection reference '{reference}'"))?;

        match url.scheme() {
            "file" => {
                let root = url
                    .to_file_path()
                    .map_err(|_| anyhow!("'{reference}' is not an absolute local path"))?;
                Ok(Connection::LocalDir(root))
            }
            "http" | "https" => Ok(Connection::Http(url)),
            other => bail!("unsupported connection scheme '{other}' in '{reference}'"),
        }
    }
}

fn http_store(endpoint: &Url, token: Option<String>) -> Result<HttpObjectStore> {
    let mut client = ObjectClient::new(endpoint.as_str())?;
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        client = client.with_token(token);
    }
    Ok(HttpObjectStore::new(client))
}

fn token_from_env() -> Option<String> {
    std::env::var(TOKEN_ENV).ok()
}

/// Resolves the source store reference
pub fn open_source(reference: &str) -> Result<Arc<dyn SourceStore>> {
    let store: Arc<dyn SourceStore> = match Connection::parse(reference)? {
        Connection::LocalDir(root) => {
            debug!(root = %root.display(), "Source is a local directory");
            Arc::new(LocalDirStore::new(root))
        }
        Connection::Http(endpoint) => {
            debug!(endpoint = %endpoint, "Source is an HTTP object store");
            Arc::new(http_store(&endpoint, token_from_env())?)
        }
    };
    Ok(store)
}

/// Resolves the destination store reference
///
/// A local destination root is created if missing.
pub async fn open_destination(reference: &str) -> Result<Arc<dyn DestinationStore>> {
    let store: Arc<dyn DestinationStore> = match Connection::parse(reference)? {
        Connection::LocalDir(root) => {
            debug!(root = %root.display(), "Destination is a local directory");
            let store = LocalDirStore::new(root);
            store.ensure_root().await?;
            Arc::new(store)
        }
        Connection::Http(endpoint) => {
            debug!(endpoint = %endpoint, "Destination is an HTTP object store");
            Arc::new(http_store(&endpoint, token_from_env())?)
        }
    };
    Ok(store)
}
