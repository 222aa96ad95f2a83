//! In-memory object store
//!
//! Implements both [`SourceStore`] and [`DestinationStore`] over a map of
//! `(bucket, key)` to bytes. Every operation is counted, and failures can be
//! injected per object, which makes it the store of choice for exercising
//! the job engine. URIs use the `mem` scheme by default.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use blobferry_core::{
    codec,
    domain::DestinationKey,
    ports::{
        DestinationStore, ObjectStat, SourceStore, StagingArea, StagingError, StagingHandle,
        TransferOptions,
    },
};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::StoreError;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    options: Option<TransferOptions>,
}

#[derive(Debug, Default)]
struct Faults {
    fetch: HashSet<String>,
    staging: HashSet<String>,
    stat: HashSet<String>,
    put: HashSet<String>,
}

#[derive(Debug, Default)]
struct Counters {
    fetch: AtomicUsize,
    stat: AtomicUsize,
    put: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Object store held entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    faults: Mutex<Faults>,
    counters: Counters,
    latency: Option<Duration>,
    scheme: Option<String>,
}

/// Tracks one in-flight operation for the concurrency high-water mark
struct InFlight<'a>(&'a Counters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports URIs under `scheme` instead of `mem`
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Delays every fetch, stat, and put by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    // --- Contents ---

    /// Stores `data` at `bucket/key` directly, bypassing counters
    pub async fn insert(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.objects.lock().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                options: None,
            },
        );
    }

    /// Returns the bytes stored at `bucket/key`
    pub async fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
    }

    /// Returns the options the object at `bucket/key` was last put with
    pub async fn options_for(&self, bucket: &str, key: &str) -> Option<TransferOptions> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .and_then(|o| o.options.clone())
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // --- Fault injection ---

    /// Makes fetching `identifier` fail as a source error
    pub async fn fail_fetch_for(&self, identifier: &str) {
        self.faults.lock().await.fetch.insert(identifier.to_string());
    }

    /// Makes fetching `identifier` fail as a local staging error
    pub async fn fail_staging_for(&self, identifier: &str) {
        self.faults.lock().await.staging.insert(identifier.to_string());
    }

    /// Makes looking up `key` fail
    pub async fn fail_stat_for(&self, key: &str) {
        self.faults.lock().await.stat.insert(key.to_string());
    }

    /// Makes writing `key` fail
    pub async fn fail_put_for(&self, key: &str) {
        self.faults.lock().await.put.insert(key.to_string());
    }

    // --- Counters ---

    pub fn fetch_calls(&self) -> usize {
        self.counters.fetch.load(Ordering::SeqCst)
    }

    pub fn stat_calls(&self) -> usize {
        self.counters.stat.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.counters.put.load(Ordering::SeqCst)
    }

    /// Highest number of operations observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait::async_trait]
impl SourceStore for MemoryStore {
    #[instrument(skip(self, staging))]
    async fn fetch(
        &self,
        container: &str,
        identifier: &str,
        staging: &StagingArea,
    ) -> anyhow::Result<StagingHandle> {
        self.counters.fetch.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.counters);
        self.simulate_latency().await;

        {
            let faults = self.faults.lock().await;
            if faults.staging.contains(identifier) {
                return Err(StagingError {
                    path: staging.path().to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "no space left"),
                }
                .into());
            }
            if faults.fetch.contains(identifier) {
                return Err(StoreError::Injected(format!("fetch {identifier}")).into());
            }
        }

        let data = self
            .get(container, identifier)
            .await
            .ok_or_else(|| StoreError::NotFound {
                container: container.to_string(),
                identifier: identifier.to_string(),
            })?;

        let handle = staging.acquire(identifier)?;
        handle.write_bytes(&data).await?;
        debug!(bytes = data.len(), "Fetched from memory");
        Ok(handle)
    }
}

#[async_trait::async_trait]
impl DestinationStore for MemoryStore {
    fn scheme(&self) -> &str {
        self.scheme.as_deref().unwrap_or("mem")
    }

    #[instrument(skip(self))]
    async fn stat(&self, bucket: &str, key: &DestinationKey) -> anyhow::Result<Option<ObjectStat>> {
        self.counters.stat.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.counters);
        self.simulate_latency().await;

        if self.faults.lock().await.stat.contains(key.as_str()) {
            return Err(StoreError::Injected(format!("stat {key}")).into());
        }

        Ok(self
            .get(bucket, key.as_str())
            .await
            .map(|data| ObjectStat {
                size_bytes: data.len() as u64,
            }))
    }

    #[instrument(skip(self, staged, options))]
    async fn put(
        &self,
        staged: &StagingHandle,
        bucket: &str,
        key: &DestinationKey,
        options: &TransferOptions,
    ) -> anyhow::Result<()> {
        self.counters.put.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.counters);
        self.simulate_latency().await;

        if self.faults.lock().await.put.contains(key.as_str()) {
            return Err(StoreError::Injected(format!("put {key}")).into());
        }

        let body = codec::upload_body(staged, options).await?.read_bytes().await?;

        let mut objects = self.objects.lock().await;
        let slot = (bucket.to_string(), key.to_string());
        if !options.overwrite_existing && objects.contains_key(&slot) {
            return Err(StoreError::ObjectExists {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }
            .into());
        }
        debug!(bytes = body.len(), "Stored in memory");
        objects.insert(
            slot,
            StoredObject {
                data: body,
                options: Some(options.clone()),
            },
        );
        Ok(())
    }
}
