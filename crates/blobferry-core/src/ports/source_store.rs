//! Source store port (driven/secondary port)
//!
//! The store objects are replicated *from*. Its only job is to
//! materialize one object into a staging handle.

use crate::ports::staging::{StagingArea, StagingHandle};

/// Port trait for the store objects are read from
///
/// ## Implementation Notes
///
/// - Acquire the handle from `staging` first and write the object into it;
///   if the write fails, dropping the handle cleans up the partial file.
/// - Staging failures should be returned as (or wrap) a
///   [`StagingError`](crate::ports::staging::StagingError) so the job can
///   tell local resource exhaustion apart from a source-side failure.
/// - A missing object is an error, not an empty handle.
#[async_trait::async_trait]
pub trait SourceStore: Send + Sync {
    /// Stages the object `identifier` from `container`
    async fn fetch(
        &self,
        container: &str,
        identifier: &str,
        staging: &StagingArea,
    ) -> anyhow::Result<StagingHandle>;
}
