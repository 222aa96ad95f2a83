//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the capability interfaces the engine depends on; concrete
//! adapters live in other crates and are chosen by the caller.
//!
//! ## Ports Overview
//!
//! - [`SourceStore`] - Stages source objects locally
//! - [`DestinationStore`] - Looks up and writes destination objects
//! - [`StagingArea`] - Per-job local scratch space with scoped handles

pub mod destination_store;
pub mod source_store;
pub mod staging;

pub use destination_store::{DestinationStore, ObjectStat, TransferOptions};
pub use source_store::SourceStore;
pub use staging::{StagingArea, StagingError, StagingHandle, StagingWriter};
