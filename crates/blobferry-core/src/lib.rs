//! Blobferry Core - Domain logic for manifest-driven object replication
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `ManifestEntry`, `TransferTask`, `DestinationKey`, `ReplicationReport`
//! - **Manifest parsing** - `ManifestReader`, a lazy reader of `source,suffix,size` lines
//! - **Planning** - `SyncPlanner`, the size-equality skip-or-transfer decision
//! - **Port definitions** - Traits for adapters: `SourceStore`, `DestinationStore`,
//!   plus the `StagingArea` every fetched object passes through
//! - **Configuration** - `JobConfig`, loaded from YAML
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement; the job that
//! drives them lives in `blobferry-sync`.

pub mod codec;
pub mod config;
pub mod domain;
pub mod manifest;
pub mod planner;
pub mod ports;
