//! archsync - Issue Synchronization & Aggregation Engine
//!
//! Mirrors issues between external trackers (GitHub, Jira, ...) and an architecture
//! graph of components, versions and interfaces, and keeps per-component rollups of those
//! issues consistent as both sides change.
//!
//! # Architecture
//!
//! - **graph**: Core data structures (Issue, TimelineItem, ComponentVersion, Interface,
//!   AggregatedIssue) and the `IssueGraph` arena
//! - **aggregation**: Incremental maintenance of aggregated issues
//! - **cleaner**: Timeline replay rebuilding denormalized issue fields
//! - **dereplication**: Duplicate detection for incoming issues and comments
//! - **walker**: Budget-gated, priority-ordered remote fetching
//! - **sync**: The orchestrator, tracker adapter contracts and the daemon
//! - **storage**: Conversion records, walker priorities and node persistence (SQLite)
//! - **config**: YAML configuration

// Core modules
pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod storage;

// Engine
pub mod aggregation;
pub mod cleaner;
pub mod dereplication;
pub mod sync;
pub mod walker;

#[cfg(test)]
mod testing;

// Re-exports
pub use error::{ArchSyncError, ErrorClass, Result};
