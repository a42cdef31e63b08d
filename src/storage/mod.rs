//! Storage layer
//!
//! Persistence contracts the engine depends on, and the SQLite implementation of all of
//! them. Conversion records and walker priorities are owned by the engine; the node store
//! only receives batches of changed nodes from the aggregation/sync unit of work.

mod conversions;
mod sqlite;

pub use conversions::{IssueConversionInformation, TimelineItemConversionInformation};
pub use sqlite::{SqliteStore, StoreConfig, StoreStats};

use crate::graph::{IssueGraph, IssueId, Node, NodeRef, TimelineItemId};
use crate::walker::CursorResourceWalkerData;
use crate::Result;
use async_trait::async_trait;

/// Batch of node writes produced by one logical operation
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub updated: Vec<Node>,
    pub deleted: Vec<NodeRef>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Persistent mapping between external and internal IDs
#[async_trait]
pub trait ConversionStore: Send + Sync {
    async fn issue_conversion_by_external(
        &self,
        source_id: &str,
        external_id: &str,
    ) -> Result<Option<IssueConversionInformation>>;

    async fn issue_conversion_by_issue(
        &self,
        source_id: &str,
        issue: &IssueId,
    ) -> Result<Option<IssueConversionInformation>>;

    /// Insert or replace, keyed by (source, external) and (source, issue)
    async fn save_issue_conversion(&self, info: &IssueConversionInformation) -> Result<()>;

    async fn list_issue_conversions(&self, source_id: &str)
        -> Result<Vec<IssueConversionInformation>>;

    async fn timeline_conversion_by_external(
        &self,
        source_id: &str,
        external_id: &str,
    ) -> Result<Option<TimelineItemConversionInformation>>;

    async fn timeline_conversion_by_item(
        &self,
        source_id: &str,
        item: &TimelineItemId,
    ) -> Result<Option<TimelineItemConversionInformation>>;

    /// Insert or replace, keyed by (source, external) and (source, item)
    async fn save_timeline_conversion(&self, info: &TimelineItemConversionInformation)
        -> Result<()>;
}

/// Persisted scheduling state of resource walkers
#[async_trait]
pub trait WalkerPriorityStore: Send + Sync {
    async fn walker_priority(&self, source_id: &str, resource_name: &str) -> Result<Option<f64>>;

    async fn set_walker_priority(&self, data: &CursorResourceWalkerData) -> Result<()>;

    async fn list_walker_priorities(&self, source_id: &str)
        -> Result<Vec<CursorResourceWalkerData>>;
}

/// Node persistence behind the in-memory graph
#[async_trait]
pub trait GraphRepository: Send + Sync {
    /// Write one batch of changes atomically
    async fn save(&self, changes: ChangeSet) -> Result<()>;

    /// Load every stored node
    async fn load_graph(&self) -> Result<IssueGraph>;
}
