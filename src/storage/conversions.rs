//! Conversion information records
//!
//! The join between an external tracker's identifiers and internal issue / timeline item
//! IDs. Their presence is what makes incremental sync idempotent, and what marks a local
//! timeline item as already synced.

use crate::graph::{IssueId, TimelineItemId};
use serde::{Deserialize, Serialize};

/// Mapping of one external issue to an internal issue
///
/// Unique per (source_id, external_id) and per (source_id, issue_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueConversionInformation {
    /// Sync source scope (the ImsProject ID)
    pub source_id: String,
    /// Stable external key of the issue
    pub external_id: String,
    /// Filled in once the issue is materialized locally
    #[serde(default)]
    pub issue_id: Option<IssueId>,
    /// Tracker-specific payload (issue number, node ID, ...)
    #[serde(default)]
    pub data: serde_json::Value,
}

impl IssueConversionInformation {
    pub fn new(source_id: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            external_id: external_id.into(),
            issue_id: None,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_issue(mut self, issue: IssueId) -> Self {
        self.issue_id = Some(issue);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Mapping of one external timeline event to an internal timeline item
///
/// A record without `external_id` marks an item as synced without it ever having been
/// pushed (used for dereplication artefacts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItemConversionInformation {
    pub source_id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub timeline_item_id: Option<TimelineItemId>,
    /// Tracker-specific subtype tag (e.g. "github_comment", "jira_changelog")
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl TimelineItemConversionInformation {
    pub fn new(source_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            external_id: None,
            timeline_item_id: None,
            kind: kind.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_timeline_item(mut self, item: TimelineItemId) -> Self {
        self.timeline_item_id = Some(item);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Record marking a locally created item as already synced
    pub fn fake_synced(source_id: impl Into<String>, item: TimelineItemId) -> Self {
        Self::new(source_id, "fake_synced").with_timeline_item(item)
    }
}
