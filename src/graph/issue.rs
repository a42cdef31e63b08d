//! Issue data structures
//!
//! Issues, their type/state vocabulary, users and labels, and the records that tie an
//! issue to a project on an external tracker.

use super::architecture::{AffectedEntityRef, TrackableRef};
use super::ids::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Issue type (bug, feature request, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueType {
    pub id: IssueTypeId,
    pub name: String,
}

/// Issue state; `is_open` is what aggregation keys on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueState {
    pub id: IssueStateId,
    pub name: String,
    pub is_open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Marks the dummy user sync writes are attributed to
    #[serde(default)]
    pub is_system: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Directed relation between two issues ("blocks", "duplicates", ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRelation {
    pub id: IssueRelationId,
    pub start: IssueId,
    pub end: IssueId,
    #[serde(default)]
    pub relation_type: Option<String>,
}

/// Core issue structure
///
/// Everything below `timeline` is denormalized from the timeline and rebuilt by the
/// cleaner; `aggregated_by` is maintained by the aggregation updater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub created_by: UserId,
    pub issue_type: IssueTypeId,
    pub state: IssueStateId,
    #[serde(default)]
    pub templated_fields: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub timeline: Vec<TimelineItemId>,
    #[serde(default)]
    pub trackables: BTreeSet<TrackableRef>,
    #[serde(default)]
    pub affects: BTreeSet<AffectedEntityRef>,
    #[serde(default)]
    pub aggregated_by: BTreeSet<AggregatedIssueId>,
    #[serde(default)]
    pub labels: BTreeSet<LabelId>,
    #[serde(default)]
    pub artefacts: BTreeSet<String>,
    /// Active assignment items mapped to their current assignment type
    #[serde(default)]
    pub assignments: BTreeMap<TimelineItemId, Option<String>>,
    #[serde(default)]
    pub comments: Vec<TimelineItemId>,
    #[serde(default)]
    pub outgoing_relations: BTreeSet<IssueRelationId>,
    #[serde(default)]
    pub incoming_relations: BTreeSet<IssueRelationId>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Issue {
    /// Create a new issue with an empty timeline
    pub fn new(
        id: impl Into<IssueId>,
        title: impl Into<String>,
        created_by: UserId,
        issue_type: IssueTypeId,
        state: IssueStateId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: String::new(),
            created_at,
            last_updated_at: created_at,
            created_by,
            issue_type,
            state,
            templated_fields: BTreeMap::new(),
            timeline: Vec::new(),
            trackables: BTreeSet::new(),
            affects: BTreeSet::new(),
            aggregated_by: BTreeSet::new(),
            labels: BTreeSet::new(),
            artefacts: BTreeSet::new(),
            assignments: BTreeMap::new(),
            comments: Vec::new(),
            outgoing_relations: BTreeSet::new(),
            incoming_relations: BTreeSet::new(),
            is_deleted: false,
        }
    }

    /// Builder-style body setter
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder-style trackable setter
    pub fn with_trackable(mut self, trackable: TrackableRef) -> Self {
        self.trackables.insert(trackable);
        self
    }
}

/// Feature gates for pushing changes to the external tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingGates {
    pub enabled: bool,
    pub labels: bool,
    pub comments: bool,
    pub title_changed: bool,
    pub assignments: bool,
    pub states: bool,
}

impl Default for OutgoingGates {
    fn default() -> Self {
        Self {
            enabled: false,
            labels: true,
            comments: true,
            title_changed: true,
            assignments: true,
            states: true,
        }
    }
}

impl OutgoingGates {
    /// Everything on
    pub fn all() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }
}

/// A project on an external tracker, synced into one trackable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImsProject {
    pub id: ImsProjectId,
    pub name: String,
    pub trackable: TrackableRef,
    #[serde(default)]
    pub outgoing: OutgoingGates,
    #[serde(default)]
    pub templated_fields: BTreeMap<String, serde_json::Value>,
}

impl ImsProject {
    pub fn new(id: impl Into<ImsProjectId>, name: impl Into<String>, trackable: TrackableRef) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            trackable,
            outgoing: OutgoingGates::default(),
            templated_fields: BTreeMap::new(),
        }
    }

    pub fn with_outgoing(mut self, outgoing: OutgoingGates) -> Self {
        self.outgoing = outgoing;
        self
    }
}

/// Link between an issue and an ImsProject it has been seen in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImsIssue {
    pub id: ImsIssueId,
    pub ims_project: ImsProjectId,
    pub issue: IssueId,
    #[serde(default)]
    pub templated_fields: BTreeMap<String, serde_json::Value>,
}
