//! Timeline items
//!
//! The ordered, immutable event log of an issue. Every denormalized field on `Issue`
//! can be rebuilt by replaying these in order.

use super::architecture::{AffectedEntityRef, TrackableRef};
use super::ids::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single event on an issue's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    pub id: TimelineItemId,
    pub issue: IssueId,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub kind: TimelineItemKind,
}

/// Event kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineItemKind {
    IssueComment {
        body: String,
        #[serde(default)]
        answers: Option<TimelineItemId>,
        #[serde(default)]
        is_deleted: bool,
    },
    AddedLabel {
        label: LabelId,
    },
    RemovedLabel {
        label: LabelId,
    },
    AddedArtefact {
        artefact: String,
    },
    RemovedArtefact {
        artefact: String,
    },
    StateChanged {
        old_state: IssueStateId,
        new_state: IssueStateId,
    },
    TitleChanged {
        old_title: String,
        new_title: String,
    },
    TypeChanged {
        old_type: IssueTypeId,
        new_type: IssueTypeId,
    },
    TemplatedFieldChanged {
        field_name: String,
        old_value: serde_json::Value,
        new_value: serde_json::Value,
    },
    Assignment {
        user: UserId,
        #[serde(default)]
        assignment_type: Option<String>,
    },
    RemovedAssignment {
        assignment: TimelineItemId,
    },
    AssignmentTypeChanged {
        assignment: TimelineItemId,
        old_type: Option<String>,
        new_type: Option<String>,
    },
    AddedToTrackable {
        trackable: TrackableRef,
    },
    RemovedFromTrackable {
        trackable: TrackableRef,
    },
    AddedAffectedEntity {
        entity: AffectedEntityRef,
    },
    RemovedAffectedEntity {
        entity: AffectedEntityRef,
    },
}

impl TimelineItemKind {
    /// Stable name used in logs and conversion records
    pub fn name(&self) -> &'static str {
        match self {
            TimelineItemKind::IssueComment { .. } => "issue_comment",
            TimelineItemKind::AddedLabel { .. } => "added_label",
            TimelineItemKind::RemovedLabel { .. } => "removed_label",
            TimelineItemKind::AddedArtefact { .. } => "added_artefact",
            TimelineItemKind::RemovedArtefact { .. } => "removed_artefact",
            TimelineItemKind::StateChanged { .. } => "state_changed",
            TimelineItemKind::TitleChanged { .. } => "title_changed",
            TimelineItemKind::TypeChanged { .. } => "type_changed",
            TimelineItemKind::TemplatedFieldChanged { .. } => "templated_field_changed",
            TimelineItemKind::Assignment { .. } => "assignment",
            TimelineItemKind::RemovedAssignment { .. } => "removed_assignment",
            TimelineItemKind::AssignmentTypeChanged { .. } => "assignment_type_changed",
            TimelineItemKind::AddedToTrackable { .. } => "added_to_trackable",
            TimelineItemKind::RemovedFromTrackable { .. } => "removed_from_trackable",
            TimelineItemKind::AddedAffectedEntity { .. } => "added_affected_entity",
            TimelineItemKind::RemovedAffectedEntity { .. } => "removed_affected_entity",
        }
    }
}

impl TimelineItem {
    /// Create an item with a freshly generated ID
    pub fn new(
        issue: IssueId,
        created_at: DateTime<Utc>,
        created_by: UserId,
        kind: TimelineItemKind,
    ) -> Self {
        Self {
            id: TimelineItemId::generate(),
            issue,
            created_at,
            created_by,
            kind,
        }
    }

    /// Body of a comment, if this item is one
    pub fn comment_body(&self) -> Option<&str> {
        match &self.kind {
            TimelineItemKind::IssueComment { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TimelineItemKind::IssueComment { .. })
    }
}

/// Timeline order: creation time, then ID so the order is total
pub fn timeline_order(a: &TimelineItem, b: &TimelineItem) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timeline_order_breaks_ties_by_id() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut a = TimelineItem::new(
            IssueId::new("i"),
            at,
            UserId::new("u"),
            TimelineItemKind::AddedArtefact {
                artefact: "x".into(),
            },
        );
        a.id = TimelineItemId::new("b");
        let mut b = a.clone();
        b.id = TimelineItemId::new("a");
        assert_eq!(timeline_order(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_kind_serialization_is_tagged() {
        let kind = TimelineItemKind::AddedLabel {
            label: LabelId::new("label-1"),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "added_label");
        assert_eq!(kind.name(), "added_label");
    }
}
