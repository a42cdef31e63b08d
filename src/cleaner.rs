//! Issue cleaner
//!
//! Rebuilds an issue's denormalized fields by replaying its timeline in order. Collection
//! fields (labels, artefacts, assignments, comments) are rebuilt from scratch; scalar
//! fields, templated fields, trackables and affects start from what the issue was
//! created with and the last event touching each entry wins.
//!
//! Whatever the replay changes in state, type, trackables or affects is forwarded to the
//! aggregation updater.

use crate::aggregation::{IssueAggregationUpdater, UpdateContext};
use crate::graph::{IssueGraph, IssueId, TimelineItemKind};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Timeline replayer
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueCleaner;

impl IssueCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Replay the timeline of `issue_id` and reconcile aggregation with the result
    pub fn clean_issue(
        &self,
        graph: &mut IssueGraph,
        context: &mut UpdateContext,
        issue_id: &IssueId,
    ) -> Result<()> {
        let before = graph.issue(issue_id)?.clone();
        let mut issue = before.clone();

        issue.labels = BTreeSet::new();
        issue.artefacts = BTreeSet::new();
        issue.assignments = BTreeMap::new();
        issue.comments = Vec::new();
        issue.last_updated_at = issue.created_at;

        for item in graph.sorted_timeline(issue_id)? {
            issue.last_updated_at = issue.last_updated_at.max(item.created_at);
            match &item.kind {
                TimelineItemKind::IssueComment { is_deleted, .. } => {
                    if !is_deleted {
                        issue.comments.push(item.id.clone());
                    }
                }
                TimelineItemKind::AddedLabel { label } => {
                    issue.labels.insert(label.clone());
                }
                TimelineItemKind::RemovedLabel { label } => {
                    issue.labels.remove(label);
                }
                TimelineItemKind::AddedArtefact { artefact } => {
                    issue.artefacts.insert(artefact.clone());
                }
                TimelineItemKind::RemovedArtefact { artefact } => {
                    issue.artefacts.remove(artefact);
                }
                TimelineItemKind::StateChanged { new_state, .. } => {
                    issue.state = new_state.clone();
                }
                TimelineItemKind::TitleChanged { new_title, .. } => {
                    issue.title = new_title.clone();
                }
                TimelineItemKind::TypeChanged { new_type, .. } => {
                    issue.issue_type = new_type.clone();
                }
                TimelineItemKind::TemplatedFieldChanged {
                    field_name,
                    new_value,
                    ..
                } => {
                    issue
                        .templated_fields
                        .insert(field_name.clone(), new_value.clone());
                }
                TimelineItemKind::Assignment {
                    assignment_type, ..
                } => {
                    issue
                        .assignments
                        .insert(item.id.clone(), assignment_type.clone());
                }
                TimelineItemKind::RemovedAssignment { assignment } => {
                    issue.assignments.remove(assignment);
                }
                TimelineItemKind::AssignmentTypeChanged {
                    assignment,
                    new_type,
                    ..
                } => {
                    if let Some(current) = issue.assignments.get_mut(assignment) {
                        *current = new_type.clone();
                    }
                }
                TimelineItemKind::AddedToTrackable { trackable } => {
                    issue.trackables.insert(trackable.clone());
                }
                TimelineItemKind::RemovedFromTrackable { trackable } => {
                    issue.trackables.remove(trackable);
                }
                TimelineItemKind::AddedAffectedEntity { entity } => {
                    issue.affects.insert(entity.clone());
                }
                TimelineItemKind::RemovedAffectedEntity { entity } => {
                    issue.affects.remove(entity);
                }
            }
        }

        if issue == before {
            return Ok(());
        }
        debug!(issue = %issue_id, "Cleaned issue");

        let state_or_type_changed =
            issue.state != before.state || issue.issue_type != before.issue_type;
        let trackables_diff = (
            issue
                .trackables
                .difference(&before.trackables)
                .cloned()
                .collect::<Vec<_>>(),
            before
                .trackables
                .difference(&issue.trackables)
                .cloned()
                .collect::<Vec<_>>(),
        );
        let affects_diff = (
            issue
                .affects
                .difference(&before.affects)
                .cloned()
                .collect::<Vec<_>>(),
            before
                .affects
                .difference(&issue.affects)
                .cloned()
                .collect::<Vec<_>>(),
        );

        graph.insert(issue);
        context.mark_updated(issue_id.clone());

        let mut updater = IssueAggregationUpdater::new(graph, context);
        if state_or_type_changed {
            updater.changed_issue_state_or_type(issue_id)?;
        }
        for trackable in &trackables_diff.0 {
            updater.added_issue_to_trackable(issue_id, trackable)?;
        }
        for trackable in &trackables_diff.1 {
            updater.removed_issue_from_trackable(issue_id, trackable)?;
        }
        for entity in &affects_diff.0 {
            updater.added_affected_entity(issue_id, entity)?;
        }
        for entity in &affects_diff.1 {
            updater.removed_affected_entity(issue_id, entity)?;
        }
        Ok(())
    }
}
