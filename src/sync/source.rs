//! Collaborator contracts
//!
//! What a tracker adapter (GitHub, Jira, ...) has to provide for the orchestrator to
//! drive it. Outgoing hooks return `None` when nothing was pushed.

use super::data_service::SyncDataService;
use crate::graph::{ImsProject, Issue, IssueId, IssueState, Label, TimelineItem, User};
use crate::storage::{IssueConversionInformation, TimelineItemConversionInformation};
use crate::{ArchSyncError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Pulls remote data into the adapter's staging area ahead of a sync
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn fetch_data(&self, projects: &[ImsProject]) -> Result<()>;
}

/// One issue as seen on the remote side
#[async_trait]
pub trait IncomingIssue: Send + Sync {
    /// Stable external key (e.g. GitHub node ID)
    fn identification(&self) -> String;

    async fn incoming_timeline_items(
        &self,
        project: &ImsProject,
    ) -> Result<Vec<Box<dyn IncomingTimelineItem>>>;

    /// Build a not-yet-persisted issue from the remote representation
    async fn create_issue(&self, project: &ImsProject, data: &mut SyncDataService) -> Result<Issue>;

    async fn fill_ims_issue_templated_fields(
        &self,
        project: &ImsProject,
        fields: &mut BTreeMap<String, serde_json::Value>,
    ) -> Result<()> {
        let _ = (project, fields);
        Ok(())
    }

    /// The issue was fully processed; the adapter may drop it from its staging area
    async fn mark_done(&self) -> Result<()>;
}

/// One remote timeline event
#[async_trait]
pub trait IncomingTimelineItem: Send + Sync {
    /// Stable external key of the event
    fn identification(&self) -> String;

    /// Translate into timeline items of `issue`
    ///
    /// `prior` is the conversion record from an earlier pass, if any. The returned record
    /// is persisted by the caller and linked to the first returned item.
    async fn to_timeline_items(
        &self,
        project: &ImsProject,
        data: &mut SyncDataService,
        prior: Option<TimelineItemConversionInformation>,
        issue: &IssueId,
    ) -> Result<(Vec<TimelineItem>, TimelineItemConversionInformation)>;
}

/// A tracker adapter
///
/// Every outgoing hook receives the actors behind the change, most recent first.
#[async_trait]
pub trait SyncSource: Send + Sync {
    fn source_name(&self) -> &str;

    async fn find_unsynced_issues(&self, project: &ImsProject) -> Result<Vec<Box<dyn IncomingIssue>>>;

    fn is_outgoing_enabled(&self, project: &ImsProject) -> bool {
        project.outgoing.enabled
    }

    fn sync_labels(&self, project: &ImsProject) -> bool {
        project.outgoing.labels
    }

    fn sync_comments(&self, project: &ImsProject) -> bool {
        project.outgoing.comments
    }

    fn sync_title_changes(&self, project: &ImsProject) -> bool {
        project.outgoing.title_changed
    }

    fn sync_assignments(&self, project: &ImsProject) -> bool {
        project.outgoing.assignments
    }

    fn sync_states(&self, project: &ImsProject) -> bool {
        project.outgoing.states
    }

    async fn create_outgoing_issue(
        &self,
        project: &ImsProject,
        issue: &Issue,
    ) -> Result<Option<IssueConversionInformation>>;

    async fn sync_comment(
        &self,
        project: &ImsProject,
        issue: &IssueConversionInformation,
        comment: &TimelineItem,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>>;

    async fn sync_title_change(
        &self,
        project: &ImsProject,
        issue: &IssueConversionInformation,
        new_title: &str,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>>;

    async fn sync_state_change(
        &self,
        project: &ImsProject,
        issue: &IssueConversionInformation,
        new_state: &IssueState,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>>;

    async fn sync_added_label(
        &self,
        project: &ImsProject,
        issue: &IssueConversionInformation,
        label: &Label,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>>;

    async fn sync_removed_label(
        &self,
        project: &ImsProject,
        issue: &IssueConversionInformation,
        label: &Label,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>>;

    async fn sync_assigned_user(
        &self,
        project: &ImsProject,
        issue: &IssueConversionInformation,
        user: &User,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>> {
        let _ = (project, issue, user, actors);
        Ok(None)
    }

    async fn sync_unassigned_user(
        &self,
        project: &ImsProject,
        issue: &IssueConversionInformation,
        user: &User,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>> {
        let _ = (project, issue, user, actors);
        Ok(None)
    }
}

/// Receives project failures worth a human's attention
#[async_trait]
pub trait SyncNotifier: Send + Sync {
    async fn notify(&self, project: &ImsProject, error: &ArchSyncError);
}

/// Notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl SyncNotifier for LoggingNotifier {
    async fn notify(&self, project: &ImsProject, error: &ArchSyncError) {
        tracing::error!(
            project = %project.id,
            name = %project.name,
            error = %error,
            "Project sync failed"
        );
    }
}
