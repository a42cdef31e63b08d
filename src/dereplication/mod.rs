//! Dereplication
//!
//! Decides whether an incoming issue or timeline item is a re-observation of something
//! already in the graph (typically the same issue mirrored into two trackers). Exactly
//! one strategy is active at a time, chosen through configuration.

mod heuristic;
mod invasive;
mod null;

pub use heuristic::HeuristicDereplicator;
pub use invasive::{extract_uuid, InvasiveDereplicator};
pub use null::NullDereplicator;

use crate::graph::{ImsProject, Issue, IssueGraph, IssueId, TimelineItem, TimelineItemId, UserId};
use crate::Result;

/// Context shared by all dereplication calls of one sync pass
#[derive(Debug, Clone)]
pub struct IssueDereplicatorRequest {
    /// User synthetic items are attributed to
    pub dummy_user: UserId,
}

impl IssueDereplicatorRequest {
    pub fn new(dummy_user: UserId) -> Self {
        Self { dummy_user }
    }
}

/// Outcome for an incoming issue
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedIssue {
    /// Nothing matched; materialize this (possibly rewritten) issue
    New(Issue),
    /// Same thing as an issue already in the graph
    Existing(IssueId),
}

#[derive(Debug, Clone)]
pub struct IssueDereplicationResult {
    pub resulting_issue: ResolvedIssue,
    /// Items to persist and mark synced without ever pushing them
    pub fake_synced_items: Vec<TimelineItem>,
}

impl IssueDereplicationResult {
    pub fn new_issue(issue: Issue) -> Self {
        Self {
            resulting_issue: ResolvedIssue::New(issue),
            fake_synced_items: Vec::new(),
        }
    }

    pub fn existing(issue: IssueId) -> Self {
        Self {
            resulting_issue: ResolvedIssue::Existing(issue),
            fake_synced_items: Vec::new(),
        }
    }
}

/// Outcome for one incoming timeline item
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTimelineItem {
    New(TimelineItem),
    Existing(TimelineItemId),
}

#[derive(Debug, Clone, Default)]
pub struct TimelineItemDereplicationResult {
    /// One entry per candidate, in candidate order
    pub resulting_items: Vec<ResolvedTimelineItem>,
}

/// Duplicate detection strategy
pub trait IssueDereplicator: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Match a not-yet-materialized issue against the issues on its trackables
    fn validate_issue(
        &self,
        project: &ImsProject,
        issue: Issue,
        graph: &IssueGraph,
        request: &IssueDereplicatorRequest,
    ) -> Result<IssueDereplicationResult>;

    /// Match candidate items against the items already on `issue`
    fn validate_timeline_items(
        &self,
        issue: &IssueId,
        candidates: Vec<TimelineItem>,
        graph: &IssueGraph,
        request: &IssueDereplicatorRequest,
    ) -> Result<TimelineItemDereplicationResult>;
}

/// Every candidate is new
pub(crate) fn all_new(candidates: Vec<TimelineItem>) -> TimelineItemDereplicationResult {
    TimelineItemDereplicationResult {
        resulting_items: candidates.into_iter().map(ResolvedTimelineItem::New).collect(),
    }
}

/// Non-deleted issues sharing a trackable with `issue` (or on the project's trackable),
/// excluding `issue` itself and issues already linked to `project`
pub(crate) fn issues_on_same_trackables<'a>(
    project: &ImsProject,
    issue: &Issue,
    graph: &'a IssueGraph,
) -> Vec<&'a Issue> {
    graph
        .issues()
        .filter(|candidate| {
            !candidate.is_deleted
                && candidate.id != issue.id
                && graph.ims_issue_for(&project.id, &candidate.id).is_none()
                && (candidate.trackables.contains(&project.trackable)
                    || !candidate.trackables.is_disjoint(&issue.trackables))
        })
        .collect()
}
