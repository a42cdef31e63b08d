//! Outgoing pass
//!
//! Pushes local changes back to the tracker. What to push is decided purely from the
//! issue's timeline and the set of items that already carry a conversion record; the
//! orchestrator then executes the plan against the `SyncSource`.

use super::metrics;
use super::orchestrator::{ProjectStats, SyncOrchestrator};
use crate::graph::{
    ImsProject, Issue, IssueStateId, LabelId, OutgoingGates, TimelineItem, TimelineItemId,
    TimelineItemKind, User, UserId,
};
use crate::storage::{IssueConversionInformation, TimelineItemConversionInformation};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// One event of a two-sided history (label added/removed, user assigned/unassigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleEvent {
    pub added: bool,
    pub synced: bool,
}

impl ToggleEvent {
    pub fn new(added: bool, synced: bool) -> Self {
        Self { added, synced }
    }
}

/// Whether the final block of a toggle history still has to be pushed
///
/// The final block is the last contiguous run of same-kind events. Nothing is pushed if
/// any event in it is already synced. Otherwise the last synced event before the block
/// tells what the remote side holds: an opposing one means the remote is out of date, a
/// same-kind one means it already agrees. With no synced history the remote is in its
/// default state, so a block that merely restores the default is skipped.
pub fn should_sync_type(events: &[ToggleEvent], restores_default_state: bool) -> bool {
    let Some(last) = events.last() else {
        return false;
    };
    let block_start = events
        .iter()
        .rposition(|event| event.added != last.added)
        .map_or(0, |index| index + 1);
    let (history, block) = events.split_at(block_start);
    if block.iter().any(|event| event.synced) {
        return false;
    }
    match history.iter().rev().find(|event| event.synced) {
        Some(previous) => previous.added != last.added,
        None => !restores_default_state,
    }
}

/// What a single push sends
#[derive(Debug, Clone, PartialEq)]
pub enum PushKind {
    Comment(TimelineItemId),
    Title(String),
    State(IssueStateId),
    AddedLabel(LabelId),
    RemovedLabel(LabelId),
    AssignedUser(UserId),
    UnassignedUser(UserId),
}

impl PushKind {
    pub fn name(&self) -> &'static str {
        match self {
            PushKind::Comment(_) => "comment",
            PushKind::Title(_) => "title",
            PushKind::State(_) => "state",
            PushKind::AddedLabel(_) => "added_label",
            PushKind::RemovedLabel(_) => "removed_label",
            PushKind::AssignedUser(_) => "assigned_user",
            PushKind::UnassignedUser(_) => "unassigned_user",
        }
    }
}

/// One planned push and the timeline items it settles
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPush {
    pub kind: PushKind,
    /// Items in timeline order; the returned record links to the last one
    pub items: Vec<TimelineItemId>,
    /// Contributing users, most recent first, without duplicates
    pub actors: Vec<UserId>,
}

fn actors_most_recent_first<'a>(items: impl DoubleEndedIterator<Item = &'a TimelineItem>) -> Vec<UserId> {
    let mut actors: Vec<UserId> = Vec::new();
    for item in items.rev() {
        if !actors.contains(&item.created_by) {
            actors.push(item.created_by.clone());
        }
    }
    actors
}

/// Trailing run of a value history sharing the final value, unless part of it is synced
fn trailing_run<'a, V: PartialEq>(
    events: &[(&'a TimelineItem, V)],
    synced: &BTreeSet<TimelineItemId>,
) -> Option<Vec<&'a TimelineItem>> {
    let (_, final_value) = events.last()?;
    let run_start = events
        .iter()
        .rposition(|(_, value)| value != final_value)
        .map_or(0, |index| index + 1);
    let run: Vec<&TimelineItem> = events[run_start..].iter().map(|(item, _)| *item).collect();
    if run.iter().any(|item| synced.contains(&item.id)) {
        return None;
    }
    Some(run)
}

fn plan_toggles<K: Ord + Clone>(
    groups: BTreeMap<K, Vec<(&TimelineItem, bool)>>,
    synced: &BTreeSet<TimelineItemId>,
    push: impl Fn(K, bool) -> PushKind,
    plan: &mut Vec<PlannedPush>,
) {
    for (key, events) in groups {
        let toggles: Vec<ToggleEvent> = events
            .iter()
            .map(|(item, added)| ToggleEvent::new(*added, synced.contains(&item.id)))
            .collect();
        let Some(&(_, added)) = events.last() else {
            continue;
        };
        if !should_sync_type(&toggles, !added) {
            continue;
        }
        let block_start = events
            .iter()
            .rposition(|(_, event_added)| *event_added != added)
            .map_or(0, |index| index + 1);
        let block = &events[block_start..];
        plan.push(PlannedPush {
            kind: push(key, added),
            items: block.iter().map(|(item, _)| item.id.clone()).collect(),
            actors: actors_most_recent_first(block.iter().map(|(item, _)| *item)),
        });
    }
}

/// Decide every push for one issue
///
/// `timeline` must be in timeline order.
pub fn plan_outgoing(
    timeline: &[&TimelineItem],
    synced: &BTreeSet<TimelineItemId>,
    gates: &OutgoingGates,
) -> Vec<PlannedPush> {
    let mut plan = Vec::new();

    if gates.comments {
        for item in timeline {
            if let TimelineItemKind::IssueComment { is_deleted: false, .. } = item.kind {
                if !synced.contains(&item.id) {
                    plan.push(PlannedPush {
                        kind: PushKind::Comment(item.id.clone()),
                        items: vec![item.id.clone()],
                        actors: vec![item.created_by.clone()],
                    });
                }
            }
        }
    }

    if gates.title_changed {
        let titles: Vec<(&TimelineItem, &str)> = timeline
            .iter()
            .filter_map(|item| match &item.kind {
                TimelineItemKind::TitleChanged { new_title, .. } => Some((*item, new_title.as_str())),
                _ => None,
            })
            .collect();
        if let Some(run) = trailing_run(&titles, synced) {
            if let Some((_, title)) = titles.last() {
                plan.push(PlannedPush {
                    kind: PushKind::Title(title.to_string()),
                    items: run.iter().map(|item| item.id.clone()).collect(),
                    actors: actors_most_recent_first(run.into_iter()),
                });
            }
        }
    }

    if gates.states {
        let states: Vec<(&TimelineItem, &IssueStateId)> = timeline
            .iter()
            .filter_map(|item| match &item.kind {
                TimelineItemKind::StateChanged { new_state, .. } => Some((*item, new_state)),
                _ => None,
            })
            .collect();
        if let Some(run) = trailing_run(&states, synced) {
            if let Some((_, state)) = states.last() {
                plan.push(PlannedPush {
                    kind: PushKind::State((*state).clone()),
                    items: run.iter().map(|item| item.id.clone()).collect(),
                    actors: actors_most_recent_first(run.into_iter()),
                });
            }
        }
    }

    if gates.labels {
        let mut by_label: BTreeMap<LabelId, Vec<(&TimelineItem, bool)>> = BTreeMap::new();
        for item in timeline {
            match &item.kind {
                TimelineItemKind::AddedLabel { label } => {
                    by_label.entry(label.clone()).or_default().push((*item, true))
                }
                TimelineItemKind::RemovedLabel { label } => {
                    by_label.entry(label.clone()).or_default().push((*item, false))
                }
                _ => {}
            }
        }
        plan_toggles(
            by_label,
            synced,
            |label, added| {
                if added {
                    PushKind::AddedLabel(label)
                } else {
                    PushKind::RemovedLabel(label)
                }
            },
            &mut plan,
        );
    }

    if gates.assignments {
        let assignees: BTreeMap<&TimelineItemId, &UserId> = timeline
            .iter()
            .filter_map(|item| match &item.kind {
                TimelineItemKind::Assignment { user, .. } => Some((&item.id, user)),
                _ => None,
            })
            .collect();
        let mut by_user: BTreeMap<UserId, Vec<(&TimelineItem, bool)>> = BTreeMap::new();
        for item in timeline {
            match &item.kind {
                TimelineItemKind::Assignment { user, .. } => {
                    by_user.entry(user.clone()).or_default().push((*item, true))
                }
                TimelineItemKind::RemovedAssignment { assignment } => {
                    if let Some(user) = assignees.get(assignment) {
                        by_user.entry((*user).clone()).or_default().push((*item, false));
                    }
                }
                _ => {}
            }
        }
        plan_toggles(
            by_user,
            synced,
            |user, added| {
                if added {
                    PushKind::AssignedUser(user)
                } else {
                    PushKind::UnassignedUser(user)
                }
            },
            &mut plan,
        );
    }

    plan
}

impl SyncOrchestrator {
    pub(super) async fn do_outgoing(
        &mut self,
        project: &ImsProject,
        stats: &mut ProjectStats,
    ) -> Result<()> {
        if !self.source.is_outgoing_enabled(project) {
            debug!(project = %project.id, "Outgoing sync disabled");
            return Ok(());
        }
        let gates = OutgoingGates {
            enabled: true,
            labels: self.source.sync_labels(project),
            comments: self.source.sync_comments(project),
            title_changed: self.source.sync_title_changes(project),
            assignments: self.source.sync_assignments(project),
            states: self.source.sync_states(project),
        };

        let issues: Vec<Issue> = self
            .data
            .graph()
            .issues_on_trackable(&project.trackable)
            .cloned()
            .collect();
        for issue in issues {
            self.sync_outgoing_issue(project, &issue, &gates, stats).await?;
        }
        Ok(())
    }

    async fn sync_outgoing_issue(
        &mut self,
        project: &ImsProject,
        issue: &Issue,
        gates: &OutgoingGates,
        stats: &mut ProjectStats,
    ) -> Result<()> {
        let source_id = project.id.as_str();
        let remote = match self
            .conversions
            .issue_conversion_by_issue(source_id, &issue.id)
            .await?
        {
            Some(remote) => remote,
            None => match self.source.create_outgoing_issue(project, issue).await? {
                Some(mut remote) => {
                    remote.source_id = source_id.to_string();
                    remote.issue_id = Some(issue.id.clone());
                    self.conversions.save_issue_conversion(&remote).await?;
                    info!(project = %project.id, issue = %issue.id, "Created issue remotely");
                    metrics::record_outgoing_push(source_id, "issue");
                    stats.outgoing_pushes += 1;
                    remote
                }
                None => return Ok(()),
            },
        };

        let graph = self.data.graph();
        let timeline = graph.sorted_timeline(&issue.id)?;
        let mut synced = BTreeSet::new();
        for item in &timeline {
            if self
                .conversions
                .timeline_conversion_by_item(source_id, &item.id)
                .await?
                .is_some()
            {
                synced.insert(item.id.clone());
            }
        }

        for push in plan_outgoing(&timeline, &synced, gates) {
            let actors = push
                .actors
                .iter()
                .map(|id| graph.user(id).cloned())
                .collect::<Result<Vec<User>>>()?;
            let record = self.execute_push(project, &remote, &push, &actors).await?;
            let Some(record) = record else {
                debug!(issue = %issue.id, kind = push.kind.name(), "Source skipped push");
                continue;
            };
            self.record_push(source_id, &push, record).await?;
            metrics::record_outgoing_push(source_id, push.kind.name());
            stats.outgoing_pushes += 1;
        }
        Ok(())
    }

    async fn execute_push(
        &self,
        project: &ImsProject,
        remote: &IssueConversionInformation,
        push: &PlannedPush,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>> {
        let graph = self.data.graph();
        match &push.kind {
            PushKind::Comment(item) => {
                let comment = graph.timeline_item(item)?;
                self.source.sync_comment(project, remote, comment, actors).await
            }
            PushKind::Title(title) => {
                self.source
                    .sync_title_change(project, remote, title, actors)
                    .await
            }
            PushKind::State(state) => {
                let state = graph.issue_state(state)?;
                self.source
                    .sync_state_change(project, remote, state, actors)
                    .await
            }
            PushKind::AddedLabel(label) => {
                let label = graph.label(label)?;
                self.source
                    .sync_added_label(project, remote, label, actors)
                    .await
            }
            PushKind::RemovedLabel(label) => {
                let label = graph.label(label)?;
                self.source
                    .sync_removed_label(project, remote, label, actors)
                    .await
            }
            PushKind::AssignedUser(user) => {
                let user = graph.user(user)?;
                self.source
                    .sync_assigned_user(project, remote, user, actors)
                    .await
            }
            PushKind::UnassignedUser(user) => {
                let user = graph.user(user)?;
                self.source
                    .sync_unassigned_user(project, remote, user, actors)
                    .await
            }
        }
    }

    /// Link the record to the push's last item and mark the rest of the run as synced
    async fn record_push(
        &self,
        source_id: &str,
        push: &PlannedPush,
        mut record: TimelineItemConversionInformation,
    ) -> Result<()> {
        let Some((last, rest)) = push.items.split_last() else {
            return Ok(());
        };
        record.source_id = source_id.to_string();
        record.timeline_item_id = Some(last.clone());
        self.conversions.save_timeline_conversion(&record).await?;
        for item in rest {
            self.conversions
                .save_timeline_conversion(&TimelineItemConversionInformation::fake_synced(
                    source_id,
                    item.clone(),
                ))
                .await?;
        }
        Ok(())
    }
}
