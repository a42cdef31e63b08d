//! Incoming pass
//!
//! Materializes remote issues and their timelines in the graph. Conversion records make
//! the pass idempotent: a remote event whose record already points at a local item is
//! never translated again.

use super::metrics;
use super::orchestrator::{ProjectStats, SyncOrchestrator};
use super::source::IncomingIssue;
use crate::dereplication::{ResolvedIssue, ResolvedTimelineItem};
use crate::graph::{ImsIssue, ImsIssueId, ImsProject, IssueId, NodeRef, TimelineItem};
use crate::storage::{IssueConversionInformation, TimelineItemConversionInformation};
use crate::Result;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Translated items of one remote event plus the record to persist for it
type PendingItems = (Vec<TimelineItem>, TimelineItemConversionInformation);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IssueOutcome {
    Created,
    Matched,
    Updated,
}

impl IssueOutcome {
    fn label(self) -> &'static str {
        match self {
            IssueOutcome::Created => "created",
            IssueOutcome::Matched => "matched",
            IssueOutcome::Updated => "updated",
        }
    }
}

impl SyncOrchestrator {
    pub(super) async fn do_incoming(
        &mut self,
        project: &ImsProject,
        stats: &mut ProjectStats,
    ) -> Result<()> {
        let incoming = self.source.find_unsynced_issues(project).await?;
        debug!(project = %project.id, count = incoming.len(), "Found unsynced issues");
        for issue in incoming {
            self.sync_incoming_issue(project, issue.as_ref(), stats)
                .await?;
        }
        Ok(())
    }

    async fn sync_incoming_issue(
        &mut self,
        project: &ImsProject,
        incoming: &dyn IncomingIssue,
        stats: &mut ProjectStats,
    ) -> Result<()> {
        let source_id = project.id.as_str();
        let external_id = incoming.identification();
        let mut conversion = self
            .conversions
            .issue_conversion_by_external(source_id, &external_id)
            .await?
            .unwrap_or_else(|| IssueConversionInformation::new(source_id, external_id.clone()));

        let known = conversion
            .issue_id
            .clone()
            .filter(|id| self.data.graph().contains(&NodeRef::from(id.clone())));
        let (mut issue_id, fresh) = match known {
            Some(id) => (id, None),
            None => {
                let mut issue = incoming.create_issue(project, &mut self.data).await?;
                issue.trackables.insert(project.trackable.clone());
                (issue.id.clone(), Some(issue))
            }
        };

        let mut pending: Vec<PendingItems> = Vec::new();
        for item in incoming.incoming_timeline_items(project).await? {
            let item_external = item.identification();
            let prior = self
                .conversions
                .timeline_conversion_by_external(source_id, &item_external)
                .await?;
            if prior
                .as_ref()
                .is_some_and(|record| record.timeline_item_id.is_some())
            {
                continue;
            }
            let (items, mut record) = item
                .to_timeline_items(project, &mut self.data, prior, &issue_id)
                .await?;
            record.source_id = source_id.to_string();
            record.external_id = Some(item_external);
            pending.push((items, record));
        }

        let mut outcome = IssueOutcome::Updated;
        let mut fake_synced = Vec::new();
        if let Some(issue) = fresh {
            let request = self.dereplicator_request();
            let result =
                self.dereplicator
                    .validate_issue(project, issue, self.data.graph(), &request)?;
            fake_synced = result.fake_synced_items;
            match result.resulting_issue {
                ResolvedIssue::New(issue) => {
                    outcome = IssueOutcome::Created;
                    issue_id = issue.id.clone();
                    self.data.put(issue);
                }
                ResolvedIssue::Existing(existing) => {
                    info!(
                        project = %project.id,
                        external = %external_id,
                        issue = %existing,
                        dereplicator = self.dereplicator.name(),
                        "Incoming issue matches existing issue"
                    );
                    outcome = IssueOutcome::Matched;
                    issue_id = existing;
                    pending = self.dereplicate_items(&issue_id, pending)?;
                }
            }
        }

        if self
            .data
            .graph()
            .ims_issue_for(&project.id, &issue_id)
            .is_none()
        {
            let mut templated_fields = BTreeMap::new();
            incoming
                .fill_ims_issue_templated_fields(project, &mut templated_fields)
                .await?;
            self.data.put(ImsIssue {
                id: ImsIssueId::generate(),
                ims_project: project.id.clone(),
                issue: issue_id.clone(),
                templated_fields,
            });
        }

        let mut records = Vec::with_capacity(pending.len() + fake_synced.len());
        for (items, mut record) in pending {
            if record.timeline_item_id.is_none() {
                record.timeline_item_id = items.first().map(|item| item.id.clone());
            }
            for item in items {
                self.attach_item(&issue_id, item)?;
                stats.timeline_items_created += 1;
            }
            records.push(record);
        }
        for item in fake_synced {
            records.push(TimelineItemConversionInformation::fake_synced(
                source_id,
                item.id.clone(),
            ));
            self.attach_item(&issue_id, item)?;
        }

        self.data.save(self.repository.as_ref()).await?;
        {
            let trackables: Vec<_> = self
                .data
                .graph()
                .issue(&issue_id)?
                .trackables
                .iter()
                .cloned()
                .collect();
            let mut updater = self.data.updater();
            if outcome == IssueOutcome::Created {
                for trackable in &trackables {
                    updater.added_issue_to_trackable(&issue_id, trackable)?;
                }
            }
            updater.changed_issue_state_or_type(&issue_id)?;
        }

        conversion.issue_id = Some(issue_id.clone());
        self.conversions.save_issue_conversion(&conversion).await?;
        for record in &records {
            self.conversions.save_timeline_conversion(record).await?;
        }

        {
            let (graph, context) = self.data.split();
            self.cleaner.clean_issue(graph, context, &issue_id)?;
        }
        self.data.save(self.repository.as_ref()).await?;
        incoming.mark_done().await?;

        match outcome {
            IssueOutcome::Created => stats.issues_created += 1,
            IssueOutcome::Matched => stats.issues_matched += 1,
            IssueOutcome::Updated => stats.issues_updated += 1,
        }
        metrics::record_issue_imported(source_id, outcome.label());
        debug!(
            project = %project.id,
            external = %external_id,
            issue = %issue_id,
            outcome = outcome.label(),
            "Synced incoming issue"
        );
        Ok(())
    }

    /// Match translated items against the comments already on `issue`
    ///
    /// Items resolving to an existing item are dropped and their record points at that
    /// item instead.
    fn dereplicate_items(
        &self,
        issue: &IssueId,
        pending: Vec<PendingItems>,
    ) -> Result<Vec<PendingItems>> {
        let mut sizes = Vec::with_capacity(pending.len());
        let mut records = Vec::with_capacity(pending.len());
        let mut candidates = Vec::new();
        for (items, record) in pending {
            sizes.push(items.len());
            records.push(record);
            candidates.extend(items.into_iter().map(|mut item| {
                item.issue = issue.clone();
                item
            }));
        }

        let request = self.dereplicator_request();
        let result = self.dereplicator.validate_timeline_items(
            issue,
            candidates,
            self.data.graph(),
            &request,
        )?;

        let mut resolved = result.resulting_items.into_iter();
        let mut regrouped = Vec::with_capacity(records.len());
        for (size, mut record) in sizes.into_iter().zip(records) {
            let mut items = Vec::with_capacity(size);
            for entry in resolved.by_ref().take(size) {
                match entry {
                    ResolvedTimelineItem::New(item) => {
                        if record.timeline_item_id.is_none() {
                            record.timeline_item_id = Some(item.id.clone());
                        }
                        items.push(item);
                    }
                    ResolvedTimelineItem::Existing(existing) => {
                        if record.timeline_item_id.is_none() {
                            record.timeline_item_id = Some(existing);
                        }
                    }
                }
            }
            regrouped.push((items, record));
        }
        Ok(regrouped)
    }

    /// Add a new item to the end of `issue`'s timeline
    fn attach_item(&mut self, issue: &IssueId, mut item: TimelineItem) -> Result<()> {
        item.issue = issue.clone();
        self.data
            .graph_mut()
            .issue_mut(issue)?
            .timeline
            .push(item.id.clone());
        self.data.context_mut().mark_updated(issue.clone());
        self.data.put(item);
        Ok(())
    }
}
