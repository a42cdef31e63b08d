//! Sync orchestrator
//!
//! One `sync()` call is one cycle: fetch remote data for every project, then run the
//! incoming and outgoing passes project by project. A failing project is logged, counted
//! and reported; it never stops the others.

use super::data_service::SyncDataService;
use super::metrics;
use super::source::{DataFetcher, LoggingNotifier, SyncNotifier, SyncSource};
use crate::cleaner::IssueCleaner;
use crate::dereplication::{IssueDereplicator, IssueDereplicatorRequest, NullDereplicator};
use crate::graph::{ImsProject, ImsProjectId, IssueGraph, User, UserId};
use crate::storage::{ConversionStore, GraphRepository};
use crate::{ArchSyncError, ErrorClass, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Counters for one project's pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectStats {
    pub issues_created: usize,
    pub issues_matched: usize,
    pub issues_updated: usize,
    pub timeline_items_created: usize,
    pub outgoing_pushes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectOutcome {
    Synced(ProjectStats),
    Failed { kind: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectReport {
    pub project: ImsProjectId,
    pub outcome: ProjectOutcome,
}

/// Per-project outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Set when the fetch step failed; the passes still run on whatever was staged
    pub fetch_error: Option<String>,
    pub projects: Vec<ProjectReport>,
}

impl SyncReport {
    pub fn failed_projects(&self) -> usize {
        self.projects
            .iter()
            .filter(|report| matches!(report.outcome, ProjectOutcome::Failed { .. }))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.fetch_error.is_none() && self.failed_projects() == 0
    }

    /// Stats of one project, if it synced
    pub fn stats(&self, project: &ImsProjectId) -> Option<&ProjectStats> {
        self.projects
            .iter()
            .find(|report| &report.project == project)
            .and_then(|report| match &report.outcome {
                ProjectOutcome::Synced(stats) => Some(stats),
                ProjectOutcome::Failed { .. } => None,
            })
    }
}

/// Default user sync writes are attributed to
pub fn default_dummy_user() -> User {
    User {
        id: UserId::new("archsync"),
        username: "archsync".to_string(),
        display_name: Some("archsync".to_string()),
        is_system: true,
    }
}

pub struct SyncOrchestrator {
    pub(super) source: Arc<dyn SyncSource>,
    pub(super) fetcher: Arc<dyn DataFetcher>,
    pub(super) conversions: Arc<dyn ConversionStore>,
    pub(super) repository: Arc<dyn GraphRepository>,
    pub(super) dereplicator: Box<dyn IssueDereplicator>,
    pub(super) notifier: Arc<dyn SyncNotifier>,
    pub(super) cleaner: IssueCleaner,
    pub(super) data: SyncDataService,
}

impl SyncOrchestrator {
    /// Create an orchestrator over `graph`
    ///
    /// `graph` should mirror what `repository` holds: a failed project pass reloads the
    /// graph from the repository.
    pub fn new(
        source: Arc<dyn SyncSource>,
        fetcher: Arc<dyn DataFetcher>,
        conversions: Arc<dyn ConversionStore>,
        repository: Arc<dyn GraphRepository>,
        graph: IssueGraph,
    ) -> Self {
        Self {
            source,
            fetcher,
            conversions,
            repository,
            dereplicator: Box::new(NullDereplicator),
            notifier: Arc::new(LoggingNotifier),
            cleaner: IssueCleaner::new(),
            data: SyncDataService::new(graph, default_dummy_user()),
        }
    }

    /// Create an orchestrator over the graph stored in `repository`
    pub async fn load(
        source: Arc<dyn SyncSource>,
        fetcher: Arc<dyn DataFetcher>,
        conversions: Arc<dyn ConversionStore>,
        repository: Arc<dyn GraphRepository>,
    ) -> Result<Self> {
        let graph = repository.load_graph().await?;
        Ok(Self::new(source, fetcher, conversions, repository, graph))
    }

    pub fn with_dereplicator(mut self, dereplicator: Box<dyn IssueDereplicator>) -> Self {
        self.dereplicator = dereplicator;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SyncNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the dummy user (creating it in the graph if needed)
    pub fn with_dummy_user(mut self, user: User) -> Self {
        let graph = std::mem::take(self.data.graph_mut());
        self.data = SyncDataService::new(graph, user);
        self
    }

    pub fn graph(&self) -> &IssueGraph {
        self.data.graph()
    }

    /// Pick up changes other writers made to the repository
    pub async fn reload(&mut self) -> Result<()> {
        self.data.reload(self.repository.as_ref()).await
    }

    pub fn source_name(&self) -> &str {
        self.source.source_name()
    }

    pub(super) fn dereplicator_request(&self) -> IssueDereplicatorRequest {
        IssueDereplicatorRequest::new(self.data.dummy_user().clone())
    }

    /// Run one full cycle
    pub async fn sync(&mut self) -> SyncReport {
        let projects: Vec<ImsProject> = self.data.graph().ims_projects().cloned().collect();
        let mut report = SyncReport::default();
        info!(
            source = self.source.source_name(),
            projects = projects.len(),
            dereplicator = self.dereplicator.name(),
            "Starting sync cycle"
        );

        if let Err(e) = self.fetcher.fetch_data(&projects).await {
            warn!(error = %e, "Data fetch failed, syncing what is staged");
            report.fetch_error = Some(e.to_string());
        }

        for project in &projects {
            let started = Instant::now();
            let outcome = match self.sync_project(project).await {
                Ok(stats) => {
                    info!(
                        project = %project.id,
                        created = stats.issues_created,
                        matched = stats.issues_matched,
                        updated = stats.issues_updated,
                        pushes = stats.outgoing_pushes,
                        "Project synced"
                    );
                    ProjectOutcome::Synced(stats)
                }
                Err(e) => {
                    self.handle_project_error(project, &e).await;
                    ProjectOutcome::Failed {
                        kind: e.kind_label(),
                        message: e.to_string(),
                    }
                }
            };
            metrics::record_project_duration(project.id.as_str(), started.elapsed().as_secs_f64());
            report.projects.push(ProjectReport {
                project: project.id.clone(),
                outcome,
            });
        }

        metrics::record_sync_cycle(if report.is_success() { "success" } else { "partial" });
        report
    }

    async fn sync_project(&mut self, project: &ImsProject) -> Result<ProjectStats> {
        let mut stats = ProjectStats::default();
        self.do_incoming(project, &mut stats).await?;
        self.do_outgoing(project, &mut stats).await?;
        self.data.save(self.repository.as_ref()).await?;
        Ok(stats)
    }

    async fn handle_project_error(&mut self, project: &ImsProject, e: &ArchSyncError) {
        match e.class() {
            ErrorClass::InvariantViolation => {
                error!(project = %project.id, error = %e, "Graph invariant violated, aborting project")
            }
            ErrorClass::Transient | ErrorClass::ProjectFatal => {
                warn!(project = %project.id, error = %e, "Project sync failed")
            }
        }
        metrics::record_project_error(project.id.as_str(), e.kind_label());
        if e.is_notifiable() {
            self.notifier.notify(project, e).await;
        }
        if let Err(reload_error) = self.data.reload(self.repository.as_ref()).await {
            error!(error = %reload_error, "Failed to reload graph after project failure");
        }
    }
}
