//! Integration tests for archsync
//!
//! These drive a fake tracker through the orchestrator against a SQLite store on disk.

use archsync::dereplication::{extract_uuid, HeuristicDereplicator, InvasiveDereplicator};
use archsync::graph::*;
use archsync::storage::{
    ChangeSet, ConversionStore, GraphRepository, IssueConversionInformation, SqliteStore,
    StoreConfig, TimelineItemConversionInformation,
};
use archsync::sync::{
    DataFetcher, IncomingIssue, IncomingTimelineItem, SyncDataService, SyncNotifier,
    SyncOrchestrator, SyncSource,
};
use archsync::{ArchSyncError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

#[derive(Debug, Clone)]
struct RemoteComment {
    id: String,
    author: String,
    body: String,
}

#[derive(Debug, Clone)]
struct RemoteIssue {
    id: String,
    title: String,
    body: String,
    author: String,
    state: String,
    comments: Vec<RemoteComment>,
}

impl RemoteIssue {
    fn new(id: &str, title: &str, author: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            body: String::new(),
            author: author.to_string(),
            state: "open".to_string(),
            comments: Vec::new(),
        }
    }

    fn with_comment(mut self, id: &str, author: &str, body: &str) -> Self {
        self.comments.push(RemoteComment {
            id: id.to_string(),
            author: author.to_string(),
            body: body.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Push {
    kind: &'static str,
    detail: String,
    actors: Vec<String>,
}

#[derive(Default)]
struct TrackerState {
    issues: HashMap<String, Vec<RemoteIssue>>,
    failing: HashSet<String>,
    pushes: Vec<Push>,
    fetches: usize,
}

/// In-memory tracker serving any number of projects
#[derive(Clone, Default)]
struct FakeTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl FakeTracker {
    fn add_issue(&self, project: &str, issue: RemoteIssue) {
        self.state
            .lock()
            .unwrap()
            .issues
            .entry(project.to_string())
            .or_default()
            .push(issue);
    }

    fn fail(&self, project: &str) {
        self.state.lock().unwrap().failing.insert(project.to_string());
    }

    fn pushes(&self) -> Vec<Push> {
        self.state.lock().unwrap().pushes.clone()
    }

    fn record(
        &self,
        project: &ImsProject,
        kind: &'static str,
        detail: String,
        actors: &[User],
    ) -> Option<TimelineItemConversionInformation> {
        let mut state = self.state.lock().unwrap();
        state.pushes.push(Push {
            kind,
            detail,
            actors: actors.iter().map(|user| user.username.clone()).collect(),
        });
        let external = format!("push-{}", state.pushes.len());
        Some(
            TimelineItemConversionInformation::new(project.id.as_str(), "fake_push")
                .with_external_id(external),
        )
    }
}

struct FakeIncomingIssue {
    remote: RemoteIssue,
}

struct FakeIncomingComment {
    comment: RemoteComment,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl IncomingIssue for FakeIncomingIssue {
    fn identification(&self) -> String {
        self.remote.id.clone()
    }

    async fn incoming_timeline_items(
        &self,
        _project: &ImsProject,
    ) -> Result<Vec<Box<dyn IncomingTimelineItem>>> {
        Ok(self
            .remote
            .comments
            .iter()
            .enumerate()
            .map(|(index, comment)| {
                Box::new(FakeIncomingComment {
                    comment: comment.clone(),
                    created_at: base_time() + Duration::minutes(index as i64 + 1),
                }) as Box<dyn IncomingTimelineItem>
            })
            .collect())
    }

    async fn create_issue(&self, _project: &ImsProject, data: &mut SyncDataService) -> Result<Issue> {
        let author = data.ensure_user(&self.remote.author, None);
        let issue_type = data.issue_type_named("Bug")?;
        let state = data.issue_state_named(&self.remote.state)?;
        Ok(Issue::new(
            IssueId::generate(),
            self.remote.title.clone(),
            author,
            issue_type,
            state,
            base_time(),
        )
        .with_body(self.remote.body.clone()))
    }

    async fn mark_done(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl IncomingTimelineItem for FakeIncomingComment {
    fn identification(&self) -> String {
        self.comment.id.clone()
    }

    async fn to_timeline_items(
        &self,
        project: &ImsProject,
        data: &mut SyncDataService,
        prior: Option<TimelineItemConversionInformation>,
        issue: &IssueId,
    ) -> Result<(Vec<TimelineItem>, TimelineItemConversionInformation)> {
        let author = data.ensure_user(&self.comment.author, None);
        let item = TimelineItem::new(
            issue.clone(),
            self.created_at,
            author,
            TimelineItemKind::IssueComment {
                body: self.comment.body.clone(),
                answers: None,
                is_deleted: false,
            },
        );
        let record = prior.unwrap_or_else(|| {
            TimelineItemConversionInformation::new(project.id.as_str(), "fake_comment")
        });
        Ok((vec![item], record))
    }
}

#[async_trait]
impl DataFetcher for FakeTracker {
    async fn fetch_data(&self, _projects: &[ImsProject]) -> Result<()> {
        self.state.lock().unwrap().fetches += 1;
        Ok(())
    }
}

#[async_trait]
impl SyncSource for FakeTracker {
    fn source_name(&self) -> &str {
        "fake"
    }

    async fn find_unsynced_issues(&self, project: &ImsProject) -> Result<Vec<Box<dyn IncomingIssue>>> {
        let state = self.state.lock().unwrap();
        if state.failing.contains(project.id.as_str()) {
            return Err(ArchSyncError::Remote("502 Bad Gateway".to_string()));
        }
        Ok(state
            .issues
            .get(project.id.as_str())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|remote| Box::new(FakeIncomingIssue { remote }) as Box<dyn IncomingIssue>)
            .collect())
    }

    async fn create_outgoing_issue(
        &self,
        project: &ImsProject,
        issue: &Issue,
    ) -> Result<Option<IssueConversionInformation>> {
        let mut state = self.state.lock().unwrap();
        state.pushes.push(Push {
            kind: "issue",
            detail: issue.title.clone(),
            actors: Vec::new(),
        });
        Ok(Some(IssueConversionInformation::new(
            project.id.as_str(),
            format!("remote-{}", state.pushes.len()),
        )))
    }

    async fn sync_comment(
        &self,
        project: &ImsProject,
        _issue: &IssueConversionInformation,
        comment: &TimelineItem,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>> {
        let body = comment.comment_body().unwrap_or_default().to_string();
        Ok(self.record(project, "comment", body, actors))
    }

    async fn sync_title_change(
        &self,
        project: &ImsProject,
        _issue: &IssueConversionInformation,
        new_title: &str,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>> {
        Ok(self.record(project, "title", new_title.to_string(), actors))
    }

    async fn sync_state_change(
        &self,
        project: &ImsProject,
        _issue: &IssueConversionInformation,
        new_state: &IssueState,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>> {
        Ok(self.record(project, "state", new_state.name.clone(), actors))
    }

    async fn sync_added_label(
        &self,
        project: &ImsProject,
        _issue: &IssueConversionInformation,
        label: &Label,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>> {
        Ok(self.record(project, "added_label", label.name.clone(), actors))
    }

    async fn sync_removed_label(
        &self,
        project: &ImsProject,
        _issue: &IssueConversionInformation,
        label: &Label,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>> {
        Ok(self.record(project, "removed_label", label.name.clone(), actors))
    }

    async fn sync_assigned_user(
        &self,
        project: &ImsProject,
        _issue: &IssueConversionInformation,
        user: &User,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>> {
        Ok(self.record(project, "assigned_user", user.username.clone(), actors))
    }

    async fn sync_unassigned_user(
        &self,
        project: &ImsProject,
        _issue: &IssueConversionInformation,
        user: &User,
        actors: &[User],
    ) -> Result<Option<TimelineItemConversionInformation>> {
        Ok(self.record(project, "unassigned_user", user.username.clone(), actors))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notified: Mutex<Vec<String>>,
}

#[async_trait]
impl SyncNotifier for RecordingNotifier {
    async fn notify(&self, project: &ImsProject, error: &ArchSyncError) {
        self.notified
            .lock()
            .unwrap()
            .push(format!("{}: {}", project.id, error));
    }
}

/// Vocabulary, three users and component "c" with two versions
fn topology() -> IssueGraph {
    let mut graph = IssueGraph::new();
    graph.insert(IssueType {
        id: IssueTypeId::new("bug"),
        name: "Bug".into(),
    });
    for (id, is_open) in [("open", true), ("closed", false)] {
        graph.insert(IssueState {
            id: IssueStateId::new(id),
            name: id.into(),
            is_open,
        });
    }
    for name in ["alice", "bob", "carol"] {
        graph.insert(User {
            id: UserId::new(name),
            username: name.into(),
            display_name: None,
            is_system: false,
        });
    }
    graph.add_component(Component::new("c", "payments"));
    graph
        .add_component_version(ComponentVersion::new("v1", "c", "1.0"))
        .unwrap();
    graph
        .add_component_version(ComponentVersion::new("v2", "c", "2.0"))
        .unwrap();
    graph
}

fn project(id: &str) -> ImsProject {
    ImsProject::new(id, id, TrackableRef::Component(ComponentId::new("c")))
        .with_outgoing(OutgoingGates::all())
}

async fn setup(graph: IssueGraph, tracker: &FakeTracker, dir: &TempDir) -> (SyncOrchestrator, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open(&StoreConfig::new(dir.path().join("sync.db"))).unwrap());
    store
        .save(ChangeSet {
            updated: graph.nodes(),
            deleted: vec![],
        })
        .await
        .unwrap();
    let orchestrator = SyncOrchestrator::load(
        Arc::new(tracker.clone()),
        Arc::new(tracker.clone()),
        store.clone(),
        store.clone(),
    )
    .await
    .unwrap();
    (orchestrator, store)
}

fn append(graph: &mut IssueGraph, issue: &IssueId, minute: i64, user: &str, kind: TimelineItemKind) {
    let item = TimelineItem::new(
        issue.clone(),
        base_time() + Duration::minutes(minute),
        UserId::new(user),
        kind,
    );
    graph.issue_mut(issue).unwrap().timeline.push(item.id.clone());
    graph.insert(item);
}

mod incoming_tests {
    use super::*;

    #[tokio::test]
    async fn test_incoming_sync_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let tracker = FakeTracker::default();
        tracker.add_issue(
            "gh",
            RemoteIssue::new("GH-1", "Checkout crashes", "alice")
                .with_comment("C-1", "bob", "Reproduced on 2.0")
                .with_comment("C-2", "dave", "Same here"),
        );
        let mut graph = topology();
        graph.insert(project("gh"));
        let (mut orchestrator, store) = setup(graph, &tracker, &dir).await;

        let report = orchestrator.sync().await;
        assert!(report.is_success());
        let stats = report.stats(&ImsProjectId::new("gh")).unwrap();
        assert_eq!(stats.issues_created, 1);
        assert_eq!(stats.timeline_items_created, 2);
        assert_eq!(stats.outgoing_pushes, 0);

        let graph = orchestrator.graph();
        assert_eq!(graph.issues().count(), 1);
        let issue = graph.issues().next().unwrap().clone();
        assert_eq!(issue.comments.len(), 2);
        assert!(graph.user_by_username("dave").is_some());
        assert_eq!(graph.ims_issues().count(), 1);
        // fallback: both versions of "c" carry the issue
        assert_eq!(graph.aggregated_issues().count(), 2);
        assert!(graph.aggregated_issues().all(|a| a.count == 1 && a.is_open));
        let nodes_after_first = graph.len();

        let report = orchestrator.sync().await;
        let stats = report.stats(&ImsProjectId::new("gh")).unwrap();
        assert_eq!(stats.issues_created, 0);
        assert_eq!(stats.issues_updated, 1);
        assert_eq!(stats.timeline_items_created, 0);
        assert_eq!(orchestrator.graph().len(), nodes_after_first);
        assert_eq!(
            orchestrator.graph().issue(&issue.id).unwrap().aggregated_by,
            issue.aggregated_by
        );
        assert!(tracker.pushes().is_empty());
        assert_eq!(tracker.state.lock().unwrap().fetches, 2);

        let stored = store.load_graph().await.unwrap();
        assert_eq!(stored.issues().count(), 1);
        assert_eq!(stored.aggregated_issues().count(), 2);
        let conversion = store
            .issue_conversion_by_external("gh", "GH-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversion.issue_id, Some(issue.id));
    }

    #[tokio::test]
    async fn test_mirrored_issue_is_dereplicated() {
        let dir = TempDir::new().unwrap();
        let tracker = FakeTracker::default();
        tracker.add_issue(
            "gh",
            RemoteIssue::new("GH-7", "Refund rounding error", "bob")
                .with_comment("GC-1", "bob", "Off by one cent"),
        );
        tracker.add_issue(
            "jira",
            RemoteIssue::new("PAY-42", "Refund rounding error", "bob")
                .with_comment("JC-1", "bob", "Off by one cent")
                .with_comment("JC-2", "carol", "Finance noticed too"),
        );
        let mut graph = topology();
        graph.insert(project("gh"));
        graph.insert(project("jira"));
        let (orchestrator, _store) = setup(graph, &tracker, &dir).await;
        let mut orchestrator =
            orchestrator.with_dereplicator(Box::new(HeuristicDereplicator::new(0.5, 1.0)));

        let report = orchestrator.sync().await;
        assert!(report.is_success());
        assert_eq!(report.stats(&ImsProjectId::new("gh")).unwrap().issues_created, 1);
        let jira = report.stats(&ImsProjectId::new("jira")).unwrap();
        assert_eq!(jira.issues_matched, 1);
        assert_eq!(jira.timeline_items_created, 1);

        let graph = orchestrator.graph();
        assert_eq!(graph.issues().count(), 1);
        assert_eq!(graph.ims_issues().count(), 2);
        let issue = graph.issues().next().unwrap();
        assert_eq!(issue.comments.len(), 2);
        assert!(tracker.pushes().is_empty());

        let report = orchestrator.sync().await;
        let jira = report.stats(&ImsProjectId::new("jira")).unwrap();
        assert_eq!(jira.timeline_items_created, 0);
        assert_eq!(orchestrator.graph().issues().count(), 1);
    }

    #[tokio::test]
    async fn test_lookalike_issues_in_one_project_stay_separate() {
        let dir = TempDir::new().unwrap();
        let tracker = FakeTracker::default();
        tracker.add_issue("gh", RemoteIssue::new("GH-1", "Bump deps", "alice"));
        tracker.add_issue("gh", RemoteIssue::new("GH-2", "Bump deps", "alice"));
        let mut graph = topology();
        graph.insert(project("gh"));
        let (orchestrator, store) = setup(graph, &tracker, &dir).await;
        let mut orchestrator =
            orchestrator.with_dereplicator(Box::new(HeuristicDereplicator::new(0.5, 1.0)));

        let report = orchestrator.sync().await;
        assert!(report.is_success());
        let stats = report.stats(&ImsProjectId::new("gh")).unwrap();
        assert_eq!(stats.issues_created, 2);
        assert_eq!(stats.issues_matched, 0);
        assert_eq!(orchestrator.graph().issues().count(), 2);

        let first = store
            .issue_conversion_by_external("gh", "GH-1")
            .await
            .unwrap()
            .and_then(|conversion| conversion.issue_id)
            .unwrap();
        let second = store
            .issue_conversion_by_external("gh", "GH-2")
            .await
            .unwrap()
            .and_then(|conversion| conversion.issue_id)
            .unwrap();
        assert_ne!(first, second);

        let report = orchestrator.sync().await;
        let stats = report.stats(&ImsProjectId::new("gh")).unwrap();
        assert_eq!(stats.issues_created, 0);
        assert_eq!(stats.issues_matched, 0);
        assert_eq!(stats.issues_updated, 2);
        assert_eq!(store.list_issue_conversions("gh").await.unwrap().len(), 2);
        assert_eq!(orchestrator.graph().issues().count(), 2);
    }

    #[tokio::test]
    async fn test_invasive_stamp_is_never_pushed() {
        let dir = TempDir::new().unwrap();
        let tracker = FakeTracker::default();
        tracker.add_issue("gh", RemoteIssue::new("GH-3", "Slow dashboard", "alice"));
        let mut graph = topology();
        graph.insert(project("gh"));
        let (orchestrator, _store) = setup(graph, &tracker, &dir).await;
        let mut orchestrator = orchestrator.with_dereplicator(Box::new(InvasiveDereplicator));

        orchestrator.sync().await;
        let issue = orchestrator.graph().issues().next().unwrap();
        assert!(issue.title.starts_with("Slow dashboard ["));
        assert!(extract_uuid(&issue.title).is_some());
        assert_eq!(issue.timeline.len(), 1);
        assert!(tracker.pushes().is_empty());

        orchestrator.sync().await;
        assert!(tracker.pushes().is_empty());
    }
}

mod outgoing_tests {
    use super::*;

    #[tokio::test]
    async fn test_local_changes_are_pushed_once() {
        let dir = TempDir::new().unwrap();
        let tracker = FakeTracker::default();
        tracker.add_issue("gh", RemoteIssue::new("GH-1", "Checkout crashes", "alice"));
        let mut graph = topology();
        graph.insert(project("gh"));
        for name in ["flaky", "regression"] {
            graph.insert(Label {
                id: LabelId::new(name),
                name: name.into(),
                color: None,
            });
        }
        let (mut orchestrator, store) = setup(graph, &tracker, &dir).await;
        orchestrator.sync().await;
        assert!(tracker.pushes().is_empty());

        let mut graph = store.load_graph().await.unwrap();
        let issue = graph.issues().next().unwrap().id.clone();
        for (minute, user) in [(10, "alice"), (11, "bob"), (12, "carol")] {
            append(
                &mut graph,
                &issue,
                minute,
                user,
                TimelineItemKind::TitleChanged {
                    old_title: "Checkout crashes".into(),
                    new_title: "Checkout crashes on empty cart".into(),
                },
            );
        }
        append(
            &mut graph,
            &issue,
            13,
            "alice",
            TimelineItemKind::AddedLabel {
                label: LabelId::new("flaky"),
            },
        );
        append(
            &mut graph,
            &issue,
            14,
            "bob",
            TimelineItemKind::RemovedLabel {
                label: LabelId::new("flaky"),
            },
        );
        append(
            &mut graph,
            &issue,
            15,
            "carol",
            TimelineItemKind::AddedLabel {
                label: LabelId::new("regression"),
            },
        );
        store
            .save(ChangeSet {
                updated: graph.nodes(),
                deleted: vec![],
            })
            .await
            .unwrap();
        orchestrator.reload().await.unwrap();

        let report = orchestrator.sync().await;
        assert_eq!(report.stats(&ImsProjectId::new("gh")).unwrap().outgoing_pushes, 2);
        assert_eq!(
            tracker.pushes(),
            vec![
                Push {
                    kind: "title",
                    detail: "Checkout crashes on empty cart".into(),
                    actors: vec!["carol".into(), "bob".into(), "alice".into()],
                },
                Push {
                    kind: "added_label",
                    detail: "regression".into(),
                    actors: vec!["carol".into()],
                },
            ]
        );
        assert_eq!(
            orchestrator.graph().issue(&issue).unwrap().title,
            "Checkout crashes on empty cart"
        );

        orchestrator.sync().await;
        assert_eq!(tracker.pushes().len(), 2);
    }

    #[tokio::test]
    async fn test_state_and_assignment_are_pushed_once() {
        let dir = TempDir::new().unwrap();
        let tracker = FakeTracker::default();
        tracker.add_issue("gh", RemoteIssue::new("GH-5", "Flaky checkout test", "alice"));
        let mut graph = topology();
        graph.insert(project("gh"));
        let (mut orchestrator, store) = setup(graph, &tracker, &dir).await;
        orchestrator.sync().await;

        let mut graph = store.load_graph().await.unwrap();
        let issue = graph.issues().next().unwrap().id.clone();
        for (minute, user) in [(10, "alice"), (11, "bob")] {
            append(
                &mut graph,
                &issue,
                minute,
                user,
                TimelineItemKind::StateChanged {
                    old_state: IssueStateId::new("open"),
                    new_state: IssueStateId::new("closed"),
                },
            );
        }
        append(
            &mut graph,
            &issue,
            12,
            "carol",
            TimelineItemKind::Assignment {
                user: UserId::new("bob"),
                assignment_type: None,
            },
        );
        store
            .save(ChangeSet {
                updated: graph.nodes(),
                deleted: vec![],
            })
            .await
            .unwrap();
        orchestrator.reload().await.unwrap();

        let report = orchestrator.sync().await;
        assert_eq!(report.stats(&ImsProjectId::new("gh")).unwrap().outgoing_pushes, 2);
        assert_eq!(
            tracker.pushes(),
            vec![
                Push {
                    kind: "state",
                    detail: "closed".into(),
                    actors: vec!["bob".into(), "alice".into()],
                },
                Push {
                    kind: "assigned_user",
                    detail: "bob".into(),
                    actors: vec!["carol".into()],
                },
            ]
        );
        assert_eq!(
            orchestrator.graph().issue(&issue).unwrap().state,
            IssueStateId::new("closed")
        );
        assert!(orchestrator
            .graph()
            .aggregated_issues()
            .all(|aggregated| !aggregated.is_open));

        let report = orchestrator.sync().await;
        assert_eq!(report.stats(&ImsProjectId::new("gh")).unwrap().outgoing_pushes, 0);
        assert_eq!(tracker.pushes().len(), 2);
    }

    #[tokio::test]
    async fn test_local_issue_is_created_remotely() {
        let dir = TempDir::new().unwrap();
        let tracker = FakeTracker::default();
        let mut graph = topology();
        graph.insert(project("gh"));
        graph.insert(
            Issue::new(
                "local-1",
                "Add audit log",
                UserId::new("carol"),
                IssueTypeId::new("bug"),
                IssueStateId::new("open"),
                base_time(),
            )
            .with_trackable(TrackableRef::Component(ComponentId::new("c"))),
        );
        append(
            &mut graph,
            &IssueId::new("local-1"),
            1,
            "carol",
            TimelineItemKind::IssueComment {
                body: "Needed for SOC2".into(),
                answers: None,
                is_deleted: false,
            },
        );
        let (mut orchestrator, store) = setup(graph, &tracker, &dir).await;

        orchestrator.sync().await;
        let kinds: Vec<&str> = tracker.pushes().iter().map(|push| push.kind).collect();
        assert_eq!(kinds, vec!["issue", "comment"]);
        let conversion = store
            .issue_conversion_by_issue("gh", &IssueId::new("local-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversion.external_id, "remote-1");

        orchestrator.sync().await;
        assert_eq!(tracker.pushes().len(), 2);
    }
}

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_project_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let tracker = FakeTracker::default();
        tracker.add_issue("gh", RemoteIssue::new("GH-1", "Checkout crashes", "alice"));
        tracker.fail("broken");
        let mut graph = topology();
        graph.insert(project("broken"));
        graph.insert(project("gh"));
        let (orchestrator, _store) = setup(graph, &tracker, &dir).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let mut orchestrator = orchestrator.with_notifier(notifier.clone());

        let report = orchestrator.sync().await;
        assert!(!report.is_success());
        assert_eq!(report.failed_projects(), 1);
        assert!(report.stats(&ImsProjectId::new("broken")).is_none());
        assert_eq!(
            report.stats(&ImsProjectId::new("gh")).unwrap().issues_created,
            1
        );
        assert_eq!(orchestrator.graph().issues().count(), 1);

        let notified = notifier.notified.lock().unwrap();
        assert_eq!(notified.len(), 1);
        assert!(notified[0].starts_with("broken: Remote error"));
    }
}
