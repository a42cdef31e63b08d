//! UUID-stamping dereplication
//!
//! Every issue title carries a `[<uuid>]` suffix. Two issues with the same stamp are the
//! same issue. An unstamped incoming issue gets a fresh stamp, and the retitling is
//! recorded as a synced-by-construction TitleChanged so it never goes back out.

use super::*;
use crate::graph::TimelineItemKind;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

lazy_static! {
    static ref TITLE_UUID: Regex =
        Regex::new(r"\[([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\]\s*$")
            .expect("Failed to compile title stamp regex");
}

/// UUID stamped at the end of a title, if any
pub fn extract_uuid(title: &str) -> Option<Uuid> {
    TITLE_UUID
        .captures(title)
        .and_then(|captures| captures.get(1))
        .and_then(|m| Uuid::parse_str(m.as_str()).ok())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InvasiveDereplicator;

impl IssueDereplicator for InvasiveDereplicator {
    fn name(&self) -> &'static str {
        "invasive"
    }

    fn validate_issue(
        &self,
        project: &ImsProject,
        mut issue: Issue,
        graph: &IssueGraph,
        request: &IssueDereplicatorRequest,
    ) -> Result<IssueDereplicationResult> {
        if let Some(stamp) = extract_uuid(&issue.title) {
            let existing = issues_on_same_trackables(project, &issue, graph)
                .into_iter()
                .filter(|candidate| extract_uuid(&candidate.title) == Some(stamp))
                .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            return Ok(match existing {
                Some(existing) => {
                    debug!(issue = %issue.id, existing = %existing.id, %stamp, "Stamp matches existing issue");
                    IssueDereplicationResult::existing(existing.id.clone())
                }
                None => IssueDereplicationResult::new_issue(issue),
            });
        }

        let stamp = Uuid::new_v4();
        let old_title = issue.title.clone();
        let new_title = format!("{} [{}]", old_title.trim_end(), stamp);
        let stamping = TimelineItem::new(
            issue.id.clone(),
            Utc::now().max(issue.created_at),
            request.dummy_user.clone(),
            TimelineItemKind::TitleChanged {
                old_title,
                new_title: new_title.clone(),
            },
        );
        issue.title = new_title;
        debug!(issue = %issue.id, %stamp, "Stamped incoming issue");

        Ok(IssueDereplicationResult {
            resulting_issue: ResolvedIssue::New(issue),
            fake_synced_items: vec![stamping],
        })
    }

    fn validate_timeline_items(
        &self,
        _issue: &IssueId,
        candidates: Vec<TimelineItem>,
        _graph: &IssueGraph,
        _request: &IssueDereplicatorRequest,
    ) -> Result<TimelineItemDereplicationResult> {
        Ok(all_new(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::*;
    use crate::testing::*;

    const STAMP: &str = "6f1c2d3e-4a5b-4c6d-8e7f-901234567890";

    fn project() -> ImsProject {
        ImsProject::new("jira", "Jira", TrackableRef::Component(ComponentId::new("c")))
    }

    fn incoming(title: &str) -> Issue {
        Issue::new(
            "incoming",
            title,
            UserId::new("bob"),
            IssueTypeId::new("bug"),
            IssueStateId::new("open"),
            at(5),
        )
        .with_trackable(TrackableRef::Component(ComponentId::new("c")))
    }

    #[test]
    fn test_extract_uuid() {
        assert_eq!(
            extract_uuid(&format!("Crash [{STAMP}]")),
            Some(Uuid::parse_str(STAMP).unwrap())
        );
        assert_eq!(extract_uuid(&format!("[{STAMP}] Crash")), None);
        assert_eq!(extract_uuid("Crash [not-a-uuid]"), None);
    }

    #[test]
    fn test_stamped_title_matches_existing() {
        let mut graph = base_graph();
        add_issue(&mut graph, "existing", &format!("Login broken [{STAMP}]"), "c");

        let result = InvasiveDereplicator
            .validate_issue(
                &project(),
                incoming(&format!("Totally different [{STAMP}]")),
                &graph,
                &IssueDereplicatorRequest::new(UserId::new("sync-bot")),
            )
            .unwrap();
        assert_eq!(
            result.resulting_issue,
            ResolvedIssue::Existing(IssueId::new("existing"))
        );
    }

    #[test]
    fn test_stamp_already_linked_to_project_is_not_matched() {
        let mut graph = base_graph();
        add_issue(&mut graph, "existing", &format!("Login broken [{STAMP}]"), "c");
        graph.insert(ImsIssue {
            id: ImsIssueId::new("link"),
            ims_project: ImsProjectId::new("jira"),
            issue: IssueId::new("existing"),
            templated_fields: Default::default(),
        });

        let result = InvasiveDereplicator
            .validate_issue(
                &project(),
                incoming(&format!("Login broken [{STAMP}]")),
                &graph,
                &IssueDereplicatorRequest::new(UserId::new("sync-bot")),
            )
            .unwrap();
        assert!(matches!(result.resulting_issue, ResolvedIssue::New(_)));
        assert!(result.fake_synced_items.is_empty());
    }

    #[test]
    fn test_unstamped_title_gets_stamp_and_fake_synced_item() {
        let graph = base_graph();
        let result = InvasiveDereplicator
            .validate_issue(
                &project(),
                incoming("Login broken"),
                &graph,
                &IssueDereplicatorRequest::new(UserId::new("sync-bot")),
            )
            .unwrap();

        let ResolvedIssue::New(issue) = result.resulting_issue else {
            panic!("expected a new issue");
        };
        assert!(issue.title.starts_with("Login broken ["));
        assert!(extract_uuid(&issue.title).is_some());

        assert_eq!(result.fake_synced_items.len(), 1);
        let item = &result.fake_synced_items[0];
        assert_eq!(item.created_by, UserId::new("sync-bot"));
        assert_eq!(
            item.kind,
            TimelineItemKind::TitleChanged {
                old_title: "Login broken".into(),
                new_title: issue.title.clone(),
            }
        );
    }
}
