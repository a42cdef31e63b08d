//! Similarity-based dereplication
//!
//! Issues are compared on three boolean signals (same title, same creator, same body),
//! comments on two (same body, same author). Each signal is evaluated in one pass over
//! the whole candidate set. When several candidates clear the threshold the best one
//! wins: highest score, then earliest creation, then smallest ID.

use super::*;
use crate::graph::TimelineItemKind;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Threshold-based matcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicDereplicator {
    issue_threshold: f64,
    comment_threshold: f64,
}

impl HeuristicDereplicator {
    /// Thresholds are fractions of matching signals in [0, 1]
    pub fn new(issue_threshold: f64, comment_threshold: f64) -> Self {
        Self {
            issue_threshold,
            comment_threshold,
        }
    }

    pub fn issue_threshold(&self) -> f64 {
        self.issue_threshold
    }

    pub fn comment_threshold(&self) -> f64 {
        self.comment_threshold
    }
}

/// Count, per candidate, how many signals matched
fn tally<'a, T, K: Ord + Clone + 'a>(
    candidates: &[&'a T],
    key: impl Fn(&'a T) -> K,
    signals: &[&dyn Fn(&T) -> bool],
) -> HashMap<K, u32>
where
    K: std::hash::Hash,
{
    let mut scores: HashMap<K, u32> = HashMap::new();
    for signal in signals {
        let matched: BTreeSet<K> = candidates
            .iter()
            .filter(|candidate| signal(candidate))
            .map(|candidate| key(*candidate))
            .collect();
        for id in matched {
            *scores.entry(id).or_default() += 1;
        }
    }
    scores
}

impl IssueDereplicator for HeuristicDereplicator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn validate_issue(
        &self,
        project: &ImsProject,
        issue: Issue,
        graph: &IssueGraph,
        _request: &IssueDereplicatorRequest,
    ) -> Result<IssueDereplicationResult> {
        let candidates = issues_on_same_trackables(project, &issue, graph);
        let same_title: &dyn Fn(&Issue) -> bool = &|c| c.title == issue.title;
        let same_creator: &dyn Fn(&Issue) -> bool = &|c| c.created_by == issue.created_by;
        let same_body: &dyn Fn(&Issue) -> bool = &|c| c.body == issue.body;
        let scores = tally(
            &candidates,
            |c: &Issue| c.id.clone(),
            &[same_title, same_creator, same_body],
        );

        let best = candidates
            .iter()
            .filter_map(|candidate| {
                let score = f64::from(scores.get(&candidate.id).copied().unwrap_or(0)) / 3.0;
                (score >= self.issue_threshold).then_some((score, *candidate))
            })
            .min_by(|(score_a, a), (score_b, b)| {
                score_b
                    .total_cmp(score_a)
                    .then_with(|| a.created_at.cmp(&b.created_at))
                    .then_with(|| a.id.cmp(&b.id))
            });

        Ok(match best {
            Some((score, existing)) => {
                debug!(
                    issue = %issue.id,
                    existing = %existing.id,
                    score,
                    "Incoming issue matches existing issue"
                );
                IssueDereplicationResult::existing(existing.id.clone())
            }
            None => IssueDereplicationResult::new_issue(issue),
        })
    }

    fn validate_timeline_items(
        &self,
        issue: &IssueId,
        candidates: Vec<TimelineItem>,
        graph: &IssueGraph,
        _request: &IssueDereplicatorRequest,
    ) -> Result<TimelineItemDereplicationResult> {
        let existing: Vec<&TimelineItem> = graph
            .sorted_timeline(issue)?
            .into_iter()
            .filter(|item| {
                matches!(
                    item.kind,
                    TimelineItemKind::IssueComment {
                        is_deleted: false,
                        ..
                    }
                )
            })
            .collect();

        let mut claimed = BTreeSet::new();
        let mut resulting_items = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(body) = candidate.comment_body() else {
                resulting_items.push(ResolvedTimelineItem::New(candidate));
                continue;
            };

            let same_body: &dyn Fn(&TimelineItem) -> bool = &|c| c.comment_body() == Some(body);
            let same_author: &dyn Fn(&TimelineItem) -> bool =
                &|c| c.created_by == candidate.created_by;
            let scores = tally(
                &existing,
                |c: &TimelineItem| c.id.clone(),
                &[same_body, same_author],
            );

            // existing is in timeline order, so the first best is also the earliest
            let mut best: Option<(f64, &TimelineItem)> = None;
            for item in &existing {
                if claimed.contains(&item.id) {
                    continue;
                }
                let score = f64::from(scores.get(&item.id).copied().unwrap_or(0)) / 2.0;
                if score >= self.comment_threshold && best.map_or(true, |(s, _)| score > s) {
                    best = Some((score, *item));
                }
            }

            match best {
                Some((_, item)) => {
                    claimed.insert(item.id.clone());
                    resulting_items.push(ResolvedTimelineItem::Existing(item.id.clone()));
                }
                None => resulting_items.push(ResolvedTimelineItem::New(candidate)),
            }
        }
        Ok(TimelineItemDereplicationResult { resulting_items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::*;
    use crate::testing::*;

    fn project() -> ImsProject {
        ImsProject::new("gh", "GitHub", TrackableRef::Component(ComponentId::new("c")))
    }

    fn request() -> IssueDereplicatorRequest {
        IssueDereplicatorRequest::new(UserId::new("sync-bot"))
    }

    fn incoming(body: &str) -> Issue {
        Issue::new(
            "incoming",
            "Crash on login",
            UserId::new("alice"),
            IssueTypeId::new("bug"),
            IssueStateId::new("open"),
            at(30),
        )
        .with_body(body)
        .with_trackable(TrackableRef::Component(ComponentId::new("c")))
    }

    fn graph_with_existing() -> IssueGraph {
        let mut graph = base_graph();
        add_issue(&mut graph, "existing", "Crash on login", "c");
        graph
            .issue_mut(&IssueId::new("existing"))
            .unwrap()
            .body = "Stack trace attached".into();
        graph
    }

    #[test]
    fn test_two_of_three_signals_clear_half_threshold() {
        let graph = graph_with_existing();
        let result = HeuristicDereplicator::new(0.5, 1.0)
            .validate_issue(&project(), incoming("Different body"), &graph, &request())
            .unwrap();
        assert_eq!(
            result.resulting_issue,
            ResolvedIssue::Existing(IssueId::new("existing"))
        );
        assert!(result.fake_synced_items.is_empty());
    }

    #[test]
    fn test_two_of_three_signals_miss_strict_threshold() {
        let graph = graph_with_existing();
        let result = HeuristicDereplicator::new(0.9, 1.0)
            .validate_issue(&project(), incoming("Different body"), &graph, &request())
            .unwrap();
        assert!(matches!(result.resulting_issue, ResolvedIssue::New(_)));
    }

    #[test]
    fn test_other_trackables_are_ignored() {
        let mut graph = base_graph();
        add_issue(&mut graph, "elsewhere", "Crash on login", "d");
        let result = HeuristicDereplicator::new(0.5, 1.0)
            .validate_issue(&project(), incoming(""), &graph, &request())
            .unwrap();
        assert!(matches!(result.resulting_issue, ResolvedIssue::New(_)));
    }

    #[test]
    fn test_issues_already_linked_to_project_are_ignored() {
        let mut graph = graph_with_existing();
        graph.insert(ImsIssue {
            id: ImsIssueId::new("link"),
            ims_project: ImsProjectId::new("gh"),
            issue: IssueId::new("existing"),
            templated_fields: Default::default(),
        });
        let dereplicator = HeuristicDereplicator::new(0.5, 1.0);
        let result = dereplicator
            .validate_issue(&project(), incoming("Stack trace attached"), &graph, &request())
            .unwrap();
        assert!(matches!(result.resulting_issue, ResolvedIssue::New(_)));

        let jira = ImsProject::new("jira", "Jira", TrackableRef::Component(ComponentId::new("c")));
        let result = dereplicator
            .validate_issue(&jira, incoming("Stack trace attached"), &graph, &request())
            .unwrap();
        assert_eq!(
            result.resulting_issue,
            ResolvedIssue::Existing(IssueId::new("existing"))
        );
    }

    #[test]
    fn test_tie_break_prefers_score_then_age() {
        let mut graph = base_graph();
        add_issue(&mut graph, "b-older", "Crash on login", "c");
        add_issue(&mut graph, "a-newer", "Crash on login", "c");
        graph.issue_mut(&IssueId::new("a-newer")).unwrap().created_at = at(10);
        add_issue(&mut graph, "z-exact", "Crash on login", "c");
        graph.issue_mut(&IssueId::new("z-exact")).unwrap().created_at = at(20);
        graph.issue_mut(&IssueId::new("z-exact")).unwrap().body = "same".into();

        let dereplicator = HeuristicDereplicator::new(0.5, 1.0);
        let result = dereplicator
            .validate_issue(&project(), incoming("same"), &graph, &request())
            .unwrap();
        assert_eq!(
            result.resulting_issue,
            ResolvedIssue::Existing(IssueId::new("z-exact"))
        );

        let result = dereplicator
            .validate_issue(&project(), incoming("other"), &graph, &request())
            .unwrap();
        assert_eq!(
            result.resulting_issue,
            ResolvedIssue::Existing(IssueId::new("b-older"))
        );
    }

    #[test]
    fn test_comments_match_on_body_and_author() {
        let mut graph = graph_with_existing();
        let issue = IssueId::new("existing");
        let known = push_item(
            &mut graph,
            &issue,
            1,
            "bob",
            TimelineItemKind::IssueComment {
                body: "Reproduced on 2.0".into(),
                answers: None,
                is_deleted: false,
            },
        );

        let comment = |user: &str, body: &str| {
            TimelineItem::new(
                issue.clone(),
                at(5),
                UserId::new(user),
                TimelineItemKind::IssueComment {
                    body: body.into(),
                    answers: None,
                    is_deleted: false,
                },
            )
        };
        let label = TimelineItem::new(
            issue.clone(),
            at(5),
            UserId::new("bob"),
            TimelineItemKind::AddedLabel {
                label: LabelId::new("l"),
            },
        );

        let result = HeuristicDereplicator::new(0.5, 1.0)
            .validate_timeline_items(
                &issue,
                vec![
                    comment("bob", "Reproduced on 2.0"),
                    comment("alice", "Reproduced on 2.0"),
                    label,
                ],
                &graph,
                &request(),
            )
            .unwrap();

        assert_eq!(result.resulting_items[0], ResolvedTimelineItem::Existing(known));
        assert!(matches!(result.resulting_items[1], ResolvedTimelineItem::New(_)));
        assert!(matches!(result.resulting_items[2], ResolvedTimelineItem::New(_)));
    }
}
