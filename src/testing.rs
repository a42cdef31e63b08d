//! Shared fixtures for unit tests

use crate::graph::*;
use chrono::{DateTime, TimeZone, Utc};

/// Fixed timestamp `minute` minutes into 2024-01-01
pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minute as i64)
}

/// Vocabulary plus two components:
/// "c" with versions v1 and v2, "d" with version d1.
pub fn base_graph() -> IssueGraph {
    let mut graph = IssueGraph::new();
    for (id, name) in [("bug", "Bug"), ("feature", "Feature")] {
        graph.insert(IssueType {
            id: IssueTypeId::new(id),
            name: name.into(),
        });
    }
    for (id, is_open) in [("open", true), ("closed", false)] {
        graph.insert(IssueState {
            id: IssueStateId::new(id),
            name: id.into(),
            is_open,
        });
    }
    for (id, is_system) in [("alice", false), ("bob", false), ("sync-bot", true)] {
        graph.insert(User {
            id: UserId::new(id),
            username: id.into(),
            display_name: None,
            is_system,
        });
    }

    graph.add_component(Component::new("c", "payments"));
    graph
        .add_component_version(ComponentVersion::new("v1", "c", "1.0"))
        .unwrap();
    graph
        .add_component_version(ComponentVersion::new("v2", "c", "2.0"))
        .unwrap();
    graph.add_component(Component::new("d", "ledger"));
    graph
        .add_component_version(ComponentVersion::new("d1", "d", "1.0"))
        .unwrap();
    graph
}

/// Open bug by alice on component `component`
pub fn add_issue(graph: &mut IssueGraph, id: &str, title: &str, component: &str) -> IssueId {
    let issue = Issue::new(
        id,
        title,
        UserId::new("alice"),
        IssueTypeId::new("bug"),
        IssueStateId::new("open"),
        at(0),
    )
    .with_trackable(TrackableRef::Component(ComponentId::new(component)));
    let issue_id = issue.id.clone();
    graph.insert(issue);
    issue_id
}

/// Append a timeline item to an issue
pub fn push_item(
    graph: &mut IssueGraph,
    issue: &IssueId,
    minute: u32,
    user: &str,
    kind: TimelineItemKind,
) -> TimelineItemId {
    let item = TimelineItem::new(issue.clone(), at(minute), UserId::new(user), kind);
    let id = item.id.clone();
    graph.issue_mut(issue).unwrap().timeline.push(id.clone());
    graph.insert(item);
    id
}

/// Every partner has at most one aggregated issue per key, counts match member sets,
/// and membership is mirrored on the issue side
pub fn assert_aggregation_consistent(graph: &IssueGraph) {
    for aggregated in graph.aggregated_issues() {
        assert_eq!(aggregated.count as usize, aggregated.issues.len());
        assert!(!aggregated.issues.is_empty(), "empty aggregated issue survived");
        let siblings = graph
            .relation_partner_aggregated_issues(&aggregated.relation_partner)
            .unwrap();
        assert!(siblings.contains(&aggregated.id));
        let same_key = siblings
            .iter()
            .map(|id| graph.aggregated_issue(id).unwrap())
            .filter(|a| a.issue_type == aggregated.issue_type && a.is_open == aggregated.is_open)
            .count();
        assert_eq!(same_key, 1);
        for issue in &aggregated.issues {
            assert!(graph.issue(issue).unwrap().aggregated_by.contains(&aggregated.id));
        }
    }
    for issue in graph.issues() {
        for aggregated in &issue.aggregated_by {
            assert!(graph
                .aggregated_issue(aggregated)
                .unwrap()
                .issues
                .contains(&issue.id));
        }
    }
    for relation in graph.aggregated_issue_relations() {
        assert_eq!(relation.count as usize, relation.issue_relations.len());
        assert!(graph
            .aggregated_issue(&relation.start)
            .unwrap()
            .outgoing_relations
            .contains(&relation.id));
        assert!(graph
            .aggregated_issue(&relation.end)
            .unwrap()
            .incoming_relations
            .contains(&relation.id));
    }
}
