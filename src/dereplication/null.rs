use super::*;

/// Treats everything as new
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDereplicator;

impl IssueDereplicator for NullDereplicator {
    fn name(&self) -> &'static str {
        "none"
    }

    fn validate_issue(
        &self,
        _project: &ImsProject,
        issue: Issue,
        _graph: &IssueGraph,
        _request: &IssueDereplicatorRequest,
    ) -> Result<IssueDereplicationResult> {
        Ok(IssueDereplicationResult::new_issue(issue))
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
