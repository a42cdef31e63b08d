//! Issue aggregation
//!
//! Derived view of the issue set on the architecture graph: per relation partner and
//! (issue type, open flag), one `AggregatedIssue` counting the issues that resolve to that
//! partner. Kept consistent incrementally by `IssueAggregationUpdater` as issues and
//! topology change, with every write buffered in an `UpdateContext`.

mod context;
mod related;
mod updater;

pub use context::{
    find_incoming_relation_partners, find_outgoing_relation_partners, partner_node, UpdateContext,
};
pub use related::{component_related_entities, impacted_components, resolve_partners};
pub use updater::IssueAggregationUpdater;
