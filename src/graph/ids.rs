//! Type-safe ID wrappers for graph nodes
//!
//! Every node kind gets its own newtype so an `IssueId` can never be passed where a
//! `ComponentVersionId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! node_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an ID from an existing string
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mint a fresh random ID
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, uuid::Uuid::new_v4().simple()))
            }

            /// Get the underlying string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

node_id!(
    /// Issue ID
    IssueId,
    "issue"
);
node_id!(
    /// Timeline item ID
    TimelineItemId,
    "item"
);
node_id!(IssueTypeId, "type");
node_id!(IssueStateId, "state");
node_id!(UserId, "user");
node_id!(LabelId, "label");
node_id!(ComponentId, "component");
node_id!(ComponentVersionId, "cv");
node_id!(InterfaceId, "interface");
node_id!(InterfaceDefinitionId, "idef");
node_id!(InterfaceSpecificationId, "ispec");
node_id!(InterfaceSpecificationVersionId, "isv");
node_id!(InterfacePartId, "ipart");
node_id!(ProjectId, "project");
node_id!(RelationId, "relation");
node_id!(
    /// Derived rollup node ID
    AggregatedIssueId,
    "agg"
);
node_id!(IssueRelationId, "irel");
node_id!(AggregatedIssueRelationId, "arel");
node_id!(
    /// ID of a project on an external tracker that is synced into a trackable
    ImsProjectId,
    "imsproject"
);
node_id!(ImsIssueId, "imsissue");
