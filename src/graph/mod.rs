//! Core graph data structures
//!
//! Issues and their timelines, the architecture graph (components, versions,
//! interfaces, relations), the derived aggregated issues, and the arena holding them all.

mod architecture;
mod ids;
mod issue;
mod store;
mod timeline;

pub use architecture::{
    AffectedEntityRef, AggregatedIssue, AggregatedIssueRelation, Component, ComponentVersion,
    Interface, InterfaceDefinition, InterfacePart, InterfaceSpecification,
    InterfaceSpecificationVersion, Project, Relation, RelationPartnerRef, TrackableRef,
};
pub use ids::*;
pub use issue::{
    ImsIssue, ImsProject, Issue, IssueRelation, IssueState, IssueType, Label, OutgoingGates, User,
};
pub use store::{IssueGraph, Node, NodeRef};
pub use timeline::{timeline_order, TimelineItem, TimelineItemKind};
