//! Architecture graph nodes
//!
//! Components, their versions and interfaces, interface specifications and the derived
//! aggregated issues that hang off relation partners.

use super::ids::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Something an issue can be filed against
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TrackableRef {
    Component(ComponentId),
    Project(ProjectId),
}

/// Any entity an issue can name in its `affects` set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AffectedEntityRef {
    Component(ComponentId),
    ComponentVersion(ComponentVersionId),
    Interface(InterfaceId),
    InterfaceSpecification(InterfaceSpecificationId),
    InterfaceSpecificationVersion(InterfaceSpecificationVersionId),
    InterfacePart(InterfacePartId),
    Project(ProjectId),
}

/// Endpoint of a directed relation, and owner of aggregated issues
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RelationPartnerRef {
    ComponentVersion(ComponentVersionId),
    Interface(InterfaceId),
}

impl fmt::Display for RelationPartnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationPartnerRef::ComponentVersion(id) => write!(f, "ComponentVersion({})", id),
            RelationPartnerRef::Interface(id) => write!(f, "Interface({})", id),
        }
    }
}

impl From<ComponentVersionId> for RelationPartnerRef {
    fn from(id: ComponentVersionId) -> Self {
        RelationPartnerRef::ComponentVersion(id)
    }
}

impl From<InterfaceId> for RelationPartnerRef {
    fn from(id: InterfaceId) -> Self {
        RelationPartnerRef::Interface(id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    #[serde(default)]
    pub versions: BTreeSet<ComponentVersionId>,
    #[serde(default)]
    pub interface_specifications: BTreeSet<InterfaceSpecificationId>,
}

impl Component {
    pub fn new(id: impl Into<ComponentId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            versions: BTreeSet::new(),
            interface_specifications: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentVersion {
    pub id: ComponentVersionId,
    pub component: ComponentId,
    pub version: String,
    #[serde(default)]
    pub interface_definitions: BTreeSet<InterfaceDefinitionId>,
    #[serde(default)]
    pub outgoing_relations: BTreeSet<RelationId>,
    #[serde(default)]
    pub incoming_relations: BTreeSet<RelationId>,
    #[serde(default)]
    pub aggregated_issues: BTreeSet<AggregatedIssueId>,
}

impl ComponentVersion {
    pub fn new(
        id: impl Into<ComponentVersionId>,
        component: impl Into<ComponentId>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            component: component.into(),
            version: version.into(),
            interface_definitions: BTreeSet::new(),
            outgoing_relations: BTreeSet::new(),
            incoming_relations: BTreeSet::new(),
            aggregated_issues: BTreeSet::new(),
        }
    }
}

/// Visible interface of a component version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub id: InterfaceId,
    pub name: String,
    pub interface_definition: InterfaceDefinitionId,
    #[serde(default)]
    pub outgoing_relations: BTreeSet<RelationId>,
    #[serde(default)]
    pub incoming_relations: BTreeSet<RelationId>,
    #[serde(default)]
    pub aggregated_issues: BTreeSet<AggregatedIssueId>,
}

impl Interface {
    pub fn new(
        id: impl Into<InterfaceId>,
        name: impl Into<String>,
        interface_definition: impl Into<InterfaceDefinitionId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            interface_definition: interface_definition.into(),
            outgoing_relations: BTreeSet::new(),
            incoming_relations: BTreeSet::new(),
            aggregated_issues: BTreeSet::new(),
        }
    }
}

/// Binds an interface specification version to a component version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub id: InterfaceDefinitionId,
    pub component_version: ComponentVersionId,
    pub interface_specification_version: InterfaceSpecificationVersionId,
    #[serde(default)]
    pub visible_interface: Option<InterfaceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceSpecification {
    pub id: InterfaceSpecificationId,
    pub name: String,
    pub component: ComponentId,
    #[serde(default)]
    pub versions: BTreeSet<InterfaceSpecificationVersionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceSpecificationVersion {
    pub id: InterfaceSpecificationVersionId,
    pub interface_specification: InterfaceSpecificationId,
    pub version: String,
    #[serde(default)]
    pub parts: BTreeSet<InterfacePartId>,
    /// Parts currently in effect; always a subset of `parts`
    #[serde(default)]
    pub active_parts: BTreeSet<InterfacePartId>,
    #[serde(default)]
    pub interface_definitions: BTreeSet<InterfaceDefinitionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfacePart {
    pub id: InterfacePartId,
    pub name: String,
    pub interface_specification_version: InterfaceSpecificationVersionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub component_versions: BTreeSet<ComponentVersionId>,
}

impl Project {
    pub fn new(id: impl Into<ProjectId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            component_versions: BTreeSet::new(),
        }
    }
}

/// Directed relation between two relation partners
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    pub start: RelationPartnerRef,
    pub end: RelationPartnerRef,
}

/// Rollup of issues of one type and open state on one relation partner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedIssue {
    pub id: AggregatedIssueId,
    pub relation_partner: RelationPartnerRef,
    pub issue_type: IssueTypeId,
    pub is_open: bool,
    pub count: u32,
    #[serde(default)]
    pub issues: BTreeSet<IssueId>,
    #[serde(default)]
    pub outgoing_relations: BTreeSet<AggregatedIssueRelationId>,
    #[serde(default)]
    pub incoming_relations: BTreeSet<AggregatedIssueRelationId>,
}

impl AggregatedIssue {
    pub fn new(relation_partner: RelationPartnerRef, issue_type: IssueTypeId, is_open: bool) -> Self {
        Self {
            id: AggregatedIssueId::generate(),
            relation_partner,
            issue_type,
            is_open,
            count: 0,
            issues: BTreeSet::new(),
            outgoing_relations: BTreeSet::new(),
            incoming_relations: BTreeSet::new(),
        }
    }
}

/// Rollup of issue relations between two aggregated issues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedIssueRelation {
    pub id: AggregatedIssueRelationId,
    pub start: AggregatedIssueId,
    pub end: AggregatedIssueId,
    #[serde(default)]
    pub relation_type: Option<String>,
    pub count: u32,
    #[serde(default)]
    pub issue_relations: BTreeSet<IssueRelationId>,
}
