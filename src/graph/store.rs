//! In-memory node arena
//!
//! `IssueGraph` holds every node kind in its own ID-keyed table. It plays the role of a
//! session cache: the engine reads and mutates nodes here and hands the changed ones to a
//! `GraphRepository` in one batch. Cyclic structure (relations, interface ownership) is
//! expressed through IDs only.

use super::architecture::*;
use super::ids::*;
use super::issue::*;
use super::timeline::{timeline_order, TimelineItem};
use crate::{ArchSyncError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

macro_rules! graph_tables {
    ($( $variant:ident => $field:ident: $ty:ty, $id:ty, $get:ident, $get_mut:ident; )*) => {
        /// Reference to any node in the graph
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(tag = "kind", content = "id")]
        pub enum NodeRef {
            $( $variant($id), )*
        }

        /// Owned copy of any node
        #[derive(Debug, Clone, Serialize, Deserialize)]
        #[serde(tag = "kind", content = "node")]
        pub enum Node {
            $( $variant($ty), )*
        }

        impl NodeRef {
            /// Node kind name, also used as the storage discriminator
            pub fn kind(&self) -> &'static str {
                match self {
                    $( NodeRef::$variant(_) => stringify!($variant), )*
                }
            }

            pub fn id_str(&self) -> &str {
                match self {
                    $( NodeRef::$variant(id) => id.as_str(), )*
                }
            }
        }

        impl Node {
            pub fn node_ref(&self) -> NodeRef {
                match self {
                    $( Node::$variant(n) => NodeRef::$variant(n.id.clone()), )*
                }
            }
        }

        $(
            impl From<$ty> for Node {
                fn from(node: $ty) -> Self {
                    Node::$variant(node)
                }
            }

            impl From<$id> for NodeRef {
                fn from(id: $id) -> Self {
                    NodeRef::$variant(id)
                }
            }
        )*

        /// Arena of all graph nodes
        #[derive(Debug, Clone, Default)]
        pub struct IssueGraph {
            $( $field: BTreeMap<$id, $ty>, )*
        }

        impl IssueGraph {
            $(
                pub fn $get(&self, id: &$id) -> Result<&$ty> {
                    self.$field
                        .get(id)
                        .ok_or_else(|| ArchSyncError::not_found(stringify!($variant), id))
                }

                pub fn $get_mut(&mut self, id: &$id) -> Result<&mut $ty> {
                    self.$field
                        .get_mut(id)
                        .ok_or_else(|| ArchSyncError::not_found(stringify!($variant), id))
                }

                pub fn $field(&self) -> impl Iterator<Item = &$ty> {
                    self.$field.values()
                }
            )*

            /// Clone a node out of the arena
            pub fn node(&self, node: &NodeRef) -> Option<Node> {
                match node {
                    $( NodeRef::$variant(id) => self.$field.get(id).cloned().map(Node::$variant), )*
                }
            }

            /// Insert or replace a node
            pub fn insert(&mut self, node: impl Into<Node>) {
                match node.into() {
                    $( Node::$variant(n) => { self.$field.insert(n.id.clone(), n); } )*
                }
            }

            /// Drop a node without touching anything that references it
            pub fn remove(&mut self, node: &NodeRef) -> Option<Node> {
                match node {
                    $( NodeRef::$variant(id) => self.$field.remove(id).map(Node::$variant), )*
                }
            }

            pub fn contains(&self, node: &NodeRef) -> bool {
                match node {
                    $( NodeRef::$variant(id) => self.$field.contains_key(id), )*
                }
            }

            /// Clone every node out of the arena
            pub fn nodes(&self) -> Vec<Node> {
                let mut nodes = Vec::with_capacity(self.len());
                $( nodes.extend(self.$field.values().cloned().map(Node::$variant)); )*
                nodes
            }

            /// Total number of nodes across all tables
            pub fn len(&self) -> usize {
                0 $( + self.$field.len() )*
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }
    };
}

graph_tables! {
    Issue => issues: Issue, IssueId, issue, issue_mut;
    TimelineItem => timeline_items: TimelineItem, TimelineItemId, timeline_item, timeline_item_mut;
    IssueType => issue_types: IssueType, IssueTypeId, issue_type, issue_type_mut;
    IssueState => issue_states: IssueState, IssueStateId, issue_state, issue_state_mut;
    User => users: User, UserId, user, user_mut;
    Label => labels: Label, LabelId, label, label_mut;
    IssueRelation => issue_relations: IssueRelation, IssueRelationId, issue_relation, issue_relation_mut;
    Component => components: Component, ComponentId, component, component_mut;
    ComponentVersion => component_versions: ComponentVersion, ComponentVersionId, component_version, component_version_mut;
    Interface => interfaces: Interface, InterfaceId, interface, interface_mut;
    InterfaceDefinition => interface_definitions: InterfaceDefinition, InterfaceDefinitionId, interface_definition, interface_definition_mut;
    InterfaceSpecification => interface_specifications: InterfaceSpecification, InterfaceSpecificationId, interface_specification, interface_specification_mut;
    InterfaceSpecificationVersion => interface_specification_versions: InterfaceSpecificationVersion, InterfaceSpecificationVersionId, interface_specification_version, interface_specification_version_mut;
    InterfacePart => interface_parts: InterfacePart, InterfacePartId, interface_part, interface_part_mut;
    Project => projects: Project, ProjectId, project, project_mut;
    Relation => relations: Relation, RelationId, relation, relation_mut;
    AggregatedIssue => aggregated_issues: AggregatedIssue, AggregatedIssueId, aggregated_issue, aggregated_issue_mut;
    AggregatedIssueRelation => aggregated_issue_relations: AggregatedIssueRelation, AggregatedIssueRelationId, aggregated_issue_relation, aggregated_issue_relation_mut;
    ImsProject => ims_projects: ImsProject, ImsProjectId, ims_project, ims_project_mut;
    ImsIssue => ims_issues: ImsIssue, ImsIssueId, ims_issue, ims_issue_mut;
}

impl IssueGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from loaded nodes
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.insert(node);
        }
        graph
    }

    // ------------------------------------------------------------------
    // Topology construction. These keep both sides of each link in sync.
    // ------------------------------------------------------------------

    pub fn add_component(&mut self, component: Component) {
        self.insert(component);
    }

    pub fn add_component_version(&mut self, version: ComponentVersion) -> Result<()> {
        self.component_mut(&version.component)?
            .versions
            .insert(version.id.clone());
        self.insert(version);
        Ok(())
    }

    pub fn add_interface_specification(&mut self, spec: InterfaceSpecification) -> Result<()> {
        self.component_mut(&spec.component)?
            .interface_specifications
            .insert(spec.id.clone());
        self.insert(spec);
        Ok(())
    }

    pub fn add_interface_specification_version(
        &mut self,
        version: InterfaceSpecificationVersion,
    ) -> Result<()> {
        self.interface_specification_mut(&version.interface_specification)?
            .versions
            .insert(version.id.clone());
        self.insert(version);
        Ok(())
    }

    /// Add a part; `active` puts it into the version's active parts as well
    pub fn add_interface_part(&mut self, part: InterfacePart, active: bool) -> Result<()> {
        let version = self.interface_specification_version_mut(&part.interface_specification_version)?;
        version.parts.insert(part.id.clone());
        if active {
            version.active_parts.insert(part.id.clone());
        }
        self.insert(part);
        Ok(())
    }

    pub fn add_interface_definition(&mut self, definition: InterfaceDefinition) -> Result<()> {
        self.component_version_mut(&definition.component_version)?
            .interface_definitions
            .insert(definition.id.clone());
        self.interface_specification_version_mut(&definition.interface_specification_version)?
            .interface_definitions
            .insert(definition.id.clone());
        self.insert(definition);
        Ok(())
    }

    /// Make an interface visible on its definition
    pub fn add_interface(&mut self, interface: Interface) -> Result<()> {
        self.interface_definition_mut(&interface.interface_definition)?
            .visible_interface = Some(interface.id.clone());
        self.insert(interface);
        Ok(())
    }

    pub fn add_relation(&mut self, relation: Relation) -> Result<()> {
        self.partner_relations_mut(&relation.start, true)?
            .insert(relation.id.clone());
        self.partner_relations_mut(&relation.end, false)?
            .insert(relation.id.clone());
        self.insert(relation);
        Ok(())
    }

    fn partner_relations_mut(
        &mut self,
        partner: &RelationPartnerRef,
        outgoing: bool,
    ) -> Result<&mut std::collections::BTreeSet<RelationId>> {
        Ok(match partner {
            RelationPartnerRef::ComponentVersion(id) => {
                let cv = self.component_version_mut(id)?;
                if outgoing {
                    &mut cv.outgoing_relations
                } else {
                    &mut cv.incoming_relations
                }
            }
            RelationPartnerRef::Interface(id) => {
                let interface = self.interface_mut(id)?;
                if outgoing {
                    &mut interface.outgoing_relations
                } else {
                    &mut interface.incoming_relations
                }
            }
        })
    }

    /// Attach an issue relation to both issues
    pub fn add_issue_relation(&mut self, relation: IssueRelation) -> Result<()> {
        self.issue_mut(&relation.start)?
            .outgoing_relations
            .insert(relation.id.clone());
        self.issue_mut(&relation.end)?
            .incoming_relations
            .insert(relation.id.clone());
        self.insert(relation);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Aggregation key of an issue: (type, is open)
    pub fn aggregation_key(&self, issue: &Issue) -> Result<(IssueTypeId, bool)> {
        let state = self.issue_state(&issue.state)?;
        Ok((issue.issue_type.clone(), state.is_open))
    }

    /// Component version owning an interface
    pub fn interface_component_version(&self, interface: &InterfaceId) -> Result<ComponentVersionId> {
        let interface = self.interface(interface)?;
        let definition = self.interface_definition(&interface.interface_definition)?;
        Ok(definition.component_version.clone())
    }

    /// Component a relation partner ultimately belongs to
    pub fn relation_partner_component(&self, partner: &RelationPartnerRef) -> Result<ComponentId> {
        let version = match partner {
            RelationPartnerRef::ComponentVersion(id) => id.clone(),
            RelationPartnerRef::Interface(id) => self.interface_component_version(id)?,
        };
        Ok(self.component_version(&version)?.component.clone())
    }

    pub fn relation_partner_aggregated_issues(
        &self,
        partner: &RelationPartnerRef,
    ) -> Result<&std::collections::BTreeSet<AggregatedIssueId>> {
        Ok(match partner {
            RelationPartnerRef::ComponentVersion(id) => &self.component_version(id)?.aggregated_issues,
            RelationPartnerRef::Interface(id) => &self.interface(id)?.aggregated_issues,
        })
    }

    pub fn relation_partner_aggregated_issues_mut(
        &mut self,
        partner: &RelationPartnerRef,
    ) -> Result<&mut std::collections::BTreeSet<AggregatedIssueId>> {
        Ok(match partner {
            RelationPartnerRef::ComponentVersion(id) => {
                &mut self.component_version_mut(id)?.aggregated_issues
            }
            RelationPartnerRef::Interface(id) => &mut self.interface_mut(id)?.aggregated_issues,
        })
    }

    /// Outgoing and incoming relation IDs of a partner
    pub fn relation_partner_relations(
        &self,
        partner: &RelationPartnerRef,
    ) -> Result<(Vec<RelationId>, Vec<RelationId>)> {
        Ok(match partner {
            RelationPartnerRef::ComponentVersion(id) => {
                let cv = self.component_version(id)?;
                (
                    cv.outgoing_relations.iter().cloned().collect(),
                    cv.incoming_relations.iter().cloned().collect(),
                )
            }
            RelationPartnerRef::Interface(id) => {
                let interface = self.interface(id)?;
                (
                    interface.outgoing_relations.iter().cloned().collect(),
                    interface.incoming_relations.iter().cloned().collect(),
                )
            }
        })
    }

    /// Visible interfaces of a component version
    pub fn visible_interfaces(&self, version: &ComponentVersionId) -> Result<Vec<InterfaceId>> {
        let cv = self.component_version(version)?;
        let mut interfaces = Vec::new();
        for definition_id in &cv.interface_definitions {
            let definition = self.interface_definition(definition_id)?;
            if let Some(interface) = &definition.visible_interface {
                interfaces.push(interface.clone());
            }
        }
        Ok(interfaces)
    }

    /// Timeline of an issue in timeline order
    pub fn sorted_timeline(&self, issue: &IssueId) -> Result<Vec<&TimelineItem>> {
        let issue = self.issue(issue)?;
        let mut items = issue
            .timeline
            .iter()
            .map(|id| self.timeline_item(id))
            .collect::<Result<Vec<_>>>()?;
        items.sort_by(|a, b| timeline_order(a, b));
        Ok(items)
    }

    /// Non-deleted issues filed against a trackable
    pub fn issues_on_trackable<'a>(
        &'a self,
        trackable: &'a TrackableRef,
    ) -> impl Iterator<Item = &'a Issue> + 'a {
        self.issues
            .values()
            .filter(move |issue| !issue.is_deleted && issue.trackables.contains(trackable))
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    pub fn label_by_name(&self, name: &str) -> Option<&Label> {
        self.labels.values().find(|l| l.name == name)
    }

    pub fn issue_state_by_name(&self, name: &str) -> Option<&IssueState> {
        self.issue_states.values().find(|s| s.name == name)
    }

    pub fn issue_type_by_name(&self, name: &str) -> Option<&IssueType> {
        self.issue_types.values().find(|t| t.name == name)
    }

    /// ImsIssue linking `issue` to `project`, if any
    pub fn ims_issue_for(&self, project: &ImsProjectId, issue: &IssueId) -> Option<&ImsIssue> {
        self.ims_issues
            .values()
            .find(|link| &link.ims_project == project && &link.issue == issue)
    }

    /// Aggregated issue on `partner` with the given key, if any
    pub fn find_aggregated_issue(
        &self,
        partner: &RelationPartnerRef,
        issue_type: &IssueTypeId,
        is_open: bool,
    ) -> Result<Option<&AggregatedIssue>> {
        for id in self.relation_partner_aggregated_issues(partner)? {
            let aggregated = self.aggregated_issue(id)?;
            if &aggregated.issue_type == issue_type && aggregated.is_open == is_open {
                return Ok(Some(aggregated));
            }
        }
        Ok(None)
    }
}
