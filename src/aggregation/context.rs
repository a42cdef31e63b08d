//! Batch update context
//!
//! Every graph mutation made by the aggregation updater (and by the sync passes that
//! drive it) is recorded here and written out by one `save()`.

use crate::graph::{IssueGraph, NodeRef, RelationPartnerRef};
use crate::storage::{ChangeSet, GraphRepository};
use crate::Result;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// Unit of work over an `IssueGraph`
#[derive(Debug, Default)]
pub struct UpdateContext {
    updated: BTreeSet<NodeRef>,
    deleted: BTreeSet<NodeRef>,
}

impl UpdateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node as changed
    pub fn mark_updated(&mut self, node: impl Into<NodeRef>) {
        let node = node.into();
        if !self.deleted.contains(&node) {
            self.updated.insert(node);
        }
    }

    /// Record a node as deleted; a deletion wins over earlier updates
    pub fn mark_deleted(&mut self, node: impl Into<NodeRef>) {
        let node = node.into();
        self.updated.remove(&node);
        self.deleted.insert(node);
    }

    pub fn is_updated(&self, node: &NodeRef) -> bool {
        self.updated.contains(node)
    }

    pub fn is_deleted(&self, node: &NodeRef) -> bool {
        self.deleted.contains(node)
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Drain the recorded changes into a change set, copying nodes out of `graph`
    pub fn take_changes(&mut self, graph: &IssueGraph) -> ChangeSet {
        let updated = std::mem::take(&mut self.updated)
            .into_iter()
            .filter_map(|node| graph.node(&node))
            .collect();
        let deleted = std::mem::take(&mut self.deleted).into_iter().collect();
        ChangeSet { updated, deleted }
    }

    /// Flush everything recorded so far as one batch
    pub async fn save(&mut self, graph: &IssueGraph, repository: &dyn GraphRepository) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let changes = self.take_changes(graph);
        debug!(
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            "Saving graph changes"
        );
        repository.save(changes).await
    }

    /// Mark a partner and everything reachable from it in either direction as updated
    pub fn lock_incoming_and_outgoing_relation_partners(
        &mut self,
        graph: &IssueGraph,
        partner: &RelationPartnerRef,
    ) -> Result<()> {
        let mut partners = find_outgoing_relation_partners(graph, partner)?;
        partners.extend(find_incoming_relation_partners(graph, partner)?);
        partners.insert(partner.clone());
        for partner in partners {
            self.mark_updated(partner_node(&partner));
        }
        Ok(())
    }
}

/// NodeRef of a relation partner
pub fn partner_node(partner: &RelationPartnerRef) -> NodeRef {
    match partner {
        RelationPartnerRef::ComponentVersion(id) => NodeRef::ComponentVersion(id.clone()),
        RelationPartnerRef::Interface(id) => NodeRef::Interface(id.clone()),
    }
}

/// Partners reachable by following relations forward
pub fn find_outgoing_relation_partners(
    graph: &IssueGraph,
    partner: &RelationPartnerRef,
) -> Result<BTreeSet<RelationPartnerRef>> {
    walk_relation_partners(graph, partner, true)
}

/// Partners reachable by following relations backward
pub fn find_incoming_relation_partners(
    graph: &IssueGraph,
    partner: &RelationPartnerRef,
) -> Result<BTreeSet<RelationPartnerRef>> {
    walk_relation_partners(graph, partner, false)
}

/// BFS over directed relations, also stepping between a component version and its
/// visible interfaces. The start partner is not part of the result.
fn walk_relation_partners(
    graph: &IssueGraph,
    start: &RelationPartnerRef,
    outgoing: bool,
) -> Result<BTreeSet<RelationPartnerRef>> {
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start.clone());
    queue.push_back(start.clone());

    while let Some(current) = queue.pop_front() {
        let mut next = Vec::new();

        let (outgoing_relations, incoming_relations) = graph.relation_partner_relations(&current)?;
        if outgoing {
            for id in outgoing_relations {
                next.push(graph.relation(&id)?.end.clone());
            }
        } else {
            for id in incoming_relations {
                next.push(graph.relation(&id)?.start.clone());
            }
        }

        match &current {
            RelationPartnerRef::ComponentVersion(id) => {
                next.extend(
                    graph
                        .visible_interfaces(id)?
                        .into_iter()
                        .map(RelationPartnerRef::Interface),
                );
            }
            RelationPartnerRef::Interface(id) => {
                next.push(RelationPartnerRef::ComponentVersion(
                    graph.interface_component_version(id)?,
                ));
            }
        }

        for partner in next {
            if visited.insert(partner.clone()) {
                queue.push_back(partner);
            }
        }
    }

    visited.remove(start);
    Ok(visited)
}
