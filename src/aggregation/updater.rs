//! Issue aggregation updater
//!
//! Keeps `AggregatedIssue`s and `AggregatedIssueRelation`s consistent with issues and
//! the architecture graph. Every event handler boils down to reconciling the affected
//! issues inside each component they can touch: compute where an issue should be
//! aggregated, drop it from aggregated issues it no longer belongs to, add it where it is
//! missing. Reconciling is idempotent, so handlers may overlap freely.

use super::context::{partner_node, UpdateContext};
use super::related::{
    candidate_issues, entity_components, impacted_components, resolve_partners,
    spec_version_components,
};
use crate::graph::*;
use crate::sync::metrics;
use crate::{ArchSyncError, Result};
use std::collections::BTreeSet;
use tracing::debug;

/// Aggregation maintenance over one graph and one batch context
pub struct IssueAggregationUpdater<'g> {
    graph: &'g mut IssueGraph,
    context: &'g mut UpdateContext,
}

impl<'g> IssueAggregationUpdater<'g> {
    pub fn new(graph: &'g mut IssueGraph, context: &'g mut UpdateContext) -> Self {
        Self { graph, context }
    }

    pub fn graph(&self) -> &IssueGraph {
        self.graph
    }

    // ------------------------------------------------------------------
    // Issue events
    // ------------------------------------------------------------------

    /// Move the issue to aggregated issues matching its current (type, open) key
    pub fn changed_issue_state_or_type(&mut self, issue: &IssueId) -> Result<()> {
        self.reconcile_issue(issue, BTreeSet::new())
    }

    pub fn added_issue_to_trackable(&mut self, issue: &IssueId, trackable: &TrackableRef) -> Result<()> {
        self.reconcile_issue(issue, trackable_components(trackable))
    }

    pub fn removed_issue_from_trackable(
        &mut self,
        issue: &IssueId,
        trackable: &TrackableRef,
    ) -> Result<()> {
        self.reconcile_issue(issue, trackable_components(trackable))
    }

    pub fn added_affected_entity(&mut self, issue: &IssueId, entity: &AffectedEntityRef) -> Result<()> {
        if matches!(entity, AffectedEntityRef::Project(_)) {
            return Ok(());
        }
        let components = entity_components(self.graph, entity);
        self.reconcile_issue(issue, components)
    }

    pub fn removed_affected_entity(
        &mut self,
        issue: &IssueId,
        entity: &AffectedEntityRef,
    ) -> Result<()> {
        if matches!(entity, AffectedEntityRef::Project(_)) {
            return Ok(());
        }
        let components = entity_components(self.graph, entity);
        self.reconcile_issue(issue, components)
    }

    /// Roll a new issue relation up between the endpoints' aggregated issues
    pub fn added_issue_relation(&mut self, relation: &IssueRelationId) -> Result<()> {
        let desired = self.desired_relation_keys(relation)?;
        self.apply_issue_relation(relation, desired)
    }

    /// Drop an issue relation from every aggregated relation carrying it
    pub fn removed_issue_relation(&mut self, relation: &IssueRelationId) -> Result<()> {
        self.apply_issue_relation(relation, BTreeSet::new())
    }

    // ------------------------------------------------------------------
    // Topology events
    // ------------------------------------------------------------------

    /// A version was added to its component; fallback issues spread onto it
    pub fn created_component_version(&mut self, version: &ComponentVersionId) -> Result<()> {
        let component = self.graph.component_version(version)?.component.clone();
        self.reconcile_component(&component)
    }

    /// Remove a version with its definitions and visible interfaces, their aggregated
    /// issues and relations, then re-aggregate the component
    pub fn deleted_component_version(&mut self, version: &ComponentVersionId) -> Result<()> {
        let cv = self.graph.component_version(version)?.clone();

        for definition_id in &cv.interface_definitions {
            let definition = self.graph.interface_definition(definition_id)?.clone();
            if let Some(interface) = &definition.visible_interface {
                self.remove_interface_node(interface)?;
            }
            if let Ok(spec_version) = self
                .graph
                .interface_specification_version_mut(&definition.interface_specification_version)
            {
                spec_version.interface_definitions.remove(definition_id);
                self.context
                    .mark_updated(definition.interface_specification_version.clone());
            }
            self.graph.remove(&definition_id.clone().into());
            self.context.mark_deleted(definition_id.clone());
        }

        let partner = RelationPartnerRef::ComponentVersion(version.clone());
        self.remove_partner_aggregations(&partner)?;
        self.remove_partner_relations(&partner)?;

        self.graph.component_mut(&cv.component)?.versions.remove(version);
        self.context.mark_updated(cv.component.clone());

        let projects: Vec<ProjectId> = self
            .graph
            .projects()
            .filter(|p| p.component_versions.contains(version))
            .map(|p| p.id.clone())
            .collect();
        for project in projects {
            self.graph
                .project_mut(&project)?
                .component_versions
                .remove(version);
            self.context.mark_updated(project);
        }

        self.graph.remove(&version.clone().into());
        self.context.mark_deleted(version.clone());
        debug!(version = %version, component = %cv.component, "Deleted component version");

        self.reconcile_component(&cv.component)
    }

    /// An interface became visible; issues naming its specification move onto it
    pub fn created_interface(&mut self, interface: &InterfaceId) -> Result<()> {
        let component = self.interface_component(interface)?;
        self.reconcile_component(&component)
    }

    pub fn deleted_interface(&mut self, interface: &InterfaceId) -> Result<()> {
        let component = self.interface_component(interface)?;
        self.remove_interface_node(interface)?;
        self.reconcile_component(&component)
    }

    pub fn deleted_interface_part(&mut self, part: &InterfacePartId) -> Result<()> {
        let spec_version_id = self.graph.interface_part(part)?.interface_specification_version.clone();
        let spec_version = self.graph.interface_specification_version_mut(&spec_version_id)?;
        spec_version.parts.remove(part);
        spec_version.active_parts.remove(part);
        self.context.mark_updated(spec_version_id.clone());

        self.graph.remove(&part.clone().into());
        self.context.mark_deleted(part.clone());

        for component in spec_version_components(self.graph, &spec_version_id) {
            self.reconcile_component(&component)?;
        }
        Ok(())
    }

    /// Replace the active parts of a specification version
    pub fn updated_active_parts(
        &mut self,
        spec_version: &InterfaceSpecificationVersionId,
        active_parts: BTreeSet<InterfacePartId>,
    ) -> Result<()> {
        let version = self.graph.interface_specification_version_mut(spec_version)?;
        if !active_parts.is_subset(&version.parts) {
            return Err(ArchSyncError::Invariant(format!(
                "active parts of {} must be a subset of its parts",
                spec_version
            )));
        }
        version.active_parts = active_parts;
        self.context.mark_updated(spec_version.clone());

        for component in spec_version_components(self.graph, spec_version) {
            self.reconcile_component(&component)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    /// Add each issue to the aggregated issue on `partner` matching its key, creating
    /// that aggregated issue if needed
    pub fn create_or_update_aggregated_issues(
        &mut self,
        partner: &RelationPartnerRef,
        issues: &[IssueId],
    ) -> Result<()> {
        for issue_id in issues {
            let (issue_type, is_open) = {
                let issue = self.graph.issue(issue_id)?;
                self.graph.aggregation_key(issue)?
            };

            let existing = self
                .graph
                .find_aggregated_issue(partner, &issue_type, is_open)?
                .map(|aggregated| aggregated.id.clone());
            let aggregated_id = match existing {
                Some(id) => id,
                None => self.create_aggregated_issue(partner, issue_type, is_open)?,
            };

            let aggregated = self.graph.aggregated_issue_mut(&aggregated_id)?;
            if !aggregated.issues.insert(issue_id.clone()) {
                continue;
            }
            aggregated.count += 1;
            self.graph
                .issue_mut(issue_id)?
                .aggregated_by
                .insert(aggregated_id.clone());
            self.context.mark_updated(aggregated_id);
            self.context.mark_updated(issue_id.clone());
            metrics::record_aggregation_change("member_added");

            self.reconcile_issue_relations_of(issue_id)?;
        }
        Ok(())
    }

    /// Take an issue out of an aggregated issue, deleting the latter once empty
    pub fn remove_issue_from_aggregated_issue(
        &mut self,
        issue: &IssueId,
        aggregated: &AggregatedIssueId,
    ) -> Result<()> {
        let entry = self.graph.aggregated_issue_mut(aggregated)?;
        if !entry.issues.remove(issue) {
            return Ok(());
        }
        entry.count = entry.count.saturating_sub(1);
        let now_empty = entry.issues.is_empty();

        if let Ok(issue_node) = self.graph.issue_mut(issue) {
            issue_node.aggregated_by.remove(aggregated);
            self.context.mark_updated(issue.clone());
        }
        metrics::record_aggregation_change("member_removed");

        if now_empty {
            self.delete_aggregated_issue(aggregated)?;
        } else {
            self.context.mark_updated(aggregated.clone());
        }

        if self.graph.contains(&issue.clone().into()) {
            self.reconcile_issue_relations_of(issue)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Reconcile an issue in every component it touches, plus `extra`
    fn reconcile_issue(&mut self, issue_id: &IssueId, extra: BTreeSet<ComponentId>) -> Result<()> {
        let mut components = extra;
        {
            let issue = self.graph.issue(issue_id)?;
            components.extend(impacted_components(self.graph, issue));
            for aggregated in &issue.aggregated_by {
                let partner = &self.graph.aggregated_issue(aggregated)?.relation_partner;
                components.insert(self.graph.relation_partner_component(partner)?);
            }
        }

        for component in components {
            if self.graph.contains(&component.clone().into()) {
                self.reconcile_issue_in_component(issue_id, &component)?;
            }
        }
        Ok(())
    }

    /// Reconcile every candidate issue of a component
    fn reconcile_component(&mut self, component: &ComponentId) -> Result<()> {
        for issue in candidate_issues(self.graph, component)? {
            self.reconcile_issue_in_component(&issue, component)?;
        }
        Ok(())
    }

    fn reconcile_issue_in_component(&mut self, issue_id: &IssueId, component: &ComponentId) -> Result<()> {
        let (desired, key, current) = {
            let issue = self.graph.issue(issue_id)?;
            let desired = resolve_partners(self.graph, issue, component)?;
            let key = self.graph.aggregation_key(issue)?;
            let mut current = Vec::new();
            for aggregated_id in &issue.aggregated_by {
                let aggregated = self.graph.aggregated_issue(aggregated_id)?;
                if &self.graph.relation_partner_component(&aggregated.relation_partner)? == component {
                    current.push((
                        aggregated_id.clone(),
                        aggregated.relation_partner.clone(),
                        (aggregated.issue_type.clone(), aggregated.is_open),
                    ));
                }
            }
            (desired, key, current)
        };

        for (aggregated_id, partner, aggregated_key) in current {
            if !desired.contains(&partner) || aggregated_key != key {
                self.remove_issue_from_aggregated_issue(issue_id, &aggregated_id)?;
            }
        }
        for partner in desired {
            self.create_or_update_aggregated_issues(&partner, std::slice::from_ref(issue_id))?;
        }
        Ok(())
    }

    fn reconcile_issue_relations_of(&mut self, issue_id: &IssueId) -> Result<()> {
        let relations: Vec<IssueRelationId> = {
            let issue = self.graph.issue(issue_id)?;
            issue
                .outgoing_relations
                .iter()
                .chain(issue.incoming_relations.iter())
                .cloned()
                .collect()
        };
        for relation in relations {
            let desired = self.desired_relation_keys(&relation)?;
            self.apply_issue_relation(&relation, desired)?;
        }
        Ok(())
    }

    /// (start aggregated, end aggregated, type) triples an issue relation should be part of
    fn desired_relation_keys(&self, relation: &IssueRelationId) -> Result<BTreeSet<RelationKey>> {
        let mut keys = BTreeSet::new();
        let Ok(relation) = self.graph.issue_relation(relation) else {
            return Ok(keys);
        };
        let start = self.graph.issue(&relation.start)?;
        let end = self.graph.issue(&relation.end)?;
        if start.is_deleted || end.is_deleted {
            return Ok(keys);
        }
        for start_aggregated in &start.aggregated_by {
            for end_aggregated in &end.aggregated_by {
                if start_aggregated != end_aggregated {
                    keys.insert((
                        start_aggregated.clone(),
                        end_aggregated.clone(),
                        relation.relation_type.clone(),
                    ));
                }
            }
        }
        Ok(keys)
    }

    fn apply_issue_relation(
        &mut self,
        relation: &IssueRelationId,
        mut desired: BTreeSet<RelationKey>,
    ) -> Result<()> {
        let current: Vec<(AggregatedIssueRelationId, RelationKey)> = self
            .graph
            .aggregated_issue_relations()
            .filter(|r| r.issue_relations.contains(relation))
            .map(|r| {
                (
                    r.id.clone(),
                    (r.start.clone(), r.end.clone(), r.relation_type.clone()),
                )
            })
            .collect();

        for (id, key) in current {
            if desired.remove(&key) {
                continue;
            }
            let entry = self.graph.aggregated_issue_relation_mut(&id)?;
            entry.issue_relations.remove(relation);
            entry.count = entry.count.saturating_sub(1);
            if entry.issue_relations.is_empty() {
                self.delete_aggregated_issue_relation(&id)?;
            } else {
                self.context.mark_updated(id);
            }
        }

        for key in desired {
            let id = match self.find_aggregated_issue_relation(&key)? {
                Some(id) => id,
                None => self.create_aggregated_issue_relation(&key)?,
            };
            let entry = self.graph.aggregated_issue_relation_mut(&id)?;
            if entry.issue_relations.insert(relation.clone()) {
                entry.count += 1;
            }
            self.context.mark_updated(id);
        }
        Ok(())
    }

    fn find_aggregated_issue_relation(&self, key: &RelationKey) -> Result<Option<AggregatedIssueRelationId>> {
        let (start, end, relation_type) = key;
        for id in &self.graph.aggregated_issue(start)?.outgoing_relations {
            let relation = self.graph.aggregated_issue_relation(id)?;
            if &relation.end == end && &relation.relation_type == relation_type {
                return Ok(Some(id.clone()));
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------------

    fn create_aggregated_issue(
        &mut self,
        partner: &RelationPartnerRef,
        issue_type: IssueTypeId,
        is_open: bool,
    ) -> Result<AggregatedIssueId> {
        let aggregated = AggregatedIssue::new(partner.clone(), issue_type, is_open);
        let id = aggregated.id.clone();
        self.graph
            .relation_partner_aggregated_issues_mut(partner)?
            .insert(id.clone());
        self.graph.insert(aggregated);
        self.context.mark_updated(id.clone());
        self.context
            .lock_incoming_and_outgoing_relation_partners(self.graph, partner)?;
        metrics::record_aggregation_change("created");
        debug!(partner = %partner, aggregated = %id, "Created aggregated issue");
        Ok(id)
    }

    fn delete_aggregated_issue(&mut self, id: &AggregatedIssueId) -> Result<()> {
        let Some(Node::AggregatedIssue(aggregated)) = self.graph.remove(&id.clone().into()) else {
            return Ok(());
        };
        self.context.mark_deleted(id.clone());

        for issue in &aggregated.issues {
            if let Ok(issue_node) = self.graph.issue_mut(issue) {
                issue_node.aggregated_by.remove(id);
                self.context.mark_updated(issue.clone());
            }
        }
        for relation in aggregated
            .outgoing_relations
            .iter()
            .chain(aggregated.incoming_relations.iter())
        {
            self.delete_aggregated_issue_relation(relation)?;
        }
        if let Ok(siblings) = self
            .graph
            .relation_partner_aggregated_issues_mut(&aggregated.relation_partner)
        {
            siblings.remove(id);
            self.context.mark_updated(partner_node(&aggregated.relation_partner));
        }

        metrics::record_aggregation_change("deleted");
        debug!(partner = %aggregated.relation_partner, aggregated = %id, "Deleted aggregated issue");
        Ok(())
    }

    fn create_aggregated_issue_relation(&mut self, key: &RelationKey) -> Result<AggregatedIssueRelationId> {
        let (start, end, relation_type) = key;
        let relation = AggregatedIssueRelation {
            id: AggregatedIssueRelationId::generate(),
            start: start.clone(),
            end: end.clone(),
            relation_type: relation_type.clone(),
            count: 0,
            issue_relations: BTreeSet::new(),
        };
        let id = relation.id.clone();
        self.graph
            .aggregated_issue_mut(start)?
            .outgoing_relations
            .insert(id.clone());
        self.graph
            .aggregated_issue_mut(end)?
            .incoming_relations
            .insert(id.clone());
        self.graph.insert(relation);
        self.context.mark_updated(start.clone());
        self.context.mark_updated(end.clone());
        self.context.mark_updated(id.clone());
        Ok(id)
    }

    fn delete_aggregated_issue_relation(&mut self, id: &AggregatedIssueRelationId) -> Result<()> {
        let Some(Node::AggregatedIssueRelation(relation)) = self.graph.remove(&id.clone().into())
        else {
            return Ok(());
        };
        if let Ok(start) = self.graph.aggregated_issue_mut(&relation.start) {
            start.outgoing_relations.remove(id);
            self.context.mark_updated(relation.start.clone());
        }
        if let Ok(end) = self.graph.aggregated_issue_mut(&relation.end) {
            end.incoming_relations.remove(id);
            self.context.mark_updated(relation.end.clone());
        }
        self.context.mark_deleted(id.clone());
        Ok(())
    }

    fn remove_partner_aggregations(&mut self, partner: &RelationPartnerRef) -> Result<()> {
        let aggregated: Vec<AggregatedIssueId> = self
            .graph
            .relation_partner_aggregated_issues(partner)?
            .iter()
            .cloned()
            .collect();
        for id in aggregated {
            self.delete_aggregated_issue(&id)?;
        }
        Ok(())
    }

    fn remove_partner_relations(&mut self, partner: &RelationPartnerRef) -> Result<()> {
        let (outgoing, incoming) = self.graph.relation_partner_relations(partner)?;
        for relation_id in outgoing.into_iter().chain(incoming) {
            let Some(Node::Relation(relation)) = self.graph.remove(&relation_id.clone().into())
            else {
                continue;
            };
            for (end, outgoing_side) in [(&relation.start, true), (&relation.end, false)] {
                if end == partner {
                    continue;
                }
                let removed = match end {
                    RelationPartnerRef::ComponentVersion(id) => {
                        self.graph.component_version_mut(id).map(|cv| {
                            if outgoing_side {
                                cv.outgoing_relations.remove(&relation_id)
                            } else {
                                cv.incoming_relations.remove(&relation_id)
                            }
                        })
                    }
                    RelationPartnerRef::Interface(id) => self.graph.interface_mut(id).map(|i| {
                        if outgoing_side {
                            i.outgoing_relations.remove(&relation_id)
                        } else {
                            i.incoming_relations.remove(&relation_id)
                        }
                    }),
                };
                if removed.unwrap_or(false) {
                    self.context.mark_updated(partner_node(end));
                }
            }
            self.context.mark_deleted(relation_id);
        }
        Ok(())
    }

    /// Delete a visible interface with its aggregated issues and relations
    fn remove_interface_node(&mut self, interface: &InterfaceId) -> Result<()> {
        let partner = RelationPartnerRef::Interface(interface.clone());
        self.remove_partner_aggregations(&partner)?;
        self.remove_partner_relations(&partner)?;

        let definition_id = self.graph.interface(interface)?.interface_definition.clone();
        if let Ok(definition) = self.graph.interface_definition_mut(&definition_id) {
            definition.visible_interface = None;
            self.context.mark_updated(definition_id);
        }
        self.graph.remove(&interface.clone().into());
        self.context.mark_deleted(interface.clone());
        Ok(())
    }

    fn interface_component(&self, interface: &InterfaceId) -> Result<ComponentId> {
        self.graph
            .relation_partner_component(&RelationPartnerRef::Interface(interface.clone()))
    }
}

type RelationKey = (AggregatedIssueId, AggregatedIssueId, Option<String>);

fn trackable_components(trackable: &TrackableRef) -> BTreeSet<ComponentId> {
    match trackable {
        TrackableRef::Component(id) => BTreeSet::from([id.clone()]),
        TrackableRef::Project(_) => BTreeSet::new(),
    }
}
