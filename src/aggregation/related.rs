//! Which relation partners an issue aggregates onto
//!
//! Resolution is scoped per component: for issue `i` and component `C`,
//!
//! - every version of `C`, if `C` is covered (trackable of `i` or named in `i.affects`)
//!   and `i.affects` names nothing inside `C` (fallback);
//! - every version of `C` named in `i.affects`;
//! - every visible interface on a version of `C` whose interface, specification version,
//!   specification or active part is named in `i.affects`.

use crate::graph::{
    AffectedEntityRef, ComponentId, InterfaceSpecificationVersionId, Issue, IssueGraph,
    IssueId, RelationPartnerRef, TrackableRef,
};
use crate::Result;
use std::collections::BTreeSet;

/// Versions of `C`, their visible interfaces, and those interfaces' specification
/// versions, specifications and active parts
pub fn component_related_entities(
    graph: &IssueGraph,
    component: &ComponentId,
) -> Result<BTreeSet<AffectedEntityRef>> {
    let mut related = BTreeSet::new();
    for version_id in &graph.component(component)?.versions {
        related.insert(AffectedEntityRef::ComponentVersion(version_id.clone()));
        for definition_id in &graph.component_version(version_id)?.interface_definitions {
            let definition = graph.interface_definition(definition_id)?;
            let Some(interface) = &definition.visible_interface else {
                continue;
            };
            related.insert(AffectedEntityRef::Interface(interface.clone()));

            let spec_version =
                graph.interface_specification_version(&definition.interface_specification_version)?;
            related.insert(AffectedEntityRef::InterfaceSpecificationVersion(
                spec_version.id.clone(),
            ));
            related.insert(AffectedEntityRef::InterfaceSpecification(
                spec_version.interface_specification.clone(),
            ));
            related.extend(
                spec_version
                    .active_parts
                    .iter()
                    .cloned()
                    .map(AffectedEntityRef::InterfacePart),
            );
        }
    }
    Ok(related)
}

/// Whether `C` is a trackable of the issue or named in its affects
pub fn is_covered(issue: &Issue, component: &ComponentId) -> bool {
    issue
        .trackables
        .contains(&TrackableRef::Component(component.clone()))
        || issue
            .affects
            .contains(&AffectedEntityRef::Component(component.clone()))
}

/// Relation partners inside `C` the issue should be aggregated on
pub fn resolve_partners(
    graph: &IssueGraph,
    issue: &Issue,
    component: &ComponentId,
) -> Result<BTreeSet<RelationPartnerRef>> {
    let mut partners = BTreeSet::new();
    if issue.is_deleted || !graph.contains(&component.clone().into()) {
        return Ok(partners);
    }

    let related = component_related_entities(graph, component)?;
    let versions = &graph.component(component)?.versions;

    if is_covered(issue, component) && issue.affects.is_disjoint(&related) {
        partners.extend(versions.iter().cloned().map(RelationPartnerRef::ComponentVersion));
    }

    for version_id in versions {
        if issue
            .affects
            .contains(&AffectedEntityRef::ComponentVersion(version_id.clone()))
        {
            partners.insert(RelationPartnerRef::ComponentVersion(version_id.clone()));
        }

        for definition_id in &graph.component_version(version_id)?.interface_definitions {
            let definition = graph.interface_definition(definition_id)?;
            let Some(interface) = &definition.visible_interface else {
                continue;
            };
            if interface_affected(
                graph,
                issue,
                interface,
                &definition.interface_specification_version,
            )? {
                partners.insert(RelationPartnerRef::Interface(interface.clone()));
            }
        }
    }

    Ok(partners)
}

fn interface_affected(
    graph: &IssueGraph,
    issue: &Issue,
    interface: &crate::graph::InterfaceId,
    spec_version: &InterfaceSpecificationVersionId,
) -> Result<bool> {
    if issue
        .affects
        .contains(&AffectedEntityRef::Interface(interface.clone()))
        || issue
            .affects
            .contains(&AffectedEntityRef::InterfaceSpecificationVersion(spec_version.clone()))
    {
        return Ok(true);
    }

    let spec_version = graph.interface_specification_version(spec_version)?;
    if issue.affects.contains(&AffectedEntityRef::InterfaceSpecification(
        spec_version.interface_specification.clone(),
    )) {
        return Ok(true);
    }

    Ok(spec_version
        .active_parts
        .iter()
        .any(|part| issue.affects.contains(&AffectedEntityRef::InterfacePart(part.clone()))))
}

/// Components an affected entity can influence; dangling references resolve to none
pub fn entity_components(graph: &IssueGraph, entity: &AffectedEntityRef) -> BTreeSet<ComponentId> {
    let mut components = BTreeSet::new();
    match entity {
        AffectedEntityRef::Component(id) => {
            components.insert(id.clone());
        }
        AffectedEntityRef::ComponentVersion(id) => {
            if let Ok(version) = graph.component_version(id) {
                components.insert(version.component.clone());
            }
        }
        AffectedEntityRef::Interface(id) => {
            if let Ok(version) = graph.interface_component_version(id) {
                if let Ok(version) = graph.component_version(&version) {
                    components.insert(version.component.clone());
                }
            }
        }
        AffectedEntityRef::InterfaceSpecification(id) => {
            if let Ok(spec) = graph.interface_specification(id) {
                components.insert(spec.component.clone());
                for version in &spec.versions {
                    components.extend(spec_version_components(graph, version));
                }
            }
        }
        AffectedEntityRef::InterfaceSpecificationVersion(id) => {
            components.extend(spec_version_components(graph, id));
        }
        AffectedEntityRef::InterfacePart(id) => {
            if let Ok(part) = graph.interface_part(id) {
                components.extend(spec_version_components(graph, &part.interface_specification_version));
            }
        }
        AffectedEntityRef::Project(_) => {}
    }
    components
}

/// Owning component of the specification plus every component implementing the version
pub fn spec_version_components(
    graph: &IssueGraph,
    spec_version: &InterfaceSpecificationVersionId,
) -> BTreeSet<ComponentId> {
    let mut components = BTreeSet::new();
    let Ok(version) = graph.interface_specification_version(spec_version) else {
        return components;
    };
    if let Ok(spec) = graph.interface_specification(&version.interface_specification) {
        components.insert(spec.component.clone());
    }
    for definition_id in &version.interface_definitions {
        if let Ok(definition) = graph.interface_definition(definition_id) {
            if let Ok(cv) = graph.component_version(&definition.component_version) {
                components.insert(cv.component.clone());
            }
        }
    }
    components
}

/// Every component the issue's trackables and affects touch
pub fn impacted_components(graph: &IssueGraph, issue: &Issue) -> BTreeSet<ComponentId> {
    let mut components: BTreeSet<ComponentId> = issue
        .trackables
        .iter()
        .filter_map(|trackable| match trackable {
            TrackableRef::Component(id) => Some(id.clone()),
            TrackableRef::Project(_) => None,
        })
        .collect();
    for entity in &issue.affects {
        components.extend(entity_components(graph, entity));
    }
    components
}

/// Relation partners making up a component's aggregation scope
pub fn component_partners(
    graph: &IssueGraph,
    component: &ComponentId,
) -> Result<BTreeSet<RelationPartnerRef>> {
    let mut partners = BTreeSet::new();
    for version in &graph.component(component)?.versions {
        partners.insert(RelationPartnerRef::ComponentVersion(version.clone()));
        partners.extend(
            graph
                .visible_interfaces(version)?
                .into_iter()
                .map(RelationPartnerRef::Interface),
        );
    }
    Ok(partners)
}

/// Issues whose aggregation inside `C` may change when `C`'s topology changes
pub fn candidate_issues(graph: &IssueGraph, component: &ComponentId) -> Result<BTreeSet<IssueId>> {
    let related = component_related_entities(graph, component)?;
    let mut candidates: BTreeSet<IssueId> = graph
        .issues()
        .filter(|issue| is_covered(issue, component) || !issue.affects.is_disjoint(&related))
        .map(|issue| issue.id.clone())
        .collect();

    for partner in component_partners(graph, component)? {
        for aggregated in graph.relation_partner_aggregated_issues(&partner)? {
            candidates.extend(graph.aggregated_issue(aggregated)?.issues.iter().cloned());
        }
    }
    Ok(candidates)
}
