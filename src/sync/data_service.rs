//! Graph access for one sync run
//!
//! Owns the in-memory graph and the pending unit of work. Adapters reach the graph through
//! this service when translating remote data, so every node they create is recorded for
//! the next save.

use crate::aggregation::{IssueAggregationUpdater, UpdateContext};
use crate::graph::{
    IssueGraph, IssueStateId, IssueTypeId, Label, LabelId, NodeRef, User, UserId,
};
use crate::storage::GraphRepository;
use crate::{ArchSyncError, Result};

pub struct SyncDataService {
    graph: IssueGraph,
    context: UpdateContext,
    dummy_user: UserId,
}

impl SyncDataService {
    /// Wrap `graph`, creating the dummy user if it is missing
    pub fn new(mut graph: IssueGraph, dummy_user: User) -> Self {
        let mut context = UpdateContext::new();
        let dummy_id = dummy_user.id.clone();
        if !graph.contains(&NodeRef::from(dummy_id.clone())) {
            graph.insert(dummy_user);
            context.mark_updated(dummy_id.clone());
        }
        Self {
            graph,
            context,
            dummy_user: dummy_id,
        }
    }

    pub fn graph(&self) -> &IssueGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut IssueGraph {
        &mut self.graph
    }

    pub fn context_mut(&mut self) -> &mut UpdateContext {
        &mut self.context
    }

    /// Graph and unit of work borrowed together
    pub fn split(&mut self) -> (&mut IssueGraph, &mut UpdateContext) {
        (&mut self.graph, &mut self.context)
    }

    pub fn updater(&mut self) -> IssueAggregationUpdater<'_> {
        IssueAggregationUpdater::new(&mut self.graph, &mut self.context)
    }

    /// User sync-originated writes are attributed to
    pub fn dummy_user(&self) -> &UserId {
        &self.dummy_user
    }

    /// Insert or replace a node and record it for the next save
    pub fn put(&mut self, node: impl Into<crate::graph::Node>) {
        let node = node.into();
        self.context.mark_updated(node.node_ref());
        self.graph.insert(node);
    }

    /// User with `username`, created on first sight
    pub fn ensure_user(&mut self, username: &str, display_name: Option<&str>) -> UserId {
        if let Some(user) = self.graph.user_by_username(username) {
            return user.id.clone();
        }
        let user = User {
            id: UserId::generate(),
            username: username.to_string(),
            display_name: display_name.map(str::to_string),
            is_system: false,
        };
        let id = user.id.clone();
        self.put(user);
        id
    }

    /// Label named `name`, created on first sight
    pub fn ensure_label(&mut self, name: &str, color: Option<&str>) -> LabelId {
        if let Some(label) = self.graph.label_by_name(name) {
            return label.id.clone();
        }
        let label = Label {
            id: LabelId::generate(),
            name: name.to_string(),
            color: color.map(str::to_string),
        };
        let id = label.id.clone();
        self.put(label);
        id
    }

    pub fn issue_state_named(&self, name: &str) -> Result<IssueStateId> {
        self.graph
            .issue_state_by_name(name)
            .map(|state| state.id.clone())
            .ok_or_else(|| ArchSyncError::Integration(format!("Unknown issue state: {}", name)))
    }

    pub fn issue_type_named(&self, name: &str) -> Result<IssueTypeId> {
        self.graph
            .issue_type_by_name(name)
            .map(|issue_type| issue_type.id.clone())
            .ok_or_else(|| ArchSyncError::Integration(format!("Unknown issue type: {}", name)))
    }

    /// Write the pending unit of work
    pub async fn save(&mut self, repository: &dyn GraphRepository) -> Result<()> {
        self.context.save(&self.graph, repository).await
    }

    /// Drop pending changes and replace the graph with what the repository holds
    pub async fn reload(&mut self, repository: &dyn GraphRepository) -> Result<()> {
        let graph = repository.load_graph().await?;
        let dummy = self.graph.user(&self.dummy_user).ok().cloned();
        self.graph = graph;
        self.context = UpdateContext::new();
        if let Some(dummy) = dummy {
            if !self.graph.contains(&NodeRef::from(self.dummy_user.clone())) {
                self.put(dummy);
            }
        }
        Ok(())
    }
}
