//! Graph Store
//!
//! The [`Graph`] owns every node and edge and is the only place where the
//! topology changes. It is a shared handle: clones observe and mutate the
//! same graph.
//!
//! # Versioning
//!
//! Every structural mutation (add, batch add, remove, reset, data update or
//! a manual [`Graph::trigger_update`]) increments the version by exactly
//! one, whatever the size of the batch. Two snapshots of a graph are equal
//! iff their versions are equal; nothing else is compared.
//!
//! # Notifications
//!
//! Each mutation emits one [`GraphEvent`] after the internal lock has been
//! released. Listeners may read the graph from inside the callback.
//!
//! # Soft failures
//!
//! Adding an edge whose endpoints are not both present is not an error: the
//! edge is dropped with a warning and nothing changes. Partially loaded or
//! streaming data therefore never aborts ingestion.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;

use super::edge::Edge;
use super::id::{EntityState, Id};
use super::node::Node;
use crate::cache::VersionedCache;
use crate::event::{Listeners, SubscriberId};

/// Notification emitted by a [`Graph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    NodeAdded(Id),
    NodesAdded(Vec<Id>),
    NodeRemoved(Id),
    NodeUpdated(Id),
    EdgeAdded(Id),
    EdgesAdded(Vec<Id>),
    EdgeRemoved(Id),
    Reset,
    /// Manual version bump after an external data mutation.
    Changed,
    TransactionStart,
    TransactionEnd,
}

impl GraphEvent {
    /// Whether the event reports a change that can affect a layout.
    pub fn is_topology_change(&self) -> bool {
        !matches!(self, GraphEvent::TransactionStart | GraphEvent::TransactionEnd)
    }
}

#[derive(Debug, Default)]
struct Topology {
    nodes: IndexMap<Id, Node>,
    edges: IndexMap<Id, Edge>,
    version: u64,
}

impl Topology {
    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn insert_node(&mut self, node: Node) {
        if let Some(previous) = self.nodes.get(node.id()) {
            warn!(id = %node.id(), "replacing existing node");
            for (edge_id, _) in previous.detach_all_edges() {
                if let Some(edge) = self.edges.get(&edge_id) {
                    node.attach_edge(edge);
                }
            }
        }
        self.nodes.insert(node.id().clone(), node);
    }

    /// Returns false when an endpoint is missing.
    fn insert_edge(&mut self, edge: Edge) -> bool {
        let (Some(source), Some(target)) = (
            self.nodes.get(edge.source_id()),
            self.nodes.get(edge.target_id()),
        ) else {
            warn!(
                id = %edge.id(),
                source_id = %edge.source_id(),
                target_id = %edge.target_id(),
                "unable to add edge: endpoint node missing"
            );
            return false;
        };

        source.attach_edge(&edge);
        target.attach_edge(&edge);

        if let Some(previous) = self.edges.insert(edge.id().clone(), edge) {
            warn!(id = %previous.id(), "replacing existing edge");
            let current = &self.edges[previous.id()];
            for endpoint in previous.connected_node_ids() {
                if current.source_id() != &endpoint && current.target_id() != &endpoint {
                    if let Some(node) = self.nodes.get(&endpoint) {
                        node.detach_edge(previous.id());
                    }
                }
            }
        }
        true
    }

    fn take_edge(&mut self, id: &Id) -> Option<Edge> {
        let edge = self.edges.shift_remove(id)?;
        for endpoint in edge.connected_node_ids() {
            if let Some(node) = self.nodes.get(&endpoint) {
                node.detach_edge(id);
            }
        }
        Some(edge)
    }
}

type Snapshot = (Arc<[Node]>, Arc<[Edge]>);

struct GraphShared {
    name: RwLock<String>,
    topology: RwLock<Topology>,
    snapshots: VersionedCache<&'static str, Snapshot>,
    listeners: Listeners<GraphEvent>,
}

/// A mutable, versioned graph.
#[derive(Clone)]
pub struct Graph {
    shared: Arc<GraphShared>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::with_name("")
    }

    /// Create an empty graph with a display name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(GraphShared {
                name: RwLock::new(name.into()),
                topology: RwLock::new(Topology::default()),
                snapshots: VersionedCache::new(),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.shared.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.shared.name.write() = name.into();
    }

    /// The current version.
    pub fn version(&self) -> u64 {
        self.shared.topology.read().version
    }

    pub fn node_count(&self) -> usize {
        self.shared.topology.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.shared.topology.read().edges.len()
    }

    /// Subscribe to graph notifications.
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.shared.listeners.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.listeners.len()
    }

    fn emit(&self, event: GraphEvent) {
        self.shared.listeners.emit(&event);
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Add a node. An existing node with the same id is replaced and keeps
    /// its edges.
    pub fn add_node(&self, node: Node) {
        let id = node.id().clone();
        {
            let mut topology = self.shared.topology.write();
            topology.insert_node(node);
            topology.bump();
        }
        self.emit(GraphEvent::NodeAdded(id));
    }

    /// Add many nodes with a single version bump. An empty batch is a no-op.
    pub fn batch_add_nodes<I>(&self, nodes: I)
    where
        I: IntoIterator<Item = Node>,
    {
        let ids = {
            let mut topology = self.shared.topology.write();
            let ids: Vec<Id> = nodes
                .into_iter()
                .map(|node| {
                    let id = node.id().clone();
                    topology.insert_node(node);
                    id
                })
                .collect();
            if !ids.is_empty() {
                topology.bump();
            }
            ids
        };
        if !ids.is_empty() {
            self.emit(GraphEvent::NodesAdded(ids));
        }
    }

    /// Remove a node and every edge connected to it.
    pub fn remove_node(&self, id: &Id) -> Option<Node> {
        let removed = {
            let mut topology = self.shared.topology.write();
            let node = topology.nodes.shift_remove(id);
            if let Some(node) = &node {
                for (edge_id, _) in node.detach_all_edges() {
                    topology.take_edge(&edge_id);
                }
                topology.bump();
            }
            node
        };

        match removed {
            Some(node) => {
                self.emit(GraphEvent::NodeRemoved(id.clone()));
                Some(node)
            }
            None => {
                warn!(%id, "unable to remove node: not found");
                None
            }
        }
    }

    /// Replace a node's payload and report it as a topology-relevant update.
    pub fn update_node_data(&self, id: &Id, data: Value) -> bool {
        let found = {
            let mut topology = self.shared.topology.write();
            match topology.nodes.get(id) {
                Some(node) => {
                    node.set_data(data);
                    topology.bump();
                    true
                }
                None => false,
            }
        };

        if found {
            self.emit(GraphEvent::NodeUpdated(id.clone()));
        } else {
            warn!(%id, "unable to update node: not found");
        }
        found
    }

    /// Set a node's interaction state. Interaction state is not topology:
    /// the version does not move and no notification is sent.
    pub fn set_node_state(&self, id: &Id, state: EntityState) -> bool {
        match self.find_node(id) {
            Some(node) => {
                node.set_state(state);
                true
            }
            None => false,
        }
    }

    pub fn find_node(&self, id: &Id) -> Option<Node> {
        self.shared.topology.read().nodes.get(id).cloned()
    }

    /// Every node, as a slice that stays the same allocation until the
    /// version changes.
    pub fn get_nodes(&self) -> Arc<[Node]> {
        self.snapshot().0
    }

    /// Degree of a node; 0 (with a warning) if the node is unknown.
    pub fn get_degree(&self, id: &Id) -> usize {
        match self.find_node(id) {
            Some(node) => node.degree(),
            None => {
                warn!(%id, "unable to get degree: node not found");
                0
            }
        }
    }

    /// Nodes at the other end of each edge connected to `id`.
    pub fn get_node_siblings(&self, id: &Id) -> Vec<Node> {
        let topology = self.shared.topology.read();
        let Some(node) = topology.nodes.get(id) else {
            warn!(%id, "unable to get siblings: node not found");
            return Vec::new();
        };
        node.sibling_ids()
            .iter()
            .filter_map(|sibling| topology.nodes.get(sibling).cloned())
            .collect()
    }

    /// Edges connected to `id`.
    pub fn get_connected_edges(&self, id: &Id) -> Vec<Edge> {
        let topology = self.shared.topology.read();
        let Some(node) = topology.nodes.get(id) else {
            return Vec::new();
        };
        node.connected_edge_ids()
            .iter()
            .filter_map(|edge_id| topology.edges.get(edge_id).cloned())
            .collect()
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Add an edge between two existing nodes.
    ///
    /// Returns `false` without touching the graph if either endpoint is
    /// missing.
    pub fn add_edge(&self, edge: Edge) -> bool {
        let id = edge.id().clone();
        let added = {
            let mut topology = self.shared.topology.write();
            let added = topology.insert_edge(edge);
            if added {
                topology.bump();
            }
            added
        };

        if added {
            self.emit(GraphEvent::EdgeAdded(id));
        }
        added
    }

    /// Add many edges with a single version bump. Edges with a missing
    /// endpoint are skipped. Returns the number of edges added.
    pub fn batch_add_edges<I>(&self, edges: I) -> usize
    where
        I: IntoIterator<Item = Edge>,
    {
        let ids = {
            let mut topology = self.shared.topology.write();
            let ids: Vec<Id> = edges
                .into_iter()
                .filter_map(|edge| {
                    let id = edge.id().clone();
                    topology.insert_edge(edge).then_some(id)
                })
                .collect();
            if !ids.is_empty() {
                topology.bump();
            }
            ids
        };

        let added = ids.len();
        if added > 0 {
            self.emit(GraphEvent::EdgesAdded(ids));
        }
        added
    }

    pub fn remove_edge(&self, id: &Id) -> Option<Edge> {
        let removed = {
            let mut topology = self.shared.topology.write();
            let edge = topology.take_edge(id);
            if edge.is_some() {
                topology.bump();
            }
            edge
        };

        match removed {
            Some(edge) => {
                self.emit(GraphEvent::EdgeRemoved(id.clone()));
                Some(edge)
            }
            None => {
                warn!(%id, "unable to remove edge: not found");
                None
            }
        }
    }

    pub fn set_edge_state(&self, id: &Id, state: EntityState) -> bool {
        match self.find_edge(id) {
            Some(edge) => {
                edge.set_state(state);
                true
            }
            None => false,
        }
    }

    pub fn find_edge(&self, id: &Id) -> Option<Edge> {
        self.shared.topology.read().edges.get(id).cloned()
    }

    /// Every edge; reference-stable while the version is unchanged.
    pub fn get_edges(&self) -> Arc<[Edge]> {
        self.snapshot().1
    }

    // ------------------------------------------------------------------
    // Whole-graph operations
    // ------------------------------------------------------------------

    /// Remove every node and edge.
    pub fn reset(&self) {
        {
            let mut topology = self.shared.topology.write();
            // handles held outside the graph must not keep stale edges
            for node in topology.nodes.values() {
                node.detach_all_edges();
            }
            topology.nodes.clear();
            topology.edges.clear();
            topology.bump();
        }
        self.emit(GraphEvent::Reset);
    }

    /// Bump the version after the caller mutated entity payloads in place.
    pub fn trigger_update(&self) {
        self.shared.topology.write().bump();
        self.emit(GraphEvent::Changed);
    }

    /// Open a transaction. Observers coalesce layout work until the
    /// matching [`Graph::transaction_end`].
    pub fn transaction_start(&self) {
        self.emit(GraphEvent::TransactionStart);
    }

    pub fn transaction_end(&self) {
        self.emit(GraphEvent::TransactionEnd);
    }

    /// Run `f` between `transaction_start` and `transaction_end`.
    pub fn transaction<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Graph) -> R,
    {
        self.transaction_start();
        let result = f(self);
        self.transaction_end();
        result
    }

    fn snapshot(&self) -> Snapshot {
        let topology = self.shared.topology.read();
        self.shared
            .snapshots
            .get_or_compute("topology", topology.version, || {
                (
                    topology.nodes.values().cloned().collect(),
                    topology.edges.values().cloned().collect(),
                )
            })
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topology = self.shared.topology.read();
        f.debug_struct("Graph")
            .field("name", &*self.shared.name.read())
            .field("version", &topology.version)
            .field("nodes", &topology.nodes.len())
            .field("edges", &topology.edges.len())
            .finish()
    }
}
