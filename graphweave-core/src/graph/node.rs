//! Graph Nodes
//!
//! A [`Node`] is a cheap, cloneable handle: clones share the same id, data,
//! interaction state and edge back-references. The owning
//! [`Graph`](super::Graph) decides when a node is part of the topology; the
//! node itself only keeps id-based links to the edges touching it.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

use super::edge::Edge;
use super::id::{EntityState, Id};

/// How a connected edge touches a node. Cached at attach time so degree
/// queries never need to go back to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub source_id: Id,
    pub target_id: Id,
    pub directed: bool,
}

#[derive(Debug)]
struct NodeInner {
    id: Id,
    data: RwLock<Value>,
    state: RwLock<EntityState>,
    edges: RwLock<IndexMap<Id, Connection>>,
}

/// A node of the graph.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Create a node with no payload.
    pub fn new(id: impl Into<Id>) -> Self {
        Self::with_data(id, Value::Null)
    }

    /// Create a node carrying a caller-owned payload.
    pub fn with_data(id: impl Into<Id>, data: Value) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                id: id.into(),
                data: RwLock::new(data),
                state: RwLock::new(EntityState::Default),
                edges: RwLock::new(IndexMap::new()),
            }),
        }
    }

    pub fn id(&self) -> &Id {
        &self.inner.id
    }

    /// A clone of the payload.
    pub fn data(&self) -> Value {
        self.inner.data.read().clone()
    }

    /// Replace the payload.
    ///
    /// This does not notify the graph; use
    /// [`Graph::update_node_data`](super::Graph::update_node_data) when the
    /// change should reach the layout.
    pub fn set_data(&self, data: Value) {
        *self.inner.data.write() = data;
    }

    pub fn state(&self) -> EntityState {
        *self.inner.state.read()
    }

    pub fn set_state(&self, state: EntityState) {
        *self.inner.state.write() = state;
    }

    /// Number of connected edges.
    pub fn degree(&self) -> usize {
        self.inner.edges.read().len()
    }

    /// Number of directed edges pointing at this node.
    pub fn in_degree(&self) -> usize {
        self.inner
            .edges
            .read()
            .values()
            .filter(|c| c.directed && c.target_id == self.inner.id)
            .count()
    }

    /// Number of directed edges leaving this node.
    pub fn out_degree(&self) -> usize {
        self.inner
            .edges
            .read()
            .values()
            .filter(|c| c.directed && c.source_id == self.inner.id)
            .count()
    }

    /// Ids of the nodes at the other end of every connected edge.
    /// A self-loop lists the node itself.
    pub fn sibling_ids(&self) -> Vec<Id> {
        self.inner
            .edges
            .read()
            .values()
            .map(|c| {
                if c.source_id == self.inner.id {
                    c.target_id.clone()
                } else {
                    c.source_id.clone()
                }
            })
            .collect()
    }

    /// Ids of the connected edges, in attach order.
    pub fn connected_edge_ids(&self) -> Vec<Id> {
        self.inner.edges.read().keys().cloned().collect()
    }

    /// Look up a property by name.
    ///
    /// Structural keys (`id`, `degree`, `inDegree`, `outDegree`, `state`)
    /// are answered by the node itself; anything else is read from the
    /// payload when it is a JSON object.
    pub fn property(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(self.inner.id.to_json()),
            "degree" => Some(Value::from(self.degree())),
            "inDegree" => Some(Value::from(self.in_degree())),
            "outDegree" => Some(Value::from(self.out_degree())),
            "state" => Some(Value::from(self.state().as_str())),
            _ => self
                .inner
                .data
                .read()
                .get(key)
                .filter(|value| !value.is_null())
                .cloned(),
        }
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn attach_edge(&self, edge: &Edge) {
        self.inner.edges.write().insert(
            edge.id().clone(),
            Connection {
                source_id: edge.source_id().clone(),
                target_id: edge.target_id().clone(),
                directed: edge.is_directed(),
            },
        );
    }

    pub(crate) fn detach_edge(&self, edge_id: &Id) -> Option<Connection> {
        self.inner.edges.write().shift_remove(edge_id)
    }

    pub(crate) fn detach_all_edges(&self) -> Vec<(Id, Connection)> {
        self.inner.edges.write().drain(..).collect()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("degree", &self.degree())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn degrees_follow_connected_edges() {
        let a = Node::new("a");
        let b = Node::new("b");

        a.attach_edge(&Edge::new("ab", "a", "b", true));
        a.attach_edge(&Edge::new("ca", "c", "a", true));
        a.attach_edge(&Edge::new("ad", "a", "d", false));
        b.attach_edge(&Edge::new("ab", "a", "b", true));

        assert_eq!(a.degree(), 3);
        assert_eq!(a.in_degree(), 1);
        assert_eq!(a.out_degree(), 1);
        assert_eq!(a.sibling_ids(), vec![Id::from("b"), Id::from("c"), Id::from("d")]);
        assert_eq!(b.in_degree(), 1);

        a.detach_edge(&Id::from("ca"));
        assert_eq!(a.in_degree(), 0);
        assert_eq!(a.connected_edge_ids(), vec![Id::from("ab"), Id::from("ad")]);
    }

    #[test]
    fn self_loop_lists_itself_as_sibling() {
        let a = Node::new(1);
        a.attach_edge(&Edge::new(10, 1, 1, false));
        assert_eq!(a.sibling_ids(), vec![Id::from(1)]);
    }

    #[test]
    fn property_reads_structure_then_payload() {
        let node = Node::with_data("n", json!({"weight": 4, "label": "N", "missing": null}));
        assert_eq!(node.property("id"), Some(json!("n")));
        assert_eq!(node.property("degree"), Some(json!(0)));
        assert_eq!(node.property("weight"), Some(json!(4)));
        assert_eq!(node.property("missing"), None);
        assert_eq!(node.property("absent"), None);
        assert_eq!(node.property("state"), Some(json!("default")));
    }

    #[test]
    fn clones_share_state() {
        let node = Node::new("n");
        let other = node.clone();
        other.set_state(EntityState::Hover);
        other.set_data(json!({"x": 1}));

        assert_eq!(node.state(), EntityState::Hover);
        assert_eq!(node.data(), json!({"x": 1}));
        assert!(node.ptr_eq(&other));
    }
}
