//! Graph Edges
//!
//! Edges reference their endpoints by id only. Endpoint lookups go through
//! the owning graph, so an edge never keeps a node alive.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::id::{EntityState, Id};

#[derive(Debug)]
struct EdgeInner {
    id: Id,
    source_id: Id,
    target_id: Id,
    directed: bool,
    data: RwLock<Value>,
    state: RwLock<EntityState>,
}

/// An edge of the graph. Clones share data and interaction state.
#[derive(Clone)]
pub struct Edge {
    inner: Arc<EdgeInner>,
}

impl Edge {
    pub fn new(
        id: impl Into<Id>,
        source_id: impl Into<Id>,
        target_id: impl Into<Id>,
        directed: bool,
    ) -> Self {
        Self::with_data(id, source_id, target_id, directed, Value::Null)
    }

    pub fn with_data(
        id: impl Into<Id>,
        source_id: impl Into<Id>,
        target_id: impl Into<Id>,
        directed: bool,
        data: Value,
    ) -> Self {
        Self {
            inner: Arc::new(EdgeInner {
                id: id.into(),
                source_id: source_id.into(),
                target_id: target_id.into(),
                directed,
                data: RwLock::new(data),
                state: RwLock::new(EntityState::Default),
            }),
        }
    }

    pub fn id(&self) -> &Id {
        &self.inner.id
    }

    pub fn source_id(&self) -> &Id {
        &self.inner.source_id
    }

    pub fn target_id(&self) -> &Id {
        &self.inner.target_id
    }

    pub fn is_directed(&self) -> bool {
        self.inner.directed
    }

    /// `[source, target]`.
    pub fn connected_node_ids(&self) -> [Id; 2] {
        [self.inner.source_id.clone(), self.inner.target_id.clone()]
    }

    pub fn data(&self) -> Value {
        self.inner.data.read().clone()
    }

    pub fn set_data(&self, data: Value) {
        *self.inner.data.write() = data;
    }

    pub fn state(&self) -> EntityState {
        *self.inner.state.read()
    }

    pub fn set_state(&self, state: EntityState) {
        *self.inner.state.write() = state;
    }

    /// Look up a property by name: `id`, `sourceId`, `targetId`,
    /// `directed` and `state` first, then the payload.
    pub fn property(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(self.inner.id.to_json()),
            "sourceId" => Some(self.inner.source_id.to_json()),
            "targetId" => Some(self.inner.target_id.to_json()),
            "directed" => Some(Value::from(self.inner.directed)),
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

    pub fn ptr_eq(&self, other: &Edge) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("id", &self.inner.id)
            .field("source_id", &self.inner.source_id)
            .field("target_id", &self.inner.target_id)
            .field("directed", &self.inner.directed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structural_properties() {
        let edge = Edge::with_data("e", 1, 2, true, json!({"weight": 0.5}));
        assert_eq!(edge.property("sourceId"), Some(json!(1)));
        assert_eq!(edge.property("targetId"), Some(json!(2)));
        assert_eq!(edge.property("directed"), Some(json!(true)));
        assert_eq!(edge.property("weight"), Some(json!(0.5)));
        assert_eq!(edge.connected_node_ids(), [Id::from(1), Id::from(2)]);
    }

    #[test]
    fn state_is_shared_between_clones() {
        let edge = Edge::new("e", "a", "b", false);
        edge.clone().set_state(EntityState::Selected);
        assert_eq!(edge.state(), EntityState::Selected);
        assert_eq!(edge.property("state"), Some(json!("selected")));
    }
}
