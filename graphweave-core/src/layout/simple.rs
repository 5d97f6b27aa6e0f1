//! Pass-through layout.
//!
//! Positions come straight from the nodes through an accessor, evaluated
//! eagerly whenever a run starts. There is no background work: `start`,
//! `update` and `resume` each emit a full start/change/done cycle before
//! returning. This is the strategy to use when coordinates are precomputed
//! and stored alongside the data.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use super::{Layout, LayoutCore, Position};
use crate::graph::{Graph, Id, Node};

/// Reads a node's position.
pub type NodePositionAccessor = Arc<dyn Fn(&Node) -> Option<Position> + Send + Sync>;

/// Which payload attributes hold the coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimpleLayoutOptions {
    pub x_attribute: String,
    pub y_attribute: String,
}

impl Default for SimpleLayoutOptions {
    fn default() -> Self {
        Self {
            x_attribute: "x".to_owned(),
            y_attribute: "y".to_owned(),
        }
    }
}

#[derive(Default)]
struct Placement {
    nodes: Arc<[Node]>,
    positions: HashMap<Id, Position>,
    locked: HashMap<Id, Position>,
}

/// A layout whose positions are read from node data.
pub struct SimpleLayout {
    core: LayoutCore,
    accessor: NodePositionAccessor,
    placement: RwLock<Placement>,
}

impl SimpleLayout {
    /// Read positions from the `x`/`y` payload attributes.
    pub fn new() -> Self {
        Self::with_options(SimpleLayoutOptions::default())
    }

    pub fn with_options(options: SimpleLayoutOptions) -> Self {
        let SimpleLayoutOptions { x_attribute, y_attribute } = options;
        Self::with_accessor(move |node: &Node| {
            let x = node.property(&x_attribute)?.as_f64()?;
            let y = node.property(&y_attribute)?.as_f64()?;
            Some([x, y])
        })
    }

    /// Read positions through a custom accessor.
    pub fn with_accessor<F>(accessor: F) -> Self
    where
        F: Fn(&Node) -> Option<Position> + Send + Sync + 'static,
    {
        Self {
            core: LayoutCore::new("simple"),
            accessor: Arc::new(accessor),
            placement: RwLock::new(Placement::default()),
        }
    }

    fn place(&self) {
        let mut placement = self.placement.write();
        let positions: HashMap<Id, Position> = placement
            .nodes
            .iter()
            .filter_map(|node| {
                let position = placement
                    .locked
                    .get(node.id())
                    .copied()
                    .or_else(|| (self.accessor)(node))?;
                Some((node.id().clone(), position))
            })
            .collect();
        debug!(
            placed = positions.len(),
            total = placement.nodes.len(),
            "simple layout placed nodes"
        );
        placement.positions = positions;
    }

    fn run(&self) {
        self.core.start();
        self.place();
        self.core.change();
        self.core.done();
    }
}

impl Default for SimpleLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout for SimpleLayout {
    fn core(&self) -> &LayoutCore {
        &self.core
    }

    fn initialize_graph(&self, graph: &Graph) {
        self.update_graph(graph);
    }

    fn update_graph(&self, graph: &Graph) {
        let nodes = graph.get_nodes();
        let present: HashSet<&Id> = nodes.iter().map(Node::id).collect();
        let mut placement = self.placement.write();
        placement.locked.retain(|id, _| present.contains(id));
        drop(present);
        placement.nodes = nodes;
    }

    fn start(&self) {
        self.run();
    }

    fn update(&self) {
        self.run();
    }

    fn resume(&self) {
        self.run();
    }

    fn stop(&self) {}

    fn position_of(&self, id: &Id) -> Option<Position> {
        self.placement.read().positions.get(id).copied()
    }

    fn lock_node_position(&self, node: &Node, x: f64, y: f64) {
        self.core.start();
        {
            let mut placement = self.placement.write();
            placement.locked.insert(node.id().clone(), [x, y]);
            placement.positions.insert(node.id().clone(), [x, y]);
        }
        self.core.change();
        self.core.done();
    }

    fn unlock_node_position(&self, node: &Node) {
        if self.placement.write().locked.remove(node.id()).is_some() {
            self.run();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::layout::{LayoutEvent, LayoutState};
    use parking_lot::Mutex;
    use serde_json::json;

    fn graph() -> Graph {
        let graph = Graph::new();
        graph.batch_add_nodes([
            Node::with_data("a", json!({"x": 0.0, "y": 1.0})),
            Node::with_data("b", json!({"x": 2, "y": 3})),
            Node::with_data("c", json!({"x": 5})),
        ]);
        graph.add_edge(Edge::new("ab", "a", "b", false));
        graph.add_edge(Edge::new("ac", "a", "c", false));
        graph
    }

    #[test]
    fn start_runs_a_full_cycle_synchronously() {
        let layout = SimpleLayout::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        layout.core().subscribe(move |event| {
            sink.lock().push(matches!(event, LayoutEvent::Done));
        });

        layout.initialize_graph(&graph());
        layout.start();

        assert_eq!(layout.state(), LayoutState::Done);
        assert_eq!(*events.lock(), vec![false, false, true]);
    }

    #[test]
    fn positions_come_from_node_data() {
        let graph = graph();
        let layout = SimpleLayout::new();
        layout.initialize_graph(&graph);
        layout.start();

        assert_eq!(layout.position_of(&Id::from("a")), Some([0.0, 1.0]));
        assert_eq!(layout.position_of(&Id::from("b")), Some([2.0, 3.0]));
        assert_eq!(layout.position_of(&Id::from("c")), None);

        let ab = graph.find_edge(&Id::from("ab")).unwrap();
        let ac = graph.find_edge(&Id::from("ac")).unwrap();
        assert_eq!(layout.get_edge_position(&ab).unwrap().target_position, [2.0, 3.0]);
        assert!(layout.get_edge_position(&ac).is_none());
    }

    #[test]
    fn locked_position_overrides_accessor() {
        let graph = graph();
        let layout = SimpleLayout::with_options(SimpleLayoutOptions {
            x_attribute: "x".into(),
            y_attribute: "y".into(),
        });
        layout.initialize_graph(&graph);
        layout.start();

        let a = graph.find_node(&Id::from("a")).unwrap();
        layout.lock_node_position(&a, 10.0, 10.0);
        layout.update();
        assert_eq!(layout.get_node_position(&a), Some([10.0, 10.0]));

        layout.unlock_node_position(&a);
        assert_eq!(layout.get_node_position(&a), Some([0.0, 1.0]));
    }

    #[test]
    fn locks_on_removed_nodes_are_dropped() {
        let graph = graph();
        let layout = SimpleLayout::with_accessor(|_| Some([0.0, 0.0]));
        layout.initialize_graph(&graph);

        let a = graph.find_node(&Id::from("a")).unwrap();
        let b = graph.find_node(&Id::from("b")).unwrap();
        layout.lock_node_position(&a, 5.0, 5.0);
        layout.lock_node_position(&b, 7.0, 7.0);

        graph.remove_node(&Id::from("a"));
        layout.update_graph(&graph);

        let placement = layout.placement.read();
        assert!(!placement.locked.contains_key(&Id::from("a")));
        assert_eq!(placement.locked.get(&Id::from("b")), Some(&[7.0, 7.0]));
    }

    #[test]
    fn custom_accessor() {
        let layout = SimpleLayout::with_accessor(|node| {
            let degree = node.degree() as f64;
            Some([degree, -degree])
        });
        layout.initialize_graph(&graph());
        layout.start();
        assert_eq!(layout.position_of(&Id::from("a")), Some([2.0, -2.0]));
    }
}
