//! Graph Engine
//!
//! The engine binds one [`Graph`] to one [`Layout`] and keeps the layout
//! consistent with the latest topology without recomputing on every single
//! mutation.
//!
//! # How It Works
//!
//! 1. [`GraphEngine::run`] subscribes to the graph and the layout, hands the
//!    graph to the layout and starts it.
//!
//! 2. Every topology notification marks the layout dirty and calls
//!    `graph_changed`. The layout is only updated when it is dirty *and* no
//!    transaction is open.
//!
//! 3. Closing the outermost transaction calls `graph_changed` again, which
//!    flushes the deferred work: N mutations inside one transaction cost one
//!    layout pass.
//!
//! 4. Layout lifecycle notifications are re-emitted on the engine, so hosts
//!    subscribe once regardless of the active strategy.
//!
//! # Read surface
//!
//! [`GraphEngine::get_nodes`] and [`GraphEngine::get_edges`] only return
//! entities the layout has positioned. Both are memoized on the graph
//! version plus the layout version; since both only ever grow, their sum
//! changes iff either one does.
//!
//! # Threading
//!
//! Graph notifications are handled synchronously on the mutating thread.
//! A handler must not expect a mutation it issues from inside a
//! notification to be observed synchronously by the same pass.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::VersionedCache;
use crate::event::{Listeners, SubscriberId};
use crate::graph::{Edge, Graph, GraphEvent, Node};
use crate::layout::{EdgePosition, Layout, LayoutEvent, LayoutState, Position};

#[derive(Debug, Default)]
struct Control {
    layout_dirty: bool,
    transaction_depth: usize,
    graph_subscription: Option<SubscriberId>,
    layout_subscription: Option<SubscriberId>,
}

type Positioned = (Arc<[Node]>, Arc<[Edge]>);

struct EngineShared {
    graph: Graph,
    layout: Arc<dyn Layout>,
    listeners: Listeners<LayoutEvent>,
    control: Mutex<Control>,
    positioned: VersionedCache<&'static str, Positioned>,
}

impl EngineShared {
    fn on_graph_event(&self, event: &GraphEvent) {
        match event {
            GraphEvent::TransactionStart => {
                self.control.lock().transaction_depth += 1;
            }
            GraphEvent::TransactionEnd => {
                {
                    let mut control = self.control.lock();
                    control.transaction_depth = control.transaction_depth.saturating_sub(1);
                }
                self.graph_changed();
            }
            _ => {
                self.control.lock().layout_dirty = true;
                self.graph_changed();
            }
        }
    }

    fn graph_changed(&self) {
        {
            let mut control = self.control.lock();
            if !control.layout_dirty || control.transaction_depth > 0 {
                return;
            }
            control.layout_dirty = false;
        }

        debug!(version = self.graph.version(), layout = self.layout.name(), "updating layout");
        self.layout.update_graph(&self.graph);
        self.layout.update();
    }

    fn detach(&self) {
        let (graph_subscription, layout_subscription) = {
            let mut control = self.control.lock();
            (control.graph_subscription.take(), control.layout_subscription.take())
        };
        if let Some(id) = graph_subscription {
            self.graph.unsubscribe(id);
        }
        if let Some(id) = layout_subscription {
            self.layout.core().unsubscribe(id);
        }
    }
}

// The graph and layout may outlive every engine handle.
impl Drop for EngineShared {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Orchestrates a graph and a layout strategy.
#[derive(Clone)]
pub struct GraphEngine {
    shared: Arc<EngineShared>,
}

impl GraphEngine {
    pub fn new<L>(graph: Graph, layout: L) -> Self
    where
        L: Layout + 'static,
    {
        Self::with_shared_layout(graph, Arc::new(layout))
    }

    pub fn with_shared_layout(graph: Graph, layout: Arc<dyn Layout>) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                graph,
                layout,
                listeners: Listeners::new(),
                control: Mutex::new(Control::default()),
                positioned: VersionedCache::new(),
            }),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.shared.graph
    }

    pub fn layout(&self) -> &Arc<dyn Layout> {
        &self.shared.layout
    }

    /// Whether the engine is currently subscribed to its graph.
    pub fn is_running(&self) -> bool {
        self.shared.control.lock().graph_subscription.is_some()
    }

    /// Wire up notifications and start the layout.
    ///
    /// The subscriptions are released by [`GraphEngine::clear`] or when the
    /// last clone of the engine is dropped.
    pub fn run(&self) {
        self.shared.detach();

        let weak: Weak<EngineShared> = Arc::downgrade(&self.shared);
        let graph_subscription = self.shared.graph.subscribe(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.on_graph_event(event);
            }
        });

        let weak: Weak<EngineShared> = Arc::downgrade(&self.shared);
        let layout_subscription = self.shared.layout.core().subscribe(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.listeners.emit(event);
            }
        });

        {
            let mut control = self.shared.control.lock();
            control.graph_subscription = Some(graph_subscription);
            control.layout_subscription = Some(layout_subscription);
            control.layout_dirty = false;
            control.transaction_depth = 0;
        }

        self.shared.layout.initialize_graph(&self.shared.graph);
        self.shared.layout.start();
    }

    /// Drop every subscription, internal and external.
    pub fn clear(&self) {
        self.shared.detach();
        self.shared.listeners.clear();
    }

    pub fn resume(&self) {
        self.shared.layout.resume();
    }

    pub fn stop(&self) {
        self.shared.layout.stop();
    }

    /// Subscribe to forwarded layout lifecycle notifications.
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&LayoutEvent) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.shared.listeners.unsubscribe(id)
    }

    fn positioned(&self) -> Positioned {
        let layout = &self.shared.layout;
        let graph = &self.shared.graph;
        let version = graph.version() + layout.version();

        self.shared.positioned.get_or_compute("positioned", version, || {
            let nodes = graph
                .get_nodes()
                .iter()
                .filter(|node| layout.get_node_position(node).is_some())
                .cloned()
                .collect();
            let edges = graph
                .get_edges()
                .iter()
                .filter(|edge| layout.get_edge_position(edge).is_some())
                .cloned()
                .collect();
            (nodes, edges)
        })
    }

    /// Nodes the layout has positioned.
    pub fn get_nodes(&self) -> Arc<[Node]> {
        self.positioned().0
    }

    /// Edges whose endpoints the layout has positioned.
    pub fn get_edges(&self) -> Arc<[Edge]> {
        self.positioned().1
    }

    pub fn get_node_position(&self, node: &Node) -> Option<Position> {
        self.shared.layout.get_node_position(node)
    }

    pub fn get_edge_position(&self, edge: &Edge) -> Option<EdgePosition> {
        self.shared.layout.get_edge_position(edge)
    }

    pub fn lock_node_position(&self, node: &Node, x: f64, y: f64) {
        self.shared.layout.lock_node_position(node, x, y);
    }

    pub fn unlock_node_position(&self, node: &Node) {
        self.shared.layout.unlock_node_position(node);
    }

    pub fn get_layout_state(&self) -> LayoutState {
        self.shared.layout.state()
    }

    /// Version of the last layout update.
    pub fn get_layout_last_update(&self) -> u64 {
        self.shared.layout.version()
    }
}

impl std::fmt::Debug for GraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEngine")
            .field("graph", &self.shared.graph)
            .field("layout", &self.shared.layout.name())
            .field("layout_state", &self.get_layout_state())
            .field("running", &self.is_running())
            .finish()
    }
}
