//! Layout Strategies
//!
//! A layout turns a graph snapshot into node positions and edge paths. The
//! [`Layout`] trait is the pluggable interface; [`LayoutCore`] is the state
//! machine and notification channel every strategy embeds.
//!
//! # Lifecycle
//!
//! ```text
//! INIT ──start/update/resume──▶ CALCULATING ──▶ DONE
//!                                   │    ▲        │
//!                                   ▼    └────────┘ (re-enter via start)
//!                                 ERROR
//! ```
//!
//! Every run emits [`LayoutEvent::Start`] once, zero or more
//! [`LayoutEvent::Change`], then exactly one [`LayoutEvent::Done`] or
//! [`LayoutEvent::Error`]. Each transition (and each position change)
//! bumps the layout version, which downstream caches use as a validity key.
//!
//! # Strategies
//!
//! - [`SimpleLayout`]: positions read eagerly from node data; every run
//!   completes synchronously.
//! - [`ForceLayout`]: a force-directed simulation executed on a background
//!   task, with results streamed back asynchronously.

mod force;
mod simple;

pub use force::{
    ForceLayout, ForceLayoutOptions, SimLink, SimNode, Simulation, SimulationParams,
    SimulationRequest, WorkerMessage,
};
pub use simple::{NodePositionAccessor, SimpleLayout, SimpleLayoutOptions};

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::debug;

use crate::error::LayoutError;
use crate::event::{Listeners, SubscriberId};
use crate::graph::{Edge, Graph, Id, Node};

/// A point in layout space.
pub type Position = [f64; 2];

/// Lifecycle state of a layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LayoutState {
    #[default]
    Init,
    Calculating,
    Done,
    Error,
}

/// Lifecycle notification emitted by a layout and forwarded by the engine.
#[derive(Debug, Clone)]
pub enum LayoutEvent {
    Start,
    Change,
    Done,
    Error(Arc<LayoutError>),
}

/// Shape of an edge path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Line,
    SplineCurve,
    Path,
}

/// Drawing coordinates of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePosition {
    pub kind: EdgeKind,
    pub source_position: Position,
    pub target_position: Position,
    pub control_points: SmallVec<[Position; 2]>,
}

impl EdgePosition {
    /// A straight segment between two points.
    pub fn line(source_position: Position, target_position: Position) -> Self {
        Self {
            kind: EdgeKind::Line,
            source_position,
            target_position,
            control_points: SmallVec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Status {
    state: LayoutState,
    version: u64,
    last_error: Option<Arc<LayoutError>>,
}

/// State machine and listener registry shared by all strategies.
///
/// Transitions update the status under a short lock and emit after the lock
/// is released.
#[derive(Debug)]
pub struct LayoutCore {
    name: &'static str,
    status: Mutex<Status>,
    listeners: Listeners<LayoutEvent>,
}

impl LayoutCore {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            status: Mutex::new(Status::default()),
            listeners: Listeners::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> LayoutState {
        self.status.lock().state
    }

    pub fn version(&self) -> u64 {
        self.status.lock().version
    }

    /// The error that ended the last failed run, if the layout is in `ERROR`.
    pub fn last_error(&self) -> Option<Arc<LayoutError>> {
        self.status.lock().last_error.clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&LayoutEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Enter `CALCULATING` and announce the start of a run.
    pub fn start(&self) {
        self.transition(LayoutState::Calculating);
        self.listeners.emit(&LayoutEvent::Start);
    }

    /// Announce new positions within the current run.
    pub fn change(&self) {
        {
            let mut status = self.status.lock();
            if status.state != LayoutState::Calculating {
                debug!(layout = self.name, state = ?status.state, "position change outside a run");
            }
            status.version += 1;
        }
        self.listeners.emit(&LayoutEvent::Change);
    }

    /// Finish the current run successfully.
    pub fn done(&self) {
        self.transition(LayoutState::Done);
        self.listeners.emit(&LayoutEvent::Done);
    }

    /// Finish the current run with an error.
    pub fn error(&self, error: LayoutError) {
        let error = Arc::new(error);
        {
            let mut status = self.status.lock();
            status.state = LayoutState::Error;
            status.version += 1;
            status.last_error = Some(error.clone());
        }
        debug!(layout = self.name, %error, "layout failed");
        self.listeners.emit(&LayoutEvent::Error(error));
    }

    /// Run a complete synchronous cycle: start, one change, done.
    pub fn complete_cycle(&self) {
        self.start();
        self.change();
        self.done();
    }

    fn transition(&self, next: LayoutState) {
        let mut status = self.status.lock();
        debug!(layout = self.name, from = ?status.state, to = ?next, "layout transition");
        status.state = next;
        status.version += 1;
        if next != LayoutState::Error {
            status.last_error = None;
        }
    }
}

/// A pluggable layout strategy.
///
/// Methods take `&self`: strategies use interior mutability so that they
/// can be shared between the engine and their own background work.
pub trait Layout: Send + Sync {
    /// The embedded lifecycle state machine.
    fn core(&self) -> &LayoutCore;

    /// Load the initial graph.
    fn initialize_graph(&self, graph: &Graph);

    /// Replace the topology the next run will use.
    fn update_graph(&self, graph: &Graph);

    fn start(&self);

    /// Recompute after a topology change.
    fn update(&self);

    /// Continue from the current positions.
    fn resume(&self);

    fn stop(&self);

    /// Position of a node by id, if resolved.
    fn position_of(&self, id: &Id) -> Option<Position>;

    fn lock_node_position(&self, node: &Node, x: f64, y: f64);

    fn unlock_node_position(&self, node: &Node);

    fn get_node_position(&self, node: &Node) -> Option<Position> {
        self.position_of(node.id())
    }

    /// Straight line between the two endpoint positions; `None` until both
    /// endpoints are resolved.
    fn get_edge_position(&self, edge: &Edge) -> Option<EdgePosition> {
        let source = self.position_of(edge.source_id())?;
        let target = self.position_of(edge.target_id())?;
        Some(EdgePosition::line(source, target))
    }

    fn name(&self) -> &'static str {
        self.core().name()
    }

    fn state(&self) -> LayoutState {
        self.core().state()
    }

    fn version(&self) -> u64 {
        self.core().version()
    }
}
