//! Force-directed layout.
//!
//! The simulation runs on a tokio executor, never on the caller's thread.
//! Each call to `start`, `update` or `resume` begins a new *generation*:
//!
//! 1. the previous generation's tasks are aborted and its generation number
//!    retired, so late results from it are discarded;
//! 2. the current topology, known positions and pinned nodes are serialized
//!    into a request;
//! 3. a worker task and an applier task are spawned for the new generation.
//!
//! Cancellation is all-or-nothing: a generation is either current and
//! applied, or retired and ignored. Lifecycle notifications are emitted under
//! the run lock so a retired generation can never interleave its events with
//! the current one's.
//!
//! A worker that sends nothing within `stall_timeout_ms` fails the run with
//! [`LayoutError::Stalled`].

mod simulation;
mod worker;

pub use simulation::{SimLink, SimNode, Simulation, SimulationParams, SimulationRequest};
pub use worker::WorkerMessage;

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{ReentrantMutex, RwLock};
use serde::Deserialize;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{Layout, LayoutCore, LayoutState, Position};
use crate::error::LayoutError;
use crate::graph::{Graph, Id, Node};
use worker::ResultSink;

/// Configuration of the force-directed layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForceLayoutOptions {
    /// Starting temperature of `start` and `update`.
    pub alpha: f64,
    /// Starting temperature of `resume`.
    pub resume_alpha: f64,
    pub alpha_min: f64,
    /// Derived from `alpha_min` so a run lasts ~300 ticks when unset.
    pub alpha_decay: Option<f64>,
    pub velocity_decay: f64,
    pub n_body_strength: f64,
    pub n_body_distance_min: f64,
    pub n_body_distance_max: f64,
    pub link_distance: f64,
    pub collision_radius: f64,
    pub ticks_per_update: usize,
    pub stall_timeout_ms: Option<u64>,
}

impl Default for ForceLayoutOptions {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            resume_alpha: 0.1,
            alpha_min: 0.001,
            alpha_decay: None,
            velocity_decay: 0.4,
            n_body_strength: -900.0,
            n_body_distance_min: 100.0,
            n_body_distance_max: 400.0,
            link_distance: 30.0,
            collision_radius: 0.0,
            ticks_per_update: 1,
            stall_timeout_ms: Some(10_000),
        }
    }
}

impl ForceLayoutOptions {
    fn params(&self, alpha: f64) -> SimulationParams {
        SimulationParams {
            alpha,
            alpha_min: self.alpha_min,
            alpha_decay: self
                .alpha_decay
                .unwrap_or_else(|| 1.0 - self.alpha_min.powf(1.0 / 300.0)),
            velocity_decay: self.velocity_decay,
            n_body_strength: self.n_body_strength,
            n_body_distance_min: self.n_body_distance_min,
            n_body_distance_max: self.n_body_distance_max,
            link_distance: self.link_distance,
            collision_radius: self.collision_radius,
            ticks_per_update: self.ticks_per_update,
        }
    }

    fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Default)]
struct RunState {
    generation: u64,
    tasks: Vec<JoinHandle<()>>,
}

impl RunState {
    fn retire(&mut self) -> u64 {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.generation += 1;
        self.generation
    }
}

/// State shared with the applier task.
struct ForceShared {
    core: LayoutCore,
    positions: DashMap<Id, Position>,
    locked: DashMap<Id, Position>,
    run: ReentrantMutex<RefCell<RunState>>,
}

impl ResultSink for ForceShared {
    fn apply(&self, generation: u64, positions: Vec<(Id, Position)>, finished: bool) {
        let run = self.run.lock();
        if run.borrow().generation != generation {
            trace!(generation, "dropping results of a retired generation");
            return;
        }

        for (id, position) in positions {
            if !self.locked.contains_key(&id) {
                self.positions.insert(id, position);
            }
        }
        self.core.change();
        if finished {
            let mut state = run.borrow_mut();
            // a listener may have restarted the layout from inside `change`
            if state.generation != generation {
                return;
            }
            state.tasks.clear();
            drop(state);
            self.core.done();
        }
    }

    fn fail(&self, generation: u64, error: LayoutError) {
        let run = self.run.lock();
        if run.borrow().generation != generation {
            return;
        }
        // a stalled worker would otherwise keep ticking
        for task in run.borrow_mut().tasks.drain(..) {
            task.abort();
        }
        self.core.error(error);
    }
}

#[derive(Default)]
struct Topology {
    nodes: Vec<Id>,
    links: Vec<SimLink>,
}

/// A force-directed layout computed off-thread.
pub struct ForceLayout {
    shared: Arc<ForceShared>,
    options: ForceLayoutOptions,
    topology: RwLock<Topology>,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl ForceLayout {
    /// Create a layout with its own single-worker executor.
    pub fn new(options: ForceLayoutOptions) -> Result<Self, LayoutError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("graphweave-force")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self::build(options, handle, Some(runtime)))
    }

    /// Create a layout that spawns onto an existing executor.
    pub fn with_handle(options: ForceLayoutOptions, handle: Handle) -> Self {
        Self::build(options, handle, None)
    }

    fn build(options: ForceLayoutOptions, handle: Handle, runtime: Option<Runtime>) -> Self {
        Self {
            shared: Arc::new(ForceShared {
                core: LayoutCore::new("force"),
                positions: DashMap::new(),
                locked: DashMap::new(),
                run: ReentrantMutex::new(RefCell::new(RunState::default())),
            }),
            options,
            topology: RwLock::new(Topology::default()),
            handle,
            runtime,
        }
    }

    pub fn options(&self) -> &ForceLayoutOptions {
        &self.options
    }

    fn request(&self, generation: u64, alpha: f64) -> SimulationRequest {
        let topology = self.topology.read();
        let nodes = topology
            .nodes
            .iter()
            .map(|id| {
                let known = self.shared.positions.get(id).map(|entry| *entry.value());
                let pinned = self.shared.locked.get(id).map(|entry| *entry.value());
                SimNode {
                    id: id.clone(),
                    x: known.map(|p| p[0]),
                    y: known.map(|p| p[1]),
                    fx: pinned.map(|p| p[0]),
                    fy: pinned.map(|p| p[1]),
                }
            })
            .collect();

        SimulationRequest {
            generation,
            nodes,
            links: topology.links.clone(),
            params: self.options.params(alpha),
        }
    }

    fn run(&self, alpha: f64) {
        let guard = self.shared.run.lock();
        let generation = guard.borrow_mut().retire();
        self.shared.core.start();

        // a listener may have restarted the layout from inside `start`
        if guard.borrow().generation != generation {
            return;
        }

        let request = self.request(generation, alpha);
        debug!(
            generation,
            nodes = request.nodes.len(),
            links = request.links.len(),
            alpha,
            "starting force simulation"
        );
        let payload = match worker::encode(&request) {
            Ok(payload) => payload,
            Err(error) => {
                self.shared.core.error(error);
                return;
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = self.handle.spawn(worker::run_worker(generation, payload, tx));
        let applier = self.handle.spawn(worker::apply_results(
            self.shared.clone(),
            generation,
            rx,
            self.options.stall_timeout(),
        ));
        guard.borrow_mut().tasks.extend([worker, applier]);
    }
}

impl Layout for ForceLayout {
    fn core(&self) -> &LayoutCore {
        &self.shared.core
    }

    fn initialize_graph(&self, graph: &Graph) {
        self.update_graph(graph);
    }

    fn update_graph(&self, graph: &Graph) {
        let nodes: Vec<Id> = graph.get_nodes().iter().map(|node| node.id().clone()).collect();
        let links = graph
            .get_edges()
            .iter()
            .map(|edge| SimLink {
                source: edge.source_id().clone(),
                target: edge.target_id().clone(),
            })
            .collect();

        let present: HashSet<&Id> = nodes.iter().collect();
        self.shared.positions.retain(|id, _| present.contains(id));
        self.shared.locked.retain(|id, _| present.contains(id));

        *self.topology.write() = Topology { nodes, links };
    }

    fn start(&self) {
        self.run(self.options.alpha);
    }

    fn update(&self) {
        self.run(self.options.alpha);
    }

    fn resume(&self) {
        self.run(self.options.resume_alpha);
    }

    fn stop(&self) {
        let guard = self.shared.run.lock();
        guard.borrow_mut().retire();
        if self.shared.core.state() == LayoutState::Calculating {
            self.shared.core.done();
        }
    }

    fn position_of(&self, id: &Id) -> Option<Position> {
        self.shared.positions.get(id).map(|entry| *entry.value())
    }

    fn lock_node_position(&self, node: &Node, x: f64, y: f64) {
        let guard = self.shared.run.lock();
        self.shared.locked.insert(node.id().clone(), [x, y]);
        self.shared.positions.insert(node.id().clone(), [x, y]);

        if self.shared.core.state() == LayoutState::Calculating {
            self.shared.core.change();
        } else {
            self.shared.core.complete_cycle();
        }
        drop(guard);
    }

    fn unlock_node_position(&self, node: &Node) {
        self.shared.locked.remove(node.id());
    }
}

impl Drop for ForceLayout {
    fn drop(&mut self) {
        self.shared.run.lock().borrow_mut().retire();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::layout::LayoutEvent;
    use std::sync::mpsc as std_mpsc;

    fn wait_for_terminal(rx: &std_mpsc::Receiver<&'static str>) -> Vec<&'static str> {
        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(10)) {
            events.push(event);
            if event == "done" || event == "error" {
                break;
            }
        }
        events
    }

    fn observe(layout: &ForceLayout) -> std_mpsc::Receiver<&'static str> {
        let (tx, rx) = std_mpsc::channel();
        let tx = parking_lot::Mutex::new(tx);
        layout.core().subscribe(move |event| {
            let name = match event {
                LayoutEvent::Start => "start",
                LayoutEvent::Change => "change",
                LayoutEvent::Done => "done",
                LayoutEvent::Error(_) => "error",
            };
            let _ = tx.lock().send(name);
        });
        rx
    }

    fn path_graph(n: i64) -> Graph {
        let graph = Graph::new();
        graph.batch_add_nodes((0..n).map(Node::new));
        graph.batch_add_edges((1..n).map(|i| Edge::new(100 + i, i - 1, i, false)));
        graph
    }

    fn quick() -> ForceLayoutOptions {
        ForceLayoutOptions {
            alpha: 1.0,
            alpha_decay: Some(0.1),
            alpha_min: 0.01,
            ..ForceLayoutOptions::default()
        }
    }

    #[test]
    fn start_streams_positions_and_finishes() {
        let graph = path_graph(4);
        let layout = ForceLayout::new(quick()).unwrap();
        let events = observe(&layout);

        layout.initialize_graph(&graph);
        layout.start();
        let seen = wait_for_terminal(&events);

        assert_eq!(seen.first(), Some(&"start"));
        assert_eq!(seen.last(), Some(&"done"));
        assert!(seen[1..seen.len() - 1].iter().all(|e| *e == "change"));
        assert_eq!(layout.state(), LayoutState::Done);
        for node in graph.get_nodes().iter() {
            assert!(layout.get_node_position(node).is_some());
        }
    }

    #[test]
    fn restart_retires_previous_generation() {
        let graph = path_graph(30);
        let layout = ForceLayout::new(ForceLayoutOptions {
            alpha_min: 1e-6,
            alpha_decay: Some(0.01),
            ..quick()
        })
        .unwrap();
        let events = observe(&layout);

        layout.initialize_graph(&graph);
        layout.start();
        layout.start();
        let seen = wait_for_terminal(&events);

        // exactly one terminal event: the first generation never finishes
        assert_eq!(seen.iter().filter(|e| **e == "done").count(), 1);
        assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(seen.iter().filter(|e| **e == "start").count(), 2);
    }

    #[test]
    fn locked_node_is_pinned() {
        let graph = path_graph(3);
        let layout = ForceLayout::new(quick()).unwrap();
        let events = observe(&layout);
        layout.initialize_graph(&graph);

        let first = graph.find_node(&Id::from(0)).unwrap();
        layout.lock_node_position(&first, 123.0, 456.0);
        assert_eq!(wait_for_terminal(&events), vec!["start", "change", "done"]);

        layout.start();
        wait_for_terminal(&events);
        assert_eq!(layout.get_node_position(&first), Some([123.0, 456.0]));

        layout.unlock_node_position(&first);
        layout.start();
        wait_for_terminal(&events);
        assert_ne!(layout.get_node_position(&first), Some([123.0, 456.0]));
    }

    #[test]
    fn stop_finishes_the_run() {
        let graph = path_graph(50);
        let layout = ForceLayout::new(ForceLayoutOptions {
            alpha_min: 1e-9,
            alpha_decay: Some(1e-4),
            ..quick()
        })
        .unwrap();
        layout.initialize_graph(&graph);
        layout.start();
        layout.stop();

        assert_eq!(layout.state(), LayoutState::Done);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ForceLayoutOptions =
            serde_json::from_value(serde_json::json!({"n_body_strength": -100.0})).unwrap();
        assert_eq!(options.n_body_strength, -100.0);
        assert_eq!(options.alpha, 0.3);
        assert_eq!(options.stall_timeout(), Some(Duration::from_secs(10)));
        let decay = options.params(0.3).alpha_decay;
        assert!((decay - 0.0228).abs() < 1e-3);
    }
}
