//! Integration Tests for the Graph Engine
//!
//! These tests verify that loading, layout orchestration and style
//! resolution work together correctly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use graphweave_core::{
    load_graph, Edge, EntityState, ForceLayout, ForceLayoutOptions, Graph, GraphData, GraphEngine,
    GraphEvent, Id, LayoutError, LayoutEvent, LayoutState, Node, SimpleLayout, Stylesheet,
    UpdateTrigger, VisualValue,
};

fn event_name(event: &LayoutEvent) -> &'static str {
    match event {
        LayoutEvent::Start => "start",
        LayoutEvent::Change => "change",
        LayoutEvent::Done => "done",
        LayoutEvent::Error(_) => "error",
    }
}

fn positioned_document() -> GraphData {
    GraphData::from_value(json!({
        "name": "triangle",
        "nodes": [
            {"id": 1, "x": 0, "y": 0, "weight": 2},
            {"id": 2, "x": 10, "y": 0, "weight": 8},
            {"id": 3, "x": 5, "y": 8}
        ],
        "edges": [
            {"id": "a", "sourceId": 1, "targetId": 2, "directed": true},
            {"id": "b", "sourceId": 2, "targetId": 3},
            {"id": "c", "sourceId": 3, "targetId": 1}
        ]
    }))
    .unwrap()
}

/// Test that a loaded graph keeps records, topology and version intact.
#[test]
fn load_preserves_records_and_topology() {
    let graph = load_graph(&positioned_document());

    assert_eq!(graph.name(), "triangle");
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 3);

    // one bump for the nodes, one for the edges
    assert_eq!(graph.version(), 2);

    let two = graph.find_node(&Id::from(2)).unwrap();
    assert_eq!(two.property("weight"), Some(json!(8)));
    assert_eq!(two.degree(), 2);
    assert_eq!(two.in_degree(), 1);
    assert_eq!(graph.get_degree(&Id::from(2)), 2);
}

/// Test that loading keeps the document's node and edge ids, numeric and text alike.
#[test]
fn load_round_trips_ids() {
    let data = GraphData::from_value(json!({
        "nodes": [{"id": 1}, {"id": "two"}, {"id": 3}, {"id": "four"}],
        "edges": [
            {"id": 10, "sourceId": 1, "targetId": "two"},
            {"id": "e2", "sourceId": "two", "targetId": 3},
            {"id": "e3", "sourceId": 3, "targetId": "four"}
        ]
    }))
    .unwrap();
    let graph = load_graph(&data);

    let expected_nodes: Vec<Id> = data
        .nodes
        .iter()
        .map(|record| Id::from_json(&record["id"]).unwrap())
        .collect();
    let expected_edges: Vec<Id> = data
        .edges
        .iter()
        .map(|record| Id::from_json(&record["id"]).unwrap())
        .collect();

    let nodes: Vec<Id> = graph.get_nodes().iter().map(|node| node.id().clone()).collect();
    let edges: Vec<Id> = graph.get_edges().iter().map(|edge| edge.id().clone()).collect();
    assert_eq!(nodes, expected_nodes);
    assert_eq!(edges, expected_edges);

    // numeric and text ids never collide
    assert!(graph.find_node(&Id::from("1")).is_none());
    assert!(graph.find_node(&Id::from(1)).is_some());
}

/// Test that removing a node removes its edges in the same version bump.
#[test]
fn removing_a_node_keeps_edges_consistent() {
    let graph = load_graph(&positioned_document());
    let version = graph.version();

    graph.remove_node(&Id::from(1));

    assert_eq!(graph.version(), version + 1);
    assert_eq!(graph.edge_count(), 1);
    assert!(graph.find_edge(&Id::from("a")).is_none());
    assert!(graph.find_edge(&Id::from("c")).is_none());

    // surviving endpoints forgot the removed edges
    let two = graph.find_node(&Id::from(2)).unwrap();
    assert_eq!(two.connected_edge_ids(), vec![Id::from("b")]);
}

/// Test that an edge with a missing endpoint never enters the graph.
#[test]
fn dangling_edge_is_rejected() {
    let graph = Graph::new();
    graph.add_node(Node::new("a"));
    let version = graph.version();

    assert!(!graph.add_edge(Edge::new("e", "a", "missing", false)));
    assert_eq!(graph.version(), version);
    assert_eq!(graph.edge_count(), 0);
}

/// Test that graph notifications arrive in mutation order.
#[test]
fn graph_notifications_follow_mutations() {
    let graph = Graph::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    graph.subscribe(move |event: &GraphEvent| sink.lock().push(event.clone()));

    graph.transaction(|g| {
        g.add_node(Node::new(1));
        g.add_node(Node::new(2));
        g.add_edge(Edge::new(10, 1, 2, false));
    });

    assert_eq!(
        *seen.lock(),
        vec![
            GraphEvent::TransactionStart,
            GraphEvent::NodeAdded(Id::from(1)),
            GraphEvent::NodeAdded(Id::from(2)),
            GraphEvent::EdgeAdded(Id::from(10)),
            GraphEvent::TransactionEnd,
        ]
    );
}

/// Test that a bulk load inside a transaction costs a single layout update.
#[test]
fn transaction_coalesces_engine_updates() {
    let engine = GraphEngine::new(Graph::new(), SimpleLayout::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    engine.subscribe(move |event| {
        if matches!(event, LayoutEvent::Start) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    engine.run();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    engine.graph().transaction(|graph| {
        for i in 0..100 {
            graph.add_node(Node::with_data(i, json!({"x": i, "y": 0})));
        }
        for i in 1..100 {
            graph.add_edge(Edge::new(1000 + i, i - 1, i, false));
        }
    });

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(engine.get_nodes().len(), 100);
    assert_eq!(engine.get_edges().len(), 99);
}

/// Test the synchronous lifecycle: start, change, done before `run` returns.
#[test]
fn simple_layout_lifecycle_through_engine() {
    let engine = GraphEngine::new(load_graph(&positioned_document()), SimpleLayout::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    engine.subscribe(move |event| sink.lock().push(event_name(event)));

    engine.run();

    assert_eq!(*seen.lock(), vec!["start", "change", "done"]);
    assert_eq!(engine.get_layout_state(), LayoutState::Done);

    let three = engine.graph().find_node(&Id::from(3)).unwrap();
    assert_eq!(engine.get_node_position(&three), Some([5.0, 8.0]));

    let a = engine.graph().find_edge(&Id::from("a")).unwrap();
    let position = engine.get_edge_position(&a).unwrap();
    assert_eq!(position.source_position, [0.0, 0.0]);
    assert_eq!(position.target_position, [10.0, 0.0]);
}

/// Test the read surface cache: same versions, same snapshot.
#[test]
fn engine_read_surface_is_memoized() {
    let engine = GraphEngine::new(load_graph(&positioned_document()), SimpleLayout::new());
    engine.run();

    let first = engine.get_nodes();
    let last_update = engine.get_layout_last_update();
    assert!(Arc::ptr_eq(&first, &engine.get_nodes()));

    // interaction state does not touch the topology version
    engine.graph().set_node_state(&Id::from(1), EntityState::Hover);
    assert!(Arc::ptr_eq(&first, &engine.get_nodes()));

    let one = engine.graph().find_node(&Id::from(1)).unwrap();
    engine.lock_node_position(&one, -1.0, -1.0);
    assert!(engine.get_layout_last_update() > last_update);
    assert_eq!(engine.get_node_position(&one), Some([-1.0, -1.0]));
}

/// Test the asynchronous lifecycle of the force layout through the engine.
#[test]
fn force_layout_lifecycle_through_engine() {
    let graph = load_graph(&positioned_document());
    let layout = ForceLayout::new(ForceLayoutOptions {
        alpha: 1.0,
        alpha_min: 0.01,
        alpha_decay: Some(0.1),
        ..ForceLayoutOptions::default()
    })
    .unwrap();
    let engine = GraphEngine::new(graph, layout);

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    engine.subscribe(move |event| {
        let _ = tx.lock().send(event_name(event));
    });

    engine.run();

    let mut seen = Vec::new();
    while let Ok(event) = rx.recv_timeout(Duration::from_secs(10)) {
        seen.push(event);
        if event == "done" || event == "error" {
            break;
        }
    }

    assert_eq!(seen.first(), Some(&"start"));
    assert_eq!(seen.last(), Some(&"done"));
    assert!(seen.contains(&"change"));
    assert_eq!(engine.get_layout_state(), LayoutState::Done);
    assert_eq!(engine.get_nodes().len(), 3);
    assert_eq!(engine.get_edges().len(), 3);
}

/// Test that stopping a force run finalizes it and keeps positions readable.
#[test]
fn force_layout_stop_through_engine() {
    let graph = Graph::new();
    graph.batch_add_nodes((0..200).map(Node::new));
    let layout = ForceLayout::new(ForceLayoutOptions {
        alpha_min: 1e-9,
        alpha_decay: Some(1e-5),
        ..ForceLayoutOptions::default()
    })
    .unwrap();
    let engine = GraphEngine::new(graph, layout);

    engine.run();
    engine.stop();

    assert_eq!(engine.get_layout_state(), LayoutState::Done);
    assert!(engine.layout().core().last_error().is_none());
}

/// Test that a force worker that goes silent fails the run through the engine.
#[test]
fn stalled_force_layout_reports_an_error() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let graph = Graph::new();
    graph.batch_add_nodes((0..150).map(Node::new));

    // one huge batch of ticks before the first message
    let layout = ForceLayout::with_handle(
        ForceLayoutOptions {
            alpha_decay: Some(0.0),
            ticks_per_update: 10_000,
            stall_timeout_ms: Some(10),
            ..ForceLayoutOptions::default()
        },
        runtime.handle().clone(),
    );
    let engine = GraphEngine::new(graph, layout);

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    engine.subscribe(move |event| {
        let _ = tx.lock().send(event.clone());
    });

    engine.run();

    let mut terminal = None;
    while let Ok(event) = rx.recv_timeout(Duration::from_secs(10)) {
        if matches!(event, LayoutEvent::Done | LayoutEvent::Error(_)) {
            terminal = Some(event);
            break;
        }
    }

    match terminal {
        Some(LayoutEvent::Error(error)) => {
            assert!(matches!(*error, LayoutError::Stalled { .. }));
        }
        other => panic!("expected a stall error, got {other:?}"),
    }
    assert_eq!(engine.get_layout_state(), LayoutState::Error);
    assert!(engine.layout().core().last_error().is_some());

    drop(engine);
    runtime.shutdown_background();
}

/// Test style accessors evaluated against graph entities.
#[test]
fn stylesheet_accessors_on_graph_entities() {
    let graph = load_graph(&positioned_document());
    let nodes = Stylesheet::from_json(
        &json!({
            "type": "circle",
            "radius": {
                "attribute": "weight",
                "fallback": 0,
                "scale": {"type": "linear", "domain": [0, 10], "range": [2, 22]}
            },
            "fill": {"default": "#cccccc", "hover": "#ff0000"},
            ":selected": {"strokeWidth": 2}
        }),
        "states-v1",
    )
    .unwrap();

    let radius = nodes.get_deck_gl_accessor("getRadius").unwrap();
    let fill = nodes.get_deck_gl_accessor("getFillColor").unwrap();
    let line = nodes.get_deck_gl_accessor("getLineWidth").unwrap();

    let one = graph.find_node(&Id::from(1)).unwrap();
    let three = graph.find_node(&Id::from(3)).unwrap();
    assert_eq!(radius.call(&one), VisualValue::Number(6.0));
    assert_eq!(radius.call(&three), VisualValue::Number(2.0));

    assert_eq!(fill.call(&one), VisualValue::Color([204, 204, 204, 255]));
    graph.set_node_state(&Id::from(1), EntityState::Hover);
    assert_eq!(fill.call(&one), VisualValue::Color([255, 0, 0, 255]));

    graph.set_node_state(&Id::from(3), EntityState::Selected);
    assert_eq!(line.call(&three), VisualValue::Number(2.0));
    assert_eq!(line.call(&one), VisualValue::Number(0.0));

    let triggers = nodes.get_deck_gl_update_triggers();
    assert_eq!(triggers["getFillColor"], UpdateTrigger::Token(json!("states-v1")));
    assert_eq!(
        triggers["getRadius"].to_json(),
        json!({"attribute": "weight", "scale": {"type": "linear", "domain": [0, 10], "range": [2, 22]}})
    );
    assert_eq!(triggers["getOffset"], UpdateTrigger::Never);

    let edges = Stylesheet::from_json(
        &json!({"type": "edge", "stroke": {"attribute": "color", "fallback": "gray"}, "strokeWidth": 1.5}),
        "states-v1",
    )
    .unwrap();
    let a = graph.find_edge(&Id::from("a")).unwrap();
    assert_eq!(
        edges.get_deck_gl_accessor("getColor").unwrap().call(&a),
        VisualValue::Color([128, 128, 128, 255])
    );
    assert_eq!(
        edges.get_deck_gl_accessor("getWidth").unwrap().call(&a),
        VisualValue::Number(1.5)
    );
}
