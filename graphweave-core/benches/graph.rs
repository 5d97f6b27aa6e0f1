//! Benchmarks for graph mutation and style evaluation.
//!
//! Run with: cargo bench -p graphweave-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use graphweave_core::{Edge, Graph, Node, Stylesheet};
use serde_json::json;

/// Build a ring of N nodes with a weight payload.
fn ring(count: i64) -> (Vec<Node>, Vec<Edge>) {
    let nodes = (0..count)
        .map(|i| Node::with_data(i, json!({"weight": i % 10})))
        .collect();
    let edges = (0..count)
        .map(|i| Edge::new(count + i, i, (i + 1) % count, false))
        .collect();
    (nodes, edges)
}

fn bench_batch_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_add");

    for count in [1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("ring", count), &count, |b, &count| {
            b.iter(|| {
                let (nodes, edges) = ring(count);
                let graph = Graph::new();
                graph.transaction(|graph| {
                    graph.batch_add_nodes(nodes);
                    graph.batch_add_edges(edges)
                });
                black_box(graph.version())
            });
        });
    }

    group.finish();
}

fn bench_stylesheet(c: &mut Criterion) {
    let mut group = c.benchmark_group("stylesheet");

    let sheet = Stylesheet::from_json(
        &json!({
            "type": "circle",
            "radius": {
                "attribute": "weight",
                "fallback": 1,
                "scale": {"type": "sqrt", "domain": [0, 10], "range": [2, 12]}
            },
            "fill": {"default": "#dddddd", "hover": "#ff8800", "selected": "#0044ff"}
        }),
        0,
    )
    .unwrap();
    let radius = sheet.get_deck_gl_accessor("getRadius").unwrap();
    let fill = sheet.get_deck_gl_accessor("getFillColor").unwrap();
    let (nodes, _) = ring(1_000);

    // Accessors are resolved once; this measures the per-datum cost
    group.bench_function("evaluate_1000_nodes", |b| {
        b.iter(|| {
            for node in &nodes {
                black_box(radius.call(node));
                black_box(fill.call(node));
            }
        });
    });

    group.bench_function("resolve", |b| {
        let declaration = json!({
            "type": "label",
            "text": {"attribute": "name", "fallback": ""},
            "fontSize": 14,
            ":hover": {"color": "red"}
        });
        b.iter(|| black_box(Stylesheet::from_json(&declaration, 0).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_batch_add, bench_stylesheet);
criterion_main!(benches);
