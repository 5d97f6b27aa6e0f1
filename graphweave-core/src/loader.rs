//! Graph loading.
//!
//! A graph document is a JSON object with a `nodes` array, an optional
//! `edges` array and an optional `name`. Records are turned into entities by
//! parser functions; the raw record becomes the entity's data payload.
//!
//! Records a parser rejects are logged and skipped, as are edges whose
//! endpoints are missing. Only a malformed document is an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::graph::{Edge, Graph, Id, Node};

/// A raw graph document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub nodes: Vec<Value>,
    #[serde(default)]
    pub edges: Vec<Value>,
}

impl GraphData {
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> Result<Self, LoadError> {
        if value.get("nodes").is_none() {
            return Err(LoadError::MissingCollection("nodes"));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Identity of a node record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNode {
    pub id: Id,
}

/// Identity and endpoints of an edge record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEdge {
    pub id: Id,
    pub source_id: Id,
    pub target_id: Id,
    pub directed: bool,
}

/// Reads `id`.
pub fn basic_node_parser(record: &Value) -> Option<ParsedNode> {
    Some(ParsedNode {
        id: Id::from_json(record.get("id")?)?,
    })
}

/// Reads `id`, `sourceId`, `targetId` and `directed` (default `false`).
pub fn basic_edge_parser(record: &Value) -> Option<ParsedEdge> {
    Some(ParsedEdge {
        id: Id::from_json(record.get("id")?)?,
        source_id: Id::from_json(record.get("sourceId")?)?,
        target_id: Id::from_json(record.get("targetId")?)?,
        directed: record.get("directed").and_then(Value::as_bool).unwrap_or(false),
    })
}

/// Build a graph from `data`.
///
/// All entities are inserted inside one transaction.
pub fn create_graph<N, E>(data: &GraphData, node_parser: N, edge_parser: E) -> Graph
where
    N: Fn(&Value) -> Option<ParsedNode>,
    E: Fn(&Value) -> Option<ParsedEdge>,
{
    let graph = Graph::with_name(data.name.clone().unwrap_or_default());

    let nodes: Vec<Node> = data
        .nodes
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match node_parser(record) {
            Some(parsed) => Some(Node::with_data(parsed.id, record.clone())),
            None => {
                warn!(index, "skipping malformed node record");
                None
            }
        })
        .collect();

    let edges: Vec<Edge> = data
        .edges
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match edge_parser(record) {
            Some(parsed) => Some(Edge::with_data(
                parsed.id,
                parsed.source_id,
                parsed.target_id,
                parsed.directed,
                record.clone(),
            )),
            None => {
                warn!(index, "skipping malformed edge record");
                None
            }
        })
        .collect();

    let added = graph.transaction(|graph| {
        graph.batch_add_nodes(nodes);
        graph.batch_add_edges(edges)
    });
    debug!(
        name = %graph.name(),
        nodes = graph.node_count(),
        edges = added,
        "graph loaded"
    );
    graph
}

/// Build a graph with the basic parsers.
pub fn load_graph(data: &GraphData) -> Graph {
    create_graph(data, basic_node_parser, basic_edge_parser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "name": "tiny",
            "nodes": [
                {"id": 1, "label": "one"},
                {"id": "two"},
                {"label": "no id"}
            ],
            "edges": [
                {"id": "e1", "sourceId": 1, "targetId": "two", "directed": true},
                {"id": "e2", "sourceId": 1, "targetId": 99},
                {"sourceId": 1}
            ]
        })
    }

    #[test]
    fn basic_parsers() {
        assert_eq!(
            basic_node_parser(&json!({"id": 3})),
            Some(ParsedNode { id: Id::from(3) })
        );
        assert_eq!(basic_node_parser(&json!({"id": [1]})), None);

        let edge = basic_edge_parser(&json!({"id": 1, "sourceId": "a", "targetId": "b"})).unwrap();
        assert!(!edge.directed);
        assert_eq!(edge.source_id, Id::from("a"));
    }

    #[test]
    fn loads_and_skips_malformed_records() {
        let data = GraphData::from_value(document()).unwrap();
        let graph = load_graph(&data);

        assert_eq!(graph.name(), "tiny");
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.version(), 2);

        let one = graph.find_node(&Id::from(1)).unwrap();
        assert_eq!(one.property("label"), Some(json!("one")));
        assert_eq!(one.out_degree(), 1);
        assert!(graph.find_edge(&Id::from("e1")).unwrap().is_directed());
    }

    #[test]
    fn custom_parsers() {
        let data = GraphData::from_json_str(
            r#"{"nodes": [{"key": "a"}, {"key": "b"}], "edges": [{"from": "a", "to": "b"}]}"#,
        )
        .unwrap();
        let graph = create_graph(
            &data,
            |record| {
                Some(ParsedNode {
                    id: Id::from_json(record.get("key")?)?,
                })
            },
            |record| {
                let source_id = Id::from_json(record.get("from")?)?;
                let target_id = Id::from_json(record.get("to")?)?;
                Some(ParsedEdge {
                    id: Id::from(format!("{source_id}->{target_id}")),
                    source_id,
                    target_id,
                    directed: true,
                })
            },
        );

        assert_eq!(graph.node_count(), 2);
        assert!(graph.find_edge(&Id::from("a->b")).is_some());
    }

    #[test]
    fn document_errors() {
        assert!(matches!(
            GraphData::from_json_str(r#"{"edges": []}"#),
            Err(LoadError::MissingCollection("nodes"))
        ));
        assert!(matches!(GraphData::from_json_str("{"), Err(LoadError::Json(_))));
        assert!(matches!(
            GraphData::from_json_str(r#"{"nodes": 3}"#),
            Err(LoadError::Json(_))
        ));
        assert!(GraphData::from_json_str(r#"{"nodes": []}"#).unwrap().edges.is_empty());
    }
}
