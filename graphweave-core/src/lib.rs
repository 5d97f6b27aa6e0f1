//! Graphweave Core
//!
//! This crate provides the engine behind the Graphweave graph visualizer.
//! It implements:
//!
//! - A mutable, versioned graph model with change notifications
//! - Layout orchestration with a synchronous and a force-directed strategy
//! - Declarative style resolution into renderer-ready accessors
//!
//! Drawing is left to the host: it reads positioned entities from the
//! engine and evaluates accessors from a stylesheet.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: nodes, edges and the graph store
//! - `layout`: the layout lifecycle and its strategies
//! - `engine`: binds a graph to a layout and batches updates
//! - `style`: stylesheets, scales and accessors
//! - `loader`: building graphs from JSON documents
//!
//! # Example
//!
//! ```rust,ignore
//! use graphweave_core::{load_graph, GraphData, GraphEngine, SimpleLayout, Stylesheet};
//! use serde_json::json;
//!
//! let data = GraphData::from_json_str(r#"{
//!     "nodes": [{"id": 1, "x": 0, "y": 0}, {"id": 2, "x": 10, "y": 5}],
//!     "edges": [{"id": "a", "sourceId": 1, "targetId": 2}]
//! }"#)?;
//!
//! let engine = GraphEngine::new(load_graph(&data), SimpleLayout::new());
//! engine.run();
//!
//! let sheet = Stylesheet::from_json(&json!({"type": "circle", "radius": 4}), 0)?;
//! let radius = sheet.get_deck_gl_accessor("getRadius")?;
//!
//! for node in engine.get_nodes().iter() {
//!     let position = engine.get_node_position(node);
//!     let r = radius.call(node);
//!     // draw ...
//! }
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod event;
pub mod graph;
pub mod layout;
pub mod loader;
pub mod style;

pub use engine::GraphEngine;
pub use error::{Error, LayoutError, LoadError, Result, StyleError};
pub use graph::{Edge, EntityState, Graph, GraphEvent, Id, Node};
pub use layout::{
    EdgeKind, EdgePosition, ForceLayout, ForceLayoutOptions, Layout, LayoutCore, LayoutEvent,
    LayoutState, Position, SimpleLayout, SimpleLayoutOptions,
};
pub use loader::{create_graph, load_graph, GraphData, ParsedEdge, ParsedNode};
pub use style::{Accessor, StyleDeclaration, StyleValue, Stylesheet, UpdateTrigger, VisualValue};
