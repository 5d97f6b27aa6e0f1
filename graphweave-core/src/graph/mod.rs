//! Graph Model
//!
//! This module implements the entity store that every other component reads
//! from.
//!
//! # Overview
//!
//! - [`Node`] and [`Edge`] are shared handles around caller-owned payloads.
//! - [`Graph`] exclusively owns the topology and exposes it through
//!   id-based lookups and version-gated snapshots.
//!
//! # Design Decisions
//!
//! 1. Cross-links are ids, not references. A node knows the ids (and
//!    direction) of its edges; an edge knows the ids of its endpoints. This
//!    avoids reference cycles between nodes and edges.
//!
//! 2. The graph is indexed by id for O(1) lookups.
//!
//! 3. The version is the only notion of equality between two states of a
//!    graph, which lets downstream caches compare a single integer.

mod edge;
mod id;
mod node;
mod store;

pub use edge::Edge;
pub use id::{EntityState, Id};
pub use node::{Connection, Node};
pub use store::{Graph, GraphEvent};
