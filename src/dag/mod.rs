// src/dag/mod.rs

//! Build graph representation.
//!
//! - [`node`] holds the Build Node and its status state machine.
//! - [`graph`] is the arena of nodes for one session.
//! - [`resolve`] validates a manifest for a target and builds the graph.

pub mod graph;
pub mod node;
pub mod resolve;

pub use graph::{BuildGraph, NodeId};
pub use node::{BuildNode, BuildStatus, InvariantViolation};
pub use resolve::{CyclePath, build_graph, check_dependencies};
