//! Graph data structures and operations.
//!
//! This module provides the layout graph using petgraph's StableGraph, with a
//! string-key map for caller-facing identity. The graph is append-only: nodes
//! and edges are never removed, so petgraph indices double as stable handles
//! and edge iteration order is insertion order.

mod edge;
mod node;
mod store;

pub use edge::EdgeParams;
pub use node::Node;
pub use store::GraphStore;
