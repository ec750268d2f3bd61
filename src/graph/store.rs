//! GraphStore - owner of all nodes and edges.
//!
//! The store wraps petgraph's StableGraph and maintains a map from the
//! caller's string keys to internal node indices. It enforces two structural
//! invariants by construction:
//! - node keys are unique (insertion is find-or-create)
//! - at most one edge exists per ordered (source, target) pair
//!
//! There is no removal operation; the graph is append-only by contract, which
//! keeps every index valid for the store's lifetime.

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use std::collections::HashMap;

use super::edge::EdgeParams;
use super::node::Node;
use crate::geom::Vec2;

/// The graph owned by the layout engine.
pub struct GraphStore {
    /// Graph topology; node weights are the nodes themselves, edge weights
    /// the spring parameters.
    graph: StableGraph<Node, EdgeParams>,

    /// Map from caller-assigned key to internal index.
    key_to_index: HashMap<String, NodeIndex>,
}

impl GraphStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            key_to_index: HashMap::new(),
        }
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Look up a node index by key.
    pub fn get(&self, key: &str) -> Option<NodeIndex> {
        self.key_to_index.get(key).copied()
    }

    /// Insert a node, or return the existing one for this key unchanged.
    ///
    /// An existing node keeps its position — repeated insertion is a lookup.
    pub fn insert_node(&mut self, key: &str, position: Vec2) -> NodeIndex {
        if let Some(index) = self.get(key) {
            return index;
        }
        let index = self.graph.add_node(Node::new(key, position));
        self.key_to_index.insert(key.to_owned(), index);
        index
    }

    /// Borrow a node by index.
    #[inline]
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }

    /// Mutably borrow a node by index.
    #[inline]
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.graph[index]
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Iterate node indices in insertion order.
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Iterate nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    // =========================================================================
    // Edge Operations
    // =========================================================================

    /// Find the edge for an ordered (source, target) pair.
    pub fn find_edge(&self, source: NodeIndex, target: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(source, target)
    }

    /// Insert an edge, or return the existing one for this ordered pair
    /// unchanged — the first insertion's parameters win.
    pub fn insert_edge(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        params: EdgeParams,
    ) -> EdgeIndex {
        if let Some(edge) = self.find_edge(source, target) {
            return edge;
        }
        self.graph.add_edge(source, target, params)
    }

    /// Borrow edge parameters by index.
    #[inline]
    pub fn edge(&self, index: EdgeIndex) -> &EdgeParams {
        &self.graph[index]
    }

    /// Endpoints of an edge as (source, target).
    pub fn endpoints(&self, index: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(index)
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterate edge indices in insertion order.
    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    /// Iterate edges in insertion order as (params, source, target).
    pub fn edges(&self) -> impl Iterator<Item = (&EdgeParams, NodeIndex, NodeIndex)> {
        self.graph
            .edge_references()
            .map(|e| (e.weight(), e.source(), e.target()))
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
