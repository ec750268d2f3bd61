//! Edge parameters for the layout graph.
//!
//! An edge is a spring constraint between two nodes. The endpoints live in
//! the graph structure itself (petgraph indices, non-owning); this weight
//! carries only the spring parameters and the rendering hint.

use serde::{Deserialize, Serialize};

/// Spring parameters attached to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeParams {
    /// Rest length, strictly positive.
    pub length: f64,
    /// Spring stiffness, strictly positive.
    pub stiffness: f64,
    /// Rendering hint only; has no effect on force computation.
    pub directed: bool,
}

impl EdgeParams {
    /// Create spring parameters with the given rest length and stiffness.
    pub fn new(length: f64, stiffness: f64) -> Self {
        Self {
            length,
            stiffness,
            directed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_params() {
        let params = EdgeParams::new(2.0, 600.0);
        assert_eq!(params.length, 2.0);
        assert_eq!(params.stiffness, 600.0);
        assert!(!params.directed);
    }
}
