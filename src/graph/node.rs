//! Node type for the layout graph.
//!
//! Each node has:
//! - A unique string key assigned by the caller
//! - Position in graph space (the NULL sentinel until placed)
//! - Velocity and a force accumulator driven by the simulation
//! - Mass and a fixed flag (fixed nodes are excluded from integration)
//! - An optional opaque payload the engine never interprets

use crate::geom::Vec2;

/// A graph vertex participating in the physics simulation.
///
/// Nodes are owned exclusively by the [`GraphStore`](super::GraphStore);
/// edges refer to them by index, never by ownership. Velocity and the force
/// accumulator belong to the integrator — external callers interact with a
/// node only through its key, position (via the pin-and-drag pattern), mass,
/// fixed flag, and payload.
#[derive(Debug, Clone)]
pub struct Node {
    /// Caller-assigned unique identity.
    pub key: String,
    /// Current position; mutated every step unless the node is fixed.
    pub position: Vec2,
    /// Mass, strictly positive. Defaults to 1.
    pub mass: f64,
    /// Fixed nodes never move on their own; their position is controlled
    /// only by external assignment (interactive dragging).
    pub fixed: bool,
    /// Opaque payload carried for the caller.
    pub data: Option<serde_json::Value>,
    /// Current velocity.
    pub(crate) velocity: Vec2,
    /// Force accumulator, already divided by mass; zeroed every step after
    /// consumption.
    pub(crate) force: Vec2,
}

impl Node {
    /// Create a node at the given position with default mass.
    pub fn new(key: impl Into<String>, position: Vec2) -> Self {
        Self {
            key: key.into(),
            position,
            mass: 1.0,
            fixed: false,
            data: None,
            velocity: Vec2::ZERO,
            force: Vec2::ZERO,
        }
    }

    /// Accumulate a force. The contribution is divided by the node's mass on
    /// entry, so the accumulator integrates directly into velocity.
    #[inline]
    pub(crate) fn apply_force(&mut self, f: Vec2) {
        self.force = self.force + f.div(self.mass);
    }

    /// Current velocity.
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }
}
