//! Spatial approximation structures.
//!
//! The only structure here is the Barnes-Hut quadtree used by the repulsion
//! pass. It is rebuilt from the current node positions on every step and
//! discarded afterwards.

mod quadtree;

pub use quadtree::{Body, QuadTree};
