//! Physics stepping and viewport tracking.
//!
//! `simulation` advances the force model by one step at a time; `viewport`
//! tracks the bounding boxes that the screen mapping and random node
//! placement depend on. Both are driven by the engine facade — neither owns
//! a clock or a render surface.

pub mod simulation;
pub mod viewport;

pub use simulation::{Energy, SimulationParams};
pub use viewport::Viewport;
