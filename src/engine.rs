//! LayoutEngine - lifecycle, configuration, and queries.
//!
//! The engine owns the graph, the physics parameters, the viewport, and the
//! injected random source. It performs no scheduling of its own: the host
//! calls [`LayoutEngine::advance`] at whatever cadence it likes (a timer, an
//! animation frame, a test loop) and the engine runs exactly one step per
//! call. After each completed step the registered [`Renderer`] is notified
//! that a frame is ready; the engine itself never draws.

use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::geom::Vec2;
use crate::graph::{EdgeParams, GraphStore, Node};
use crate::layout::{Energy, SimulationParams, Viewport, simulation};

/// How long the mean energy must stay under the stop threshold before the
/// engine auto-stops, in simulated milliseconds.
const STOP_IDLE_MS: f64 = 1000.0;

/// Collaborator notified after every completed step.
///
/// Implementations typically invalidate a canvas or schedule a repaint; the
/// engine only guarantees that node positions are consistent when the call
/// arrives.
pub trait Renderer {
    fn frame_ready(&mut self);
}

/// The layout engine facade.
pub struct LayoutEngine {
    store: GraphStore,
    params: SimulationParams,
    viewport: Viewport,
    rng: ChaCha8Rng,
    energy: Energy,
    renderer: Option<Box<dyn Renderer>>,
    running: bool,
    /// Re-entrancy guard: a step request arriving while a step is still in
    /// flight is dropped, never queued.
    stepping: AtomicBool,
    /// Simulated milliseconds spent below the stop threshold.
    idle_elapsed_ms: f64,
}

impl LayoutEngine {
    /// Create an engine with the given parameters and RNG seed.
    ///
    /// The seed drives every random decision (node placement, coincidence
    /// jitter, degenerate force directions), so equal seeds and equal call
    /// sequences reproduce layouts exactly.
    pub fn new(params: SimulationParams, seed: u64) -> Self {
        let viewport = Viewport::new(params.margins);
        Self {
            store: GraphStore::new(),
            params,
            viewport,
            rng: ChaCha8Rng::seed_from_u64(seed),
            energy: Energy::default(),
            renderer: None,
            running: false,
            stepping: AtomicBool::new(false),
            idle_elapsed_ms: 0.0,
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Current parameters.
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Replace the parameters; effective from the next step.
    pub fn set_params(&mut self, mut params: SimulationParams) {
        params.friction = params.friction.clamp(0.0, 1.0);
        self.viewport.set_margins(params.margins);
        self.params = params;
    }

    /// Register the renderer to notify after each step.
    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.renderer = Some(renderer);
    }

    /// Record the screen size in pixels and recompute bounds immediately.
    pub fn set_screen_size(&mut self, width: f64, height: f64) {
        self.viewport.set_screen(width, height);
        self.viewport.update(&self.store);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Allow stepping. Idempotent; also resets the auto-stop idle window.
    pub fn start(&mut self) {
        self.running = true;
        self.idle_elapsed_ms = 0.0;
    }

    /// Prevent future steps. Idempotent; never interrupts a step in flight.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether the engine will act on the next `advance` call.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run one physics step, if the engine is running.
    ///
    /// Returns whether the engine is still running afterwards, so a host
    /// scheduler can stop ticking once the layout settles. An overlapping
    /// call (only possible when the host re-enters from the renderer
    /// notification) is dropped rather than queued.
    ///
    /// A fault inside the step is logged and swallowed; the engine stays
    /// usable and the next tick proceeds normally.
    pub fn advance(&mut self) -> bool {
        if !self.running {
            return false;
        }
        if self.stepping.swap(true, Ordering::Acquire) {
            return self.running;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| self.step_once()));
        if outcome.is_err() {
            log::error!("layout step failed; dropping this tick");
        }

        self.stepping.store(false, Ordering::Release);
        self.running
    }

    fn step_once(&mut self) {
        self.energy = simulation::step(
            &mut self.store,
            &self.params,
            self.viewport.actual(),
            &mut self.rng,
        );
        self.viewport.update(&self.store);

        if let Some(renderer) = self.renderer.as_mut() {
            renderer.frame_ready();
        }

        if self.params.auto_stop {
            if self.energy.mean <= self.params.stop_threshold {
                self.idle_elapsed_ms += self.params.step_interval_ms;
                if self.idle_elapsed_ms > STOP_IDLE_MS {
                    log::debug!(
                        "layout settled (mean energy {:.4}); auto-stopping",
                        self.energy.mean
                    );
                    self.running = false;
                }
            } else {
                self.idle_elapsed_ms = 0.0;
            }
        }
    }

    // =========================================================================
    // Graph Mutation
    // =========================================================================

    /// Add a node at a random point inside the current actual bounds, or
    /// return the existing node for this key unchanged.
    pub fn add_node(&mut self, key: &str) -> NodeIndex {
        if let Some(index) = self.store.get(key) {
            return index;
        }
        let position = self.viewport.actual().random_point(&mut self.rng);
        self.store.insert_node(key, position)
    }

    /// Add a node at an explicit position, or return the existing node for
    /// this key unchanged (its position is not reset).
    pub fn add_node_at(&mut self, key: &str, x: f64, y: f64) -> NodeIndex {
        self.store.insert_node(key, Vec2::new(x, y))
    }

    /// Add an edge, auto-creating missing endpoints. A duplicate ordered
    /// pair returns the existing edge unchanged; a new edge takes the given
    /// rest length and the engine's current global stiffness. `directed` is
    /// a rendering hint carried through to consumers, ignored by the forces.
    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        length: f64,
        directed: bool,
    ) -> EdgeIndex {
        let source = self.add_node(source);
        let target = self.add_node(target);
        if let Some(edge) = self.store.find_edge(source, target) {
            return edge;
        }
        let mut params = EdgeParams::new(length, self.params.stiffness);
        params.directed = directed;
        self.store.insert_edge(source, target, params)
    }

    // =========================================================================
    // Node Control (pin-and-drag pattern)
    // =========================================================================

    /// Fix or release a node. Fixed nodes ignore forces entirely; their
    /// position changes only through `set_node_position`.
    pub fn set_node_fixed(&mut self, key: &str, fixed: bool) -> bool {
        match self.store.get(key) {
            Some(index) => {
                self.store.node_mut(index).fixed = fixed;
                true
            }
            None => false,
        }
    }

    /// Move a node, typically while dragging it with the pointer.
    pub fn set_node_position(&mut self, key: &str, x: f64, y: f64) -> bool {
        match self.store.get(key) {
            Some(index) => {
                self.store.node_mut(index).position = Vec2::new(x, y);
                true
            }
            None => false,
        }
    }

    /// Change a node's mass. Rejects non-positive masses.
    pub fn set_node_mass(&mut self, key: &str, mass: f64) -> bool {
        if mass <= 0.0 {
            return false;
        }
        match self.store.get(key) {
            Some(index) => {
                self.store.node_mut(index).mass = mass;
                true
            }
            None => false,
        }
    }

    /// Attach or clear a node's opaque payload.
    pub fn set_node_data(&mut self, key: &str, data: Option<serde_json::Value>) -> bool {
        match self.store.get(key) {
            Some(index) => {
                self.store.node_mut(index).data = data;
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Look up a node by key.
    pub fn get_node(&self, key: &str) -> Option<&Node> {
        self.store.get(key).map(|index| self.store.node(index))
    }

    /// Energy statistics from the most recent step.
    pub fn energy(&self) -> Energy {
        self.energy
    }

    /// Iterate nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.store.nodes()
    }

    /// Iterate edges in insertion order as (params, source, target).
    pub fn edges(&self) -> impl Iterator<Item = (&EdgeParams, &Node, &Node)> {
        self.store
            .edges()
            .map(move |(params, s, t)| (params, self.store.node(s), self.store.node(t)))
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.store.edge_count()
    }

    /// Map a graph-space point to screen pixels; NULL until the view bounds
    /// are established.
    pub fn to_screen(&self, pt: Vec2) -> Vec2 {
        self.viewport.to_screen(pt)
    }

    /// Map a screen pixel to graph space; NULL until the view bounds are
    /// established.
    pub fn from_screen(&self, sx: f64, sy: f64) -> Vec2 {
        self.viewport.from_screen(sx, sy)
    }

    /// The node closest in graph space to a screen coordinate.
    ///
    /// Linear scan over non-exploded nodes; the first minimum wins on ties.
    /// None when the view bounds are not yet established or no node is
    /// eligible.
    pub fn nearest(&self, sx: f64, sy: f64) -> Option<&Node> {
        let pt = self.from_screen(sx, sy);
        if pt.exploded() {
            return None;
        }

        let mut best: Option<&Node> = None;
        let mut best_dist = f64::INFINITY;
        for node in self.store.nodes() {
            if node.position.exploded() {
                continue;
            }
            let dist = (node.position - pt).magnitude();
            if dist < best_dist {
                best_dist = dist;
                best = Some(node);
            }
        }
        best
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(SimulationParams::default(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingRenderer(Rc<Cell<usize>>);

    impl Renderer for CountingRenderer {
        fn frame_ready(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn engine() -> LayoutEngine {
        LayoutEngine::new(SimulationParams::default(), 42)
    }

    #[test]
    fn test_advance_requires_start() {
        let mut engine = engine();
        engine.add_node_at("a", 0.0, 0.0);
        assert!(!engine.advance());

        engine.start();
        assert!(engine.advance());
    }

    #[test]
    fn test_start_stop_idempotent() {
        let mut engine = engine();
        engine.start();
        engine.start();
        assert!(engine.is_running());
        engine.stop();
        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_add_node_twice_returns_same_node() {
        let mut engine = engine();
        let a = engine.add_node_at("a", 1.0, 2.0);
        let b = engine.add_node_at("a", 9.0, 9.0);

        assert_eq!(a, b);
        assert_eq!(engine.node_count(), 1);
        let node = engine.get_node("a").expect("node exists");
        assert_eq!(node.position, Vec2::new(1.0, 2.0));
    }

    #[test]
    fn test_add_node_random_placement_inside_bounds() {
        let mut engine = engine();
        engine.add_node("floating");

        let node = engine.get_node("floating").expect("node exists");
        let actual = engine.viewport.actual();
        assert!(node.position.x >= actual.top_left.x);
        assert!(node.position.x <= actual.bottom_right.x);
        assert!(node.position.y >= actual.top_left.y);
        assert!(node.position.y <= actual.bottom_right.y);
    }

    #[test]
    fn test_add_edge_auto_creates_endpoints() {
        let mut engine = engine();
        engine.add_edge("a", "b", 1.0, false);

        assert_eq!(engine.node_count(), 2);
        assert_eq!(engine.edge_count(), 1);
        assert!(engine.get_node("a").is_some());
        assert!(engine.get_node("b").is_some());
    }

    #[test]
    fn test_add_edge_twice_returns_same_edge() {
        let mut engine = engine();
        let first = engine.add_edge("a", "b", 3.0, false);
        let second = engine.add_edge("a", "b", 8.0, false);

        assert_eq!(first, second);
        assert_eq!(engine.edge_count(), 1);
        let (params, _, _) = engine.edges().next().expect("edge exists");
        assert_eq!(params.length, 3.0);
    }

    #[test]
    fn test_new_edge_takes_current_stiffness() {
        let mut engine = engine();
        let mut params = engine.params().clone();
        params.stiffness = 123.0;
        engine.set_params(params);

        engine.add_edge("a", "b", 1.0, false);
        let (edge, _, _) = engine.edges().next().expect("edge exists");
        assert_eq!(edge.stiffness, 123.0);
    }

    #[test]
    fn test_renderer_notified_each_step() {
        let count = Rc::new(Cell::new(0));
        let mut engine = engine();
        engine.set_renderer(Box::new(CountingRenderer(Rc::clone(&count))));
        engine.add_edge("a", "b", 1.0, false);

        engine.start();
        for _ in 0..3 {
            engine.advance();
        }
        assert_eq!(count.get(), 3);

        // No notifications once stopped.
        engine.stop();
        engine.advance();
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_auto_stop_after_sustained_low_energy() {
        let mut engine = engine();
        // An empty graph has zero energy, under any threshold.
        engine.start();

        let mut ticks = 0;
        while engine.advance() {
            ticks += 1;
            assert!(ticks < 1000, "auto-stop never fired");
        }

        // 10 ms per tick: the 1000 ms idle window passes on tick 101.
        assert_eq!(ticks, 100);
        assert!(!engine.is_running());

        // start() resets the idle window and stepping resumes.
        engine.start();
        assert!(engine.advance());
    }

    #[test]
    fn test_auto_stop_disabled() {
        let mut engine = LayoutEngine::new(
            SimulationParams {
                auto_stop: false,
                ..SimulationParams::default()
            },
            42,
        );
        engine.start();
        for _ in 0..200 {
            assert!(engine.advance());
        }
    }

    #[test]
    fn test_pinned_node_survives_stepping() {
        let mut engine = engine();
        engine.add_node_at("pin", 2.0, 2.0);
        engine.add_node_at("free", 4.0, 2.0);
        engine.add_edge("pin", "free", 1.0, false);
        engine.set_node_fixed("pin", true);

        engine.start();
        for _ in 0..25 {
            engine.advance();
        }

        let node = engine.get_node("pin").expect("node exists");
        assert_eq!(node.position, Vec2::new(2.0, 2.0));
    }

    #[test]
    fn test_drag_pattern_moves_fixed_node() {
        let mut engine = engine();
        engine.add_node_at("pin", 2.0, 2.0);
        engine.set_node_fixed("pin", true);
        assert!(engine.set_node_position("pin", 7.0, -1.0));

        engine.start();
        engine.advance();

        let node = engine.get_node("pin").expect("node exists");
        assert_eq!(node.position, Vec2::new(7.0, -1.0));
    }

    #[test]
    fn test_set_node_mass_rejects_non_positive() {
        let mut engine = engine();
        engine.add_node_at("a", 0.0, 0.0);
        assert!(!engine.set_node_mass("a", 0.0));
        assert!(!engine.set_node_mass("a", -1.0));
        assert!(engine.set_node_mass("a", 2.5));
        assert_eq!(engine.get_node("a").expect("node exists").mass, 2.5);
    }

    #[test]
    fn test_missing_node_setters_return_false() {
        let mut engine = engine();
        assert!(!engine.set_node_fixed("ghost", true));
        assert!(!engine.set_node_position("ghost", 0.0, 0.0));
        assert!(!engine.set_node_data("ghost", None));
    }

    #[test]
    fn test_nearest_on_single_node_graph() {
        let mut engine = engine();
        engine.add_node_at("solo", 5.0, 5.0);
        engine.set_screen_size(800.0, 600.0);

        // Any query point maps to the only node.
        for (sx, sy) in [(0.0, 0.0), (400.0, 300.0), (799.0, 599.0)] {
            let hit = engine.nearest(sx, sy).expect("nearest finds the node");
            assert_eq!(hit.key, "solo");
        }
    }

    #[test]
    fn test_nearest_without_screen_is_none() {
        let mut engine = engine();
        engine.add_node_at("a", 0.0, 0.0);
        // View bounds never established: no screen size, no steps.
        assert!(engine.nearest(10.0, 10.0).is_none());
    }

    #[test]
    fn test_set_screen_size_establishes_view() {
        let mut engine = engine();
        engine.add_node_at("a", 0.0, 0.0);
        engine.set_screen_size(640.0, 480.0);

        let screen = engine.to_screen(Vec2::ZERO);
        assert!(!screen.exploded());
        let back = engine.from_screen(screen.x, screen.y);
        assert!((back - Vec2::ZERO).magnitude() < 1e-9);
    }

    #[test]
    fn test_friction_clamped() {
        let mut engine = engine();
        let mut params = engine.params().clone();
        params.friction = 3.0;
        engine.set_params(params);
        assert_eq!(engine.params().friction, 1.0);
    }

    #[test]
    fn test_energy_converges_for_spring_pair() {
        let mut engine = LayoutEngine::new(
            SimulationParams {
                repulsion: 0.0,
                auto_stop: false,
                ..SimulationParams::default()
            },
            42,
        );
        engine.add_node_at("a", -5.0, 0.0);
        engine.add_node_at("b", 5.0, 0.0);
        engine.add_edge("a", "b", 2.0, false);

        engine.start();
        for _ in 0..1000 {
            engine.advance();
        }

        let energy = engine.energy();
        assert!(energy.sum >= 0.0);
        assert!(energy.max <= energy.sum + 1e-12);
        assert!((energy.mean - energy.sum / 2.0).abs() < 1e-12);
        assert!(energy.mean < 1e-5);
    }
}
