//! Canopy Layout - WASM Module
//!
//! A force-directed graph layout engine compiled to WebAssembly. The engine
//! computes 2D positions for graph nodes through an iterative physics
//! simulation (spring attraction plus Barnes-Hut approximated repulsion) and
//! exposes a JavaScript-friendly API via wasm-bindgen. The host owns the
//! cadence: call `tick()` from a timer or animation frame and draw from the
//! `onFrame` callback.
//!
//! # Architecture
//!
//! - `geom`: 2D vector and rectangle value types
//! - `graph`: graph store built on petgraph's StableGraph
//! - `spatial`: Barnes-Hut quadtree, rebuilt every step
//! - `layout`: physics integrator and viewport/bounds tracking
//! - `engine`: lifecycle facade driven by the host scheduler

use js_sys::Function;
use serde::Serialize;
use wasm_bindgen::prelude::*;

pub mod engine;
pub mod geom;
pub mod graph;
pub mod layout;
pub mod spatial;

use engine::{LayoutEngine, Renderer};
use geom::Vec2;
use layout::SimulationParams;

/// Bridge from the `log` facade to the browser console.
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let message = JsValue::from_str(&format!("{}: {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&message),
            log::Level::Warn => web_sys::console::warn_1(&message),
            _ => web_sys::console::log_1(&message),
        }
    }

    fn flush(&self) {}
}

/// Initialize the WASM module: panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }
}

/// Renderer that forwards frame-ready notifications to a JS callback.
struct JsRenderer {
    callback: Function,
}

impl Renderer for JsRenderer {
    fn frame_ready(&mut self) {
        if self.callback.call0(&JsValue::NULL).is_err() {
            log::warn!("frame-ready callback threw; continuing");
        }
    }
}

/// Read-only node snapshot handed across the JS boundary.
#[derive(Serialize)]
struct NodeView<'a> {
    key: &'a str,
    x: f64,
    y: f64,
    mass: f64,
    fixed: bool,
}

/// Read-only edge snapshot handed across the JS boundary.
#[derive(Serialize)]
struct EdgeView<'a> {
    source: &'a str,
    target: &'a str,
    length: f64,
    directed: bool,
}

/// Main entry point for the layout engine.
///
/// This struct wraps the internal LayoutEngine and provides the public API
/// exposed to JavaScript.
#[wasm_bindgen]
pub struct CanopyLayout {
    engine: LayoutEngine,
}

#[wasm_bindgen]
impl CanopyLayout {
    /// Create an engine with default parameters.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            engine: LayoutEngine::default(),
        }
    }

    /// Create an engine with an explicit RNG seed for reproducible layouts.
    #[wasm_bindgen(js_name = withSeed)]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            engine: LayoutEngine::new(SimulationParams::default(), seed),
        }
    }

    // =========================================================================
    // Graph Construction
    // =========================================================================

    /// Add a node by key. Without coordinates the node is placed at a random
    /// point inside the current layout bounds. Adding an existing key is a
    /// no-op that keeps the node's position.
    #[wasm_bindgen(js_name = addNode)]
    pub fn add_node(&mut self, key: &str, x: Option<f64>, y: Option<f64>) {
        match (x, y) {
            (Some(x), Some(y)) => {
                self.engine.add_node_at(key, x, y);
            }
            _ => {
                self.engine.add_node(key);
            }
        }
    }

    /// Add an edge, auto-creating missing endpoints. `length` defaults to 1;
    /// `directed` is a rendering hint and defaults to false. Adding an
    /// existing (source, target) pair keeps the first edge's parameters.
    #[wasm_bindgen(js_name = addEdge)]
    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        length: Option<f64>,
        directed: Option<bool>,
    ) {
        self.engine
            .add_edge(source, target, length.unwrap_or(1.0), directed.unwrap_or(false));
    }

    /// Get the number of nodes.
    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> u32 {
        self.engine.node_count() as u32
    }

    /// Get the number of edges.
    #[wasm_bindgen(js_name = edgeCount)]
    pub fn edge_count(&self) -> u32 {
        self.engine.edge_count() as u32
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Allow stepping and reset the auto-stop window. Idempotent.
    pub fn start(&mut self) {
        self.engine.start();
    }

    /// Prevent future steps. Idempotent.
    pub fn stop(&mut self) {
        self.engine.stop();
    }

    /// Whether `tick()` will act.
    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Advance one physics step. Returns false once the engine has stopped
    /// (explicitly or through auto-stop) so the host can cease scheduling.
    pub fn tick(&mut self) -> bool {
        self.engine.advance()
    }

    /// Register a callback invoked after every completed step.
    #[wasm_bindgen(js_name = onFrame)]
    pub fn on_frame(&mut self, callback: Function) {
        self.engine.set_renderer(Box::new(JsRenderer { callback }));
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Record the screen size in pixels; recomputes bounds immediately.
    #[wasm_bindgen(js_name = setScreenSize)]
    pub fn set_screen_size(&mut self, width: f64, height: f64) {
        self.engine.set_screen_size(width, height);
    }

    /// Replace the simulation parameters from a plain JS object. Missing
    /// fields fall back to their defaults. Returns false (and logs) when the
    /// object does not deserialize.
    #[wasm_bindgen(js_name = setParams)]
    pub fn set_params(&mut self, params: JsValue) -> bool {
        match serde_wasm_bindgen::from_value::<SimulationParams>(params) {
            Ok(params) => {
                self.engine.set_params(params);
                true
            }
            Err(err) => {
                log::warn!("rejected params object: {err}");
                false
            }
        }
    }

    /// Current simulation parameters as a plain JS object.
    #[wasm_bindgen(js_name = getParams)]
    pub fn get_params(&self) -> JsValue {
        serde_wasm_bindgen::to_value(self.engine.params()).unwrap_or(JsValue::NULL)
    }

    /// Energy statistics from the most recent step: `{ sum, max, mean }`.
    pub fn energy(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.engine.energy()).unwrap_or(JsValue::NULL)
    }

    // =========================================================================
    // Node Control (pin-and-drag pattern)
    // =========================================================================

    /// Pin a node: it ignores forces until unpinned and moves only through
    /// `setNodePosition`.
    #[wasm_bindgen(js_name = pinNode)]
    pub fn pin_node(&mut self, key: &str) -> bool {
        self.engine.set_node_fixed(key, true)
    }

    /// Unpin a node.
    #[wasm_bindgen(js_name = unpinNode)]
    pub fn unpin_node(&mut self, key: &str) -> bool {
        self.engine.set_node_fixed(key, false)
    }

    /// Check if a node is pinned.
    #[wasm_bindgen(js_name = isNodePinned)]
    pub fn is_node_pinned(&self, key: &str) -> bool {
        self.engine.get_node(key).map(|n| n.fixed).unwrap_or(false)
    }

    /// Set a node's position in graph space.
    #[wasm_bindgen(js_name = setNodePosition)]
    pub fn set_node_position(&mut self, key: &str, x: f64, y: f64) -> bool {
        self.engine.set_node_position(key, x, y)
    }

    /// Get a node's position in graph space as `[x, y]`.
    #[wasm_bindgen(js_name = getNodePosition)]
    pub fn get_node_position(&self, key: &str) -> Option<Vec<f64>> {
        self.engine
            .get_node(key)
            .map(|n| vec![n.position.x, n.position.y])
    }

    /// Set a node's mass. Rejects non-positive values.
    #[wasm_bindgen(js_name = setNodeMass)]
    pub fn set_node_mass(&mut self, key: &str, mass: f64) -> bool {
        self.engine.set_node_mass(key, mass)
    }

    /// Attach an arbitrary payload to a node; `null`/`undefined` clears it.
    #[wasm_bindgen(js_name = setNodeData)]
    pub fn set_node_data(&mut self, key: &str, data: JsValue) -> bool {
        if data.is_null() || data.is_undefined() {
            return self.engine.set_node_data(key, None);
        }
        match serde_wasm_bindgen::from_value::<serde_json::Value>(data) {
            Ok(value) => self.engine.set_node_data(key, Some(value)),
            Err(err) => {
                log::warn!("rejected node payload: {err}");
                false
            }
        }
    }

    /// Read a node's payload, or `null`.
    #[wasm_bindgen(js_name = getNodeData)]
    pub fn get_node_data(&self, key: &str) -> JsValue {
        self.engine
            .get_node(key)
            .and_then(|n| n.data.as_ref())
            .and_then(|data| serde_wasm_bindgen::to_value(data).ok())
            .unwrap_or(JsValue::NULL)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Map a graph-space point to screen pixels as `[x, y]`, or `null`
    /// before the view bounds are established.
    #[wasm_bindgen(js_name = toScreen)]
    pub fn to_screen(&self, x: f64, y: f64) -> Option<Vec<f64>> {
        let s = self.engine.to_screen(Vec2::new(x, y));
        if s.is_null() { None } else { Some(vec![s.x, s.y]) }
    }

    /// Map a screen pixel to graph space as `[x, y]`, or `null` before the
    /// view bounds are established.
    #[wasm_bindgen(js_name = fromScreen)]
    pub fn from_screen(&self, sx: f64, sy: f64) -> Option<Vec<f64>> {
        let p = self.engine.from_screen(sx, sy);
        if p.is_null() { None } else { Some(vec![p.x, p.y]) }
    }

    /// Key of the node closest (in graph space) to a screen coordinate.
    pub fn nearest(&self, sx: f64, sy: f64) -> Option<String> {
        self.engine.nearest(sx, sy).map(|n| n.key.clone())
    }

    /// Snapshot of all nodes as `[{ key, x, y, mass, fixed }, ...]`.
    pub fn nodes(&self) -> JsValue {
        let views: Vec<NodeView<'_>> = self
            .engine
            .nodes()
            .map(|n| NodeView {
                key: &n.key,
                x: n.position.x,
                y: n.position.y,
                mass: n.mass,
                fixed: n.fixed,
            })
            .collect();
        serde_wasm_bindgen::to_value(&views).unwrap_or(JsValue::NULL)
    }

    /// Snapshot of all edges as `[{ source, target, length, directed }, ...]`.
    pub fn edges(&self) -> JsValue {
        let views: Vec<EdgeView<'_>> = self
            .engine
            .edges()
            .map(|(params, source, target)| EdgeView {
                source: &source.key,
                target: &target.key,
                length: params.length,
                directed: params.directed,
            })
            .collect();
        serde_wasm_bindgen::to_value(&views).unwrap_or(JsValue::NULL)
    }
}

impl Default for CanopyLayout {
    fn default() -> Self {
        Self::new()
    }
}
