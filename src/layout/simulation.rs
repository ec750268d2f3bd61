//! Force simulation: one semi-implicit Euler step over the graph.
//!
//! A step runs the passes in a fixed order: zero the force accumulators,
//! repulsion (Barnes-Hut when theta > 0, exact all-pairs otherwise), spring
//! forces along edges, centroid drift plus optional gravity, then the
//! velocity/position update with its stability safeguards and the energy
//! statistics used for convergence detection.
//!
//! Numeric policy: degenerate states never abort a step. Zero distances fall
//! back to a random unit direction, repulsion distances are floored at 1, and
//! positions that become NaN ("exploded") are left alone — they drop out of
//! bounds computation and tree insertion but are never repaired.

use petgraph::stable_graph::NodeIndex;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geom::{Rect, Vec2};
use crate::graph::GraphStore;
use crate::spatial::{Body, QuadTree};

/// Speed above which the nonlinear velocity damping kicks in.
const MAX_SPEED: f64 = 1000.0;

/// Distance floor shared with the quadtree's force law.
const MIN_DISTANCE: f64 = 1.0;

/// Tunable physics parameters. All values take effect on the next step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Global strength of the pairwise repulsive force.
    pub repulsion: f64,
    /// Stiffness assigned to newly created edges; springs are skipped
    /// entirely when this is not positive.
    pub stiffness: f64,
    /// Velocity damping factor in 0..1.
    pub friction: f64,
    /// Integration time step.
    pub dt: f64,
    /// Pull every node toward the origin, scaled by repulsion / 100.
    pub gravity: bool,
    /// Barnes-Hut opening angle; 0 selects exact all-pairs repulsion.
    pub theta: f64,
    /// Stop stepping automatically once the layout has settled.
    pub auto_stop: bool,
    /// Mean-energy level below which the layout counts as settled.
    pub stop_threshold: f64,
    /// Host scheduler cadence in milliseconds; used to convert ticks into
    /// the sustained-idle window for auto-stop.
    pub step_interval_ms: f64,
    /// Screen margins in pixels: top, right, bottom, left.
    pub margins: [f64; 4],
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            repulsion: 1000.0,
            stiffness: 600.0,
            friction: 0.5,
            dt: 0.01,
            gravity: false,
            theta: 0.4,
            auto_stop: true,
            stop_threshold: 0.7,
            step_interval_ms: 10.0,
            margins: [20.0, 20.0, 20.0, 20.0],
        }
    }
}

/// Aggregate squared-speed statistics for one step.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Energy {
    /// Sum of squared node speeds.
    pub sum: f64,
    /// Largest single squared speed.
    pub max: f64,
    /// `sum / node_count`, or 0 for an empty graph.
    pub mean: f64,
}

/// Advance the simulation by one step and report the resulting energy.
///
/// `bounds` is the current actual bounding box, used as the quadtree root
/// region.
pub(crate) fn step<R: Rng>(
    store: &mut GraphStore,
    params: &SimulationParams,
    bounds: Rect,
    rng: &mut R,
) -> Energy {
    let indices: Vec<_> = store.node_indices().collect();

    for &i in &indices {
        store.node_mut(i).force = Vec2::ZERO;
    }

    if params.repulsion > 0.0 {
        if params.theta > 0.0 {
            apply_barnes_hut(store, &indices, params, bounds, rng);
        } else {
            apply_brute_force(store, &indices, params, rng);
        }
    }

    if params.stiffness > 0.0 {
        apply_springs(store, rng);
    }

    update_velocity_and_position(store, &indices, params)
}

/// Approximate repulsion through a quadtree rebuilt for this step.
fn apply_barnes_hut<R: Rng>(
    store: &mut GraphStore,
    indices: &[NodeIndex],
    params: &SimulationParams,
    bounds: Rect,
    rng: &mut R,
) {
    let mut tree = QuadTree::new(bounds, params.theta);
    for &i in indices {
        let node = store.node(i);
        tree.insert(
            Body {
                index: i,
                position: node.position,
                mass: node.mass,
            },
            rng,
        );
    }

    // Coincident bodies get nudged apart during the build; persist the
    // nudge so the layout itself separates.
    for &(i, position) in tree.displaced() {
        store.node_mut(i).position = position;
    }

    for &i in indices {
        let node = store.node(i);
        let force = tree.repulsion_at(i, node.position, params.repulsion, rng);
        store.node_mut(i).apply_force(force);
    }
}

/// Exact all-pairs repulsion, used when theta is 0. Applies the same force
/// law as the tree; each unordered pair contributes once to both endpoints,
/// so per-node totals agree with the tree as theta approaches 0.
fn apply_brute_force<R: Rng>(
    store: &mut GraphStore,
    indices: &[NodeIndex],
    params: &SimulationParams,
    rng: &mut R,
) {
    for (n, &a) in indices.iter().enumerate() {
        let a_pos = store.node(a).position;
        if a_pos.exploded() {
            continue;
        }
        let a_mass = store.node(a).mass;

        for &b in &indices[n + 1..] {
            let b_pos = store.node(b).position;
            if b_pos.exploded() {
                continue;
            }
            let b_mass = store.node(b).mass;

            let d = a_pos - b_pos;
            let mag = d.magnitude();
            let dist = mag.max(MIN_DISTANCE);
            let dir = if mag > 0.0 {
                d.normalize()
            } else {
                Vec2::random_unit(rng)
            };

            store
                .node_mut(a)
                .apply_force(dir.scale(params.repulsion * b_mass).div(dist * dist));
            store
                .node_mut(b)
                .apply_force(dir.scale(-(params.repulsion * a_mass)).div(dist * dist));
        }
    }
}

/// Hooke springs along every edge, split symmetrically onto the endpoints.
fn apply_springs<R: Rng>(store: &mut GraphStore, rng: &mut R) {
    let edges: Vec<_> = store.edge_indices().collect();
    for e in edges {
        let Some((source, target)) = store.endpoints(e) else {
            continue;
        };
        let params = *store.edge(e);

        let s = store.node(target).position - store.node(source).position;
        let mag = s.magnitude();
        let q = params.length - mag;
        let dir = if mag > 0.0 {
            s.normalize()
        } else {
            Vec2::random_unit(rng)
        };

        store
            .node_mut(source)
            .apply_force(dir.scale(params.stiffness * q * -0.5));
        store
            .node_mut(target)
            .apply_force(dir.scale(params.stiffness * q * 0.5));
    }
}

/// Drift, gravity, velocity and position update, and energy accumulation.
fn update_velocity_and_position(
    store: &mut GraphStore,
    indices: &[NodeIndex],
    params: &SimulationParams,
) -> Energy {
    let count = indices.len();

    // Uniform force pulling the centroid back to the origin.
    let mut drift = Vec2::ZERO;
    if count > 0 {
        let mut total = Vec2::ZERO;
        for &i in indices {
            total = total + store.node(i).position;
        }
        drift = total.div(-(count as f64));
    }

    let mut sum = 0.0;
    let mut max = 0.0f64;

    for &i in indices {
        let node = store.node_mut(i);

        if count > 0 {
            node.apply_force(drift);
        }
        if params.gravity {
            let pull = node.position.scale(-1.0);
            node.apply_force(pull.scale(params.repulsion / 100.0));
        }

        if node.fixed {
            // Position is under external control; kill any accumulated state.
            node.velocity = Vec2::ZERO;
            node.force = Vec2::ZERO;
        } else {
            node.velocity = node.velocity + node.force.scale(params.dt);
            node.velocity = node.velocity.scale(1.0 - params.friction);
            node.force = Vec2::ZERO;

            let speed = node.velocity.magnitude();
            if speed > MAX_SPEED {
                // Nonlinear damping: dividing by speed squared collapses
                // runaway velocities far below the threshold.
                node.velocity = node.velocity.div(speed * speed);
            }

            node.position = node.position + node.velocity.scale(params.dt);
        }

        let speed = node.velocity.magnitude();
        let z = speed * speed;
        sum += z;
        if z > max {
            max = z;
        }
    }

    Energy {
        sum,
        max,
        mean: if count > 0 { sum / count as f64 } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeParams;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn wide_bounds() -> Rect {
        Rect::new(Vec2::new(-50.0, -50.0), Vec2::new(50.0, 50.0))
    }

    fn scattered_store(n: usize, seed: u64) -> GraphStore {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut store = GraphStore::new();
        for i in 0..n {
            let p = Vec2::random_in(&mut rng, 20.0);
            store.insert_node(&format!("n{i}"), p);
        }
        store
    }

    #[test]
    fn test_step_on_empty_graph() {
        let mut store = GraphStore::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let energy = step(&mut store, &SimulationParams::default(), wide_bounds(), &mut rng);
        assert_eq!(energy.sum, 0.0);
        assert_eq!(energy.mean, 0.0);
    }

    #[test]
    fn test_energy_statistics() {
        let mut store = GraphStore::new();
        let a = store.insert_node("a", Vec2::new(-1.0, 0.0));
        let b = store.insert_node("b", Vec2::new(1.0, 0.0));
        store.node_mut(a).velocity = Vec2::new(3.0, 4.0);
        store.node_mut(b).velocity = Vec2::new(0.0, 1.0);

        // Everything switched off and dt = 0: velocities pass through
        // untouched and the stats read them directly.
        let params = SimulationParams {
            repulsion: 0.0,
            stiffness: 0.0,
            friction: 0.0,
            dt: 0.0,
            ..SimulationParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let energy = step(&mut store, &params, wide_bounds(), &mut rng);

        assert!((energy.sum - 26.0).abs() < 1e-12);
        assert!((energy.max - 25.0).abs() < 1e-12);
        assert!((energy.mean - 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_brute_force_pair_is_equal_and_opposite() {
        let mut store = GraphStore::new();
        let a = store.insert_node("a", Vec2::new(-3.0, 1.0));
        let b = store.insert_node("b", Vec2::new(4.0, -2.0));
        let indices: Vec<_> = store.node_indices().collect();

        let params = SimulationParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        apply_brute_force(&mut store, &indices, &params, &mut rng);

        let fa = store.node(a).force;
        let fb = store.node(b).force;
        assert!((fa.magnitude() - fb.magnitude()).abs() < 1e-12);
        assert!((fa + fb).magnitude() < 1e-12);
        assert!(fa.magnitude() > 0.0);
    }

    #[test]
    fn test_barnes_hut_matches_brute_force_at_small_theta() {
        let params_tree = SimulationParams {
            theta: 1e-6,
            ..SimulationParams::default()
        };
        let params_brute = SimulationParams::default();

        let mut tree_store = scattered_store(24, 99);
        let mut brute_store = scattered_store(24, 99);
        let indices: Vec<_> = tree_store.node_indices().collect();

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        apply_barnes_hut(
            &mut tree_store,
            &indices,
            &params_tree,
            wide_bounds(),
            &mut rng,
        );
        apply_brute_force(&mut brute_store, &indices, &params_brute, &mut rng);

        for &i in &indices {
            let ft = tree_store.node(i).force;
            let fb = brute_store.node(i).force;
            let rel = (ft - fb).magnitude() / fb.magnitude().max(1e-12);
            assert!(rel < 1e-2, "node {i:?}: relative error {rel}");
        }
    }

    #[test]
    fn test_fixed_node_never_moves() {
        let mut store = GraphStore::new();
        let anchor = store.insert_node("anchor", Vec2::new(1.0, 1.0));
        let free = store.insert_node("free", Vec2::new(3.0, 1.0));
        store.node_mut(anchor).fixed = true;
        store.insert_edge(anchor, free, EdgeParams::new(1.0, 600.0));

        let params = SimulationParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..50 {
            step(&mut store, &params, wide_bounds(), &mut rng);
        }

        assert_eq!(store.node(anchor).position, Vec2::new(1.0, 1.0));
        assert_eq!(store.node(anchor).velocity(), Vec2::ZERO);
        // The free node did move.
        assert_ne!(store.node(free).position, Vec2::new(3.0, 1.0));
    }

    #[test]
    fn test_spring_pair_settles_at_rest_length() {
        let mut store = GraphStore::new();
        let a = store.insert_node("a", Vec2::new(-5.0, 0.0));
        let b = store.insert_node("b", Vec2::new(5.0, 0.0));
        store.insert_edge(a, b, EdgeParams::new(2.0, 600.0));

        let params = SimulationParams {
            repulsion: 0.0,
            ..SimulationParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut energy = Energy::default();
        for _ in 0..1000 {
            energy = step(&mut store, &params, wide_bounds(), &mut rng);
        }

        let dist = (store.node(a).position - store.node(b).position).magnitude();
        assert!((dist - 2.0).abs() < 0.05, "distance {dist} not near rest length");
        assert!(store.node(a).velocity().magnitude() < 1e-3);
        assert!(store.node(b).velocity().magnitude() < 1e-3);
        assert!(energy.mean < 1e-5);
    }

    #[test]
    fn test_symmetric_triangle_stays_symmetric() {
        let mut store = GraphStore::new();
        // Equilateral triangle centered on the origin.
        let r = 3.0;
        let mut idx = Vec::new();
        for (name, angle) in [("a", 90.0f64), ("b", 210.0), ("c", 330.0)] {
            let rad = angle.to_radians();
            idx.push(store.insert_node(name, Vec2::new(r * rad.cos(), r * rad.sin())));
        }

        // Exact repulsion keeps the symmetry bit-for-bit modulo rounding.
        let params = SimulationParams {
            theta: 0.0,
            stiffness: 0.0,
            ..SimulationParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..50 {
            step(&mut store, &params, wide_bounds(), &mut rng);
        }

        let d01 = (store.node(idx[0]).position - store.node(idx[1]).position).magnitude();
        let d12 = (store.node(idx[1]).position - store.node(idx[2]).position).magnitude();
        let d20 = (store.node(idx[2]).position - store.node(idx[0]).position).magnitude();

        assert!((d01 - d12).abs() / d01 < 1e-3);
        assert!((d12 - d20).abs() / d12 < 1e-3);
        // Nodes repelled each other outward.
        assert!(d01 > r);
    }

    #[test]
    fn test_zero_distance_pair_separates() {
        let mut store = GraphStore::new();
        let a = store.insert_node("a", Vec2::new(0.5, 0.5));
        let b = store.insert_node("b", Vec2::new(0.5, 0.5));

        let params = SimulationParams {
            stiffness: 0.0,
            ..SimulationParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..10 {
            step(&mut store, &params, wide_bounds(), &mut rng);
        }

        let dist = (store.node(a).position - store.node(b).position).magnitude();
        assert!(dist > 0.0);
        assert!(!store.node(a).position.exploded());
        assert!(!store.node(b).position.exploded());
    }

    #[test]
    fn test_exploded_node_is_never_repaired() {
        let mut store = GraphStore::new();
        let dead = store.insert_node("dead", Vec2::NULL);

        let params = SimulationParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..5 {
            let energy = step(&mut store, &params, wide_bounds(), &mut rng);
            // A fully exploded graph still completes every step.
            assert!(energy.mean.is_nan() || energy.mean >= 0.0);
        }

        assert!(store.node(dead).position.exploded());
    }

    #[test]
    fn test_repulsion_skips_exploded_pairs() {
        let mut store = GraphStore::new();
        store.insert_node("dead", Vec2::NULL);
        let live = store.insert_node("live", Vec2::new(1.0, 1.0));
        let other = store.insert_node("other", Vec2::new(4.0, 1.0));
        let indices: Vec<_> = store.node_indices().collect();

        let params = SimulationParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        apply_brute_force(&mut store, &indices, &params, &mut rng);

        // The live pair still repels, and no NaN leaks out of the dead node.
        assert!(!store.node(live).force.exploded());
        assert!(!store.node(other).force.exploded());
        assert!(store.node(live).force.magnitude() > 0.0);
    }
}
