//! Barnes-Hut quadtree for approximate n-body repulsion.
//!
//! The tree is rebuilt from scratch every simulation step and discarded after
//! the repulsion pass — it never outlives the step that built it. Branches
//! live in a flat arena (`Vec<Branch>`) and refer to children through slot
//! variants, so the structure needs no `Box` chains and no recursion.
//!
//! Accuracy is controlled by the opening angle theta: a branch whose
//! `sqrt(width * height) / distance` ratio is at or below theta is treated as
//! a single aggregate mass at its centroid; larger ratios are opened and the
//! four children visited instead. Theta 0 opens every branch, which degrades
//! to exact all-pairs summation.

use petgraph::stable_graph::NodeIndex;
use rand::Rng;
use std::collections::VecDeque;

use crate::geom::{Rect, Vec2};

/// Fraction of a branch's extent used to nudge apart coincident bodies.
const JITTER: f64 = 0.08;

/// Distance floor for the inverse-square law.
const MIN_DISTANCE: f64 = 1.0;

/// A point mass copied out of the graph for one build of the tree.
#[derive(Debug, Clone, Copy)]
pub struct Body {
    pub index: NodeIndex,
    pub position: Vec2,
    pub mass: f64,
}

/// One quadrant of a branch: empty, a single body, or a sub-branch handle.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Empty,
    Leaf(Body),
    Branch(usize),
}

/// Internal tree node covering a rectangular region.
struct Branch {
    origin: Vec2,
    size: Vec2,
    /// Total mass of all bodies inserted at or below this branch.
    mass: f64,
    /// Mass-weighted position sum; divide by `mass` for the centroid.
    centroid: Vec2,
    /// Quadrants ordered NW, NE, SW, SE.
    children: [Slot; 4],
}

const NW: usize = 0;
const NE: usize = 1;
const SW: usize = 2;
const SE: usize = 3;

impl Branch {
    fn new(origin: Vec2, size: Vec2) -> Self {
        Self {
            origin,
            size,
            mass: 0.0,
            centroid: Vec2::ZERO,
            children: [Slot::Empty; 4],
        }
    }

    /// Quadrant for a position, comparing the offset from the branch origin
    /// against half the branch size per axis. Exact ties go to the
    /// lower-coordinate side (north/west).
    fn quadrant(&self, position: Vec2) -> usize {
        let offset = position - self.origin;
        let half = self.size.div(2.0);
        match (offset.y <= half.y, offset.x <= half.x) {
            (true, true) => NW,
            (true, false) => NE,
            (false, true) => SW,
            (false, false) => SE,
        }
    }
}

/// Ephemeral Barnes-Hut tree over the current node positions.
pub struct QuadTree {
    branches: Vec<Branch>,
    theta: f64,
    /// Positions nudged apart during insertion; the caller writes these back
    /// to the graph after the build.
    displaced: Vec<(NodeIndex, Vec2)>,
}

impl QuadTree {
    const ROOT: usize = 0;

    /// Create an empty tree whose root covers `bounds`.
    pub fn new(bounds: Rect, theta: f64) -> Self {
        Self {
            branches: vec![Branch::new(bounds.top_left, bounds.size())],
            theta,
            displaced: Vec::new(),
        }
    }

    /// Insert a body. Bodies with an exploded position are skipped.
    ///
    /// Descends quadrants iteratively; when a body lands on an occupied leaf,
    /// the leaf is demoted into a fresh sub-branch and both bodies are
    /// reinserted there. Exactly coincident bodies are separated by nudging
    /// the pre-existing one within the new sub-branch.
    pub fn insert<R: Rng>(&mut self, body: Body, rng: &mut R) {
        if body.position.exploded() {
            return;
        }

        let mut pending = vec![(body, Self::ROOT)];
        while let Some((b, start)) = pending.pop() {
            let mut at = start;
            loop {
                // Every branch on the descent path accumulates mass and the
                // mass-weighted centroid sum.
                let branch = &mut self.branches[at];
                branch.mass += b.mass;
                branch.centroid = branch.centroid + b.position.scale(b.mass);

                let q = self.branches[at].quadrant(b.position);
                let slot = self.branches[at].children[q];
                match slot {
                    Slot::Empty => {
                        self.branches[at].children[q] = Slot::Leaf(b);
                        break;
                    }
                    Slot::Branch(child) => {
                        at = child;
                    }
                    Slot::Leaf(mut other) => {
                        let half = self.branches[at].size.div(2.0);
                        let mut origin = self.branches[at].origin;
                        if q == NE || q == SE {
                            origin.x += half.x;
                        }
                        if q == SW || q == SE {
                            origin.y += half.y;
                        }

                        let child = self.branches.len();
                        self.branches.push(Branch::new(origin, half));
                        self.branches[at].children[q] = Slot::Branch(child);

                        if other.position.x == b.position.x && other.position.y == b.position.y {
                            let kx = half.x * JITTER;
                            let ky = half.y * JITTER;
                            other.position.x = (other.position.x - kx / 2.0
                                + rng.random::<f64>() * kx)
                                .clamp(origin.x, origin.x + half.x);
                            other.position.y = (other.position.y - ky / 2.0
                                + rng.random::<f64>() * ky)
                                .clamp(origin.y, origin.y + half.y);
                            self.displaced.push((other.index, other.position));
                        }

                        // The displaced body restarts inside the new branch;
                        // its mass is already counted in every ancestor.
                        pending.push((other, child));
                        at = child;
                    }
                }
            }
        }
    }

    /// Positions that were nudged apart during insertion.
    pub fn displaced(&self) -> &[(NodeIndex, Vec2)] {
        &self.displaced
    }

    /// Total mass inserted into the tree.
    pub fn total_mass(&self) -> f64 {
        self.branches[Self::ROOT].mass
    }

    /// Aggregate repulsive force on a query body at `position`.
    ///
    /// Breadth-first over the tree. Leaves contribute an inverse-square push
    /// away from themselves; branches are either opened (ratio above theta)
    /// or collapsed to their centroid. The querying node never repels itself.
    pub fn repulsion_at<R: Rng>(
        &self,
        index: NodeIndex,
        position: Vec2,
        repulsion: f64,
        rng: &mut R,
    ) -> Vec2 {
        let mut total = Vec2::ZERO;
        let mut queue = VecDeque::new();
        queue.push_back(Slot::Branch(Self::ROOT));

        while let Some(slot) = queue.pop_front() {
            match slot {
                Slot::Empty => {}
                Slot::Leaf(body) => {
                    if body.index != index {
                        total = total + point_force(position, body.position, repulsion * body.mass, rng);
                    }
                }
                Slot::Branch(handle) => {
                    let branch = &self.branches[handle];
                    if branch.mass <= 0.0 {
                        continue;
                    }
                    let centroid = branch.centroid.div(branch.mass);
                    let dist = (position - centroid).magnitude();
                    let extent = (branch.size.x * branch.size.y).sqrt();
                    if extent / dist > self.theta {
                        for child in branch.children {
                            queue.push_back(child);
                        }
                    } else {
                        total = total
                            + point_force(position, centroid, repulsion * branch.mass, rng);
                    }
                }
            }
        }

        total
    }
}

/// Inverse-square push on `target` away from a point mass at `source`.
///
/// Distance is floored at 1; an exactly zero separation falls back to a
/// random unit direction.
fn point_force<R: Rng>(target: Vec2, source: Vec2, scaled_mass: f64, rng: &mut R) -> Vec2 {
    let d = target - source;
    let mag = d.magnitude();
    let dist = mag.max(MIN_DISTANCE);
    let dir = if mag > 0.0 {
        d.normalize()
    } else {
        Vec2::random_unit(rng)
    };
    dir.scale(scaled_mass).div(dist * dist)
}
