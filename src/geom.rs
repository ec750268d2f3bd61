//! Geometry primitives for the layout engine.
//!
//! `Vec2` doubles as a point and a displacement in graph space. A value with
//! both components NaN is the "null" sentinel for positions that have never
//! been assigned; a value with *either* component NaN is "exploded" — the
//! result of a degenerate simulation state. Exploded positions are tolerated
//! and propagate; they are never repaired here.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

/// 2D point/vector with f64 components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    /// The "unpositioned" sentinel: both components NaN.
    pub const NULL: Vec2 = Vec2 {
        x: f64::NAN,
        y: f64::NAN,
    };

    /// The origin.
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// True only when both components are NaN (the null sentinel).
    #[inline]
    pub fn is_null(self) -> bool {
        self.x.is_nan() && self.y.is_nan()
    }

    /// True when either component is NaN.
    #[inline]
    pub fn exploded(self) -> bool {
        self.x.is_nan() || self.y.is_nan()
    }

    /// Multiply both components by a scalar.
    #[inline]
    pub fn scale(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    /// Divide both components by a scalar.
    #[inline]
    pub fn div(self, s: f64) -> Self {
        Self::new(self.x / s, self.y / s)
    }

    /// Euclidean length.
    #[inline]
    pub fn magnitude(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction. Dividing by a zero magnitude yields
    /// NaN components; callers guard the zero case.
    #[inline]
    pub fn normalize(self) -> Self {
        self.div(self.magnitude())
    }

    /// Uniform random vector inside the square [-radius, radius] per axis.
    pub fn random_in<R: Rng>(rng: &mut R, radius: f64) -> Self {
        Self::new(
            2.0 * radius * (rng.random::<f64>() - 0.5),
            2.0 * radius * (rng.random::<f64>() - 0.5),
        )
    }

    /// Random direction of unit length, used as the fallback when a force
    /// direction is degenerate (zero distance between bodies).
    pub fn random_unit<R: Rng>(rng: &mut R) -> Self {
        Self::random_in(rng, 1.0).normalize()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    #[inline]
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Axis-aligned rectangle stored as a (top-left, bottom-right) corner pair.
///
/// Graph space uses screen orientation: y grows downward, so `top_left` holds
/// the component-wise minimum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top_left: Vec2,
    pub bottom_right: Vec2,
}

impl Rect {
    /// Create a rectangle from its two corners.
    #[inline]
    pub fn new(top_left: Vec2, bottom_right: Vec2) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    /// Width and height as a vector.
    #[inline]
    pub fn size(&self) -> Vec2 {
        self.bottom_right - self.top_left
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> Vec2 {
        self.top_left + self.size().div(2.0)
    }

    /// Uniform random point inside the rectangle.
    pub fn random_point<R: Rng>(&self, rng: &mut R) -> Vec2 {
        let s = self.size();
        self.top_left + Vec2::new(s.x * rng.random::<f64>(), s.y * rng.random::<f64>())
    }
}
