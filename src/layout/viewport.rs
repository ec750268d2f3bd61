//! Viewport tracking: actual bounds, smoothed view bounds, screen mapping.
//!
//! Two rectangles are maintained. The *actual* bounds are a tight fit over
//! the live node positions, recomputed every step. The *view* bounds lag
//! behind through exponential smoothing and are what the coordinate mapping
//! uses, so the picture glides instead of jumping. A smoothed update is only
//! committed when it would move the picture by at least a pixel, which stops
//! imperceptible churn from invalidating the screen.

use crate::geom::{Rect, Vec2};
use crate::graph::GraphStore;

/// Per-step smoothing factor for the view bounds.
const SMOOTHING: f64 = 0.04;

/// Padding added on every side of the tight bounding box, in graph units.
const PADDING: f64 = 1.2;

/// Minimum width and height of the actual bounds, in graph units.
const MIN_EXTENT: f64 = 4.0;

/// Bounds tracker and graph-space/screen-space mapping.
pub struct Viewport {
    /// Screen size in pixels.
    width: f64,
    height: f64,
    /// Pixel margins: top, right, bottom, left.
    margins: [f64; 4],
    /// Tight (padded) fit over current node positions.
    actual: Rect,
    /// Smoothed bounds used for mapping; None until first update.
    view: Option<Rect>,
}

impl Viewport {
    /// Create a tracker with no screen attached yet.
    ///
    /// The actual bounds start at the empty-graph default so that random
    /// node placement has a region to draw from before the first step.
    pub fn new(margins: [f64; 4]) -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            margins,
            actual: Self::measure(&GraphStore::new()),
            view: None,
        }
    }

    /// Record the screen size in pixels.
    pub fn set_screen(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    /// Replace the pixel margins (top, right, bottom, left).
    pub fn set_margins(&mut self, margins: [f64; 4]) {
        self.margins = margins;
    }

    /// Current actual bounds.
    pub fn actual(&self) -> Rect {
        self.actual
    }

    /// Current view bounds, if established.
    pub fn view(&self) -> Option<Rect> {
        self.view
    }

    /// Tight bounding box over non-exploded positions, padded and expanded
    /// to the minimum extent. Defaults to [-1,-1]..[1,1] before padding when
    /// no node has a usable position.
    fn measure(store: &GraphStore) -> Rect {
        let mut lt = Vec2::NULL;
        let mut rb = Vec2::NULL;

        for node in store.nodes() {
            let p = node.position;
            if p.exploded() {
                continue;
            }
            if lt.is_null() {
                lt = p;
                rb = p;
            } else {
                if p.x < lt.x {
                    lt.x = p.x;
                }
                if p.y < lt.y {
                    lt.y = p.y;
                }
                if p.x > rb.x {
                    rb.x = p.x;
                }
                if p.y > rb.y {
                    rb.y = p.y;
                }
            }
        }

        if lt.is_null() {
            lt = Vec2::new(-1.0, -1.0);
            rb = Vec2::new(1.0, 1.0);
        }

        lt.x -= PADDING;
        lt.y -= PADDING;
        rb.x += PADDING;
        rb.y += PADDING;

        let padded = Rect::new(lt, rb);
        let size = padded.size();
        let center = padded.center();
        let half = Vec2::new(size.x.max(MIN_EXTENT), size.y.max(MIN_EXTENT)).div(2.0);
        Rect::new(center - half, center + half)
    }

    /// Recompute the actual bounds and advance the smoothed view.
    ///
    /// The first update seeds the view directly; afterwards each corner moves
    /// 4% of the way toward the actual bounds, and the result is committed
    /// only when the shift amounts to more than one pixel on either axis.
    pub fn update(&mut self, store: &GraphStore) {
        self.actual = Self::measure(store);

        let Some(view) = self.view else {
            self.view = Some(self.actual);
            return;
        };

        let lt = view.top_left + (self.actual.top_left - view.top_left).scale(SMOOTHING);
        let rb =
            view.bottom_right + (self.actual.bottom_right - view.bottom_right).scale(SMOOTHING);

        let shift = Vec2::new(
            (view.top_left - lt).magnitude(),
            (view.bottom_right - rb).magnitude(),
        );
        if shift.x * self.width > 1.0 || shift.y * self.height > 1.0 {
            self.view = Some(Rect::new(lt, rb));
        }
    }

    /// Map a graph-space point to screen pixels, or `Vec2::NULL` when the
    /// view bounds are not yet established.
    pub fn to_screen(&self, pt: Vec2) -> Vec2 {
        let Some(view) = self.view else {
            return Vec2::NULL;
        };

        let size = view.size();
        let [top, right, bottom, left] = self.margins;
        let offset = pt - view.top_left;
        let sx = left + offset.div(size.x).x * (self.width - (right + left));
        let sy = top + offset.div(size.y).y * (self.height - (top + bottom));
        Vec2::new(sx, sy)
    }

    /// Map a screen pixel back to graph space, or `Vec2::NULL` when the view
    /// bounds are not yet established.
    pub fn from_screen(&self, sx: f64, sy: f64) -> Vec2 {
        let Some(view) = self.view else {
            return Vec2::NULL;
        };

        let size = view.size();
        let [top, right, bottom, left] = self.margins;
        let x = (sx - left) / (self.width - (right + left)) * size.x + view.top_left.x;
        let y = (sy - top) / (self.height - (top + bottom)) * size.y + view.top_left.y;
        Vec2::new(x, y)
    }
}
