//! Camera: scale + translation between surface pixels and layout world units.
//!
//! `screen = world * scale + (tx, ty)`. The scale is always kept inside the
//! configured bounds. Fits animate from the current transform to a target one
//! with an ease-out cubic curve; the engine steps the animation once per frame.

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use crate::consts::{DEFAULT_MAX_SCALE, DEFAULT_MIN_SCALE, FIT_ANIMATION_MS};

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    /// Bounds of a circle.
    #[must_use]
    pub fn around_circle(center: Point, r: f64) -> Self {
        Self { min_x: center.x - r, min_y: center.y - r, max_x: center.x + r, max_y: center.y + r }
    }

    /// Smallest box containing both `self` and `other`.
    #[must_use]
    pub fn union(self, other: BBox) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new((self.min_x + self.max_x) * 0.5, (self.min_y + self.max_y) * 0.5)
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite() && self.min_y.is_finite() && self.max_x.is_finite() && self.max_y.is_finite()
    }
}

/// A complete camera transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Transform {
    fn lerp(self, to: Transform, t: f64) -> Transform {
        Transform {
            scale: self.scale + (to.scale - self.scale) * t,
            tx: self.tx + (to.tx - self.tx) * t,
            ty: self.ty + (to.ty - self.ty) * t,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Animation {
    from: Transform,
    to: Transform,
    /// Set by the first animation step so callers need no clock to start one.
    start_ms: Option<f64>,
    duration_ms: f64,
}

/// Camera state for pan/zoom over the map.
#[derive(Debug, Clone)]
pub struct Camera {
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
    min_scale: f64,
    max_scale: f64,
    viewport_width: f64,
    viewport_height: f64,
    animation: Option<Animation>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::with_bounds(DEFAULT_MIN_SCALE, DEFAULT_MAX_SCALE)
    }
}

impl Camera {
    /// Identity camera with custom scale bounds.
    #[must_use]
    pub fn with_bounds(min_scale: f64, max_scale: f64) -> Self {
        Self {
            scale: 1.0_f64.clamp(min_scale, max_scale),
            tx: 0.0,
            ty: 0.0,
            min_scale,
            max_scale,
            viewport_width: 0.0,
            viewport_height: 0.0,
            animation: None,
        }
    }

    /// Update the surface size in CSS pixels.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport_width = width.max(0.0);
        self.viewport_height = height.max(0.0);
    }

    /// Surface size as `(width, height)`.
    #[must_use]
    pub fn viewport(&self) -> (f64, f64) {
        (self.viewport_width, self.viewport_height)
    }

    #[must_use]
    pub fn scale_bounds(&self) -> (f64, f64) {
        (self.min_scale, self.max_scale)
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        Transform { scale: self.scale, tx: self.tx, ty: self.ty }
    }

    /// Convert a screen-space point (CSS pixels) to world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point { x: (screen.x - self.tx) / self.scale, y: (screen.y - self.ty) / self.scale }
    }

    /// Convert a world-space point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point { x: world.x * self.scale + self.tx, y: world.y * self.scale + self.ty }
    }

    /// Convert a screen-space distance (pixels) to world-space distance.
    #[must_use]
    pub fn screen_dist_to_world(&self, screen_dist: f64) -> f64 {
        screen_dist / self.scale
    }

    fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }

    /// Pan by a screen-space delta. Interrupts any running animation.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        self.animation = None;
        self.tx += dx;
        self.ty += dy;
    }

    /// Multiply the scale by `factor` while keeping the world point under `screen` fixed.
    pub fn zoom_at(&mut self, factor: f64, screen: Point) {
        if !factor.is_finite() || factor <= 0.0 || !screen.is_finite() {
            return;
        }
        self.animation = None;
        let anchor = self.screen_to_world(screen);
        self.scale = self.clamp_scale(self.scale * factor);
        self.tx = screen.x - anchor.x * self.scale;
        self.ty = screen.y - anchor.y * self.scale;
    }

    /// Set an absolute scale, anchored at the viewport center.
    pub fn set_scale_centered(&mut self, scale: f64) {
        if !scale.is_finite() || scale <= 0.0 {
            return;
        }
        let center = self.viewport_center();
        self.zoom_at(scale / self.scale, center);
    }

    /// Translate so `world` sits at the viewport center, keeping the scale.
    pub fn center_on(&mut self, world: Point) {
        if !world.is_finite() {
            return;
        }
        self.animation = None;
        let center = self.viewport_center();
        self.tx = center.x - world.x * self.scale;
        self.ty = center.y - world.y * self.scale;
    }

    /// Back to the identity transform.
    pub fn reset(&mut self) {
        self.animation = None;
        self.scale = self.clamp_scale(1.0);
        self.tx = 0.0;
        self.ty = 0.0;
    }

    /// Start animating toward the transform that fits `bbox` into the viewport.
    ///
    /// `padding_ratio` is added on every side, relative to the box size.
    /// Returns the target transform, or `None` when there is nothing to fit
    /// (no box, non-finite box, or an unsized viewport).
    pub fn fit_to_bbox(&mut self, bbox: Option<BBox>, padding_ratio: f64) -> Option<Transform> {
        let bbox = bbox.filter(BBox::is_finite)?;
        if self.viewport_width <= 0.0 || self.viewport_height <= 0.0 {
            return None;
        }

        let pad = 1.0 + 2.0 * padding_ratio.max(0.0);
        let padded_w = (bbox.width() * pad).max(1.0);
        let padded_h = (bbox.height() * pad).max(1.0);
        let scale = self.clamp_scale((self.viewport_width / padded_w).min(self.viewport_height / padded_h));
        let center = bbox.center();
        let target = Transform {
            scale,
            tx: self.viewport_width * 0.5 - center.x * scale,
            ty: self.viewport_height * 0.5 - center.y * scale,
        };

        self.animation =
            Some(Animation { from: self.transform(), to: target, start_ms: None, duration_ms: FIT_ANIMATION_MS });
        Some(target)
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Advance the running animation to `now_ms`.
    ///
    /// Returns `true` when the transform changed and a repaint is needed. The
    /// final step lands exactly on the target and ends the animation.
    pub fn step_animation(&mut self, now_ms: f64) -> bool {
        let Some(anim) = self.animation.as_mut() else {
            return false;
        };
        let start = *anim.start_ms.get_or_insert(now_ms);
        let t = if anim.duration_ms > 0.0 { ((now_ms - start) / anim.duration_ms).clamp(0.0, 1.0) } else { 1.0 };
        let done = t >= 1.0;
        let current = if done { anim.to } else { anim.from.lerp(anim.to, ease_out_cubic(t)) };
        if done {
            self.animation = None;
        }
        self.scale = current.scale;
        self.tx = current.tx;
        self.ty = current.ty;
        true
    }

    fn viewport_center(&self) -> Point {
        Point::new(self.viewport_width * 0.5, self.viewport_height * 0.5)
    }
}

/// Ease-out cubic for smooth deceleration.
#[must_use]
pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}
