//! View transform for pan/zoom over the layout.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest allowed scale.
pub const MIN_SCALE: f64 = 0.1;
/// Largest allowed scale.
pub const MAX_SCALE: f64 = 5.0;

/// ViewTransform maps between screen pixels and world coordinates.
///
/// Drawing translates by the pan offset and then scales, so a world point `w`
/// lands on screen at `pan + w * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    /// Current zoom factor, always within `[min_scale, max_scale]`.
    scale: f64,
    /// Current translation offset in screen pixels.
    pan: Vec2,
    /// Minimum allowed scale.
    min_scale: f64,
    /// Maximum allowed scale.
    max_scale: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan: Vec2::ZERO,
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
        }
    }
}

impl ViewTransform {
    /// Create an identity transform with the default zoom bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transform with custom zoom bounds.
    ///
    /// Bounds are kept within `[MIN_SCALE, MAX_SCALE]` and ordered so that
    /// `min <= max`; non-finite bounds fall back to the defaults. The initial
    /// scale of 1.0 is clamped into them.
    pub fn with_bounds(min_scale: f64, max_scale: f64) -> Self {
        let bound = |value: f64, fallback: f64| {
            if value.is_finite() {
                value.clamp(MIN_SCALE, MAX_SCALE)
            } else {
                fallback
            }
        };
        let (a, b) = (bound(min_scale, MIN_SCALE), bound(max_scale, MAX_SCALE));
        let (min_scale, max_scale) = if a <= b { (a, b) } else { (b, a) };
        Self {
            scale: 1.0_f64.clamp(min_scale, max_scale),
            pan: Vec2::ZERO,
            min_scale,
            max_scale,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn pan_offset(&self) -> Vec2 {
        self.pan
    }

    pub fn min_scale(&self) -> f64 {
        self.min_scale
    }

    pub fn max_scale(&self) -> f64 {
        self.max_scale
    }

    /// Get the affine transform for rendering (world to screen).
    pub fn transform(&self) -> Affine {
        Affine::translate(self.pan) * Affine::scale(self.scale)
    }

    /// Get the inverse transform for input handling (screen to world).
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.scale) * Affine::translate(-self.pan)
    }

    /// Convert a screen point to world coordinates.
    pub fn to_world(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.pan.x) / self.scale,
            (screen.y - self.pan.y) / self.scale,
        )
    }

    /// Convert a world point to screen coordinates.
    pub fn to_screen(&self, world: Point) -> Point {
        Point::new(
            self.pan.x + world.x * self.scale,
            self.pan.y + world.y * self.scale,
        )
    }

    /// Map a world rectangle to the screen rectangle it covers.
    pub fn rect_to_screen(&self, world: Rect) -> Rect {
        Rect::from_points(self.to_screen(world.origin()), self.to_screen(Point::new(world.x1, world.y1)))
    }

    /// Pan by a delta in screen pixels.
    pub fn pan(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Zoom by `factor`, keeping the world point under `pivot` fixed.
    ///
    /// The requested scale is clamped first and the pan is solved from the
    /// clamped value, so the pivot stays put even when the factor overshoots.
    pub fn zoom_at(&mut self, factor: f64, pivot: Point) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let world = self.to_world(pivot);
        let new_scale = (self.scale * factor).clamp(self.min_scale, self.max_scale);
        self.pan = Vec2::new(pivot.x - world.x * new_scale, pivot.y - world.y * new_scale);
        self.scale = new_scale;
    }

    /// Replace scale and pan outright. Scale is clamped into the bounds.
    pub fn reset(&mut self, scale: f64, pan: Vec2) {
        self.scale = scale.clamp(self.min_scale, self.max_scale);
        self.pan = pan;
    }

    /// Center a world point in a viewport at the given scale.
    pub fn center_on(&mut self, world: Point, viewport: Size, scale: f64) {
        let scale = scale.clamp(self.min_scale, self.max_scale);
        let pan = Vec2::new(
            viewport.width / 2.0 - world.x * scale,
            viewport.height / 2.0 - world.y * scale,
        );
        self.reset(scale, pan);
    }

    /// Zoom level as a rounded percentage, for the zoom label.
    pub fn zoom_percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_point_eq(a: Point, b: Point) {
        assert!((a.x - b.x).abs() < EPS, "{a:?} != {b:?}");
        assert!((a.y - b.y).abs() < EPS, "{a:?} != {b:?}");
    }

    #[test]
    fn test_default_view() {
        let view = ViewTransform::new();
        assert_eq!(view.pan_offset(), Vec2::ZERO);
        assert!((view.scale() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_to_world_with_pan_and_scale() {
        let mut view = ViewTransform::new();
        view.reset(2.0, Vec2::new(50.0, 100.0));
        let world = view.to_world(Point::new(150.0, 300.0));
        assert_point_eq(world, Point::new(50.0, 100.0));
    }

    #[test]
    fn test_to_world_matches_inverse_affine() {
        let mut view = ViewTransform::new();
        view.reset(1.7, Vec2::new(-12.0, 33.0));
        let screen = Point::new(321.0, -45.0);
        assert_point_eq(view.to_world(screen), view.inverse_transform() * screen);
        let world = Point::new(10.0, 20.0);
        assert_point_eq(view.to_screen(world), view.transform() * world);
    }

    #[test]
    fn test_roundtrip_conversion() {
        for &(scale, px, py) in &[(0.1, 0.0, 0.0), (1.5, 30.0, -20.0), (5.0, -400.0, 250.0)] {
            let mut view = ViewTransform::new();
            view.reset(scale, Vec2::new(px, py));
            let original = Point::new(123.0, 456.0);
            assert_point_eq(view.to_world(view.to_screen(original)), original);
        }
    }

    #[test]
    fn test_zoom_keeps_pivot_fixed() {
        let mut view = ViewTransform::new();
        view.reset(1.3, Vec2::new(40.0, -10.0));
        let pivot = Point::new(200.0, 150.0);
        let before = view.to_world(pivot);
        view.zoom_at(1.1, pivot);
        assert_point_eq(view.to_world(pivot), before);
    }

    #[test]
    fn test_zoom_clamp_keeps_pivot_fixed() {
        let mut view = ViewTransform::new();
        view.reset(4.8, Vec2::new(10.0, 10.0));
        let pivot = Point::new(300.0, 200.0);
        let before = view.to_world(pivot);
        view.zoom_at(10.0, pivot);
        assert!((view.scale() - MAX_SCALE).abs() < f64::EPSILON);
        assert_point_eq(view.to_world(pivot), before);

        view.zoom_at(0.0001, pivot);
        assert!((view.scale() - MIN_SCALE).abs() < f64::EPSILON);
        assert_point_eq(view.to_world(pivot), before);
    }

    #[test]
    fn test_zoom_out_from_two_at_center() {
        let mut view = ViewTransform::new();
        view.reset(2.0, Vec2::ZERO);
        let center = Point::new(400.0, 300.0);
        let before = view.to_world(center);
        view.zoom_at(1.0 / 1.1, center);
        assert!((view.scale() - 1.818_181_818).abs() < 1e-6);
        assert_point_eq(view.to_world(center), before);
    }

    #[test]
    fn test_zoom_ignores_invalid_factor() {
        let mut view = ViewTransform::new();
        view.zoom_at(f64::NAN, Point::ZERO);
        view.zoom_at(-2.0, Point::ZERO);
        assert!((view.scale() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_custom_bounds_stay_within_fixed_range() {
        let mut view = ViewTransform::with_bounds(0.0, 50.0);
        assert!((view.min_scale() - MIN_SCALE).abs() < f64::EPSILON);
        assert!((view.max_scale() - MAX_SCALE).abs() < f64::EPSILON);
        for _ in 0..100 {
            view.zoom_at(0.5, Point::new(400.0, 300.0));
        }
        assert!((view.scale() - MIN_SCALE).abs() < 1e-12);
        for _ in 0..100 {
            view.zoom_at(2.0, Point::new(400.0, 300.0));
        }
        assert!((view.scale() - MAX_SCALE).abs() < 1e-12);

        let swapped = ViewTransform::with_bounds(3.0, f64::NAN);
        assert!((swapped.min_scale() - 3.0).abs() < f64::EPSILON);
        assert!((swapped.max_scale() - MAX_SCALE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pan() {
        let mut view = ViewTransform::new();
        view.pan(Vec2::new(10.0, 20.0));
        view.pan(Vec2::new(-4.0, 1.0));
        assert_eq!(view.pan_offset(), Vec2::new(6.0, 21.0));
    }

    #[test]
    fn test_center_on() {
        let mut view = ViewTransform::new();
        view.reset(3.0, Vec2::new(99.0, 99.0));
        view.center_on(Point::new(90.0, 30.0), Size::new(800.0, 600.0), 1.0);
        assert_point_eq(view.to_screen(Point::new(90.0, 30.0)), Point::new(400.0, 300.0));
        assert_eq!(view.zoom_percent(), 100);
    }
}
