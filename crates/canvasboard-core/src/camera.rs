//! Camera module for pan/zoom transforms.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Zoom level that corresponds to "100%".
pub const DEFAULT_ZOOM: f64 = 1.0;
pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 2.0;
/// Pan offsets beyond this magnitude are treated as corrupt.
pub const PAN_LIMIT: f64 = 1e7;

/// Camera manages the view transform for the board.
///
/// `screen = world * zoom + offset`. The inverse is used for hit-testing and
/// element placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Current translation offset (pan), in screen pixels
    pub offset: Vec2,
    /// Current zoom level
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: DEFAULT_ZOOM,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// World to screen transform, for rendering.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Screen to world transform, for input handling.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Convert a screen distance to world units.
    pub fn screen_len_to_world(&self, len: f64) -> f64 {
        len / self.zoom
    }

    /// Pan the camera by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
        self.sanitize();
    }

    /// Zoom by `factor`, keeping the world point under `screen_point` fixed.
    ///
    /// Returns `false` if the zoom was already at the clamp limit.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) -> bool {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return false;
        }
        let world_point = self.screen_to_world(screen_point);
        self.zoom = new_zoom;
        self.offset = Vec2::new(
            screen_point.x - world_point.x * new_zoom,
            screen_point.y - world_point.y * new_zoom,
        );
        self.sanitize();
        true
    }

    /// Reset camera to default position and zoom.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = DEFAULT_ZOOM;
    }

    /// Pan so `world_point` sits at the centre of the viewport.
    pub fn center_on(&mut self, world_point: Point, viewport: Size) {
        self.offset = Vec2::new(
            viewport.width / 2.0 - world_point.x * self.zoom,
            viewport.height / 2.0 - world_point.y * self.zoom,
        );
        self.sanitize();
    }

    /// Fit the camera to show the given bounding box.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.reset();
            return;
        }

        let padded_viewport = Size::new(
            (viewport.width - padding * 2.0).max(1.0),
            (viewport.height - padding * 2.0).max(1.0),
        );

        let scale_x = padded_viewport.width / bounds.width();
        let scale_y = padded_viewport.height / bounds.height();
        self.zoom = scale_x.min(scale_y).clamp(self.min_zoom, self.max_zoom);
        self.center_on(bounds.center(), viewport);
    }

    /// Reset to the default view if pan or zoom became non-finite or absurd.
    ///
    /// Returns `true` when a reset happened.
    pub fn sanitize(&mut self) -> bool {
        let bad_offset = !self.offset.x.is_finite()
            || !self.offset.y.is_finite()
            || self.offset.x.abs() > PAN_LIMIT
            || self.offset.y.abs() > PAN_LIMIT;
        let bad_zoom = !self.zoom.is_finite() || self.zoom <= 0.0;
        if bad_offset || bad_zoom {
            log::warn!(
                "camera reset after invalid transform: offset={:?} zoom={}",
                self.offset,
                self.zoom
            );
            self.reset();
            return true;
        }
        false
    }

    /// World-space rectangle visible in a viewport of the given size.
    pub fn visible_world_rect(&self, viewport: Size) -> Rect {
        let top_left = self.screen_to_world(Point::ZERO);
        let bottom_right = self.screen_to_world(Point::new(viewport.width, viewport.height));
        Rect::from_points(top_left, bottom_right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera() {
        let camera = Camera::new();
        assert_eq!(camera.offset, Vec2::ZERO);
        assert!((camera.zoom - DEFAULT_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_world_with_offset() {
        let mut camera = Camera::new();
        camera.offset = Vec2::new(50.0, 100.0);
        let world = camera.screen_to_world(Point::new(100.0, 200.0));
        assert!((world.x - 50.0).abs() < f64::EPSILON);
        assert!((world.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_world_with_zoom() {
        let mut camera = Camera::new();
        camera.zoom = 2.0;
        let world = camera.screen_to_world(Point::new(100.0, 200.0));
        assert!((world.x - 50.0).abs() < f64::EPSILON);
        assert!((world.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut camera = Camera::new();
        camera.offset = Vec2::new(30.0, -20.0);
        camera.zoom = 1.5;

        let original = Point::new(123.0, 456.0);
        let back = camera.world_to_screen(camera.screen_to_world(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_keeps_anchor_fixed() {
        let mut camera = Camera::new();
        camera.offset = Vec2::new(12.0, -7.0);
        let anchor = Point::new(320.0, 240.0);
        let before = camera.screen_to_world(anchor);
        camera.zoom_at(anchor, 1.15);
        let after = camera.screen_to_world(anchor);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_in_then_out_restores_view() {
        let mut camera = Camera::new();
        camera.offset = Vec2::new(40.0, 25.0);
        let original = camera.clone();
        let anchor = Point::new(200.0, 150.0);
        camera.zoom_at(anchor, 1.25);
        camera.zoom_at(anchor, 1.0 / 1.25);
        assert!((camera.zoom - original.zoom).abs() < 1e-9);
        assert!((camera.offset.x - original.offset.x).abs() < 1e-9);
        assert!((camera.offset.y - original.offset.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_clamp() {
        let mut camera = Camera::new();
        camera.zoom_at(Point::ZERO, 0.001);
        assert!((camera.zoom - MIN_ZOOM).abs() < f64::EPSILON);
        assert!(!camera.zoom_at(Point::ZERO, 0.5));

        camera.zoom_at(Point::ZERO, 1000.0);
        assert!((camera.zoom - MAX_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pan() {
        let mut camera = Camera::new();
        camera.pan(Vec2::new(10.0, 20.0));
        assert!((camera.offset.x - 10.0).abs() < f64::EPSILON);
        assert!((camera.offset.y - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_finite_pan_resets() {
        let mut camera = Camera::new();
        camera.zoom = 1.5;
        camera.pan(Vec2::new(f64::NAN, 0.0));
        assert_eq!(camera, Camera::default());
    }

    #[test]
    fn test_pan_beyond_limit_resets() {
        let mut camera = Camera::new();
        camera.pan(Vec2::new(PAN_LIMIT * 2.0, 0.0));
        assert_eq!(camera.offset, Vec2::ZERO);
    }

    #[test]
    fn test_center_on() {
        let mut camera = Camera::new();
        camera.center_on(Point::new(100.0, 50.0), Size::new(800.0, 600.0));
        let screen = camera.world_to_screen(Point::new(100.0, 50.0));
        assert!((screen.x - 400.0).abs() < f64::EPSILON);
        assert!((screen.y - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_to_bounds_clamps_zoom() {
        let mut camera = Camera::new();
        let content = Rect::new(0.0, 0.0, 10_000.0, 10_000.0);
        camera.fit_to_bounds(content, Size::new(800.0, 600.0), 50.0);
        assert!((camera.zoom - MIN_ZOOM).abs() < f64::EPSILON);
        camera.fit_to_bounds(Rect::ZERO, Size::new(800.0, 600.0), 50.0);
        assert_eq!(camera, Camera::default());
    }
}
