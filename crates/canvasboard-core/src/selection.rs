//! Resize handles for the selected element.

use crate::elements::{Element, ElementId, bounds};
use crate::input::CursorIcon;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Handle hit radius in screen pixels.
pub const HANDLE_RADIUS: f64 = 8.0;
/// Smallest width or height a resize may produce, in world units.
pub const MIN_SIZE: f64 = 10.0;

/// Which part of the box a handle drags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    #[serde(rename = "nw")]
    NorthWest,
    #[serde(rename = "ne")]
    NorthEast,
    #[serde(rename = "sw")]
    SouthWest,
    #[serde(rename = "se")]
    SouthEast,
    #[serde(rename = "n")]
    North,
    #[serde(rename = "s")]
    South,
    #[serde(rename = "w")]
    West,
    #[serde(rename = "e")]
    East,
}

impl HandleKind {
    /// Corners first so they win over edges on tiny boxes.
    pub const ALL: [HandleKind; 8] = [
        HandleKind::NorthWest,
        HandleKind::NorthEast,
        HandleKind::SouthWest,
        HandleKind::SouthEast,
        HandleKind::North,
        HandleKind::South,
        HandleKind::West,
        HandleKind::East,
    ];

    pub fn is_corner(self) -> bool {
        matches!(
            self,
            HandleKind::NorthWest
                | HandleKind::NorthEast
                | HandleKind::SouthWest
                | HandleKind::SouthEast
        )
    }

    fn moves_left(self) -> bool {
        matches!(self, HandleKind::NorthWest | HandleKind::SouthWest | HandleKind::West)
    }

    fn moves_right(self) -> bool {
        matches!(self, HandleKind::NorthEast | HandleKind::SouthEast | HandleKind::East)
    }

    fn moves_top(self) -> bool {
        matches!(self, HandleKind::NorthWest | HandleKind::NorthEast | HandleKind::North)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, HandleKind::SouthWest | HandleKind::SouthEast | HandleKind::South)
    }

    /// Position of this handle on `rect`.
    pub fn position(self, rect: Rect) -> Point {
        let c = rect.center();
        match self {
            HandleKind::NorthWest => Point::new(rect.x0, rect.y0),
            HandleKind::NorthEast => Point::new(rect.x1, rect.y0),
            HandleKind::SouthWest => Point::new(rect.x0, rect.y1),
            HandleKind::SouthEast => Point::new(rect.x1, rect.y1),
            HandleKind::North => Point::new(c.x, rect.y0),
            HandleKind::South => Point::new(c.x, rect.y1),
            HandleKind::West => Point::new(rect.x0, c.y),
            HandleKind::East => Point::new(rect.x1, c.y),
        }
    }

    pub fn cursor(self) -> CursorIcon {
        match self {
            HandleKind::NorthWest | HandleKind::SouthEast => CursorIcon::NwseResize,
            HandleKind::NorthEast | HandleKind::SouthWest => CursorIcon::NeswResize,
            HandleKind::North | HandleKind::South => CursorIcon::NsResize,
            HandleKind::West | HandleKind::East => CursorIcon::EwResize,
        }
    }
}

/// A resize handle with its world position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Check if a world point hits this handle. `tolerance` is in world units.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.position).hypot2() <= tolerance * tolerance
    }
}

/// The eight resize handles of an element's bounding box.
pub fn get_handles(element: &Element) -> Vec<Handle> {
    let rect = bounds(element);
    HandleKind::ALL
        .iter()
        .map(|kind| Handle::new(kind.position(rect), *kind))
        .collect()
}

/// First handle hit at `point`, if any.
pub fn hit_test_handles(element: &Element, point: Point, tolerance: f64) -> Option<HandleKind> {
    get_handles(element)
        .into_iter()
        .find(|h| h.hit_test(point, tolerance))
        .map(|h| h.kind)
}

/// Rectangle produced by dragging `handle` of `original` by `delta`.
///
/// Corner handles move two edges, edge handles one. Width and height never
/// drop below [`MIN_SIZE`]; when clamped the opposite edge stays put.
pub fn resize_rect(original: Rect, handle: HandleKind, delta: Vec2) -> Rect {
    let (mut x0, mut y0, mut x1, mut y1) = (original.x0, original.y0, original.x1, original.y1);
    if handle.moves_left() {
        x0 = (x0 + delta.x).min(x1 - MIN_SIZE);
    }
    if handle.moves_right() {
        x1 = (x1 + delta.x).max(x0 + MIN_SIZE);
    }
    if handle.moves_top() {
        y0 = (y0 + delta.y).min(y1 - MIN_SIZE);
    }
    if handle.moves_bottom() {
        y1 = (y1 + delta.y).max(y0 + MIN_SIZE);
    }
    if x1 - x0 < MIN_SIZE {
        x1 = x0 + MIN_SIZE;
    }
    if y1 - y0 < MIN_SIZE {
        y1 = y0 + MIN_SIZE;
    }
    Rect::new(x0, y0, x1, y1)
}

/// State of an active resize.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeState {
    pub element_id: ElementId,
    pub handle: HandleKind,
    /// Pointer position at press, world coordinates.
    pub start_point: Point,
    /// Box before the resize started.
    pub original: Rect,
}

impl ResizeState {
    pub fn new(
        element_id: ElementId,
        handle: HandleKind,
        start_point: Point,
        original: Rect,
    ) -> Self {
        Self {
            element_id,
            handle,
            start_point,
            original,
        }
    }

    /// Box for the pointer at `point`.
    pub fn rect_at(&self, point: Point) -> Rect {
        resize_rect(self.original, self.handle, point - self.start_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Properties, ShapeKind, default_shape};

    fn element(x: f64, y: f64, w: f64, h: f64) -> Element {
        let mut shape = default_shape(ShapeKind::Rectangle);
        shape.x = x;
        shape.y = y;
        shape.width = w;
        shape.height = h;
        Element::new(Properties::Shape(shape), 0, None)
    }

    fn assert_rect(r: Rect, x: f64, y: f64, w: f64, h: f64) {
        assert!((r.x0 - x).abs() < 1e-9, "x {} != {x}", r.x0);
        assert!((r.y0 - y).abs() < 1e-9, "y {} != {y}", r.y0);
        assert!((r.width() - w).abs() < 1e-9, "w {} != {w}", r.width());
        assert!((r.height() - h).abs() < 1e-9, "h {} != {h}", r.height());
    }

    #[test]
    fn test_eight_handles() {
        let handles = get_handles(&element(0.0, 0.0, 100.0, 50.0));
        assert_eq!(handles.len(), 8);
        let east = handles.iter().find(|h| h.kind == HandleKind::East).unwrap();
        assert_eq!(east.position, Point::new(100.0, 25.0));
    }

    #[test]
    fn test_hit_test_handles() {
        let el = element(0.0, 0.0, 100.0, 50.0);
        let corner = hit_test_handles(&el, Point::new(103.0, 52.0), 8.0);
        assert_eq!(corner, Some(HandleKind::SouthEast));
        assert_eq!(hit_test_handles(&el, Point::new(50.0, -4.0), 8.0), Some(HandleKind::North));
        assert_eq!(hit_test_handles(&el, Point::new(50.0, 25.0), 8.0), None);
        // Tolerance scales with zoom: 8px at zoom 2 is 4 world units.
        assert_eq!(hit_test_handles(&el, Point::new(106.0, 50.0), 4.0), None);
    }

    #[test]
    fn test_corner_moves_two_edges() {
        let r = Rect::new(10.0, 10.0, 110.0, 60.0);
        let d = Vec2::new(20.0, 10.0);
        let nw = Vec2::new(5.0, -5.0);
        assert_rect(resize_rect(r, HandleKind::NorthWest, nw), 15.0, 5.0, 95.0, 55.0);
        assert_rect(resize_rect(r, HandleKind::SouthEast, d), 10.0, 10.0, 120.0, 60.0);
        assert_rect(resize_rect(r, HandleKind::NorthEast, d), 10.0, 20.0, 120.0, 40.0);
        assert_rect(resize_rect(r, HandleKind::SouthWest, d), 30.0, 10.0, 80.0, 60.0);
    }

    #[test]
    fn test_edge_moves_one_edge() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0);
        let d = Vec2::new(30.0, 20.0);
        assert_rect(resize_rect(r, HandleKind::North, d), 0.0, 20.0, 100.0, 80.0);
        assert_rect(resize_rect(r, HandleKind::East, d), 0.0, 0.0, 130.0, 100.0);
        let up = Vec2::new(30.0, -20.0);
        assert_rect(resize_rect(r, HandleKind::South, up), 0.0, 0.0, 100.0, 80.0);
        let left = Vec2::new(-30.0, 20.0);
        assert_rect(resize_rect(r, HandleKind::West, left), -30.0, 0.0, 130.0, 100.0);
    }

    #[test]
    fn test_resize_clamps_to_min_size() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0);
        let shrunk = resize_rect(r, HandleKind::SouthEast, Vec2::new(-500.0, -500.0));
        assert_rect(shrunk, 0.0, 0.0, MIN_SIZE, MIN_SIZE);
        let shrunk = resize_rect(r, HandleKind::NorthWest, Vec2::new(500.0, 500.0));
        assert_rect(shrunk, 90.0, 90.0, MIN_SIZE, MIN_SIZE);
    }

    #[test]
    fn test_resize_state_tracks_pointer() {
        let el = element(0.0, 0.0, 100.0, 100.0);
        let state = ResizeState::new(el.id, HandleKind::East, Point::new(100.0, 50.0), bounds(&el));
        assert_rect(state.rect_at(Point::new(150.0, 80.0)), 0.0, 0.0, 150.0, 100.0);
    }

    #[test]
    fn test_cursor_for_handles() {
        assert_eq!(HandleKind::NorthWest.cursor(), CursorIcon::NwseResize);
        assert_eq!(HandleKind::SouthWest.cursor(), CursorIcon::NeswResize);
        assert_eq!(HandleKind::North.cursor(), CursorIcon::NsResize);
        assert_eq!(HandleKind::East.cursor(), CursorIcon::EwResize);
    }
}
