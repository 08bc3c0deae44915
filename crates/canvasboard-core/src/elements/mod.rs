//! Element definitions for the board.
//!
//! An [`Element`] pairs backend bookkeeping (id, z-order, version, authorship)
//! with a [`Properties`] payload whose variant is the element's type. Geometry
//! (`bounds`, `hit_test`) and drawing ([`render`]) dispatch over that closed set.

mod color;
mod props;
mod render;

pub use color::Color;
pub use props::{
    ConnectorProps, FileProps, GroupProps, ImageProps, Properties, ShapeKind, ShapeProps,
    StickyProps, StrokePath, StrokeStyle, TextAlign, TextProps, default_properties, default_shape,
    required_fields, validate,
};
pub use render::{ImageState, Surface, TextStyle, format_file_size, render, wrap_text};

use chrono::{DateTime, Utc};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for an element.
pub type ElementId = Uuid;
/// Opaque user identifier supplied by the authentication layer.
pub type UserId = String;
/// Opaque board identifier.
pub type BoardId = String;

/// Extra slack around line-like elements when hit-testing, in world units.
pub const LINE_HIT_TOLERANCE: f64 = 5.0;

/// Errors raised while building or validating elements.
#[derive(Debug, Error)]
pub enum ElementError {
    #[error("missing required property `{field}` for {element_type} element")]
    MissingField {
        element_type: ElementType,
        field: &'static str,
    },
    #[error("invalid properties: {0}")]
    InvalidProperties(String),
}

pub type ElementResult<T> = Result<T, ElementError>;

/// The closed set of element variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Shape,
    Text,
    Sticky,
    Image,
    File,
    Connector,
    Group,
}

impl ElementType {
    pub const ALL: [ElementType; 7] = [
        ElementType::Shape,
        ElementType::Text,
        ElementType::Sticky,
        ElementType::Image,
        ElementType::File,
        ElementType::Connector,
        ElementType::Group,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Shape => "shape",
            ElementType::Text => "text",
            ElementType::Sticky => "sticky",
            ElementType::Image => "image",
            ElementType::File => "file",
            ElementType::Connector => "connector",
            ElementType::Group => "group",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One visual object on a board.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ElementRecord")]
pub struct Element {
    pub id: ElementId,
    pub board_id: Option<BoardId>,
    pub properties: Properties,
    pub z_index: i64,
    pub group_id: Option<ElementId>,
    pub version: u64,
    pub created_by: Option<UserId>,
    pub updated_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Element {
    /// Create a fresh element at version 1.
    pub fn new(properties: Properties, z_index: i64, created_by: Option<UserId>) -> Self {
        Self::with_id(Uuid::new_v4(), properties, z_index, created_by)
    }

    pub fn with_id(
        id: ElementId,
        properties: Properties,
        z_index: i64,
        created_by: Option<UserId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            board_id: None,
            properties,
            z_index,
            group_id: None,
            version: 1,
            updated_by: created_by.clone(),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.properties.element_type()
    }

    pub fn is_group(&self) -> bool {
        matches!(self.properties, Properties::Group(_))
    }

    pub fn as_group(&self) -> Option<&GroupProps> {
        match &self.properties {
            Properties::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn center(&self) -> Point {
        bounds(self).center()
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.properties.translate(delta);
    }

    /// Stamp a local modification.
    pub fn touch(&mut self, user: Option<&UserId>) {
        self.updated_at = Utc::now();
        if let Some(user) = user {
            self.updated_by = Some(user.clone());
        }
    }
}

/// Wire shape of an element: `properties` is an open JSON object keyed by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRecord {
    pub id: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<BoardId>,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub z_index: i64,
    #[serde(default)]
    pub group_id: Option<ElementId>,
    #[serde(default = "ElementRecord::initial_version")]
    pub version: u64,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub updated_by: Option<UserId>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ElementRecord {
    fn initial_version() -> u64 {
        1
    }
}

impl TryFrom<ElementRecord> for Element {
    type Error = ElementError;

    fn try_from(record: ElementRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            board_id: record.board_id,
            properties: Properties::from_map(record.element_type, record.properties)?,
            z_index: record.z_index,
            group_id: record.group_id,
            version: record.version,
            created_by: record.created_by,
            updated_by: record.updated_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Serialize)]
struct ElementWire<'a> {
    id: &'a ElementId,
    #[serde(skip_serializing_if = "Option::is_none")]
    board_id: Option<&'a BoardId>,
    #[serde(rename = "type")]
    element_type: ElementType,
    properties: &'a Properties,
    z_index: i64,
    group_id: &'a Option<ElementId>,
    version: u64,
    created_by: &'a Option<UserId>,
    updated_by: &'a Option<UserId>,
    created_at: &'a DateTime<Utc>,
    updated_at: &'a DateTime<Utc>,
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ElementWire {
            id: &self.id,
            board_id: self.board_id.as_ref(),
            element_type: self.element_type(),
            properties: &self.properties,
            z_index: self.z_index,
            group_id: &self.group_id,
            version: self.version,
            created_by: &self.created_by,
            updated_by: &self.updated_by,
            created_at: &self.created_at,
            updated_at: &self.updated_at,
        }
        .serialize(serializer)
    }
}

/// Axis-aligned box of an element.
///
/// Line-like elements use their explicit endpoints when present; everything
/// else uses the stored `{x, y, width, height}`.
pub fn bounds(element: &Element) -> Rect {
    match element.properties.endpoints() {
        Some((start, end)) => Rect::from_points(start, end),
        None => element.properties.frame(),
    }
}

/// Union of the bounds of several elements.
pub fn union_bounds<'a>(elements: impl IntoIterator<Item = &'a Element>) -> Option<Rect> {
    elements
        .into_iter()
        .map(bounds)
        .reduce(|acc, b| acc.union(b))
}

/// Rotate `point` around `center` by `degrees`.
pub fn rotate_about(point: Point, center: Point, degrees: f64) -> Point {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    Point::new(center.x + dx * cos - dy * sin, center.y + dx * sin + dy * cos)
}

/// Whether `point` (world coordinates) lies on the element.
///
/// Rotated elements are tested by rotating the point back by `-rotation`
/// about the element's centre and checking the unrotated box.
pub fn hit_test(point: Point, element: &Element) -> bool {
    let rect = bounds(element);
    if let Some((start, end)) = element.properties.endpoints() {
        return rect.inflate(LINE_HIT_TOLERANCE, LINE_HIT_TOLERANCE).contains(point)
            && point_to_segment_dist(point, start, end) <= LINE_HIT_TOLERANCE;
    }
    let rotation = element.properties.rotation();
    let local = if rotation != 0.0 {
        rotate_about(point, rect.center(), -rotation)
    } else {
        point
    };
    local.x >= rect.x0 && local.x <= rect.x1 && local.y >= rect.y0 && local.y <= rect.y1
}

/// Distance from a point to a line segment.
pub(crate) fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let ap = point - a;
    let len_sq = ab.hypot2();
    if len_sq < f64::EPSILON {
        return ap.hypot();
    }
    let t = (ap.dot(ab) / len_sq).clamp(0.0, 1.0);
    let projection = a + ab * t;
    (point - projection).hypot()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rect_element(x: f64, y: f64, w: f64, h: f64, rotation: f64) -> Element {
        let mut shape = default_shape(ShapeKind::Rectangle);
        shape.x = x;
        shape.y = y;
        shape.width = w;
        shape.height = h;
        shape.rotation = rotation;
        Element::new(Properties::Shape(shape), 0, None)
    }

    #[test]
    fn test_new_element_starts_at_version_one() {
        let element = Element::new(default_properties(ElementType::Text), 3, Some("u1".into()));
        assert_eq!(element.version, 1);
        assert_eq!(element.z_index, 3);
        assert_eq!(element.element_type(), ElementType::Text);
        assert_eq!(element.updated_by.as_deref(), Some("u1"));
    }

    #[test]
    fn test_wire_roundtrip_keeps_type_and_properties() {
        let element = rect_element(1.0, 2.0, 3.0, 4.0, 0.0);
        let value = serde_json::to_value(&element).unwrap();
        assert_eq!(value["type"], json!("shape"));
        assert_eq!(value["properties"]["shape"], json!("rectangle"));
        assert_eq!(value["properties"]["fillColor"], json!("#ffffff"));
        assert!(value.get("board_id").is_none());
        let back: Element = serde_json::from_value(value).unwrap();
        assert_eq!(back, element);
    }

    #[test]
    fn test_invalid_record_is_rejected() {
        let raw = json!({
            "id": Uuid::new_v4(),
            "type": "sticky",
            "properties": { "x": 0, "y": 0, "width": 10, "height": 10 },
        });
        assert!(serde_json::from_value::<Element>(raw).is_err());
    }

    #[test]
    fn test_record_defaults() {
        let raw = json!({
            "id": Uuid::new_v4(),
            "type": "image",
            "properties": { "x": 0, "y": 0, "width": 10, "height": 10 },
        });
        let element: Element = serde_json::from_value(raw).unwrap();
        assert_eq!(element.version, 1);
        assert_eq!(element.z_index, 0);
        assert!(element.group_id.is_none());
    }

    #[test]
    fn test_bounds_rect() {
        let element = rect_element(10.0, 20.0, 30.0, 40.0, 0.0);
        let b = bounds(&element);
        assert!((b.x0 - 10.0).abs() < f64::EPSILON);
        assert!((b.y1 - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bounds_line_uses_endpoints() {
        let mut shape = default_shape(ShapeKind::Line);
        shape.start_point = Some(Point::new(50.0, 10.0));
        shape.end_point = Some(Point::new(0.0, 30.0));
        let element = Element::new(Properties::Shape(shape), 0, None);
        let b = bounds(&element);
        assert!((b.x0 - 0.0).abs() < f64::EPSILON);
        assert!((b.width() - 50.0).abs() < f64::EPSILON);
        assert!((b.height() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bounds_line_without_endpoints_falls_back() {
        let shape = default_shape(ShapeKind::Line);
        let element = Element::new(Properties::Shape(shape), 0, None);
        let b = bounds(&element);
        assert!((b.width() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_test_unrotated() {
        let element = rect_element(0.0, 0.0, 100.0, 50.0, 0.0);
        assert!(hit_test(Point::new(50.0, 25.0), &element));
        assert!(hit_test(Point::new(100.0, 50.0), &element));
        assert!(!hit_test(Point::new(101.0, 25.0), &element));
    }

    #[test]
    fn test_hit_test_rotated_90() {
        // 100x20 bar centred at (50, 10); rotated it spans x 40..60, y -40..60.
        let element = rect_element(0.0, 0.0, 100.0, 20.0, 90.0);
        assert!(hit_test(Point::new(50.0, 50.0), &element));
        assert!(!hit_test(Point::new(5.0, 10.0), &element));
    }

    #[test]
    fn test_hit_test_rotated_180_matches_reflection() {
        let rotated = rect_element(0.0, 0.0, 80.0, 30.0, 180.0);
        let plain = rect_element(0.0, 0.0, 80.0, 30.0, 0.0);
        let center = Point::new(40.0, 15.0);
        let probes = [
            Point::new(10.0, 5.0),
            Point::new(79.0, 29.0),
            Point::new(-5.0, 12.0),
            Point::new(40.0, 31.5),
            Point::new(60.0, 20.0),
        ];
        for p in probes {
            let reflected = Point::new(2.0 * center.x - p.x, 2.0 * center.y - p.y);
            assert_eq!(hit_test(p, &rotated), hit_test(reflected, &plain), "probe {p:?}");
        }
    }

    #[test]
    fn test_hit_test_connector_segment() {
        let element = Element::new(default_properties(ElementType::Connector), 0, None);
        assert!(hit_test(Point::new(100.0, 3.0), &element));
        assert!(!hit_test(Point::new(100.0, 20.0), &element));
    }

    #[test]
    fn test_union_bounds() {
        let a = rect_element(0.0, 0.0, 10.0, 10.0, 0.0);
        let b = rect_element(20.0, 5.0, 10.0, 10.0, 0.0);
        let u = union_bounds([&a, &b]).unwrap();
        assert!((u.width() - 30.0).abs() < f64::EPSILON);
        assert!((u.height() - 15.0).abs() < f64::EPSILON);
        assert!(union_bounds(std::iter::empty::<&Element>()).is_none());
    }

    #[test]
    fn test_point_to_segment_dist() {
        let d = point_to_segment_dist(Point::new(5.0, 5.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d - 5.0).abs() < f64::EPSILON);
        let d = point_to_segment_dist(Point::new(3.0, 4.0), Point::ZERO, Point::ZERO);
        assert!((d - 5.0).abs() < f64::EPSILON);
    }
}
