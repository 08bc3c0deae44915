//! Per-variant property payloads and the required-field contract.

use super::color::Color;
use super::{ElementError, ElementId, ElementResult, ElementType};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sub-kind of a `shape` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Circle,
    Triangle,
    Star,
    Line,
    Arrow,
    Drawing,
}

impl ShapeKind {
    /// Whether the shape is defined by two endpoints rather than a box.
    pub fn is_two_point(self) -> bool {
        matches!(self, ShapeKind::Line | ShapeKind::Arrow)
    }
}

/// Dash pattern for strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl StrokeStyle {
    pub fn dashes(self) -> &'static [f64] {
        match self {
            StrokeStyle::Solid => &[],
            StrokeStyle::Dashed => &[5.0, 5.0],
            StrokeStyle::Dotted => &[2.0, 2.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

fn black() -> Color {
    Color::black()
}

fn white() -> Color {
    Color::white()
}

fn transparent() -> Color {
    Color::transparent()
}

fn stroke_width() -> f64 {
    2.0
}

fn yes() -> bool {
    true
}

/// One freehand stroke in world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokePath {
    pub points: Vec<Point>,
    #[serde(default = "black")]
    pub stroke_color: Color,
    #[serde(default = "stroke_width")]
    pub stroke_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeProps {
    pub shape: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "white")]
    pub fill_color: Color,
    #[serde(default = "black")]
    pub stroke_color: Color,
    #[serde(default = "stroke_width")]
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_point: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_point: Option<Point>,
    /// Freehand strokes, only meaningful for [`ShapeKind::Drawing`].
    #[serde(default)]
    pub paths: Vec<StrokePath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProps {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    pub text: String,
    #[serde(default = "TextProps::default_font_size")]
    pub font_size: f64,
    #[serde(default = "TextProps::default_font_family")]
    pub font_family: String,
    #[serde(default = "black")]
    pub color: Color,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub align: TextAlign,
}

impl TextProps {
    fn default_font_size() -> f64 {
        16.0
    }

    fn default_font_family() -> String {
        "Arial".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyProps {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    pub text: String,
    #[serde(default = "StickyProps::default_background")]
    pub background_color: Color,
    #[serde(default = "black")]
    pub text_color: Color,
    #[serde(default = "StickyProps::default_font_size")]
    pub font_size: f64,
}

impl StickyProps {
    fn default_background() -> Color {
        Color::rgb(0xff, 0xff, 0x88)
    }

    fn default_font_size() -> f64 {
        14.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProps {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    /// URL handed out by the file storage service; empty until uploaded.
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub file_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProps {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub preview_url: Option<String>,
}

impl FileProps {
    /// Previews are only drawn for image files.
    pub fn has_image_preview(&self) -> bool {
        self.preview_url.is_some() && self.file_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorProps {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub start_element: Option<ElementId>,
    #[serde(default)]
    pub end_element: Option<ElementId>,
    pub start_point: Point,
    pub end_point: Point,
    #[serde(default = "black")]
    pub stroke_color: Color,
    #[serde(default = "stroke_width")]
    pub stroke_width: f64,
    #[serde(default)]
    pub stroke_style: StrokeStyle,
    #[serde(default)]
    pub arrow_start: bool,
    #[serde(default = "yes")]
    pub arrow_end: bool,
}

impl ConnectorProps {
    /// Recompute the stored box from the endpoints.
    pub fn sync_frame(&mut self) {
        let rect = Rect::from_points(self.start_point, self.end_point);
        self.x = rect.x0;
        self.y = rect.y0;
        self.width = rect.width();
        self.height = rect.height();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProps {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub children: Vec<ElementId>,
    #[serde(default = "transparent")]
    pub background_color: Color,
    #[serde(default = "GroupProps::default_border")]
    pub border_color: Color,
    #[serde(default = "GroupProps::default_border_width")]
    pub border_width: f64,
    #[serde(default = "GroupProps::default_border_style")]
    pub border_style: StrokeStyle,
}

impl GroupProps {
    fn default_border() -> Color {
        Color::rgb(0xcc, 0xcc, 0xcc)
    }

    fn default_border_width() -> f64 {
        1.0
    }

    fn default_border_style() -> StrokeStyle {
        StrokeStyle::Dashed
    }
}

/// Variant-specific element properties.
///
/// Serializes as the bare payload object; the variant travels separately as
/// the element's `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Properties {
    Shape(ShapeProps),
    Text(TextProps),
    Sticky(StickyProps),
    Image(ImageProps),
    File(FileProps),
    Connector(ConnectorProps),
    Group(GroupProps),
}

/// Required property keys for a variant. Drawings additionally need `paths`.
pub fn required_fields(
    element_type: ElementType,
    properties: &Map<String, Value>,
) -> Vec<&'static str> {
    let mut fields = match element_type {
        ElementType::Shape => vec!["shape", "x", "y", "width", "height"],
        ElementType::Text | ElementType::Sticky => vec!["x", "y", "width", "height", "text"],
        ElementType::Image | ElementType::File | ElementType::Group => {
            vec!["x", "y", "width", "height"]
        }
        ElementType::Connector => vec!["x", "y", "startPoint", "endPoint"],
    };
    if element_type == ElementType::Shape
        && properties.get("shape").and_then(Value::as_str) == Some("drawing")
    {
        fields.push("paths");
    }
    fields
}

/// Check that every required key for the variant is present and non-null.
pub fn validate(element_type: ElementType, properties: &Map<String, Value>) -> bool {
    first_missing(element_type, properties).is_none()
}

fn first_missing(
    element_type: ElementType,
    properties: &Map<String, Value>,
) -> Option<&'static str> {
    required_fields(element_type, properties)
        .into_iter()
        .find(|field| properties.get(*field).is_none_or(Value::is_null))
}

/// Default property set for a variant.
pub fn default_properties(element_type: ElementType) -> Properties {
    match element_type {
        ElementType::Shape => Properties::Shape(default_shape(ShapeKind::Rectangle)),
        ElementType::Text => Properties::Text(TextProps {
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 50.0,
            rotation: 0.0,
            text: "New Text".to_string(),
            font_size: TextProps::default_font_size(),
            font_family: TextProps::default_font_family(),
            color: Color::black(),
            bold: false,
            italic: false,
            underline: false,
            align: TextAlign::Left,
        }),
        ElementType::Sticky => Properties::Sticky(StickyProps {
            x: 100.0,
            y: 100.0,
            width: 150.0,
            height: 150.0,
            rotation: 0.0,
            text: "Sticky Note".to_string(),
            background_color: StickyProps::default_background(),
            text_color: Color::black(),
            font_size: StickyProps::default_font_size(),
        }),
        ElementType::Image => Properties::Image(ImageProps {
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 200.0,
            rotation: 0.0,
            src: String::new(),
            alt: "Image".to_string(),
            file_id: None,
        }),
        ElementType::File => Properties::File(FileProps {
            x: 100.0,
            y: 100.0,
            width: 120.0,
            height: 80.0,
            rotation: 0.0,
            file_id: None,
            file_name: String::new(),
            file_type: String::new(),
            file_size: 0,
            preview_url: None,
        }),
        ElementType::Connector => Properties::Connector(ConnectorProps {
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 2.0,
            start_element: None,
            end_element: None,
            start_point: Point::new(0.0, 0.0),
            end_point: Point::new(200.0, 0.0),
            stroke_color: Color::black(),
            stroke_width: 2.0,
            stroke_style: StrokeStyle::Solid,
            arrow_start: false,
            arrow_end: true,
        }),
        ElementType::Group => Properties::Group(GroupProps {
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 200.0,
            rotation: 0.0,
            children: Vec::new(),
            background_color: Color::transparent(),
            border_color: GroupProps::default_border(),
            border_width: GroupProps::default_border_width(),
            border_style: StrokeStyle::Dashed,
        }),
    }
}

/// Defaults for a shape of the given sub-kind.
pub fn default_shape(kind: ShapeKind) -> ShapeProps {
    let drawing = kind == ShapeKind::Drawing;
    ShapeProps {
        shape: kind,
        x: 100.0,
        y: 100.0,
        width: if drawing { 200.0 } else { 100.0 },
        height: if drawing { 200.0 } else { 100.0 },
        rotation: 0.0,
        fill_color: if drawing { Color::transparent() } else { Color::white() },
        stroke_color: Color::black(),
        stroke_width: 2.0,
        start_point: None,
        end_point: None,
        paths: Vec::new(),
    }
}

impl Properties {
    /// Validate a raw property bag and decode it into the variant payload.
    pub fn from_map(
        element_type: ElementType,
        properties: Map<String, Value>,
    ) -> ElementResult<Self> {
        if let Some(field) = first_missing(element_type, &properties) {
            return Err(ElementError::MissingField { element_type, field });
        }
        let value = Value::Object(properties);
        let decoded = match element_type {
            ElementType::Shape => serde_json::from_value(value).map(Properties::Shape),
            ElementType::Text => serde_json::from_value(value).map(Properties::Text),
            ElementType::Sticky => serde_json::from_value(value).map(Properties::Sticky),
            ElementType::Image => serde_json::from_value(value).map(Properties::Image),
            ElementType::File => serde_json::from_value(value).map(Properties::File),
            ElementType::Connector => serde_json::from_value(value).map(Properties::Connector),
            ElementType::Group => serde_json::from_value(value).map(Properties::Group),
        };
        decoded.map_err(|e| ElementError::InvalidProperties(format!("{element_type}: {e}")))
    }

    /// Encode the payload back into a property bag.
    pub fn to_map(&self) -> ElementResult<Map<String, Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ElementError::InvalidProperties(format!(
                "expected an object, got {other}"
            ))),
            Err(e) => Err(ElementError::InvalidProperties(e.to_string())),
        }
    }

    /// Merge a patch into a copy of these properties, re-validating the result.
    pub fn merged(&self, patch: &Map<String, Value>) -> ElementResult<Self> {
        let mut map = self.to_map()?;
        for (key, value) in patch {
            map.insert(key.clone(), value.clone());
        }
        Self::from_map(self.element_type(), map)
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Properties::Shape(_) => ElementType::Shape,
            Properties::Text(_) => ElementType::Text,
            Properties::Sticky(_) => ElementType::Sticky,
            Properties::Image(_) => ElementType::Image,
            Properties::File(_) => ElementType::File,
            Properties::Connector(_) => ElementType::Connector,
            Properties::Group(_) => ElementType::Group,
        }
    }

    /// Stored `{x, y, width, height}` box, ignoring rotation and endpoints.
    pub fn frame(&self) -> Rect {
        let (x, y, w, h) = match self {
            Properties::Shape(p) => (p.x, p.y, p.width, p.height),
            Properties::Text(p) => (p.x, p.y, p.width, p.height),
            Properties::Sticky(p) => (p.x, p.y, p.width, p.height),
            Properties::Image(p) => (p.x, p.y, p.width, p.height),
            Properties::File(p) => (p.x, p.y, p.width, p.height),
            Properties::Connector(p) => (p.x, p.y, p.width, p.height),
            Properties::Group(p) => (p.x, p.y, p.width, p.height),
        };
        Rect::new(x, y, x + w, y + h).abs()
    }

    /// Rotation in degrees. Connectors never rotate.
    pub fn rotation(&self) -> f64 {
        match self {
            Properties::Shape(p) => p.rotation,
            Properties::Text(p) => p.rotation,
            Properties::Sticky(p) => p.rotation,
            Properties::Image(p) => p.rotation,
            Properties::File(p) => p.rotation,
            Properties::Group(p) => p.rotation,
            Properties::Connector(_) => 0.0,
        }
    }

    /// Endpoints for line-like elements.
    pub fn endpoints(&self) -> Option<(Point, Point)> {
        match self {
            Properties::Shape(p) if p.shape.is_two_point() => match (p.start_point, p.end_point) {
                (Some(start), Some(end)) => Some((start, end)),
                _ => None,
            },
            Properties::Connector(p) => Some((p.start_point, p.end_point)),
            _ => None,
        }
    }

    /// Move the element by `delta`, including any absolute points it carries.
    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Properties::Shape(p) => {
                p.x += delta.x;
                p.y += delta.y;
                if let Some(start) = p.start_point.as_mut() {
                    *start += delta;
                }
                if let Some(end) = p.end_point.as_mut() {
                    *end += delta;
                }
                for path in &mut p.paths {
                    for point in &mut path.points {
                        *point += delta;
                    }
                }
            }
            Properties::Text(p) => {
                p.x += delta.x;
                p.y += delta.y;
            }
            Properties::Sticky(p) => {
                p.x += delta.x;
                p.y += delta.y;
            }
            Properties::Image(p) => {
                p.x += delta.x;
                p.y += delta.y;
            }
            Properties::File(p) => {
                p.x += delta.x;
                p.y += delta.y;
            }
            Properties::Connector(p) => {
                p.start_point += delta;
                p.end_point += delta;
                p.sync_frame();
            }
            Properties::Group(p) => {
                p.x += delta.x;
                p.y += delta.y;
            }
        }
    }

    /// Replace the stored box. Absolute points are remapped proportionally.
    pub fn set_frame(&mut self, frame: Rect) {
        let old = self.frame();
        let remap = |p: Point| -> Point {
            let fx = if old.width() > 0.0 { (p.x - old.x0) / old.width() } else { 0.0 };
            let fy = if old.height() > 0.0 { (p.y - old.y0) / old.height() } else { 0.0 };
            Point::new(frame.x0 + fx * frame.width(), frame.y0 + fy * frame.height())
        };
        match self {
            Properties::Shape(p) => {
                p.start_point = p.start_point.map(remap);
                p.end_point = p.end_point.map(remap);
                for path in &mut p.paths {
                    for point in &mut path.points {
                        *point = remap(*point);
                    }
                }
                (p.x, p.y, p.width, p.height) = (frame.x0, frame.y0, frame.width(), frame.height());
            }
            Properties::Text(p) => {
                (p.x, p.y, p.width, p.height) = (frame.x0, frame.y0, frame.width(), frame.height());
            }
            Properties::Sticky(p) => {
                (p.x, p.y, p.width, p.height) = (frame.x0, frame.y0, frame.width(), frame.height());
            }
            Properties::Image(p) => {
                (p.x, p.y, p.width, p.height) = (frame.x0, frame.y0, frame.width(), frame.height());
            }
            Properties::File(p) => {
                (p.x, p.y, p.width, p.height) = (frame.x0, frame.y0, frame.width(), frame.height());
            }
            Properties::Connector(p) => {
                p.start_point = remap(p.start_point);
                p.end_point = remap(p.end_point);
                p.sync_frame();
            }
            Properties::Group(p) => {
                (p.x, p.y, p.width, p.height) = (frame.x0, frame.y0, frame.width(), frame.height());
            }
        }
    }

    /// Editable text content, for text and sticky elements.
    pub fn text(&self) -> Option<&str> {
        match self {
            Properties::Text(p) => Some(&p.text),
            Properties::Sticky(p) => Some(&p.text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, text: String) -> bool {
        match self {
            Properties::Text(p) => p.text = text,
            Properties::Sticky(p) => p.text = text,
            _ => return false,
        }
        true
    }
}
