//! Tool system for the board.

use crate::elements::{
    Color, ElementType, Properties, ShapeKind, StrokePath, default_properties, default_shape,
};
use crate::input::CursorIcon;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Two-point elements smaller than this in both axes are discarded.
pub const DRAW_THRESHOLD: f64 = 2.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Select,
    Rectangle,
    Circle,
    Triangle,
    Star,
    Line,
    Arrow,
    Connector,
    Drawing,
    Text,
    Sticky,
    Image,
    File,
    Eraser,
}

impl ToolKind {
    pub const ALL: [ToolKind; 14] = [
        ToolKind::Select,
        ToolKind::Rectangle,
        ToolKind::Circle,
        ToolKind::Triangle,
        ToolKind::Star,
        ToolKind::Line,
        ToolKind::Arrow,
        ToolKind::Connector,
        ToolKind::Drawing,
        ToolKind::Text,
        ToolKind::Sticky,
        ToolKind::Image,
        ToolKind::File,
        ToolKind::Eraser,
    ];

    /// Shape sub-kind produced by shape tools.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            ToolKind::Rectangle => Some(ShapeKind::Rectangle),
            ToolKind::Circle => Some(ShapeKind::Circle),
            ToolKind::Triangle => Some(ShapeKind::Triangle),
            ToolKind::Star => Some(ShapeKind::Star),
            ToolKind::Line => Some(ShapeKind::Line),
            ToolKind::Arrow => Some(ShapeKind::Arrow),
            ToolKind::Drawing => Some(ShapeKind::Drawing),
            _ => None,
        }
    }

    /// Line, arrow and connector: press for the start, release for the end.
    pub fn is_two_point(self) -> bool {
        matches!(self, ToolKind::Line | ToolKind::Arrow | ToolKind::Connector)
    }

    /// Tools that drop a default element centred on a single click.
    pub fn is_single_click(self) -> bool {
        matches!(
            self,
            ToolKind::Rectangle
                | ToolKind::Circle
                | ToolKind::Triangle
                | ToolKind::Star
                | ToolKind::Text
                | ToolKind::Sticky
                | ToolKind::Image
                | ToolKind::File
        )
    }

    /// Tools whose element needs an uploaded resource first.
    pub fn needs_upload(self) -> bool {
        matches!(self, ToolKind::Image | ToolKind::File)
    }

    pub fn cursor(self) -> CursorIcon {
        match self {
            ToolKind::Select => CursorIcon::Default,
            ToolKind::Eraser => CursorIcon::NotAllowed,
            ToolKind::Text => CursorIcon::Text,
            _ => CursorIcon::Crosshair,
        }
    }
}

/// Default properties for a single-click tool, centred on `point`.
pub fn properties_at(tool: ToolKind, point: Point) -> Option<Properties> {
    let mut properties = match tool {
        ToolKind::Rectangle | ToolKind::Circle | ToolKind::Triangle | ToolKind::Star => {
            Properties::Shape(default_shape(tool.shape_kind()?))
        }
        ToolKind::Text => default_properties(ElementType::Text),
        ToolKind::Sticky => default_properties(ElementType::Sticky),
        ToolKind::Image => default_properties(ElementType::Image),
        ToolKind::File => default_properties(ElementType::File),
        _ => return None,
    };
    let size = properties.frame().size();
    properties.set_frame(Rect::from_center_size(point, size));
    Some(properties)
}

/// Whether a two-point gesture is large enough to keep.
pub fn exceeds_threshold(start: Point, end: Point) -> bool {
    (end.x - start.x).abs() > DRAW_THRESHOLD || (end.y - start.y).abs() > DRAW_THRESHOLD
}

/// Properties for a line, arrow or connector from `start` to `end`, or
/// `None` if the gesture is below the draw threshold.
pub fn two_point_properties(tool: ToolKind, start: Point, end: Point) -> Option<Properties> {
    if !exceeds_threshold(start, end) {
        return None;
    }
    let frame = Rect::from_points(start, end);
    match tool {
        ToolKind::Line | ToolKind::Arrow => {
            let mut shape = default_shape(tool.shape_kind()?);
            shape.x = frame.x0;
            shape.y = frame.y0;
            shape.width = frame.width();
            shape.height = frame.height();
            shape.start_point = Some(start);
            shape.end_point = Some(end);
            Some(Properties::Shape(shape))
        }
        ToolKind::Connector => match default_properties(ElementType::Connector) {
            Properties::Connector(mut connector) => {
                connector.start_point = start;
                connector.end_point = end;
                connector.sync_frame();
                Some(Properties::Connector(connector))
            }
            _ => None,
        },
        _ => None,
    }
}

/// A freehand drawing whose box spans all points. Needs at least two points.
pub fn drawing_properties(
    points: &[Point],
    stroke_color: Color,
    stroke_width: f64,
) -> Option<Properties> {
    if points.len() < 2 {
        return None;
    }
    let frame = points
        .iter()
        .skip(1)
        .fold(Rect::from_points(points[0], points[0]), |acc, p| acc.union_pt(*p));
    let mut shape = default_shape(ShapeKind::Drawing);
    shape.x = frame.x0;
    shape.y = frame.y0;
    shape.width = frame.width();
    shape.height = frame.height();
    shape.stroke_color = stroke_color;
    shape.stroke_width = stroke_width;
    shape.paths = vec![StrokePath {
        points: points.to_vec(),
        stroke_color,
        stroke_width,
    }];
    Some(Properties::Shape(shape))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_classes_are_disjoint() {
        for tool in ToolKind::ALL {
            assert!(!(tool.is_two_point() && tool.is_single_click()), "{tool:?}");
        }
        assert!(ToolKind::Image.needs_upload());
        assert!(!ToolKind::Sticky.needs_upload());
    }

    #[test]
    fn test_properties_centred_on_click() {
        let props = properties_at(ToolKind::Sticky, Point::new(200.0, 100.0)).unwrap();
        let frame = props.frame();
        assert!((frame.x0 - 125.0).abs() < f64::EPSILON);
        assert!((frame.y0 - 25.0).abs() < f64::EPSILON);
        assert_eq!(props.element_type(), ElementType::Sticky);

        let star = properties_at(ToolKind::Star, Point::ZERO).unwrap();
        match star {
            Properties::Shape(s) => assert_eq!(s.shape, ShapeKind::Star),
            _ => panic!("expected a shape"),
        }
        assert!(properties_at(ToolKind::Line, Point::ZERO).is_none());
    }

    #[test]
    fn test_two_point_threshold() {
        let start = Point::new(10.0, 10.0);
        assert!(two_point_properties(ToolKind::Line, start, Point::new(11.0, 11.0)).is_none());
        let props = two_point_properties(ToolKind::Line, start, Point::new(10.0, 40.0)).unwrap();
        let frame = props.frame();
        assert!((frame.height() - 30.0).abs() < f64::EPSILON);
        assert!((frame.x0 - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_connector_from_points() {
        let start = Point::new(50.0, 20.0);
        let end = Point::new(10.0, 60.0);
        let props = two_point_properties(ToolKind::Connector, start, end).unwrap();
        match props {
            Properties::Connector(c) => {
                assert_eq!(c.start_point, Point::new(50.0, 20.0));
                assert!((c.x - 10.0).abs() < f64::EPSILON);
                assert!((c.width - 40.0).abs() < f64::EPSILON);
                assert!(c.arrow_end);
            }
            _ => panic!("expected a connector"),
        }
    }

    #[test]
    fn test_drawing_bounds_span_points() {
        assert!(drawing_properties(&[Point::ZERO], Color::black(), 2.0).is_none());
        let points = [Point::new(5.0, 8.0), Point::new(-3.0, 2.0), Point::new(12.0, 20.0)];
        let props = drawing_properties(&points, Color::black(), 3.0).unwrap();
        let frame = props.frame();
        assert!((frame.x0 + 3.0).abs() < f64::EPSILON);
        assert!((frame.y0 - 2.0).abs() < f64::EPSILON);
        assert!((frame.width() - 15.0).abs() < f64::EPSILON);
        assert!((frame.height() - 18.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cursor_per_tool() {
        assert_eq!(ToolKind::Select.cursor(), CursorIcon::Default);
        assert_eq!(ToolKind::Eraser.cursor(), CursorIcon::NotAllowed);
        assert_eq!(ToolKind::Drawing.cursor(), CursorIcon::Crosshair);
    }
}
