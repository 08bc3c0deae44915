//! Element drawing against an abstract surface.

use super::color::Color;
use super::props::{
    ConnectorProps, FileProps, GroupProps, ImageProps, ShapeKind, ShapeProps, StickyProps,
    TextAlign, TextProps,
};
use super::{Element, Properties, bounds};
use kurbo::{Affine, BezPath, Ellipse, Point, Rect, Shape as _, Vec2};
use std::f64::consts::PI;

const ARROW_HEAD_LENGTH: f64 = 10.0;
const ARROW_HEAD_ANGLE: f64 = PI / 6.0;
const STAR_SPIKES: usize = 5;
const LINE_HEIGHT: f64 = 1.2;
const STICKY_PADDING: f64 = 10.0;
const PLACEHOLDER_FILL: Color = Color::rgb(0xf0, 0xf0, 0xf0);
const PLACEHOLDER_BORDER: Color = Color::rgb(0xcc, 0xcc, 0xcc);
const PLACEHOLDER_INK: Color = Color::rgb(0x66, 0x66, 0x66);

/// Load state of a remote image resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    /// Drawn.
    Ready,
    /// Not yet available; the surface will ask for a re-render once it is.
    Pending,
    Failed,
}

/// Font parameters for a run of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_size: f64,
    pub font_family: String,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
}

impl TextStyle {
    pub fn plain(font_size: f64, color: Color) -> Self {
        Self {
            font_size,
            font_family: "Arial".to_string(),
            color,
            bold: false,
            italic: false,
        }
    }
}

/// Drawing target for elements. Coordinates are in world space; the
/// implementation applies the view transform.
pub trait Surface {
    fn fill(&mut self, path: &BezPath, color: Color);

    fn stroke(&mut self, path: &BezPath, color: Color, width: f64, dashes: &[f64]);

    /// Draw a single line of text with its baseline starting at `origin`.
    fn text(&mut self, origin: Point, text: &str, style: &TextStyle);

    /// Advance width of `text` when laid out with `style`.
    fn measure_text(&self, text: &str, style: &TextStyle) -> f64;

    /// Draw the image at `src` into `rect` if it is loaded.
    fn image(&mut self, rect: Rect, src: &str) -> ImageState;

    fn push_transform(&mut self, transform: Affine);

    fn pop_transform(&mut self);
}

/// Draw one element. Pure with respect to the element.
pub fn render<S: Surface + ?Sized>(surface: &mut S, element: &Element) {
    let rotation = element.properties.rotation();
    let rotated = rotation != 0.0;
    if rotated {
        let center = bounds(element).center();
        surface.push_transform(
            Affine::translate(center.to_vec2())
                * Affine::rotate(rotation.to_radians())
                * Affine::translate(-center.to_vec2()),
        );
    }

    match &element.properties {
        Properties::Shape(shape) => render_shape(surface, shape),
        Properties::Text(text) => render_text(surface, text),
        Properties::Sticky(sticky) => render_sticky(surface, sticky),
        Properties::Image(image) => render_image(surface, image),
        Properties::File(file) => render_file(surface, file),
        Properties::Connector(connector) => render_connector(surface, connector),
        Properties::Group(group) => render_group(surface, group),
    }

    if rotated {
        surface.pop_transform();
    }
}

fn box_of(x: f64, y: f64, width: f64, height: f64) -> Rect {
    Rect::new(x, y, x + width, y + height).abs()
}

fn fill_and_stroke<S: Surface + ?Sized>(surface: &mut S, path: &BezPath, shape: &ShapeProps) {
    if !shape.fill_color.is_transparent() {
        surface.fill(path, shape.fill_color);
    }
    if shape.stroke_width > 0.0 {
        surface.stroke(path, shape.stroke_color, shape.stroke_width, &[]);
    }
}

fn render_shape<S: Surface + ?Sized>(surface: &mut S, shape: &ShapeProps) {
    let rect = box_of(shape.x, shape.y, shape.width, shape.height);
    match shape.shape {
        ShapeKind::Rectangle => fill_and_stroke(surface, &rect.to_path(0.1), shape),
        ShapeKind::Circle => {
            let radius = rect.width().min(rect.height()) / 2.0;
            let path = Ellipse::new(rect.center(), (radius, radius), 0.0).to_path(0.1);
            fill_and_stroke(surface, &path, shape);
        }
        ShapeKind::Triangle => {
            let mut path = BezPath::new();
            path.move_to(Point::new(rect.center().x, rect.y0));
            path.line_to(Point::new(rect.x1, rect.y1));
            path.line_to(Point::new(rect.x0, rect.y1));
            path.close_path();
            fill_and_stroke(surface, &path, shape);
        }
        ShapeKind::Star => fill_and_stroke(surface, &star_path(rect), shape),
        ShapeKind::Line | ShapeKind::Arrow => {
            let (start, end) = match (shape.start_point, shape.end_point) {
                (Some(start), Some(end)) => (start, end),
                _ => (Point::new(rect.x0, rect.y0), Point::new(rect.x1, rect.y1)),
            };
            let mut path = BezPath::new();
            path.move_to(start);
            path.line_to(end);
            if shape.shape == ShapeKind::Arrow {
                append_arrow_head(&mut path, start, end);
            }
            surface.stroke(&path, shape.stroke_color, shape.stroke_width, &[]);
        }
        ShapeKind::Drawing => {
            for stroke in &shape.paths {
                if stroke.points.len() < 2 {
                    continue;
                }
                let mut path = BezPath::new();
                path.move_to(stroke.points[0]);
                for point in &stroke.points[1..] {
                    path.line_to(*point);
                }
                surface.stroke(&path, stroke.stroke_color, stroke.stroke_width, &[]);
            }
        }
    }
}

/// Five-pointed star inscribed in `rect`, inner radius half the outer.
fn star_path(rect: Rect) -> BezPath {
    let center = rect.center();
    let outer = rect.width().min(rect.height()) / 2.0;
    let inner = outer * 0.5;
    let mut path = BezPath::new();
    for i in 0..STAR_SPIKES * 2 {
        let angle = i as f64 * PI / STAR_SPIKES as f64;
        let radius = if i % 2 == 0 { outer } else { inner };
        let point = center + Vec2::from_angle(angle) * radius;
        if i == 0 {
            path.move_to(point);
        } else {
            path.line_to(point);
        }
    }
    path.close_path();
    path
}

/// Two strokes at +/-30 degrees off the shaft, pointing at `tip`.
fn append_arrow_head(path: &mut BezPath, from: Point, tip: Point) {
    let angle = (tip.y - from.y).atan2(tip.x - from.x);
    for side in [-1.0, 1.0] {
        let wing = angle + PI + side * ARROW_HEAD_ANGLE;
        path.move_to(tip);
        path.line_to(tip + Vec2::from_angle(wing) * ARROW_HEAD_LENGTH);
    }
}

/// Greedy word wrap. Explicit newlines always break.
pub fn wrap_text<S: Surface + ?Sized>(
    surface: &S,
    text: &str,
    max_width: f64,
    style: &TextStyle,
) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split(' ') {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if !line.is_empty() && surface.measure_text(&candidate, style) > max_width {
                lines.push(std::mem::replace(&mut line, word.to_string()));
            } else {
                line = candidate;
            }
        }
        lines.push(line);
    }
    lines
}

fn aligned_x<S: Surface + ?Sized>(
    surface: &S,
    line: &str,
    rect: Rect,
    align: TextAlign,
    style: &TextStyle,
) -> f64 {
    match align {
        TextAlign::Left => rect.x0,
        TextAlign::Center => rect.x0 + (rect.width() - surface.measure_text(line, style)) / 2.0,
        TextAlign::Right => rect.x1 - surface.measure_text(line, style),
    }
}

fn render_text<S: Surface + ?Sized>(surface: &mut S, text: &TextProps) {
    let rect = box_of(text.x, text.y, text.width, text.height);
    let style = TextStyle {
        font_size: text.font_size,
        font_family: text.font_family.clone(),
        color: text.color,
        bold: text.bold,
        italic: text.italic,
    };
    let mut baseline = rect.y0 + text.font_size;
    for line in wrap_text(surface, &text.text, rect.width(), &style) {
        let x = aligned_x(surface, &line, rect, text.align, &style);
        surface.text(Point::new(x, baseline), &line, &style);
        if text.underline && !line.is_empty() {
            let mut underline = BezPath::new();
            underline.move_to(Point::new(x, baseline + 2.0));
            underline.line_to(Point::new(x + surface.measure_text(&line, &style), baseline + 2.0));
            surface.stroke(&underline, text.color, 1.0, &[]);
        }
        baseline += text.font_size * LINE_HEIGHT;
    }
}

fn render_sticky<S: Surface + ?Sized>(surface: &mut S, sticky: &StickyProps) {
    let rect = box_of(sticky.x, sticky.y, sticky.width, sticky.height);
    let path = rect.to_path(0.1);
    surface.fill(&path, sticky.background_color);
    surface.stroke(&path, PLACEHOLDER_BORDER, 1.0, &[]);

    let style = TextStyle::plain(sticky.font_size, sticky.text_color);
    let inner = rect.inset(-STICKY_PADDING);
    let mut baseline = inner.y0 + sticky.font_size;
    for line in wrap_text(surface, &sticky.text, inner.width(), &style) {
        if baseline > rect.y1 {
            break;
        }
        surface.text(Point::new(inner.x0, baseline), &line, &style);
        baseline += sticky.font_size * LINE_HEIGHT;
    }
}

/// Grey card with a centred caption, shown while a resource is unavailable.
fn render_placeholder<S: Surface + ?Sized>(surface: &mut S, rect: Rect, caption: &str) {
    let path = rect.to_path(0.1);
    surface.fill(&path, PLACEHOLDER_FILL);
    surface.stroke(&path, PLACEHOLDER_BORDER, 1.0, &[]);
    let mut cross = BezPath::new();
    cross.move_to(Point::new(rect.x0, rect.y0));
    cross.line_to(Point::new(rect.x1, rect.y1));
    cross.move_to(Point::new(rect.x1, rect.y0));
    cross.line_to(Point::new(rect.x0, rect.y1));
    surface.stroke(&cross, PLACEHOLDER_BORDER, 1.0, &[]);
    centered_text(surface, rect.center(), caption, &TextStyle::plain(12.0, PLACEHOLDER_INK));
}

fn centered_text<S: Surface + ?Sized>(
    surface: &mut S,
    center: Point,
    text: &str,
    style: &TextStyle,
) {
    let width = surface.measure_text(text, style);
    surface.text(Point::new(center.x - width / 2.0, center.y), text, style);
}

fn render_image<S: Surface + ?Sized>(surface: &mut S, image: &ImageProps) {
    let rect = box_of(image.x, image.y, image.width, image.height);
    if image.src.is_empty() {
        render_placeholder(surface, rect, "No Image");
        return;
    }
    match surface.image(rect, &image.src) {
        ImageState::Ready => {}
        ImageState::Pending => render_placeholder(surface, rect, "Loading..."),
        ImageState::Failed => render_placeholder(surface, rect, &image.alt),
    }
}

/// Human-readable byte count: `0 B`, `1.5 KB`, `2 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, UNITS[unit])
    } else {
        format!("{rounded:.1} {}", UNITS[unit])
    }
}

fn render_file<S: Surface + ?Sized>(surface: &mut S, file: &FileProps) {
    let rect = box_of(file.x, file.y, file.width, file.height);
    let path = rect.to_path(0.1);
    surface.fill(&path, PLACEHOLDER_FILL);
    surface.stroke(&path, PLACEHOLDER_BORDER, 1.0, &[]);

    if let (true, Some(preview)) = (file.has_image_preview(), file.preview_url.as_deref()) {
        let thumb = Rect::new(rect.x0 + 4.0, rect.y0 + 4.0, rect.x1 - 4.0, rect.center().y - 2.0);
        if surface.image(thumb, preview) != ImageState::Ready {
            render_placeholder(surface, thumb, "");
        }
    }

    let center = rect.center();
    let name = if file.file_name.is_empty() { "File" } else { &file.file_name };
    let caption = TextStyle::plain(10.0, PLACEHOLDER_INK);
    centered_text(surface, center + Vec2::new(0.0, 5.0), name, &caption);
    if file.file_size > 0 {
        centered_text(
            surface,
            center + Vec2::new(0.0, 15.0),
            &format_file_size(file.file_size),
            &TextStyle::plain(8.0, PLACEHOLDER_INK),
        );
    }
}

fn render_connector<S: Surface + ?Sized>(surface: &mut S, connector: &ConnectorProps) {
    let (start, end) = (connector.start_point, connector.end_point);
    let mut shaft = BezPath::new();
    shaft.move_to(start);
    shaft.line_to(end);
    surface.stroke(
        &shaft,
        connector.stroke_color,
        connector.stroke_width,
        connector.stroke_style.dashes(),
    );

    let mut heads = BezPath::new();
    if connector.arrow_end {
        append_arrow_head(&mut heads, start, end);
    }
    if connector.arrow_start {
        append_arrow_head(&mut heads, end, start);
    }
    if !heads.elements().is_empty() {
        surface.stroke(&heads, connector.stroke_color, connector.stroke_width, &[]);
    }
}

fn render_group<S: Surface + ?Sized>(surface: &mut S, group: &GroupProps) {
    let rect = box_of(group.x, group.y, group.width, group.height);
    let path = rect.to_path(0.1);
    if !group.background_color.is_transparent() {
        surface.fill(&path, group.background_color);
    }
    surface.stroke(&path, group.border_color, group.border_width, group.border_style.dashes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{ElementType, default_properties, default_shape};

    /// Records calls instead of drawing.
    #[derive(Default)]
    struct Recorder {
        fills: usize,
        strokes: Vec<Vec<f64>>,
        texts: Vec<String>,
        images: Vec<String>,
        transforms: isize,
        max_depth: isize,
        image_state: Option<ImageState>,
    }

    impl Surface for Recorder {
        fn fill(&mut self, _path: &BezPath, _color: Color) {
            self.fills += 1;
        }

        fn stroke(&mut self, _path: &BezPath, _color: Color, _width: f64, dashes: &[f64]) {
            self.strokes.push(dashes.to_vec());
        }

        fn text(&mut self, _origin: Point, text: &str, _style: &TextStyle) {
            self.texts.push(text.to_string());
        }

        fn measure_text(&self, text: &str, style: &TextStyle) -> f64 {
            text.chars().count() as f64 * style.font_size * 0.5
        }

        fn image(&mut self, _rect: Rect, src: &str) -> ImageState {
            self.images.push(src.to_string());
            self.image_state.unwrap_or(ImageState::Pending)
        }

        fn push_transform(&mut self, _transform: Affine) {
            self.transforms += 1;
            self.max_depth = self.max_depth.max(self.transforms);
        }

        fn pop_transform(&mut self) {
            self.transforms -= 1;
        }
    }

    #[test]
    fn test_rectangle_fills_and_strokes() {
        let mut surface = Recorder::default();
        let element = Element::new(default_properties(ElementType::Shape), 0, None);
        render(&mut surface, &element);
        assert_eq!(surface.fills, 1);
        assert_eq!(surface.strokes.len(), 1);
    }

    #[test]
    fn test_rotation_is_balanced() {
        let mut shape = default_shape(ShapeKind::Star);
        shape.rotation = 45.0;
        let element = Element::new(Properties::Shape(shape), 0, None);
        let mut surface = Recorder::default();
        render(&mut surface, &element);
        assert_eq!(surface.max_depth, 1);
        assert_eq!(surface.transforms, 0);
    }

    #[test]
    fn test_image_placeholder_until_ready() {
        let mut image = match default_properties(ElementType::Image) {
            Properties::Image(image) => image,
            _ => unreachable!(),
        };
        image.src = "https://files.example/a.png".to_string();
        let element = Element::new(Properties::Image(image), 0, None);

        let mut pending = Recorder::default();
        render(&mut pending, &element);
        assert_eq!(pending.images.len(), 1);
        assert!(pending.texts.contains(&"Loading...".to_string()));

        let mut ready = Recorder {
            image_state: Some(ImageState::Ready),
            ..Default::default()
        };
        render(&mut ready, &element);
        assert!(ready.texts.is_empty());
        assert_eq!(ready.fills, 0);
    }

    #[test]
    fn test_image_without_src_skips_loading() {
        let element = Element::new(default_properties(ElementType::Image), 0, None);
        let mut surface = Recorder::default();
        render(&mut surface, &element);
        assert!(surface.images.is_empty());
        assert_eq!(surface.texts, vec!["No Image".to_string()]);
    }

    #[test]
    fn test_connector_dash_style() {
        let mut connector = match default_properties(ElementType::Connector) {
            Properties::Connector(c) => c,
            _ => unreachable!(),
        };
        connector.stroke_style = crate::elements::StrokeStyle::Dashed;
        connector.arrow_start = true;
        let element = Element::new(Properties::Connector(connector), 0, None);
        let mut surface = Recorder::default();
        render(&mut surface, &element);
        assert_eq!(surface.strokes[0], vec![5.0, 5.0]);
        assert_eq!(surface.strokes.len(), 2);
    }

    #[test]
    fn test_wrap_text() {
        let surface = Recorder::default();
        let style = TextStyle::plain(10.0, Color::black());
        // 5 units per char, 40 units wide -> 8 chars per line.
        let lines = wrap_text(&surface, "one two three\nfour", 40.0, &style);
        assert_eq!(lines, vec!["one two", "three", "four"]);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024 * 1024), "5120 GB");
    }

    #[test]
    fn test_file_card_shows_size() {
        let mut file = match default_properties(ElementType::File) {
            Properties::File(f) => f,
            _ => unreachable!(),
        };
        file.file_name = "report.pdf".to_string();
        file.file_size = 2048;
        let element = Element::new(Properties::File(file), 0, None);
        let mut surface = Recorder::default();
        render(&mut surface, &element);
        assert_eq!(surface.texts, vec!["report.pdf".to_string(), "2 KB".to_string()]);
        assert!(surface.images.is_empty());
    }
}
