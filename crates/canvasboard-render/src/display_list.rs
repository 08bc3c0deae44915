//! Retained drawing commands for one frame.
//!
//! [`DisplayList`] is the [`Surface`] elements draw into. Hosts replay the
//! commands with whatever 2D backend they have; core colors convert into
//! `peniko::Color` for that.

use canvasboard_core::elements::{Color, ImageState, Surface, TextStyle};
use kurbo::{Affine, BezPath, Point, Rect};
use std::collections::HashMap;

/// Average glyph advance as a fraction of the font size. Used for layout
/// when no font engine is available.
const AVERAGE_ADVANCE: f64 = 0.55;

/// One drawing operation. `transform` maps world to screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Fill {
        path: BezPath,
        color: Color,
        transform: Affine,
    },
    Stroke {
        path: BezPath,
        color: Color,
        width: f64,
        dashes: Vec<f64>,
        transform: Affine,
    },
    Text {
        origin: Point,
        text: String,
        style: TextStyle,
        transform: Affine,
    },
    Image {
        rect: Rect,
        src: String,
        transform: Affine,
    },
}

#[derive(Debug, Clone)]
pub struct DisplayList {
    background: Color,
    commands: Vec<DrawCommand>,
    stack: Vec<Affine>,
    /// Known load state of image resources.
    images: HashMap<String, ImageState>,
    /// Images drawn this frame whose state was unknown.
    missing: Vec<String>,
}

impl Default for DisplayList {
    fn default() -> Self {
        Self {
            background: Color::white(),
            commands: Vec::new(),
            stack: Vec::new(),
            images: HashMap::new(),
            missing: Vec::new(),
        }
    }
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the previous frame and start a new one.
    pub fn begin(&mut self, background: Color) {
        self.background = background;
        self.commands.clear();
        self.stack.clear();
        self.missing.clear();
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Transform applied to commands pushed now.
    pub fn current_transform(&self) -> Affine {
        self.stack.last().copied().unwrap_or(Affine::IDENTITY)
    }

    pub fn set_image_state(&mut self, src: &str, state: ImageState) {
        self.images.insert(src.to_string(), state);
    }

    /// Images the frame wanted but whose state was unknown.
    pub fn take_missing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.missing)
    }
}

impl Surface for DisplayList {
    fn fill(&mut self, path: &BezPath, color: Color) {
        let transform = self.current_transform();
        self.commands.push(DrawCommand::Fill {
            path: path.clone(),
            color,
            transform,
        });
    }

    fn stroke(&mut self, path: &BezPath, color: Color, width: f64, dashes: &[f64]) {
        let transform = self.current_transform();
        self.commands.push(DrawCommand::Stroke {
            path: path.clone(),
            color,
            width,
            dashes: dashes.to_vec(),
            transform,
        });
    }

    fn text(&mut self, origin: Point, text: &str, style: &TextStyle) {
        if text.is_empty() {
            return;
        }
        let transform = self.current_transform();
        self.commands.push(DrawCommand::Text {
            origin,
            text: text.to_string(),
            style: style.clone(),
            transform,
        });
    }

    fn measure_text(&self, text: &str, style: &TextStyle) -> f64 {
        text.chars().count() as f64 * style.font_size * AVERAGE_ADVANCE
    }

    fn image(&mut self, rect: Rect, src: &str) -> ImageState {
        let state = match self.images.get(src) {
            Some(state) => *state,
            None => {
                if !self.missing.iter().any(|s| s == src) {
                    self.missing.push(src.to_string());
                }
                ImageState::Pending
            }
        };
        if state == ImageState::Ready {
            let transform = self.current_transform();
            self.commands.push(DrawCommand::Image {
                rect,
                src: src.to_string(),
                transform,
            });
        }
        state
    }

    fn push_transform(&mut self, transform: Affine) {
        let combined = self.current_transform() * transform;
        self.stack.push(combined);
    }

    fn pop_transform(&mut self) {
        self.stack.pop();
    }
}
