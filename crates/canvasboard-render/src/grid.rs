//! Background grid planning.
//!
//! The grid is derived from the camera alone and never stored. Its cost is
//! bounded at any zoom: spacing doubles as cells shrink on screen, and the
//! number of dots and lines emitted is capped.

use canvasboard_core::camera::Camera;
use canvasboard_core::settings::{BoardSettings, GridStyle};
use kurbo::{Point, Rect, Size};

/// Most dots drawn for one frame.
pub const MAX_GRID_POINTS: usize = 50_000;
/// Most lines drawn per axis for one frame.
pub const MAX_GRID_LINES: usize = 1_000;

/// Grid geometry for one frame, in world coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPlan {
    pub style: GridStyle,
    /// Distance between neighbouring grid positions.
    pub spacing: f64,
    /// World area the grid covers.
    pub area: Rect,
    pub dots: Vec<Point>,
    /// Dot radius in screen pixels.
    pub dot_radius: f64,
    /// x of each vertical line.
    pub vertical: Vec<f64>,
    /// y of each horizontal line.
    pub horizontal: Vec<f64>,
    /// Line width in screen pixels.
    pub line_width: f64,
}

/// Spacing multiplier for a zoom level: a power of two that keeps cells from
/// collapsing when zoomed out.
pub fn spacing_factor(zoom: f64) -> f64 {
    if !zoom.is_finite() || zoom <= 0.0 {
        return 1.0;
    }
    2f64.powf((1.0 / zoom).log2().floor()).max(1.0)
}

/// Grid positions `spacing` apart covering `[from, to]`, at most `cap` of them.
fn positions(from: f64, to: f64, spacing: f64, cap: usize) -> Vec<f64> {
    let start = (from / spacing).floor() * spacing;
    let mut values = Vec::new();
    let mut i = 0usize;
    loop {
        let value = start + i as f64 * spacing;
        if value > to || values.len() >= cap {
            break;
        }
        values.push(value);
        i += 1;
    }
    values
}

impl GridPlan {
    /// Plan the grid visible through `camera` in a viewport of `viewport` pixels.
    pub fn compute(settings: &BoardSettings, camera: &Camera, viewport: Size) -> Self {
        let zoom = camera.zoom;
        let spacing = settings.grid_size.max(1.0) * spacing_factor(zoom);
        let area = camera.visible_world_rect(viewport);
        let inv_zoom = 1.0 / zoom;
        let mut plan = Self {
            style: settings.grid_style,
            spacing,
            area,
            dots: Vec::new(),
            dot_radius: inv_zoom.sqrt().clamp(0.5, 3.0),
            vertical: Vec::new(),
            horizontal: Vec::new(),
            line_width: inv_zoom.sqrt().max(0.5),
        };
        if !area.is_finite() || area.is_zero_area() {
            return plan;
        }

        match settings.grid_style {
            GridStyle::None => {}
            GridStyle::Lines => {
                plan.vertical = positions(area.x0, area.x1, spacing, MAX_GRID_LINES);
                plan.horizontal = positions(area.y0, area.y1, spacing, MAX_GRID_LINES);
            }
            GridStyle::Dots => {
                let xs = positions(area.x0, area.x1, spacing, MAX_GRID_LINES);
                let ys = positions(area.y0, area.y1, spacing, MAX_GRID_LINES);
                'outer: for x in &xs {
                    for y in &ys {
                        if plan.dots.len() >= MAX_GRID_POINTS {
                            log::debug!("grid dot budget reached at spacing {spacing}");
                            break 'outer;
                        }
                        plan.dots.push(Point::new(*x, *y));
                    }
                }
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.dots.is_empty() && self.vertical.is_empty() && self.horizontal.is_empty()
    }
}
