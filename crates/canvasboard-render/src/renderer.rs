//! Frame renderer.
//!
//! Builds a [`DisplayList`] for the board: background, grid, elements in
//! z-order, selection chrome and the in-progress drawing preview.

use crate::display_list::DisplayList;
use crate::grid::GridPlan;
use crate::images::ImageCache;
use canvasboard_core::elements::{Color, Element, Surface, bounds, render};
use canvasboard_core::interaction::{InteractionEngine, InteractionState};
use canvasboard_core::layers::LayerStore;
use canvasboard_core::selection::{HANDLE_RADIUS, get_handles};
use kurbo::{BezPath, Circle, Point, Rect, Shape as _};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Minimum interval between throttled renders.
pub const RENDER_THROTTLE: Duration = Duration::from_millis(16);
/// Frames slower than this are logged.
const SLOW_FRAME: Duration = Duration::from_micros(16_670);

const SELECTION_COLOR: Color = Color::rgb(59, 130, 246);
const GRID_COLOR: Color = Color::rgb(0xe0, 0xe0, 0xe0);
const HANDLE_FILL: Color = Color::rgb(255, 255, 255);

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("invalid viewport: {0}")]
    InvalidViewport(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Renders a board into a retained display list.
///
/// Rendering needs `&mut self`, so a frame can never start while another is
/// being built.
pub struct FrameRenderer {
    list: DisplayList,
    images: ImageCache,
    dirty: bool,
    last_render: Option<Instant>,
    frames: u64,
}

impl FrameRenderer {
    pub fn new(images: ImageCache) -> Self {
        Self {
            list: DisplayList::new(),
            images,
            dirty: true,
            last_render: None,
            frames: 0,
        }
    }

    pub fn display_list(&self) -> &DisplayList {
        &self.list
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    /// Number of frames built so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Mark the board as changed; the next [`Self::render_if_due`] draws.
    pub fn request_render(&mut self) {
        self.dirty = true;
    }

    pub fn needs_render(&self) -> bool {
        self.dirty
    }

    /// Render now if something changed and the throttle interval has passed.
    /// Finished image loads count as a change.
    pub fn render_if_due(
        &mut self,
        store: &LayerStore,
        engine: &InteractionEngine,
        now: Instant,
    ) -> RenderResult<Option<&DisplayList>> {
        if self.images.poll() > 0 {
            self.dirty = true;
        }
        if !self.dirty {
            return Ok(None);
        }
        if let Some(last) = self.last_render {
            if now.duration_since(last) < RENDER_THROTTLE {
                return Ok(None);
            }
        }
        self.build(store, engine, now)?;
        Ok(Some(&self.list))
    }

    /// Render immediately, ignoring the throttle.
    pub fn render(
        &mut self,
        store: &LayerStore,
        engine: &InteractionEngine,
    ) -> RenderResult<&DisplayList> {
        self.images.poll();
        self.build(store, engine, Instant::now())?;
        Ok(&self.list)
    }

    fn build(
        &mut self,
        store: &LayerStore,
        engine: &InteractionEngine,
        now: Instant,
    ) -> RenderResult<()> {
        let viewport = engine.viewport();
        if !(viewport.width.is_finite() && viewport.height.is_finite()) || viewport.is_zero_area() {
            return Err(RendererError::InvalidViewport(format!(
                "{}x{}",
                viewport.width, viewport.height
            )));
        }
        let started = Instant::now();
        let settings = engine.settings();
        let camera = engine.camera();

        for (src, state) in self.images.states() {
            self.list.set_image_state(src, state);
        }

        self.list.begin(settings.background_color);
        self.list.push_transform(camera.transform());

        let grid = GridPlan::compute(settings, camera, viewport);
        draw_grid(&mut self.list, &grid, camera.zoom);

        let editing = match engine.state() {
            InteractionState::EditingText { element_id, .. } => Some(*element_id),
            _ => None,
        };
        let visible = camera.visible_world_rect(viewport);
        for element in store.elements() {
            if Some(element.id) == editing {
                continue;
            }
            if !may_be_visible(element, visible) {
                continue;
            }
            render(&mut self.list, element);
        }

        let handle_size = HANDLE_RADIUS / camera.zoom;
        for element in store.selected_elements() {
            draw_selection(&mut self.list, element, 1.0 / camera.zoom);
        }
        if let Some(element) = store.single_selected().filter(|e| !e.is_group()) {
            for handle in get_handles(element) {
                draw_handle(&mut self.list, handle.position, handle_size / 2.0, 1.0 / camera.zoom);
            }
        }

        if let Some(properties) = engine.preview() {
            render(&mut self.list, &Element::new(properties, store.next_z(), None));
        }

        self.list.pop_transform();

        for src in self.list.take_missing() {
            self.images.request(&src);
        }

        self.dirty = false;
        self.last_render = Some(now);
        self.frames += 1;
        let elapsed = started.elapsed();
        if elapsed > SLOW_FRAME {
            log::warn!("Slow render: {:?} for {} commands", elapsed, self.list.len());
        }
        Ok(())
    }
}

/// Conservative cull: the bounds grown by half their diagonal cover any
/// rotation of the element.
fn may_be_visible(element: &Element, visible: Rect) -> bool {
    let rect = bounds(element);
    let reach = 0.5 * rect.width().hypot(rect.height()) + 1.0;
    let rect = rect.inflate(reach, reach);
    rect.x1 >= visible.x0 && rect.x0 <= visible.x1 && rect.y1 >= visible.y0 && rect.y0 <= visible.y1
}

fn draw_grid(surface: &mut DisplayList, grid: &GridPlan, zoom: f64) {
    if grid.is_empty() {
        return;
    }
    // Dots batched into one fill, lines into one stroke.
    if !grid.dots.is_empty() {
        let radius = grid.dot_radius / zoom;
        let mut path = BezPath::new();
        for dot in &grid.dots {
            path.extend(Circle::new(*dot, radius).path_elements(0.1));
        }
        surface.fill(&path, GRID_COLOR);
    }
    if !grid.vertical.is_empty() || !grid.horizontal.is_empty() {
        let mut path = BezPath::new();
        for x in &grid.vertical {
            path.move_to(Point::new(*x, grid.area.y0));
            path.line_to(Point::new(*x, grid.area.y1));
        }
        for y in &grid.horizontal {
            path.move_to(Point::new(grid.area.x0, *y));
            path.line_to(Point::new(grid.area.x1, *y));
        }
        surface.stroke(&path, GRID_COLOR, grid.line_width / zoom, &[]);
    }
}

fn draw_selection(surface: &mut DisplayList, element: &Element, pixel: f64) {
    let rect = bounds(element).inflate(4.0 * pixel, 4.0 * pixel);
    surface.stroke(&rect.to_path(0.1), SELECTION_COLOR, 2.0 * pixel, &[5.0 * pixel, 5.0 * pixel]);
}

fn draw_handle(surface: &mut DisplayList, center: Point, half: f64, pixel: f64) {
    let path = Rect::from_center_size(center, (half * 2.0, half * 2.0)).to_path(0.1);
    surface.fill(&path, HANDLE_FILL);
    surface.stroke(&path, SELECTION_COLOR, pixel, &[]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display_list::DrawCommand;
    use crate::images::tests::{MemorySource, png_bytes, poll_until};
    use canvasboard_core::elements::{ElementType, Properties, default_properties};
    use canvasboard_core::settings::{BoardSettings, GridStyle};
    use kurbo::Size;
    use std::collections::HashMap;

    fn renderer(images: HashMap<String, Vec<u8>>) -> FrameRenderer {
        FrameRenderer::new(ImageCache::new(MemorySource(images)))
    }

    fn engine() -> InteractionEngine {
        let settings = BoardSettings {
            grid_style: GridStyle::None,
            ..BoardSettings::default()
        };
        InteractionEngine::new(Size::new(800.0, 600.0), settings)
    }

    fn fills(list: &DisplayList) -> usize {
        list.commands().iter().filter(|c| matches!(c, DrawCommand::Fill { .. })).count()
    }

    #[test]
    fn test_throttle_and_dirty_flag() {
        let mut renderer = renderer(HashMap::new());
        let store = LayerStore::new(None);
        let engine = engine();
        let t0 = Instant::now();
        assert!(renderer.render_if_due(&store, &engine, t0).unwrap().is_some());
        // Nothing changed.
        assert!(renderer.render_if_due(&store, &engine, t0 + RENDER_THROTTLE).unwrap().is_none());
        renderer.request_render();
        let early = t0 + Duration::from_millis(5);
        assert!(renderer.render_if_due(&store, &engine, early).unwrap().is_none());
        assert!(renderer.needs_render());
        assert!(renderer.render_if_due(&store, &engine, t0 + RENDER_THROTTLE).unwrap().is_some());
        assert_eq!(renderer.frames(), 2);
        renderer.render(&store, &engine).unwrap();
        assert_eq!(renderer.frames(), 3);
    }

    #[test]
    fn test_elements_in_z_order_and_selection() {
        let mut renderer = renderer(HashMap::new());
        let mut store = LayerStore::new(None);
        let sticky = store.add(Element::new(default_properties(ElementType::Sticky), 2, None));
        store.add(Element::new(default_properties(ElementType::Shape), 1, None));
        let list = renderer.render(&store, &engine()).unwrap();
        let unselected = list.len();
        assert!(unselected > 0);

        store.select(&[sticky]);
        let list = renderer.render(&store, &engine()).unwrap();
        // Outline plus eight handles, each a fill and a stroke.
        assert_eq!(list.len(), unselected + 1 + 16);
    }

    #[test]
    fn test_edited_text_is_hidden() {
        let mut renderer = renderer(HashMap::new());
        let mut store = LayerStore::new(None);
        let text = Element::new(default_properties(ElementType::Text), 1, None);
        let center = text.center();
        store.add(text);
        let mut engine = engine();
        engine.double_click(&store, center);
        let list = renderer.render(&store, &engine).unwrap();
        assert!(!list.commands().iter().any(|c| matches!(c, DrawCommand::Text { .. })));
    }

    #[test]
    fn test_grid_drawn_as_single_batch() {
        let mut renderer = renderer(HashMap::new());
        let store = LayerStore::new(None);
        let mut engine = engine();
        engine.set_settings(BoardSettings::default());
        let list = renderer.render(&store, &engine).unwrap();
        assert_eq!(fills(list), 1);
    }

    #[test]
    fn test_loaded_image_triggers_rerender() {
        let src = "https://cdn.example.com/cat.png".to_string();
        let mut renderer = renderer(HashMap::from([(src.clone(), png_bytes(2, 2))]));
        let mut store = LayerStore::new(None);
        let Properties::Image(mut image) = default_properties(ElementType::Image) else {
            unreachable!()
        };
        image.src = src.clone();
        store.add(Element::new(Properties::Image(image), 1, None));
        let engine = engine();

        let list = renderer.render(&store, &engine).unwrap();
        assert!(!list.commands().iter().any(|c| matches!(c, DrawCommand::Image { .. })));

        poll_until(&mut renderer.images, 1);
        // poll_until drained the channel, so flag the change by hand.
        renderer.request_render();
        let later = Instant::now() + RENDER_THROTTLE;
        let list = renderer.render_if_due(&store, &engine, later).unwrap().unwrap();
        assert!(
            list.commands()
                .iter()
                .any(|c| matches!(c, DrawCommand::Image { src: s, .. } if *s == src))
        );
        assert!(renderer.images().get(&src).is_some());
    }

    #[test]
    fn test_zero_viewport_is_rejected() {
        let mut renderer = renderer(HashMap::new());
        let engine = InteractionEngine::new(Size::ZERO, BoardSettings::default());
        assert!(matches!(
            renderer.render(&LayerStore::new(None), &engine),
            Err(RendererError::InvalidViewport(_))
        ));
    }
}
