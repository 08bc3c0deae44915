//! Pointer and keyboard interaction state machine.
//!
//! The engine owns the camera and a single exclusive interaction session. It
//! turns raw input into [`LayerStore`] mutations and reports, per event, which
//! elements changed so the sync layer can push them.

use crate::camera::Camera;
use crate::elements::{Color, Element, ElementId, ElementType, Properties, bounds};
use crate::history::HistoryAction;
use crate::input::{CursorIcon, InputState, Modifiers, MouseButton, PointerEvent};
use crate::layers::{Change, LayerStore, diff_elements};
use crate::selection::{HANDLE_RADIUS, HandleKind, ResizeState, hit_test_handles};
use crate::settings::BoardSettings;
use crate::tools::{ToolKind, drawing_properties, properties_at, two_point_properties};
use kurbo::{Point, Rect, Size, Vec2};
use std::time::Instant;

/// Wheel zoom factor per notch away from the user.
pub const WHEEL_ZOOM_OUT: f64 = 0.85;
/// Wheel zoom factor per notch towards the user.
pub const WHEEL_ZOOM_IN: f64 = 1.15;
/// Arrow-key pan step, divided by the zoom level.
pub const ARROW_PAN_STEP: f64 = 50.0;
/// Screen padding used by "fit content".
pub const FIT_PADDING: f64 = 50.0;
const FREEHAND_STROKE_WIDTH: f64 = 2.0;

/// Elements being dragged and where the pointer grabbed each one.
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    /// Pointer position minus element origin, in world units.
    pub offsets: Vec<(ElementId, Vec2)>,
    pub moved: bool,
}

impl DragState {
    pub fn ids(&self) -> Vec<ElementId> {
        self.offsets.iter().map(|(id, _)| *id).collect()
    }
}

/// The single active interaction session.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Idle,
    Panning {
        last_screen: Point,
    },
    Resizing(ResizeState),
    Dragging(DragState),
    DrawingFreehand {
        points: Vec<Point>,
    },
    DrawingTwoPoint {
        tool: ToolKind,
        start: Point,
        end: Point,
    },
    EditingText {
        element_id: ElementId,
        buffer: String,
    },
}

impl InteractionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            InteractionState::Idle => "idle",
            InteractionState::Panning { .. } => "panning",
            InteractionState::Resizing(_) => "resizing",
            InteractionState::Dragging(_) => "dragging",
            InteractionState::DrawingFreehand { .. } => "drawing_freehand",
            InteractionState::DrawingTwoPoint { .. } => "drawing_two_point",
            InteractionState::EditingText { .. } => "editing_text",
        }
    }
}

/// The host should ask the user for a file and upload it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadRequest {
    /// [`ToolKind::Image`] or [`ToolKind::File`].
    pub tool: ToolKind,
    /// World position the element will be centred on.
    pub position: Point,
}

/// What the file storage service returned for an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub url: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

/// Result of one input event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// Persisted changes to push to the server, in order.
    pub changes: Vec<Change>,
    pub redraw: bool,
    pub upload: Option<UploadRequest>,
}

impl Response {
    fn none() -> Self {
        Self::default()
    }

    fn redraw() -> Self {
        Self {
            redraw: true,
            ..Self::default()
        }
    }

    fn changed(changes: Vec<Change>) -> Self {
        Self {
            changes,
            redraw: true,
            upload: None,
        }
    }

    fn merge(mut self, other: Response) -> Self {
        self.changes.extend(other.changes);
        self.redraw |= other.redraw;
        self.upload = other.upload.or(self.upload);
        self
    }
}

/// Placement of the text editing overlay, in screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub element_id: ElementId,
    pub rect: Rect,
    /// Font size already scaled by the zoom level.
    pub font_size: f64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct InteractionEngine {
    camera: Camera,
    input: InputState,
    tool: ToolKind,
    state: InteractionState,
    settings: BoardSettings,
    viewport: Size,
    hovered_handle: Option<HandleKind>,
    /// Ink used for new freehand strokes.
    pub stroke_color: Color,
}

impl InteractionEngine {
    pub fn new(viewport: Size, settings: BoardSettings) -> Self {
        Self {
            camera: Camera::new(),
            input: InputState::new(),
            tool: ToolKind::Select,
            state: InteractionState::Idle,
            settings,
            viewport,
            hovered_handle: None,
            stroke_color: Color::black(),
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn settings(&self) -> &BoardSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: BoardSettings) {
        self.settings = settings;
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    /// Switch tools. In-progress drawing and text editing are discarded.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if matches!(
            self.state,
            InteractionState::DrawingFreehand { .. }
                | InteractionState::DrawingTwoPoint { .. }
                | InteractionState::EditingText { .. }
        ) {
            self.state = InteractionState::Idle;
        }
        self.tool = tool;
    }

    // --- pointer -------------------------------------------------------

    pub fn pointer_down(
        &mut self,
        store: &mut LayerStore,
        screen: Point,
        button: MouseButton,
        modifiers: Modifiers,
    ) -> Response {
        self.pointer_down_at(store, screen, button, modifiers, Instant::now())
    }

    pub fn pointer_down_at(
        &mut self,
        store: &mut LayerStore,
        screen: Point,
        button: MouseButton,
        modifiers: Modifiers,
        now: Instant,
    ) -> Response {
        self.input.set_modifiers(modifiers);
        self.input
            .handle_pointer_event_at(PointerEvent::Down { position: screen, button }, now);

        // Clicking away from the overlay commits it, like losing focus.
        let response = self.commit_text(store);
        if !self.state.is_idle() {
            return response;
        }

        let world = self.camera.screen_to_world(screen);
        match button {
            MouseButton::Right => return response,
            MouseButton::Middle => {
                self.state = InteractionState::Panning { last_screen: screen };
                return response.merge(Response::redraw());
            }
            MouseButton::Left => {}
        }

        if self.settings.locked {
            self.state = InteractionState::Panning { last_screen: screen };
            return response.merge(Response::redraw());
        }

        if self.input.is_double_click() && self.begin_text_edit(store, world) {
            return response.merge(Response::redraw());
        }

        let next = match self.tool {
            ToolKind::Select => self.select_down(store, screen, world, modifiers),
            ToolKind::Eraser => match store.element_at(world) {
                Some(id) => Response::changed(remove_with_changes(store, id)),
                None => Response::none(),
            },
            ToolKind::Drawing => {
                self.state = InteractionState::DrawingFreehand { points: vec![world] };
                Response::redraw()
            }
            tool if tool.is_two_point() => {
                self.state = InteractionState::DrawingTwoPoint {
                    tool,
                    start: world,
                    end: world,
                };
                Response::redraw()
            }
            tool => self.create_at(store, tool, world),
        };
        response.merge(next)
    }

    fn select_down(
        &mut self,
        store: &mut LayerStore,
        screen: Point,
        world: Point,
        modifiers: Modifiers,
    ) -> Response {
        let tolerance = self.camera.screen_len_to_world(HANDLE_RADIUS);
        if let Some(selected) = store.single_selected().filter(|e| !e.is_group()) {
            if let Some(handle) = hit_test_handles(selected, world, tolerance) {
                let resize = ResizeState::new(selected.id, handle, world, bounds(selected));
                self.state = InteractionState::Resizing(resize);
                return Response::redraw();
            }
        }

        let Some(id) = store.element_at(world) else {
            store.clear_selection();
            self.state = InteractionState::Panning { last_screen: screen };
            return Response::redraw();
        };
        if modifiers.shift {
            if store.is_selected(id) {
                store.remove_from_selection(id);
                return Response::redraw();
            }
            store.add_to_selection(id);
        } else if !store.is_selected(id) {
            store.select(&[id]);
        }
        self.state = InteractionState::Dragging(drag_state(store, world));
        Response::redraw()
    }

    fn create_at(&mut self, store: &mut LayerStore, tool: ToolKind, world: Point) -> Response {
        self.tool = ToolKind::Select;
        if tool.needs_upload() {
            return Response {
                upload: Some(UploadRequest { tool, position: world }),
                ..Response::none()
            };
        }
        let Some(properties) = properties_at(tool, world) else {
            return Response::none();
        };
        let id = add_element(store, properties);
        Response::changed(vec![Change::Upsert(id)])
    }

    pub fn pointer_move(&mut self, store: &mut LayerStore, screen: Point) -> Response {
        self.pointer_move_at(store, screen, Instant::now())
    }

    /// Moves closer together than the input throttle are dropped.
    pub fn pointer_move_at(
        &mut self,
        store: &mut LayerStore,
        screen: Point,
        now: Instant,
    ) -> Response {
        if !self
            .input
            .handle_pointer_event_at(PointerEvent::Move { position: screen }, now)
        {
            return Response::none();
        }
        let world = self.camera.screen_to_world(screen);

        if self.state.is_idle() {
            let hovered = self.handle_under(store, world);
            if hovered != self.hovered_handle {
                self.hovered_handle = hovered;
                return Response::redraw();
            }
            return Response::none();
        }

        match &mut self.state {
            InteractionState::Panning { last_screen } => {
                let delta = screen - *last_screen;
                *last_screen = screen;
                self.camera.pan(delta);
            }
            InteractionState::Resizing(resize) => resize_to(store, resize, world),
            InteractionState::Dragging(drag) => {
                drag_to(store, drag, world);
                drag.moved = true;
            }
            InteractionState::DrawingFreehand { points } => points.push(world),
            InteractionState::DrawingTwoPoint { end, .. } => *end = world,
            InteractionState::EditingText { .. } | InteractionState::Idle => {
                return Response::none();
            }
        }
        Response::redraw()
    }

    pub fn pointer_up(
        &mut self,
        store: &mut LayerStore,
        screen: Point,
        button: MouseButton,
    ) -> Response {
        self.pointer_up_at(store, screen, button, Instant::now())
    }

    pub fn pointer_up_at(
        &mut self,
        store: &mut LayerStore,
        screen: Point,
        button: MouseButton,
        now: Instant,
    ) -> Response {
        self.input
            .handle_pointer_event_at(PointerEvent::Up { position: screen, button }, now);
        if matches!(self.state, InteractionState::EditingText { .. }) {
            return Response::none();
        }
        let world = self.camera.screen_to_world(screen);
        // The last move may have been throttled; land exactly on the release.
        match &mut self.state {
            InteractionState::Resizing(resize) => resize_to(store, resize, world),
            InteractionState::Dragging(drag) => {
                if drag_to(store, drag, world) {
                    drag.moved = true;
                }
            }
            _ => {}
        }
        self.finish(store, Some(world))
    }

    /// The pointer left the board: two-point drawing and text editing are
    /// discarded, anything else finishes where it is.
    pub fn pointer_leave(&mut self, store: &mut LayerStore) -> Response {
        self.input.handle_pointer_event(PointerEvent::Leave);
        self.hovered_handle = None;
        match self.state {
            InteractionState::DrawingTwoPoint { .. } | InteractionState::EditingText { .. } => {
                self.state = InteractionState::Idle;
                Response::redraw()
            }
            _ => self.finish(store, None),
        }
    }

    /// End the active session, committing whatever it produced.
    fn finish(&mut self, store: &mut LayerStore, release: Option<Point>) -> Response {
        match std::mem::take(&mut self.state) {
            InteractionState::Idle => Response::none(),
            InteractionState::Panning { .. } => Response::redraw(),
            InteractionState::Resizing(resize) => {
                let ids = [resize.element_id];
                let changes = commit_moved(store, &ids, HistoryAction::ResizeElement);
                Response::changed(changes)
            }
            InteractionState::Dragging(drag) => {
                if !drag.moved {
                    return Response::none();
                }
                let changes = commit_moved(store, &drag.ids(), HistoryAction::MoveElements);
                Response::changed(changes)
            }
            InteractionState::DrawingFreehand { points } => {
                match drawing_properties(&points, self.stroke_color, FREEHAND_STROKE_WIDTH) {
                    Some(properties) => {
                        Response::changed(vec![Change::Upsert(add_element(store, properties))])
                    }
                    None => Response::redraw(),
                }
            }
            InteractionState::DrawingTwoPoint { tool, start, end } => {
                self.tool = ToolKind::Select;
                commit_two_point(store, tool, start, release.unwrap_or(end))
            }
            editing @ InteractionState::EditingText { .. } => {
                self.state = editing;
                Response::none()
            }
        }
    }

    pub fn wheel(&mut self, screen: Point, delta_y: f64) -> Response {
        if !delta_y.is_finite() || delta_y.abs() < f64::EPSILON {
            return Response::none();
        }
        let factor = if delta_y > 0.0 { WHEEL_ZOOM_OUT } else { WHEEL_ZOOM_IN };
        if self.camera.zoom_at(screen, factor) {
            Response::redraw()
        } else {
            Response::none()
        }
    }

    // --- text editing --------------------------------------------------

    /// Start editing a text or sticky element under `screen`.
    pub fn double_click(&mut self, store: &LayerStore, screen: Point) -> Response {
        if self.settings.locked || !self.state.is_idle() {
            return Response::none();
        }
        let world = self.camera.screen_to_world(screen);
        if self.begin_text_edit(store, world) {
            Response::redraw()
        } else {
            Response::none()
        }
    }

    fn begin_text_edit(&mut self, store: &LayerStore, world: Point) -> bool {
        let Some(id) = store.element_at(world) else {
            return false;
        };
        let Some(text) = store.element(id).and_then(|e| e.properties.text()) else {
            return false;
        };
        self.state = InteractionState::EditingText {
            element_id: id,
            buffer: text.to_string(),
        };
        true
    }

    /// Replace the text being edited. Returns `false` when not editing.
    pub fn text_input(&mut self, text: &str) -> bool {
        match &mut self.state {
            InteractionState::EditingText { buffer, .. } => {
                *buffer = text.to_string();
                true
            }
            _ => false,
        }
    }

    /// The editing overlay lost focus: keep what was typed.
    pub fn focus_lost(&mut self, store: &mut LayerStore) -> Response {
        self.commit_text(store)
    }

    fn commit_text(&mut self, store: &mut LayerStore) -> Response {
        let (element_id, buffer) = match std::mem::take(&mut self.state) {
            InteractionState::EditingText { element_id, buffer } => (element_id, buffer),
            other => {
                self.state = other;
                return Response::none();
            }
        };
        let user = store.user().cloned();
        let Some(element) = store.element_mut(element_id) else {
            log::debug!("text edit target {element_id} disappeared");
            return Response::redraw();
        };
        if element.properties.text() == Some(buffer.as_str()) {
            return Response::redraw();
        }
        element.properties.set_text(buffer);
        element.touch(user.as_ref());
        store.commit(HistoryAction::EditText);
        Response::changed(vec![Change::Upsert(element_id)])
    }

    pub fn text_overlay(&self, store: &LayerStore) -> Option<TextOverlay> {
        let InteractionState::EditingText { element_id, buffer } = &self.state else {
            return None;
        };
        let element = store.element(*element_id)?;
        let font_size = match &element.properties {
            Properties::Text(text) => text.font_size,
            Properties::Sticky(sticky) => sticky.font_size,
            _ => return None,
        };
        let frame = element.properties.frame();
        let rect = Rect::from_points(
            self.camera.world_to_screen(Point::new(frame.x0, frame.y0)),
            self.camera.world_to_screen(Point::new(frame.x1, frame.y1)),
        );
        Some(TextOverlay {
            element_id: *element_id,
            rect,
            font_size: font_size * self.camera.zoom,
            text: buffer.clone(),
        })
    }

    // --- keyboard ------------------------------------------------------

    /// Handle a key press. Keys use DOM names (`"z"`, `"Delete"`, `"ArrowUp"`).
    pub fn key(&mut self, store: &mut LayerStore, key: &str, modifiers: Modifiers) -> Response {
        self.input.set_modifiers(modifiers);
        if matches!(self.state, InteractionState::EditingText { .. }) {
            return match key {
                "Enter" => self.commit_text(store),
                "Escape" => {
                    self.state = InteractionState::Idle;
                    Response::redraw()
                }
                _ => Response::none(),
            };
        }
        if key == "Escape" {
            return self.cancel(store);
        }

        let lower = key.to_ascii_lowercase();
        if modifiers.command() {
            return match (lower.as_str(), modifiers.shift) {
                ("c", _) => {
                    let ids = store.selection().to_vec();
                    store.copy(&ids);
                    Response::none()
                }
                _ if self.settings.locked => Response::none(),
                ("z", false) => self.undo(store),
                ("z", true) | ("y", _) => self.redo(store),
                ("g", false) => self.group_selection(store),
                ("g", true) => self.ungroup_selection(store),
                ("d", _) => self.duplicate_selection(store),
                ("v", _) => {
                    Response::changed(store.paste().into_iter().map(Change::Upsert).collect())
                }
                _ => Response::none(),
            };
        }

        let step = ARROW_PAN_STEP / self.camera.zoom;
        match key {
            "Delete" | "Backspace" if !self.settings.locked => self.delete_selection(store),
            "ArrowUp" => self.pan_by(Vec2::new(0.0, step)),
            "ArrowDown" => self.pan_by(Vec2::new(0.0, -step)),
            "ArrowLeft" => self.pan_by(Vec2::new(step, 0.0)),
            "ArrowRight" => self.pan_by(Vec2::new(-step, 0.0)),
            _ => match lower.as_str() {
                "r" => self.reset_view(),
                "o" => self.center_on_origin(),
                "f" => self.fit_content(store),
                _ => Response::none(),
            },
        }
    }

    /// Escape: drop an in-progress drawing, or clear the selection when idle.
    fn cancel(&mut self, store: &mut LayerStore) -> Response {
        match self.state {
            InteractionState::DrawingFreehand { .. } | InteractionState::DrawingTwoPoint { .. } => {
                self.state = InteractionState::Idle;
                Response::redraw()
            }
            InteractionState::Idle => {
                if store.selection().is_empty() {
                    Response::none()
                } else {
                    store.clear_selection();
                    Response::redraw()
                }
            }
            _ => self.finish(store, None),
        }
    }

    pub fn undo(&mut self, store: &mut LayerStore) -> Response {
        let before = store.elements().to_vec();
        if !store.undo() {
            return Response::none();
        }
        Response::changed(diff_elements(&before, store.elements()))
    }

    pub fn redo(&mut self, store: &mut LayerStore) -> Response {
        let before = store.elements().to_vec();
        if !store.redo() {
            return Response::none();
        }
        Response::changed(diff_elements(&before, store.elements()))
    }

    fn group_selection(&mut self, store: &mut LayerStore) -> Response {
        let ids = store.selection().to_vec();
        let Some(group) = store.group(&ids) else {
            return Response::none();
        };
        let children = store
            .element(group)
            .and_then(Element::as_group)
            .map(|g| g.children.clone())
            .unwrap_or_default();
        Response::changed(vec![Change::Grouped { group, children }])
    }

    fn ungroup_selection(&mut self, store: &mut LayerStore) -> Response {
        let ids = store.selection().to_vec();
        let changes: Vec<Change> = ids
            .into_iter()
            .filter(|id| store.ungroup(*id))
            .map(|group| Change::Ungrouped { group })
            .collect();
        if changes.is_empty() {
            Response::none()
        } else {
            Response::changed(changes)
        }
    }

    fn duplicate_selection(&mut self, store: &mut LayerStore) -> Response {
        let ids = store.selection().to_vec();
        let copies: Vec<ElementId> = ids.into_iter().filter_map(|id| store.duplicate(id)).collect();
        if copies.is_empty() {
            return Response::none();
        }
        store.select(&copies);
        Response::changed(copies.into_iter().map(Change::Upsert).collect())
    }

    fn delete_selection(&mut self, store: &mut LayerStore) -> Response {
        let ids = store.selection().to_vec();
        let changes: Vec<Change> = ids
            .into_iter()
            .flat_map(|id| remove_with_changes(store, id))
            .collect();
        store.clear_selection();
        if changes.is_empty() {
            Response::none()
        } else {
            Response::changed(changes)
        }
    }

    // --- view ----------------------------------------------------------

    fn pan_by(&mut self, delta: Vec2) -> Response {
        self.camera.pan(delta);
        Response::redraw()
    }

    pub fn reset_view(&mut self) -> Response {
        self.camera.reset();
        Response::redraw()
    }

    pub fn center_on_origin(&mut self) -> Response {
        self.camera.center_on(Point::ZERO, self.viewport);
        Response::redraw()
    }

    /// Zoom and pan so every element is visible.
    pub fn fit_content(&mut self, store: &LayerStore) -> Response {
        match store.content_bounds() {
            Some(content) => self.camera.fit_to_bounds(content, self.viewport, FIT_PADDING),
            None => self.camera.reset(),
        }
        Response::redraw()
    }

    // --- uploads -------------------------------------------------------

    /// Create an image element once the host has uploaded the file.
    pub fn place_image(
        &mut self,
        store: &mut LayerStore,
        position: Point,
        file: &UploadedFile,
    ) -> Response {
        let Some(Properties::Image(mut image)) = properties_at(ToolKind::Image, position) else {
            return Response::none();
        };
        image.file_id = Some(file.id.clone());
        image.src = file.url.clone();
        image.alt = file.name.clone();
        let id = add_element(store, Properties::Image(image));
        Response::changed(vec![Change::Upsert(id)])
    }

    /// Create a file card once the host has uploaded the file.
    pub fn place_file(
        &mut self,
        store: &mut LayerStore,
        position: Point,
        file: &UploadedFile,
    ) -> Response {
        let Some(Properties::File(mut card)) = properties_at(ToolKind::File, position) else {
            return Response::none();
        };
        card.file_id = Some(file.id.clone());
        card.file_name = file.name.clone();
        card.file_type = file.mime_type.clone();
        card.file_size = file.size;
        if file.mime_type.starts_with("image/") {
            card.preview_url = Some(file.url.clone());
        }
        let id = add_element(store, Properties::File(card));
        Response::changed(vec![Change::Upsert(id)])
    }

    // --- feedback ------------------------------------------------------

    /// Element being drawn, for the renderer.
    pub fn preview(&self) -> Option<Properties> {
        match &self.state {
            InteractionState::DrawingFreehand { points } => {
                drawing_properties(points, self.stroke_color, FREEHAND_STROKE_WIDTH)
            }
            InteractionState::DrawingTwoPoint { tool, start, end } => {
                two_point_properties(*tool, *start, *end)
            }
            _ => None,
        }
    }

    pub fn cursor(&self) -> CursorIcon {
        match &self.state {
            InteractionState::Panning { .. } => CursorIcon::Grabbing,
            InteractionState::Resizing(resize) => resize.handle.cursor(),
            InteractionState::Dragging(_) => CursorIcon::Move,
            InteractionState::DrawingFreehand { .. } | InteractionState::DrawingTwoPoint { .. } => {
                CursorIcon::Crosshair
            }
            InteractionState::EditingText { .. } => CursorIcon::Text,
            InteractionState::Idle if self.settings.locked => CursorIcon::Grab,
            InteractionState::Idle => self
                .hovered_handle
                .map_or_else(|| self.tool.cursor(), HandleKind::cursor),
        }
    }

    fn handle_under(&self, store: &LayerStore, world: Point) -> Option<HandleKind> {
        if self.tool != ToolKind::Select || self.settings.locked {
            return None;
        }
        let tolerance = self.camera.screen_len_to_world(HANDLE_RADIUS);
        store
            .single_selected()
            .filter(|e| !e.is_group())
            .and_then(|e| hit_test_handles(e, world, tolerance))
    }
}

fn add_element(store: &mut LayerStore, properties: Properties) -> ElementId {
    let element = Element::new(properties, store.next_z(), store.user().cloned());
    let id = store.add(element);
    store.select(&[id]);
    id
}

/// Selected elements plus the children of selected groups.
fn drag_state(store: &LayerStore, world: Point) -> DragState {
    let mut ids: Vec<ElementId> = Vec::new();
    for element in store.selected_elements() {
        let children = element.as_group().map(|g| g.children.as_slice()).unwrap_or_default();
        for id in std::iter::once(&element.id).chain(children) {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
    }
    let offsets = ids
        .into_iter()
        .filter_map(|id| store.element(id).map(|e| (id, world - e.properties.frame().origin())))
        .collect();
    DragState { offsets, moved: false }
}

fn resize_to(store: &mut LayerStore, resize: &ResizeState, world: Point) {
    let rect = resize.rect_at(world);
    let id = resize.element_id;
    if let Some(element) = store.element_mut(id) {
        element.properties.set_frame(rect);
    }
    follow_connectors(store, &[id]);
}

/// Move the dragged elements so the grab point sits under `world`. Returns
/// whether anything moved.
fn drag_to(store: &mut LayerStore, drag: &DragState, world: Point) -> bool {
    let mut moved = false;
    for (id, offset) in &drag.offsets {
        if let Some(element) = store.element_mut(*id) {
            let delta = (world - *offset) - element.properties.frame().origin();
            if delta != Vec2::ZERO {
                element.translate(delta);
                moved = true;
            }
        }
    }
    if moved {
        follow_connectors(store, &drag.ids());
    }
    moved
}

/// Snap attached connector endpoints to the centres of `moved`. Returns the
/// connectors touched.
fn follow_connectors(store: &mut LayerStore, moved: &[ElementId]) -> Vec<ElementId> {
    let mut touched = Vec::new();
    for id in moved {
        let Some(center) = store.element(*id).map(Element::center) else {
            continue;
        };
        for connector_id in store.connectors_attached_to(*id) {
            if let Some(Properties::Connector(connector)) =
                store.element_mut(connector_id).map(|e| &mut e.properties)
            {
                if connector.start_element == Some(*id) {
                    connector.start_point = center;
                }
                if connector.end_element == Some(*id) {
                    connector.end_point = center;
                }
                connector.sync_frame();
            }
            if !touched.contains(&connector_id) {
                touched.push(connector_id);
            }
        }
    }
    touched
}

/// Stamp and record elements edited in place, plus connectors that followed.
fn commit_moved(store: &mut LayerStore, ids: &[ElementId], action: HistoryAction) -> Vec<Change> {
    let connectors = follow_connectors(store, ids);
    let user = store.user().cloned();
    let mut changes = Vec::new();
    for id in ids.iter().chain(connectors.iter()) {
        if let Some(element) = store.element_mut(*id) {
            element.touch(user.as_ref());
            let change = Change::Upsert(*id);
            if !changes.contains(&change) {
                changes.push(change);
            }
        }
    }
    store.commit(action);
    changes
}

fn commit_two_point(store: &mut LayerStore, tool: ToolKind, start: Point, end: Point) -> Response {
    let Some(mut properties) = two_point_properties(tool, start, end) else {
        return Response::redraw();
    };
    if let Properties::Connector(connector) = &mut properties {
        if let Some((id, center)) = connect_target(store, start) {
            connector.start_element = Some(id);
            connector.start_point = center;
        }
        if let Some((id, center)) = connect_target(store, end) {
            connector.end_element = Some(id);
            connector.end_point = center;
        }
        connector.sync_frame();
    }
    Response::changed(vec![Change::Upsert(add_element(store, properties))])
}

/// Element a connector end should bind to at `point`.
fn connect_target(store: &LayerStore, point: Point) -> Option<(ElementId, Point)> {
    let element = store.element(store.element_at(point)?)?;
    match element.element_type() {
        ElementType::Connector | ElementType::Group => None,
        _ => Some((element.id, element.center())),
    }
}

/// Remove an element and report the deletion plus any links it broke.
fn remove_with_changes(store: &mut LayerStore, id: ElementId) -> Vec<Change> {
    let Some(removed) = store.element(id) else {
        return Vec::new();
    };
    let parent = removed.group_id;
    let released: Vec<ElementId> = store
        .elements()
        .iter()
        .filter(|e| e.group_id == Some(id))
        .map(|e| e.id)
        .collect();
    if !store.remove(id) {
        return Vec::new();
    }
    let mut changes = vec![Change::Delete(id)];
    changes.extend(released.into_iter().map(Change::Upsert));
    changes.extend(parent.filter(|p| store.element(*p).is_some()).map(Change::Upsert));
    changes
}
