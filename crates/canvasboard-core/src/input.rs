//! Input state management for pointer and keyboard events.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
        alt: false,
        meta: false,
    };

    pub const CTRL_SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: true,
        alt: false,
        meta: false,
    };

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Pointer event in screen coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
    },
    Up {
        position: Point,
        button: MouseButton,
    },
    Move {
        position: Point,
    },
    Scroll {
        position: Point,
        delta: Vec2,
    },
    /// The pointer left the board surface.
    Leave,
}

/// Keyboard event. Keys use DOM-style names: `"a"`, `"Delete"`, `"ArrowLeft"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KeyEvent {
    Pressed(String),
    Released(String),
}

/// Cursor the host should show over the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CursorIcon {
    #[default]
    Default,
    Crosshair,
    Text,
    Grab,
    Grabbing,
    Move,
    /// Diagonal resize, north-west to south-east.
    NwseResize,
    /// Diagonal resize, north-east to south-west.
    NeswResize,
    NsResize,
    EwResize,
    NotAllowed,
}

const DOUBLE_CLICK_TIME: Duration = Duration::from_millis(500);
const DOUBLE_CLICK_DISTANCE: f64 = 5.0;
/// Minimum spacing between processed pointer moves.
pub const MOVE_THROTTLE: Duration = Duration::from_millis(8);

/// Tracks pointer and keyboard state between events.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Current pointer position in screen coordinates.
    pub pointer_position: Point,
    /// Pointer position at the previous processed event.
    pub previous_pointer_position: Point,
    pressed_buttons: HashSet<MouseButton>,
    pub modifiers: Modifiers,
    pressed_keys: HashSet<String>,
    last_click_time: Option<Instant>,
    last_click_position: Option<Point>,
    double_click_detected: bool,
    last_move: Option<Instant>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_pointer_event(&mut self, event: PointerEvent) -> bool {
        self.handle_pointer_event_at(event, Instant::now())
    }

    /// Process a pointer event observed at `now`.
    ///
    /// Returns `false` for moves dropped by the throttle; callers should skip
    /// those entirely.
    pub fn handle_pointer_event_at(&mut self, event: PointerEvent, now: Instant) -> bool {
        match event {
            PointerEvent::Down { position, button } => {
                self.set_position(position);
                self.pressed_buttons.insert(button);
                self.double_click_detected = false;
                if button == MouseButton::Left {
                    self.detect_double_click(position, now);
                }
                true
            }
            PointerEvent::Up { position, button } => {
                self.set_position(position);
                self.pressed_buttons.remove(&button);
                true
            }
            PointerEvent::Move { position } => {
                if self
                    .last_move
                    .is_some_and(|last| now.saturating_duration_since(last) < MOVE_THROTTLE)
                {
                    return false;
                }
                self.last_move = Some(now);
                self.set_position(position);
                true
            }
            PointerEvent::Scroll { position, .. } => {
                self.set_position(position);
                true
            }
            PointerEvent::Leave => {
                self.pressed_buttons.clear();
                true
            }
        }
    }

    fn set_position(&mut self, position: Point) {
        self.previous_pointer_position = self.pointer_position;
        self.pointer_position = position;
    }

    fn detect_double_click(&mut self, position: Point, now: Instant) {
        if let (Some(last_time), Some(last_pos)) =
            (self.last_click_time, self.last_click_position)
        {
            let elapsed = now.saturating_duration_since(last_time);
            let close = (position - last_pos).hypot() < DOUBLE_CLICK_DISTANCE;
            if elapsed < DOUBLE_CLICK_TIME && close {
                self.double_click_detected = true;
                // A third click starts a new pair.
                self.last_click_time = None;
                self.last_click_position = None;
                return;
            }
        }
        self.last_click_time = Some(now);
        self.last_click_position = Some(position);
    }

    pub fn handle_key_event(&mut self, event: KeyEvent) {
        match event {
            KeyEvent::Pressed(key) => {
                self.pressed_keys.insert(key);
            }
            KeyEvent::Released(key) => {
                self.pressed_keys.remove(&key);
            }
        }
    }

    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }

    /// Whether the last pointer-down completed a double-click.
    pub fn is_double_click(&self) -> bool {
        self.double_click_detected
    }

    /// Pointer movement since the previous processed event.
    pub fn pointer_delta(&self) -> Vec2 {
        self.pointer_position - self.previous_pointer_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Down {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    #[test]
    fn test_button_press_and_release() {
        let mut input = InputState::new();
        input.handle_pointer_event(down(100.0, 100.0));
        assert!(input.is_button_pressed(MouseButton::Left));
        assert!(!input.is_button_pressed(MouseButton::Right));

        input.handle_pointer_event(PointerEvent::Up {
            position: Point::new(100.0, 100.0),
            button: MouseButton::Left,
        });
        assert!(!input.is_button_pressed(MouseButton::Left));
    }

    #[test]
    fn test_move_throttle() {
        let mut input = InputState::new();
        let t0 = Instant::now();
        let mv = |x| PointerEvent::Move {
            position: Point::new(x, 0.0),
        };
        assert!(input.handle_pointer_event_at(mv(1.0), t0));
        assert!(!input.handle_pointer_event_at(mv(2.0), t0 + Duration::from_millis(3)));
        assert!((input.pointer_position.x - 1.0).abs() < f64::EPSILON);
        assert!(input.handle_pointer_event_at(mv(3.0), t0 + Duration::from_millis(9)));
        assert!((input.pointer_position.x - 3.0).abs() < f64::EPSILON);
        assert!((input.pointer_delta().x - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_double_click_detection() {
        let mut input = InputState::new();
        let t0 = Instant::now();
        input.handle_pointer_event_at(down(100.0, 100.0), t0);
        assert!(!input.is_double_click());
        input.handle_pointer_event_at(down(101.0, 100.0), t0 + Duration::from_millis(200));
        assert!(input.is_double_click());
        // Third click does not chain.
        input.handle_pointer_event_at(down(101.0, 100.0), t0 + Duration::from_millis(300));
        assert!(!input.is_double_click());
    }

    #[test]
    fn test_double_click_too_far_or_slow() {
        let mut input = InputState::new();
        let t0 = Instant::now();
        input.handle_pointer_event_at(down(100.0, 100.0), t0);
        input.handle_pointer_event_at(down(200.0, 200.0), t0 + Duration::from_millis(100));
        assert!(!input.is_double_click());
        input.handle_pointer_event_at(down(200.0, 200.0), t0 + Duration::from_millis(900));
        assert!(!input.is_double_click());
    }

    #[test]
    fn test_leave_releases_buttons() {
        let mut input = InputState::new();
        input.handle_pointer_event(down(0.0, 0.0));
        input.handle_pointer_event(PointerEvent::Leave);
        assert!(!input.is_button_pressed(MouseButton::Left));
    }

    #[test]
    fn test_key_press() {
        let mut input = InputState::new();
        input.handle_key_event(KeyEvent::Pressed("a".to_string()));
        assert!(input.is_key_pressed("a"));
        input.handle_key_event(KeyEvent::Released("a".to_string()));
        assert!(!input.is_key_pressed("a"));
    }

    #[test]
    fn test_command_modifier() {
        assert!(Modifiers::CTRL.command());
        assert!(!Modifiers::NONE.command());
        let meta = Modifiers {
            meta: true,
            ..Modifiers::default()
        };
        assert!(meta.command());
    }
}
