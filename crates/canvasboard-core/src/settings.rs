//! Board-wide display settings.

use crate::elements::Color;
use serde::{Deserialize, Serialize};

/// Default grid spacing in world units.
pub const DEFAULT_GRID_SIZE: f64 = 20.0;

/// Grid style for the board background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridStyle {
    /// Plain background.
    None,
    /// Full grid lines.
    Lines,
    /// A dot at every grid intersection.
    #[default]
    Dots,
}

impl GridStyle {
    /// Cycle to the next grid style.
    pub fn next(self) -> Self {
        match self {
            GridStyle::None => GridStyle::Lines,
            GridStyle::Lines => GridStyle::Dots,
            GridStyle::Dots => GridStyle::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GridStyle::None => "None",
            GridStyle::Lines => "Lines",
            GridStyle::Dots => "Dots",
        }
    }
}

fn default_grid_size() -> f64 {
    DEFAULT_GRID_SIZE
}

/// Background, grid and lock state of a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSettings {
    #[serde(default = "Color::white")]
    pub background_color: Color,
    #[serde(default)]
    pub grid_style: GridStyle,
    #[serde(default = "default_grid_size")]
    pub grid_size: f64,
    /// When set, pointer input only pans and edits are refused.
    #[serde(default, alias = "isLocked")]
    pub locked: bool,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            background_color: Color::white(),
            grid_style: GridStyle::default(),
            grid_size: DEFAULT_GRID_SIZE,
            locked: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_grid_style_cycles() {
        let mut style = GridStyle::None;
        for _ in 0..3 {
            style = style.next();
        }
        assert_eq!(style, GridStyle::None);
    }

    #[test]
    fn test_settings_defaults_from_partial_json() {
        let settings: BoardSettings =
            serde_json::from_value(json!({ "gridStyle": "lines", "isLocked": true })).unwrap();
        assert_eq!(settings.grid_style, GridStyle::Lines);
        assert!(settings.locked);
        assert!((settings.grid_size - DEFAULT_GRID_SIZE).abs() < f64::EPSILON);
        assert_eq!(settings.background_color, Color::white());
    }
}
