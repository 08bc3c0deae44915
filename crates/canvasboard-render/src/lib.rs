//! Canvasboard Render Library
//!
//! Turns a board into a retained display list that a host replays with its
//! own 2D backend.

mod display_list;
pub mod grid;
mod images;
mod renderer;

pub use display_list::{DisplayList, DrawCommand};
pub use grid::{GridPlan, MAX_GRID_LINES, MAX_GRID_POINTS};
pub use images::{HttpImageSource, ImageCache, ImageError, ImageSource, decode};
pub use renderer::{FrameRenderer, RENDER_THROTTLE, RenderResult, RendererError};
