//! Canvasboard Core Library
//!
//! Element model, layer store, interaction engine and synchronization for
//! the Canvasboard shared whiteboard.

pub mod camera;
pub mod elements;
pub mod export;
pub mod history;
pub mod input;
pub mod interaction;
pub mod layers;
pub mod selection;
#[cfg(feature = "client")]
pub mod session;
pub mod settings;
pub mod sync;
pub mod tools;

pub use camera::Camera;
pub use elements::{
    BoardId, Color, Element, ElementError, ElementId, ElementType, Properties, UserId,
};
pub use export::{BoardExport, ExportError};
pub use history::{History, HistoryAction};
pub use input::{CursorIcon, InputState, Modifiers, MouseButton};
pub use interaction::{InteractionEngine, InteractionState, Response, UploadRequest, UploadedFile};
pub use layers::{Change, LayerStore};
pub use selection::{HandleKind, ResizeState};
#[cfg(feature = "client")]
pub use session::{BoardSession, Notice, SessionConfig};
pub use settings::{BoardSettings, GridStyle};
pub use sync::{BoardEvent, SyncError};
pub use tools::ToolKind;
