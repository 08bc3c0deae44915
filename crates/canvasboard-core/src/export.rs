//! Board export and import as JSON documents.

use crate::elements::{BoardId, Element};
use crate::layers::LayerStore;
use crate::settings::BoardSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(String),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// A self-contained copy of a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardExport {
    #[serde(default)]
    pub board_id: Option<BoardId>,
    pub elements: Vec<Element>,
    #[serde(default)]
    pub settings: BoardSettings,
    pub timestamp: DateTime<Utc>,
}

impl BoardExport {
    /// Snapshot the store's elements and the board settings.
    pub fn capture(
        board_id: Option<&BoardId>,
        store: &LayerStore,
        settings: &BoardSettings,
    ) -> Self {
        Self {
            board_id: board_id.cloned(),
            elements: store.elements().to_vec(),
            settings: settings.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> ExportResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ExportError::Serialization(e.to_string()))
    }

    /// Parse an export. Elements with invalid properties reject the whole file.
    pub fn from_json(json: &str) -> ExportResult<Self> {
        serde_json::from_str(json).map_err(|e| ExportError::Serialization(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> ExportResult<()> {
        let json = self.to_json()?;
        fs::write(path, json)
            .map_err(|e| ExportError::Io(format!("failed to write {}: {}", path.display(), e)))?;
        log::info!("exported {} elements to {}", self.elements.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> ExportResult<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| ExportError::Io(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json).map_err(|e| {
            ExportError::Serialization(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Replace the store's contents with this export and return its settings.
    ///
    /// Local history restarts from the imported state.
    pub fn apply(self, store: &mut LayerStore) -> BoardSettings {
        store.load_state(self.elements);
        self.settings
    }

    /// Suggested file name, e.g. `board-abc-20240101T120000.json`.
    pub fn file_name(&self) -> String {
        let stamp = self.timestamp.format("%Y%m%dT%H%M%S");
        match &self.board_id {
            Some(id) => format!("board-{id}-{stamp}.json"),
            None => format!("board-{stamp}.json"),
        }
    }
}
