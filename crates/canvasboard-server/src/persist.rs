//! Optional JSON persistence, one file per board.
//!
//! Handlers mark a board dirty after each commit; a background task writes
//! the board's current state. Bursts of commits collapse into one write.

use crate::store::{BoardState, BoardStore};
use canvasboard_core::elements::BoardId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("serialization error on {path}: {source}")]
    Serialization {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Serialize, Deserialize)]
struct BoardFile {
    board_id: BoardId,
    #[serde(flatten)]
    state: BoardState,
}

/// File name for a board id. Anything outside `[A-Za-z0-9_-]` is
/// percent-encoded; the id itself is stored inside the file.
fn file_name(board_id: &str) -> String {
    let mut name = String::with_capacity(board_id.len() + EXTENSION.len() + 1);
    for byte in board_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{byte:02X}"));
        }
    }
    name.push('.');
    name.push_str(EXTENSION);
    name
}

/// Write one board.
pub async fn save_board(dir: &Path, board_id: &str, state: BoardState) -> Result<(), PersistError> {
    let path = dir.join(file_name(board_id));
    let file = BoardFile {
        board_id: board_id.to_string(),
        state,
    };
    let json = serde_json::to_vec_pretty(&file).map_err(|source| PersistError::Serialization {
        path: path.clone(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|source| PersistError::Io { path: tmp.clone(), source })?;
    tokio::fs::rename(&tmp, &path)
        .await
        .map_err(|source| PersistError::Io { path: path.clone(), source })?;
    Ok(())
}

/// Load every board file in `dir` into `store`. Unreadable files are logged
/// and skipped. Returns how many boards were loaded.
pub async fn load_all(dir: &Path, store: &BoardStore) -> Result<usize, PersistError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| PersistError::Io { path: dir.to_path_buf(), source })?;
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|source| PersistError::Io { path: dir.to_path_buf(), source })?;

    let mut loaded = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => return Err(PersistError::Io { path: dir.to_path_buf(), source }),
        };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        match read_board(&path).await {
            Ok(file) => {
                tracing::debug!(
                    board_id = %file.board_id,
                    elements = file.state.elements.len(),
                    "loaded board"
                );
                store.restore(&file.board_id, file.state);
                loaded += 1;
            }
            Err(e) => tracing::warn!("skipping board file: {}", e),
        }
    }
    Ok(loaded)
}

async fn read_board(path: &Path) -> Result<BoardFile, PersistError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| PersistError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

/// Handle to the background writer.
#[derive(Clone)]
pub struct Persister {
    tx: mpsc::UnboundedSender<BoardId>,
}

impl Persister {
    /// Start the writer. It runs until every handle is dropped, then
    /// finishes pending writes and exits.
    pub fn spawn(dir: PathBuf, store: Arc<BoardStore>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<BoardId>();
        let task = tokio::spawn(async move {
            while let Some(board_id) = rx.recv().await {
                let mut dirty = HashSet::from([board_id]);
                while let Ok(more) = rx.try_recv() {
                    dirty.insert(more);
                }
                for board_id in dirty {
                    let state = match store.export(&board_id) {
                        Ok(Some(state)) => state,
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::error!(%board_id, "failed to read board for saving: {}", e);
                            continue;
                        }
                    };
                    match save_board(&dir, &board_id, state).await {
                        Ok(()) => tracing::debug!(%board_id, "board saved"),
                        Err(e) => tracing::error!(%board_id, "failed to save board: {}", e),
                    }
                }
            }
        });
        (Self { tx }, task)
    }

    pub fn mark_dirty(&self, board_id: &str) {
        if self.tx.send(board_id.to_string()).is_err() {
            tracing::warn!(board_id, "persistence writer stopped; change not saved");
        }
    }
}
