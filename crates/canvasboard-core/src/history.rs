//! Local undo/redo history.
//!
//! Each entry is a full copy of the board taken *after* a mutation. The
//! pointer names the entry that mirrors the live state; undo steps it back,
//! redo forward, and recording a new entry drops everything ahead of it.

use crate::elements::{Element, ElementId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of entries kept.
pub const MAX_HISTORY: usize = 50;

/// What produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Load,
    AddElement,
    RemoveElement,
    UpdateElement,
    BringToFront,
    SendToBack,
    MoveUp,
    MoveDown,
    GroupElements,
    UngroupElements,
    MoveElements,
    ResizeElement,
    EditText,
    Duplicate,
    Paste,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub timestamp: DateTime<Utc>,
    pub elements: Vec<Element>,
    pub selection: Vec<ElementId>,
}

impl HistoryEntry {
    pub fn new(action: HistoryAction, elements: &[Element], selection: &[ElementId]) -> Self {
        Self {
            action,
            timestamp: Utc::now(),
            elements: elements.to_vec(),
            selection: selection.to_vec(),
        }
    }
}

/// Fixed-capacity ring of board snapshots with a movable pointer.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    index: Option<usize>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            index: None,
            capacity: capacity.max(1),
        }
    }

    /// Append an entry, discarding any redo tail first.
    pub fn record(&mut self, entry: HistoryEntry) {
        let keep = self.index.map_or(0, |i| i + 1);
        self.entries.truncate(keep);
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.index = Some(self.entries.len() - 1);
    }

    /// Overwrite the entry under the pointer with the live state.
    ///
    /// Keeps undo followed by redo exact even after selection changes or
    /// remote updates that do not record history.
    pub fn refresh_current(&mut self, elements: &[Element], selection: &[ElementId]) {
        if let Some(entry) = self.index.and_then(|i| self.entries.get_mut(i)) {
            entry.elements = elements.to_vec();
            entry.selection = selection.to_vec();
        }
    }

    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        match self.index {
            Some(i) if i > 0 => {
                self.index = Some(i - 1);
                self.entries.get(i - 1)
            }
            _ => None,
        }
    }

    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        match self.index {
            Some(i) if i + 1 < self.entries.len() => {
                self.index = Some(i + 1);
                self.entries.get(i + 1)
            }
            _ => None,
        }
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.index, Some(i) if i > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.index, Some(i) if i + 1 < self.entries.len())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}
