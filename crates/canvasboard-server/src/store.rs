//! Authoritative per-board element storage.
//!
//! Every board is a [`BoardState`] behind its own mutex, so each request is
//! applied to one board atomically. Elements carry a version counter that
//! only ever grows, even across deletes and restores, and every board keeps
//! an append-only snapshot log used by the whole-board undo.

use canvasboard_core::elements::{
    BoardId, Element, ElementError, ElementId, ElementType, Properties, UserId, default_properties,
    union_bounds,
};
use canvasboard_core::sync::protocol::{
    CHANGE_UNDO, CreateElementRequest, ElementPage, GroupRequest, Pagination, Snapshot,
    SnapshotData, UpdateElementRequest,
};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Largest page the element listing serves.
pub const MAX_PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ElementError),
    #[error("version conflict: client has {client_version}, server has {}", .server.version)]
    Conflict { server: Box<Element>, client_version: u64 },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Rejected(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything stored for one board.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardState {
    /// Sorted by `z_index`, then creation time.
    pub elements: Vec<Element>,
    /// Oldest first.
    pub snapshots: Vec<Snapshot>,
    next_snapshot_id: u64,
    /// Highest version ever issued per element id, deleted ones included.
    versions: HashMap<ElementId, u64>,
}

impl BoardState {
    fn position(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|e| e.id == id)
    }

    fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    fn sort(&mut self) {
        self.elements
            .sort_by(|a, b| a.z_index.cmp(&b.z_index).then(a.created_at.cmp(&b.created_at)));
    }

    /// Version for the next write of `id`, never below `floor`.
    fn next_version(&mut self, id: ElementId, floor: u64) -> u64 {
        let version = self.versions.get(&id).copied().unwrap_or(0).max(floor) + 1;
        self.versions.insert(id, version);
        version
    }

    fn record_version(&mut self, id: ElementId, version: u64) {
        let entry = self.versions.entry(id).or_insert(version);
        *entry = (*entry).max(version);
    }

    fn capture(&self) -> SnapshotData {
        SnapshotData {
            elements: self.elements.clone(),
            timestamp: Utc::now(),
        }
    }

    fn append_snapshot(
        &mut self,
        board_id: &str,
        data: SnapshotData,
        change_type: &str,
        user: &UserId,
    ) -> Snapshot {
        self.next_snapshot_id += 1;
        let snapshot = Snapshot {
            id: self.next_snapshot_id,
            board_id: board_id.to_string(),
            snapshot_data: data,
            change_type: change_type.to_string(),
            created_by: Some(user.clone()),
            created_at: Utc::now(),
        };
        self.snapshots.push(snapshot.clone());
        snapshot
    }

    /// Remove `child` from the `children` list of `group_id`.
    fn unlink_child(&mut self, group_id: ElementId, child: ElementId) {
        if let Some(pos) = self.position(group_id) {
            if let Properties::Group(group) = &mut self.elements[pos].properties {
                group.children.retain(|c| *c != child);
            }
        }
    }
}

/// All boards, created on first use.
#[derive(Default)]
pub struct BoardStore {
    boards: DashMap<BoardId, Arc<Mutex<BoardState>>>,
}

impl BoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn board(&self, board_id: &str) -> Arc<Mutex<BoardState>> {
        self.boards
            .entry(board_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(BoardState::default())))
            .clone()
    }

    /// Run `f` with exclusive access to one board.
    fn with_board<T>(
        &self,
        board_id: &str,
        f: impl FnOnce(&mut BoardState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let board = self.board(board_id);
        let mut state = board
            .lock()
            .map_err(|_| StoreError::Internal(format!("board {board_id} lock poisoned")))?;
        f(&mut state)
    }

    /// Copy of a board's state, if the board exists.
    pub fn export(&self, board_id: &str) -> StoreResult<Option<BoardState>> {
        let Some(board) = self.boards.get(board_id).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        let state = board
            .lock()
            .map_err(|_| StoreError::Internal(format!("board {board_id} lock poisoned")))?;
        Ok(Some(state.clone()))
    }

    /// Install a previously exported board, replacing any current state.
    pub fn restore(&self, board_id: &str, mut state: BoardState) {
        state.sort();
        let elements: Vec<(ElementId, u64)> =
            state.elements.iter().map(|e| (e.id, e.version)).collect();
        for (id, version) in elements {
            state.record_version(id, version);
        }
        state.next_snapshot_id = state
            .snapshots
            .iter()
            .map(|s| s.id)
            .max()
            .unwrap_or(0)
            .max(state.next_snapshot_id);
        self.boards.insert(board_id.to_string(), Arc::new(Mutex::new(state)));
    }

    /// One page of a board's elements. `page` counts from 1.
    pub fn list(&self, board_id: &str, page: u32, limit: u32) -> StoreResult<ElementPage> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        self.with_board(board_id, |state| {
            let total = state.elements.len();
            let offset = (page as usize - 1).saturating_mul(limit as usize);
            let elements = state
                .elements
                .iter()
                .skip(offset)
                .take(limit as usize)
                .cloned()
                .collect();
            Ok(ElementPage {
                elements,
                pagination: Pagination {
                    page,
                    limit,
                    total,
                    pages: total.div_ceil(limit as usize) as u32,
                },
            })
        })
    }

    pub fn create(
        &self,
        board_id: &str,
        request: CreateElementRequest,
        user: &UserId,
    ) -> StoreResult<Element> {
        let properties = Properties::from_map(request.element_type, request.properties)?;
        self.with_board(board_id, |state| {
            let mut element = Element::new(properties, request.z_index, Some(user.clone()));
            element.board_id = Some(board_id.to_string());
            state.record_version(element.id, element.version);
            state.elements.push(element.clone());
            state.sort();
            Ok(element)
        })
    }

    /// Create-or-update. A present `version` must match the stored one.
    pub fn put(
        &self,
        board_id: &str,
        element_id: ElementId,
        request: UpdateElementRequest,
        user: &UserId,
    ) -> StoreResult<Element> {
        self.with_board(board_id, |state| {
            let Some(pos) = state.position(element_id) else {
                let element_type = request.element_type.unwrap_or(ElementType::Shape);
                let properties = request.properties.ok_or_else(|| {
                    StoreError::Rejected("Properties are required for a new element".into())
                })?;
                let properties = Properties::from_map(element_type, properties)?;
                let z_index = request.z_index.unwrap_or(0);
                let mut element =
                    Element::with_id(element_id, properties, z_index, Some(user.clone()));
                element.board_id = Some(board_id.to_string());
                element.version = state.next_version(element_id, 0);
                state.elements.push(element.clone());
                state.sort();
                return Ok(element);
            };

            let stored = &state.elements[pos];
            if let Some(version) = request.version {
                if version != stored.version {
                    return Err(StoreError::Conflict {
                        server: Box::new(stored.clone()),
                        client_version: version,
                    });
                }
            }
            let element_type = request.element_type.unwrap_or_else(|| stored.element_type());
            let properties = match request.properties {
                Some(map) => Properties::from_map(element_type, map)?,
                None if element_type == stored.element_type() => stored.properties.clone(),
                None => {
                    return Err(StoreError::Rejected(
                        "Changing the type requires properties".into(),
                    ));
                }
            };
            let floor = stored.version;
            let version = state.next_version(element_id, floor);

            let element = &mut state.elements[pos];
            element.properties = properties;
            if let Some(z_index) = request.z_index {
                element.z_index = z_index;
            }
            element.version = version;
            element.updated_by = Some(user.clone());
            element.updated_at = Utc::now();
            let element = element.clone();
            state.sort();
            Ok(element)
        })
    }

    pub fn delete(&self, board_id: &str, element_id: ElementId) -> StoreResult<Element> {
        self.with_board(board_id, |state| {
            let pos = state
                .position(element_id)
                .ok_or_else(|| StoreError::NotFound("Element not found".into()))?;
            let element = state.elements.remove(pos);
            if let Some(group_id) = element.group_id {
                state.unlink_child(group_id, element_id);
            }
            Ok(element)
        })
    }

    /// Create a group around the existing elements among `request.element_ids`.
    ///
    /// The group covers the union of their bounds and sits one above the
    /// topmost of them. Children are linked without a version bump.
    pub fn group(
        &self,
        board_id: &str,
        request: GroupRequest,
        user: &UserId,
    ) -> StoreResult<Element> {
        if request.element_ids.is_empty() {
            return Err(StoreError::Rejected("Element IDs are required".into()));
        }
        self.with_board(board_id, |state| {
            let mut children: Vec<ElementId> = Vec::new();
            for id in &request.element_ids {
                if state.element(*id).is_some_and(|e| !e.is_group()) && !children.contains(id) {
                    children.push(*id);
                }
            }
            if children.is_empty() {
                return Err(StoreError::NotFound("Elements not found".into()));
            }
            let group_id = request.group_id.unwrap_or_else(uuid::Uuid::new_v4);
            if state.element(group_id).is_some() {
                return Err(StoreError::Rejected(format!("Element {group_id} already exists")));
            }

            let members: Vec<&Element> =
                children.iter().filter_map(|id| state.element(*id)).collect();
            let z_index = members.iter().map(|e| e.z_index).max().unwrap_or(0) + 1;
            let mut properties = default_properties(ElementType::Group);
            if let Some(frame) = union_bounds(members) {
                properties.set_frame(frame);
            }
            if let Some(patch) = &request.group_properties {
                properties = properties.merged(patch)?;
            }
            if let Properties::Group(group) = &mut properties {
                group.children = children.clone();
            }

            let mut group = Element::with_id(group_id, properties, z_index, Some(user.clone()));
            group.board_id = Some(board_id.to_string());
            group.version = state.next_version(group_id, 0);

            for child in &children {
                let previous = state.element(*child).and_then(|e| e.group_id);
                if let Some(previous) = previous {
                    state.unlink_child(previous, *child);
                }
                if let Some(pos) = state.position(*child) {
                    let element = &mut state.elements[pos];
                    element.group_id = Some(group_id);
                    element.updated_by = Some(user.clone());
                }
            }
            state.elements.push(group.clone());
            state.sort();
            Ok(group)
        })
    }

    /// Release the children of `group_id` and delete the group element.
    /// Returns the released children.
    pub fn ungroup(
        &self,
        board_id: &str,
        group_id: ElementId,
        user: &UserId,
    ) -> StoreResult<Vec<Element>> {
        self.with_board(board_id, |state| {
            let mut released = Vec::new();
            for element in state.elements.iter_mut().filter(|e| e.group_id == Some(group_id)) {
                element.group_id = None;
                element.updated_by = Some(user.clone());
                released.push(element.clone());
            }
            let group = state.position(group_id).filter(|pos| state.elements[*pos].is_group());
            match group {
                Some(pos) => {
                    state.elements.remove(pos);
                }
                None if released.is_empty() => {
                    return Err(StoreError::NotFound("Group not found".into()));
                }
                None => {}
            }
            Ok(released)
        })
    }

    /// Append the current element set to the snapshot log.
    pub fn snapshot(
        &self,
        board_id: &str,
        change_type: &str,
        user: &UserId,
    ) -> StoreResult<Snapshot> {
        self.with_board(board_id, |state| {
            let data = state.capture();
            Ok(state.append_snapshot(board_id, data, change_type, user))
        })
    }

    /// Up to `limit` snapshots, newest first.
    pub fn history(&self, board_id: &str, limit: u32) -> StoreResult<Vec<Snapshot>> {
        self.with_board(board_id, |state| {
            Ok(state.snapshots.iter().rev().take(limit as usize).cloned().collect())
        })
    }

    /// Replace the whole board with the newest snapshot.
    ///
    /// The restored data is appended to the log again as an `undo` entry,
    /// so repeating undo lands on the same state. Restored elements keep
    /// their ids and get versions above anything issued before.
    pub fn undo(&self, board_id: &str, user: &UserId) -> StoreResult<SnapshotData> {
        self.with_board(board_id, |state| {
            let latest = state
                .snapshots
                .last()
                .cloned()
                .ok_or_else(|| StoreError::NotFound("No snapshots available".into()))?;
            let now = Utc::now();
            let mut restored = latest.snapshot_data.elements.clone();
            for element in &mut restored {
                element.version = state.next_version(element.id, element.version);
                element.board_id = Some(board_id.to_string());
                element.updated_by = Some(user.clone());
                element.updated_at = now;
            }
            state.elements = restored;
            state.sort();

            state.append_snapshot(board_id, latest.snapshot_data.clone(), CHANGE_UNDO, user);
            Ok(SnapshotData {
                elements: state.elements.clone(),
                timestamp: latest.snapshot_data.timestamp,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvasboard_core::sync::protocol::CHANGE_MANUAL;
    use serde_json::{Map, Value, json};

    const BOARD: &str = "b1";

    fn alice() -> UserId {
        "alice".into()
    }

    fn props(element_type: ElementType) -> Map<String, Value> {
        default_properties(element_type).to_map().unwrap()
    }

    fn create(store: &BoardStore, element_type: ElementType, z_index: i64) -> Element {
        let request = CreateElementRequest {
            element_type,
            properties: props(element_type),
            z_index,
        };
        store.create(BOARD, request, &alice()).unwrap()
    }

    fn update(properties: Map<String, Value>, version: Option<u64>) -> UpdateElementRequest {
        UpdateElementRequest {
            properties: Some(properties),
            version,
            ..UpdateElementRequest::default()
        }
    }

    #[test]
    fn test_create_validates_properties() {
        let store = BoardStore::new();
        let mut properties = props(ElementType::Text);
        properties.remove("text");
        let request = CreateElementRequest {
            element_type: ElementType::Text,
            properties,
            z_index: 0,
        };
        assert!(matches!(
            store.create(BOARD, request, &alice()),
            Err(StoreError::Validation(ElementError::MissingField { field: "text", .. }))
        ));
        assert_eq!(store.list(BOARD, 1, 100).unwrap().pagination.total, 0);
    }

    #[test]
    fn test_list_orders_and_paginates() {
        let store = BoardStore::new();
        let top = create(&store, ElementType::Sticky, 5);
        let bottom = create(&store, ElementType::Shape, 1);
        let middle = create(&store, ElementType::Text, 3);

        let page = store.list(BOARD, 1, 2).unwrap();
        let ids: Vec<ElementId> = page.elements.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![bottom.id, middle.id]);
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.pages, 2);

        let page = store.list(BOARD, 2, 2).unwrap();
        assert_eq!(page.elements.len(), 1);
        assert_eq!(page.elements[0].id, top.id);
        assert!(store.list(BOARD, 3, 2).unwrap().elements.is_empty());
    }

    #[test]
    fn test_put_increments_version_and_detects_conflicts() {
        let store = BoardStore::new();
        let element = create(&store, ElementType::Sticky, 1);
        let mut properties = props(ElementType::Sticky);
        properties.insert("text".into(), json!("first"));

        let updated = store
            .put(BOARD, element.id, update(properties.clone(), Some(1)), &"bob".into())
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.updated_by.as_deref(), Some("bob"));
        assert_eq!(updated.properties.text(), Some("first"));

        properties.insert("text".into(), json!("stale"));
        match store.put(BOARD, element.id, update(properties, Some(1)), &alice()) {
            Err(StoreError::Conflict { server, client_version }) => {
                assert_eq!(client_version, 1);
                assert_eq!(server.version, 2);
                assert_eq!(server.properties.text(), Some("first"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        // Nothing was written.
        let stored = store.list(BOARD, 1, 10).unwrap().elements;
        assert_eq!(stored[0].properties.text(), Some("first"));
    }

    #[test]
    fn test_put_without_version_or_properties() {
        let store = BoardStore::new();
        let element = create(&store, ElementType::Shape, 1);
        let request = UpdateElementRequest {
            z_index: Some(9),
            ..UpdateElementRequest::default()
        };
        let updated = store.put(BOARD, element.id, request, &alice()).unwrap();
        assert_eq!(updated.z_index, 9);
        assert_eq!(updated.version, 2);
        assert_eq!(updated.properties, element.properties);
    }

    #[test]
    fn test_put_inserts_unknown_id() {
        let store = BoardStore::new();
        let id = uuid::Uuid::new_v4();
        let request = UpdateElementRequest {
            element_type: Some(ElementType::Sticky),
            ..update(props(ElementType::Sticky), Some(7))
        };
        let element = store.put(BOARD, id, request, &alice()).unwrap();
        assert_eq!(element.id, id);
        assert_eq!(element.version, 1);
        assert_eq!(element.board_id.as_deref(), Some(BOARD));

        let empty = UpdateElementRequest::default();
        assert!(matches!(
            store.put(BOARD, uuid::Uuid::new_v4(), empty, &alice()),
            Err(StoreError::Rejected(_))
        ));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let store = BoardStore::new();
        let element = create(&store, ElementType::Shape, 1);
        assert_eq!(store.delete(BOARD, element.id).unwrap().id, element.id);
        assert!(matches!(store.delete(BOARD, element.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_recreated_element_version_keeps_growing() {
        let store = BoardStore::new();
        let element = create(&store, ElementType::Shape, 1);
        store.put(BOARD, element.id, update(props(ElementType::Shape), None), &alice()).unwrap();
        store.delete(BOARD, element.id).unwrap();
        let request = UpdateElementRequest {
            element_type: Some(ElementType::Shape),
            ..update(props(ElementType::Shape), None)
        };
        let again = store.put(BOARD, element.id, request, &alice()).unwrap();
        assert_eq!(again.version, 3);
    }

    #[test]
    fn test_group_and_ungroup() {
        let store = BoardStore::new();
        let a = create(&store, ElementType::Shape, 1);
        let b = create(&store, ElementType::Sticky, 4);
        let group_id = uuid::Uuid::new_v4();
        let request = GroupRequest {
            element_ids: vec![a.id, b.id, uuid::Uuid::new_v4()],
            group_properties: None,
            group_id: Some(group_id),
        };
        let group = store.group(BOARD, request, &alice()).unwrap();
        assert_eq!(group.id, group_id);
        assert_eq!(group.z_index, 5);
        assert_eq!(group.as_group().unwrap().children, vec![a.id, b.id]);
        // Default shape at (100,100) 100x100 and sticky at (100,100) 150x150.
        let frame = group.properties.frame();
        let actual = (frame.x0, frame.y0, frame.width(), frame.height());
        assert_eq!(actual, (100.0, 100.0, 150.0, 150.0));

        let elements = store.list(BOARD, 1, 10).unwrap().elements;
        for child in elements.iter().filter(|e| e.id != group_id) {
            assert_eq!(child.group_id, Some(group_id));
            assert_eq!(child.version, 1);
        }

        let released = store.ungroup(BOARD, group_id, &alice()).unwrap();
        assert_eq!(released.len(), 2);
        assert!(released.iter().all(|e| e.group_id.is_none()));
        let elements = store.list(BOARD, 1, 10).unwrap().elements;
        assert_eq!(elements.len(), 2);
        assert!(matches!(store.ungroup(BOARD, group_id, &alice()), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_group_rejects_empty_and_unknown() {
        let store = BoardStore::new();
        let empty = GroupRequest {
            element_ids: vec![],
            group_properties: None,
            group_id: None,
        };
        assert!(matches!(store.group(BOARD, empty, &alice()), Err(StoreError::Rejected(_))));
        let unknown = GroupRequest {
            element_ids: vec![uuid::Uuid::new_v4()],
            group_properties: None,
            group_id: None,
        };
        assert!(matches!(store.group(BOARD, unknown, &alice()), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_history_is_newest_first() {
        let store = BoardStore::new();
        create(&store, ElementType::Shape, 1);
        let first = store.snapshot(BOARD, CHANGE_MANUAL, &alice()).unwrap();
        create(&store, ElementType::Shape, 2);
        let second = store.snapshot(BOARD, "auto", &alice()).unwrap();
        assert_eq!(first.snapshot_data.elements.len(), 1);
        assert_eq!(second.snapshot_data.elements.len(), 2);

        let history = store.history(BOARD, 50).unwrap();
        assert_eq!(history.iter().map(|s| s.id).collect::<Vec<_>>(), vec![second.id, first.id]);
        assert_eq!(store.history(BOARD, 1).unwrap().len(), 1);
        assert_eq!(history[0].change_type, "auto");
    }

    #[test]
    fn test_undo_restores_latest_snapshot() {
        let store = BoardStore::new();
        assert!(matches!(store.undo(BOARD, &alice()), Err(StoreError::NotFound(_))));

        let kept = create(&store, ElementType::Sticky, 1);
        store.snapshot(BOARD, CHANGE_MANUAL, &alice()).unwrap();
        let mut properties = props(ElementType::Sticky);
        properties.insert("text".into(), json!("edited"));
        let edited = store.put(BOARD, kept.id, update(properties, None), &alice()).unwrap();
        create(&store, ElementType::Shape, 2);

        let data = store.undo(BOARD, &"bob".into()).unwrap();
        assert_eq!(data.elements.len(), 1);
        let restored = &store.list(BOARD, 1, 10).unwrap().elements;
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].id, kept.id);
        assert_eq!(restored[0].properties.text(), Some("Sticky Note"));
        assert!(restored[0].version > edited.version);

        let history = store.history(BOARD, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].change_type, "undo");
        assert_eq!(history[0].snapshot_data, history[1].snapshot_data);
    }

    #[test]
    fn test_repeated_undo_keeps_the_restored_state() {
        let store = BoardStore::new();
        let kept = create(&store, ElementType::Sticky, 1);
        store.snapshot(BOARD, CHANGE_MANUAL, &alice()).unwrap();
        let mut properties = props(ElementType::Sticky);
        properties.insert("text".into(), json!("edited"));
        store.put(BOARD, kept.id, update(properties, None), &alice()).unwrap();
        create(&store, ElementType::Shape, 2);

        store.undo(BOARD, &alice()).unwrap();
        let first = store.list(BOARD, 1, 10).unwrap().elements;
        let data = store.undo(BOARD, &alice()).unwrap();

        let ids: Vec<ElementId> = data.elements.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![kept.id]);
        assert_eq!(data.elements[0].properties.text(), Some("Sticky Note"));
        // Versions keep growing through both restorations.
        assert!(data.elements[0].version > first[0].version);

        let history = store.history(BOARD, 10).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|s| s.snapshot_data.elements.len() == 1));
    }

    #[test]
    fn test_export_and_restore() {
        let store = BoardStore::new();
        let element = create(&store, ElementType::Shape, 1);
        store.snapshot(BOARD, CHANGE_MANUAL, &alice()).unwrap();
        let state = store.export(BOARD).unwrap().unwrap();
        assert!(store.export("missing").unwrap().is_none());

        let copy = BoardStore::new();
        copy.restore(BOARD, state);
        assert_eq!(copy.list(BOARD, 1, 10).unwrap().elements[0].id, element.id);
        let next = copy.snapshot(BOARD, CHANGE_MANUAL, &alice()).unwrap();
        assert_eq!(next.id, 2);
    }
}
