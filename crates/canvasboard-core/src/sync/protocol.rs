//! Messages exchanged with the board service.
//!
//! REST bodies keep the service's field names: element rows are snake_case,
//! request envelopes camelCase. Real-time events are tagged by `type`.

use crate::elements::{BoardId, Element, ElementId, ElementResult, ElementType, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default page size of the element listing.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;
/// Snapshot kind recorded when none is given.
pub const CHANGE_MANUAL: &str = "manual";
/// Snapshot kind recorded by a server-side undo.
pub const CHANGE_UNDO: &str = "undo";

/// Real-time message pushed to every subscriber of a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BoardEvent {
    ElementCreated {
        element: Element,
        user_id: UserId,
    },
    ElementUpdated {
        element: Element,
        user_id: UserId,
    },
    ElementDeleted {
        element_id: ElementId,
        user_id: UserId,
    },
    ElementsGrouped {
        group_element: Element,
        element_ids: Vec<ElementId>,
        user_id: UserId,
    },
    ElementsUngrouped {
        group_id: ElementId,
        /// Children as stored after their group link was cleared.
        elements: Vec<Element>,
        user_id: UserId,
    },
    BoardRestored {
        snapshot_data: SnapshotData,
        user_id: UserId,
    },
}

impl BoardEvent {
    /// User whose request produced the event.
    pub fn user_id(&self) -> &str {
        match self {
            BoardEvent::ElementCreated { user_id, .. }
            | BoardEvent::ElementUpdated { user_id, .. }
            | BoardEvent::ElementDeleted { user_id, .. }
            | BoardEvent::ElementsGrouped { user_id, .. }
            | BoardEvent::ElementsUngrouped { user_id, .. }
            | BoardEvent::BoardRestored { user_id, .. } => user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BoardEvent::ElementCreated { .. } => "element_created",
            BoardEvent::ElementUpdated { .. } => "element_updated",
            BoardEvent::ElementDeleted { .. } => "element_deleted",
            BoardEvent::ElementsGrouped { .. } => "elements_grouped",
            BoardEvent::ElementsUngrouped { .. } => "elements_ungrouped",
            BoardEvent::BoardRestored { .. } => "board_restored",
        }
    }
}

/// The element set captured by a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    pub elements: Vec<Element>,
    pub timestamp: DateTime<Utc>,
}

/// One row of the server snapshot log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u64,
    pub board_id: BoardId,
    pub snapshot_data: SnapshotData,
    pub change_type: String,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// `POST /boards/{id}/elements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateElementRequest {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub z_index: i64,
}

/// `PUT /boards/{id}/elements/{element_id}`.
///
/// Every field is optional; absent ones keep their stored value. `version`
/// is the writer's last known version and is checked when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateElementRequest {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<ElementType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl UpdateElementRequest {
    /// Full-state update of `element` against `version`.
    pub fn from_element(element: &Element, version: u64) -> ElementResult<Self> {
        Ok(Self {
            element_type: Some(element.element_type()),
            properties: Some(element.properties.to_map()?),
            z_index: Some(element.z_index),
            version: Some(version),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateElementResponse {
    pub success: bool,
    pub element: Element,
}

/// Body of a 409 answer to a stale update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictBody {
    pub error: String,
    pub conflict: bool,
    pub server_element: Element,
    pub client_version: u64,
    pub server_version: u64,
}

/// `POST /boards/{id}/elements/group`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequest {
    pub element_ids: Vec<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_properties: Option<Map<String, Value>>,
    /// Id for the new group, so a client's local group keeps its identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<ElementId>,
}

/// `POST /boards/{id}/elements/ungroup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UngroupRequest {
    pub group_id: ElementId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub pages: u32,
}

/// One page of `GET /boards/{id}/elements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementPage {
    pub elements: Vec<Element>,
    pub pagination: Pagination,
}

/// `POST /boards/{id}/snapshot`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<String>,
}

/// Answer to `POST /boards/{id}/undo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResponse {
    pub message: String,
    pub restored_elements: usize,
}

/// Generic error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
