//! Synchronization with the board service.
//!
//! [`protocol`] holds the wire types shared with the server. With the
//! `client` feature the module also provides the REST client, the
//! background [`SyncClient`] and the real-time [`Connection`].

mod api;
#[cfg(feature = "client")]
mod client;
#[cfg(feature = "client")]
mod connection;
pub mod protocol;

pub use api::{BoardApi, fetch_all};
#[cfg(feature = "client")]
pub use api::HttpBoardApi;
#[cfg(feature = "client")]
pub use client::{SyncClient, SyncEvent};
#[cfg(feature = "client")]
pub use connection::{Connection, ConnectionEvent, ConnectionState};
#[cfg(all(test, feature = "client"))]
pub(crate) use client::tests::MemoryApi;
pub use protocol::{
    BoardEvent, ConflictBody, CreateElementRequest, ElementPage, ErrorBody, GroupRequest,
    Pagination, Snapshot, SnapshotData, SnapshotRequest, UndoResponse, UngroupRequest,
    UpdateElementRequest, UpdateElementResponse,
};

use crate::elements::{Element, ElementError};
use thiserror::Error;

/// Sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The write was stale; carries the authoritative element.
    #[error("version conflict on element {}", .0.id)]
    Conflict(Box<Element>),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Element(#[from] ElementError),
}

pub type SyncResult<T> = Result<T, SyncError>;
