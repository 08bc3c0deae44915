//! Background REST worker.
//!
//! Local edits are queued to a worker thread so the input path never waits
//! on the network. Requests run in submission order; results come back as
//! [`SyncEvent`]s the session drains each tick.

use super::api::{BoardApi, HttpBoardApi, fetch_all};
use super::protocol::{
    DEFAULT_PAGE_LIMIT, GroupRequest, Snapshot, UndoResponse, UpdateElementRequest,
};
use super::{SyncError, SyncResult};
use crate::elements::{BoardId, Element, ElementId};
use crate::layers::{Change, LayerStore};
use crate::session::SessionConfig;
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Results reported by the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A write was accepted; carries the stored element.
    Stored(Element),
    /// A write was stale; carries the authoritative element.
    Conflict(Element),
    /// The board's full element set.
    Loaded(Vec<Element>),
    SnapshotCreated(Snapshot),
    /// Server snapshot log, newest first.
    History(Vec<Snapshot>),
    Restored(UndoResponse),
    /// A request failed. Local state is left untouched.
    Failed { operation: &'static str, message: String },
}

enum Outgoing {
    Upsert(Element),
    Delete(ElementId),
    Group(GroupRequest),
    Ungroup(ElementId),
}

enum Command {
    Push(Vec<Outgoing>),
    FetchAll,
    Snapshot(String),
    History(u32),
    Undo,
    Shutdown,
}

/// Client side of the board REST surface.
pub struct SyncClient {
    board_id: BoardId,
    cmd_tx: Option<Sender<Command>>,
    event_rx: Receiver<SyncEvent>,
    _thread: Option<JoinHandle<()>>,
}

impl SyncClient {
    /// Connect to the service named by `config` over HTTP.
    pub fn new(config: &SessionConfig) -> SyncResult<Self> {
        let api = HttpBoardApi::new(&config.server_url, config.token.clone())?;
        Ok(Self::with_api(config.board_id.clone(), api))
    }

    /// Run the worker against any [`BoardApi`].
    pub fn with_api(board_id: BoardId, api: impl BoardApi + 'static) -> Self {
        let (cmd_tx, cmd_rx) = channel::<Command>();
        let (event_tx, event_rx) = channel::<SyncEvent>();
        let worker = Worker {
            board_id: board_id.clone(),
            api: Box::new(api),
            acked: HashMap::new(),
            superseded: HashMap::new(),
            events: event_tx,
        };
        let handle = thread::spawn(move || worker.run(cmd_rx));
        Self {
            board_id,
            cmd_tx: Some(cmd_tx),
            event_rx,
            _thread: Some(handle),
        }
    }

    pub fn board_id(&self) -> &BoardId {
        &self.board_id
    }

    fn send(&self, command: Command) -> bool {
        match &self.cmd_tx {
            Some(tx) => tx.send(command).is_ok(),
            None => false,
        }
    }

    /// Queue the writes described by `changes`, reading element state from
    /// `store` as it is now.
    pub fn push(&self, store: &LayerStore, changes: &[Change]) -> bool {
        let mut batch = Vec::with_capacity(changes.len());
        for change in changes {
            match change {
                Change::Upsert(id) => match store.element(*id) {
                    Some(element) => batch.push(Outgoing::Upsert(element.clone())),
                    None => log::debug!("skipping push of vanished element {id}"),
                },
                Change::Delete(id) => batch.push(Outgoing::Delete(*id)),
                Change::Grouped { group, children } => {
                    let encoded = store.element(*group).map(|g| g.properties.to_map());
                    let group_properties = match encoded {
                        Some(Ok(map)) => Some(map),
                        Some(Err(e)) => {
                            log::warn!("group {group} properties not encodable: {e}");
                            None
                        }
                        None => None,
                    };
                    batch.push(Outgoing::Group(GroupRequest {
                        element_ids: children.clone(),
                        group_properties,
                        group_id: Some(*group),
                    }));
                }
                Change::Ungrouped { group } => batch.push(Outgoing::Ungroup(*group)),
            }
        }
        if batch.is_empty() {
            return true;
        }
        self.send(Command::Push(batch))
    }

    /// Request the board's full element set.
    pub fn fetch_all(&self) -> bool {
        self.send(Command::FetchAll)
    }

    pub fn snapshot(&self, change_type: &str) -> bool {
        self.send(Command::Snapshot(change_type.to_string()))
    }

    pub fn history(&self, limit: u32) -> bool {
        self.send(Command::History(limit))
    }

    /// Ask the server to restore its latest snapshot.
    pub fn server_undo(&self) -> bool {
        self.send(Command::Undo)
    }

    /// Drain pending results (non-blocking).
    pub fn poll_events(&mut self) -> Vec<SyncEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Block up to `timeout` for the next result.
    pub fn wait_event(&mut self, timeout: Duration) -> Option<SyncEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Stop the worker after the requests already queued.
    pub fn close(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Shutdown);
        }
        self._thread = None;
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.close();
    }
}

struct Worker {
    board_id: BoardId,
    api: Box<dyn BoardApi>,
    /// Last version the server confirmed per element. Lets back-to-back
    /// writes of one element carry the version the previous write produced.
    acked: HashMap<ElementId, u64>,
    /// Server version that beat one of our writes. Queued writes based on
    /// an older copy are dropped until the session adopts the server copy.
    superseded: HashMap<ElementId, u64>,
    events: Sender<SyncEvent>,
}

impl Worker {
    fn run(mut self, commands: Receiver<Command>) {
        log::info!("sync worker started for board {}", self.board_id);
        while let Ok(command) = commands.recv() {
            match command {
                Command::Push(batch) => {
                    for item in batch {
                        self.push(item);
                    }
                }
                Command::FetchAll => self.fetch_all(),
                Command::Snapshot(change_type) => {
                    match self.api.create_snapshot(&self.board_id, &change_type) {
                        Ok(snapshot) => self.emit(SyncEvent::SnapshotCreated(snapshot)),
                        Err(e) => self.fail("snapshot", e),
                    }
                }
                Command::History(limit) => match self.api.history(&self.board_id, limit) {
                    Ok(history) => self.emit(SyncEvent::History(history)),
                    Err(e) => self.fail("history", e),
                },
                Command::Undo => match self.api.undo(&self.board_id) {
                    Ok(response) => self.emit(SyncEvent::Restored(response)),
                    Err(e) => self.fail("undo", e),
                },
                Command::Shutdown => break,
            }
        }
        log::info!("sync worker for board {} exiting", self.board_id);
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }

    fn fail(&self, operation: &'static str, error: SyncError) {
        log::error!("{operation} failed for board {}: {error}", self.board_id);
        self.emit(SyncEvent::Failed {
            operation,
            message: error.to_string(),
        });
    }

    fn push(&mut self, item: Outgoing) {
        match item {
            Outgoing::Upsert(element) => self.upsert(element),
            Outgoing::Delete(id) => match self.api.delete_element(&self.board_id, id) {
                Ok(()) => {
                    self.acked.remove(&id);
                    self.superseded.remove(&id);
                }
                Err(SyncError::NotFound(_)) => log::debug!("element {id} already gone"),
                Err(e) => self.fail("delete", e),
            },
            Outgoing::Group(request) => match self.api.group_elements(&self.board_id, &request) {
                Ok(group) => {
                    self.acked.insert(group.id, group.version);
                    self.emit(SyncEvent::Stored(group));
                }
                Err(e) => self.fail("group", e),
            },
            Outgoing::Ungroup(group_id) => {
                match self.api.ungroup_elements(&self.board_id, group_id) {
                    Ok(()) => {
                        self.acked.remove(&group_id);
                    }
                    Err(SyncError::NotFound(_)) => log::debug!("group {group_id} already gone"),
                    Err(e) => self.fail("ungroup", e),
                }
            }
        }
    }

    fn upsert(&mut self, element: Element) {
        if let Some(&winner) = self.superseded.get(&element.id) {
            if element.version < winner {
                log::debug!(
                    "dropping write of element {} based on version {}, server has {}",
                    element.id,
                    element.version,
                    winner
                );
                return;
            }
            self.superseded.remove(&element.id);
        }
        let version = self
            .acked
            .get(&element.id)
            .map_or(element.version, |acked| (*acked).max(element.version));
        let request = match UpdateElementRequest::from_element(&element, version) {
            Ok(request) => request,
            Err(e) => return self.fail("update", e.into()),
        };
        match self.api.put_element(&self.board_id, element.id, &request) {
            Ok(stored) => {
                log::debug!("element {} stored at version {}", stored.id, stored.version);
                self.acked.insert(stored.id, stored.version);
                self.emit(SyncEvent::Stored(stored));
            }
            Err(SyncError::Conflict(server)) => {
                log::warn!(
                    "version conflict on element {}: sent {}, server has {}",
                    server.id,
                    version,
                    server.version
                );
                self.acked.remove(&server.id);
                self.superseded.insert(server.id, server.version);
                self.emit(SyncEvent::Conflict(*server));
            }
            Err(e) => self.fail("update", e),
        }
    }

    fn fetch_all(&mut self) {
        match fetch_all(self.api.as_ref(), &self.board_id, DEFAULT_PAGE_LIMIT) {
            Ok(elements) => {
                self.acked = elements.iter().map(|e| (e.id, e.version)).collect();
                self.superseded.clear();
                self.emit(SyncEvent::Loaded(elements));
            }
            Err(e) => self.fail("fetch", e),
        }
    }
}
