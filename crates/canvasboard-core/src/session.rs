//! One open board.
//!
//! [`BoardSession`] owns everything a client needs for a board: the layer
//! store, the interaction engine, the REST worker and the real-time
//! connection. It is created when a board opens and dropped when it closes.
//! The host forwards input to it and calls [`BoardSession::tick`] once per
//! frame to fold network results back into the store.

use crate::elements::{BoardId, ElementId, UserId};
use crate::export::BoardExport;
use crate::input::{CursorIcon, Modifiers, MouseButton};
use crate::interaction::{InteractionEngine, Response, TextOverlay, UploadedFile};
use crate::layers::LayerStore;
use crate::settings::BoardSettings;
use crate::sync::protocol::{BoardEvent, CHANGE_MANUAL, Snapshot};
use crate::sync::{
    Connection, ConnectionEvent, ConnectionState, SyncClient, SyncError, SyncEvent, SyncResult,
};
use crate::tools::ToolKind;
use kurbo::{Point, Size};
use std::time::Duration;
use url::Url;

/// Delay between reconnect attempts of the real-time channel.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Who is editing which board, and where the service lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Base URL of the REST surface, e.g. `http://localhost:3030`.
    pub server_url: String,
    pub board_id: BoardId,
    pub user_id: UserId,
    /// Bearer token, also passed to the WebSocket as `?token=`.
    pub token: String,
    pub reconnect_delay: Duration,
}

impl SessionConfig {
    pub fn new(
        server_url: impl Into<String>,
        board_id: impl Into<BoardId>,
        user_id: impl Into<UserId>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            board_id: board_id.into(),
            user_id: user_id.into(),
            token: token.into(),
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    /// Address of the board's real-time channel.
    pub fn ws_url(&self) -> SyncResult<String> {
        let mut url = Url::parse(&self.server_url)
            .map_err(|e| SyncError::InvalidUrl(format!("{}: {e}", self.server_url)))?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(SyncError::InvalidUrl(format!("unsupported scheme: {other}"))),
        };
        url.set_scheme(scheme)
            .map_err(|()| SyncError::InvalidUrl(self.server_url.clone()))?;
        url.path_segments_mut()
            .map_err(|()| SyncError::InvalidUrl(self.server_url.clone()))?
            .pop_if_empty()
            .extend(["boards", self.board_id.as_str(), "ws"]);
        url.query_pairs_mut().clear().append_pair("token", &self.token);
        Ok(url.into())
    }
}

/// Something the host may want to tell the user about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A local edit lost against a newer server version and was overwritten.
    Conflict { element_id: ElementId },
    /// A request failed; the local edit stays in place.
    SyncFailed { operation: &'static str, message: String },
    Connected,
    ConnectionLost,
    SnapshotCreated { id: u64 },
    /// A server undo finished.
    Restored { restored_elements: usize },
}

pub struct BoardSession {
    config: SessionConfig,
    store: LayerStore,
    engine: InteractionEngine,
    sync: SyncClient,
    connection: Option<Connection>,
    /// A full fetch is outstanding; broadcasts are dropped until it lands.
    fetching: bool,
    loaded: bool,
    notices: Vec<Notice>,
    server_history: Vec<Snapshot>,
}

impl BoardSession {
    /// Open the board named by `config` and start loading it.
    pub fn open(
        config: SessionConfig,
        viewport: Size,
        settings: BoardSettings,
    ) -> SyncResult<Self> {
        let sync = SyncClient::new(&config)?;
        let connection = Connection::open(&config.ws_url()?, config.reconnect_delay)?;
        Ok(Self::with_transport(config, viewport, settings, sync, Some(connection)))
    }

    /// Open over explicit transports. Without a connection the session
    /// still pushes and fetches over REST but receives no broadcasts.
    pub fn with_transport(
        config: SessionConfig,
        viewport: Size,
        settings: BoardSettings,
        sync: SyncClient,
        connection: Option<Connection>,
    ) -> Self {
        log::info!("opening board {} as {}", config.board_id, config.user_id);
        let store = LayerStore::new(Some(config.user_id.clone()));
        let engine = InteractionEngine::new(viewport, settings);
        let mut session = Self {
            config,
            store,
            engine,
            sync,
            connection,
            fetching: false,
            loaded: false,
            notices: Vec::new(),
            server_history: Vec::new(),
        };
        session.refetch();
        session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    pub fn engine(&self) -> &InteractionEngine {
        &self.engine
    }

    /// Whether the initial load has completed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map_or(ConnectionState::Disconnected, Connection::state)
    }

    /// Server snapshot log as last fetched with [`Self::request_history`].
    pub fn server_history(&self) -> &[Snapshot] {
        &self.server_history
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn refetch(&mut self) {
        if self.sync.fetch_all() {
            self.fetching = true;
        }
    }

    fn push(&mut self, response: Response) -> Response {
        if !response.changes.is_empty() && !self.sync.push(&self.store, &response.changes) {
            log::warn!("sync worker gone, {} changes stay local", response.changes.len());
        }
        response
    }

    // --- network ---------------------------------------------------------

    /// Apply pending network results. Returns whether the board needs a redraw.
    pub fn tick(&mut self) -> bool {
        let mut redraw = false;

        let connection_events = match self.connection.as_mut() {
            Some(connection) => connection.poll_events(),
            None => Vec::new(),
        };
        for event in connection_events {
            match event {
                ConnectionEvent::Connected => {
                    self.notices.push(Notice::Connected);
                    // Anything broadcast while we were away is only in a full fetch.
                    if !self.fetching {
                        self.refetch();
                    }
                }
                ConnectionEvent::Disconnected => self.notices.push(Notice::ConnectionLost),
                ConnectionEvent::Error(message) => {
                    log::debug!("board channel unavailable: {message}")
                }
                ConnectionEvent::Message(event) => redraw |= self.handle_board_event(event),
            }
        }

        for event in self.sync.poll_events() {
            redraw |= self.handle_sync_event(event);
        }
        redraw
    }

    /// Apply a broadcast from the board channel.
    pub fn handle_board_event(&mut self, event: BoardEvent) -> bool {
        if self.fetching {
            log::debug!("dropping {} received during full fetch", event.kind());
            return false;
        }
        let own = event.user_id() == self.config.user_id;
        match event {
            // A restore replaces the board for everyone, the requester included.
            BoardEvent::BoardRestored { snapshot_data, .. } => {
                log::info!("board restored to {} elements", snapshot_data.elements.len());
                self.store.replace_all(snapshot_data.elements);
            }
            _ if own => return false,
            BoardEvent::ElementCreated { element, .. }
            | BoardEvent::ElementUpdated { element, .. } => {
                self.store.apply_remote_upsert(element);
            }
            BoardEvent::ElementDeleted { element_id, .. } => {
                if !self.store.apply_remote_delete(element_id) {
                    return false;
                }
            }
            BoardEvent::ElementsGrouped {
                group_element,
                element_ids,
                ..
            } => self.store.apply_remote_grouped(group_element, &element_ids),
            BoardEvent::ElementsUngrouped { group_id, elements, .. } => {
                self.store.apply_remote_ungrouped(group_id, elements);
            }
        }
        true
    }

    fn handle_sync_event(&mut self, event: SyncEvent) -> bool {
        match event {
            SyncEvent::Stored(element) => {
                self.store.acknowledge(&element);
                false
            }
            SyncEvent::Conflict(element) => {
                self.notices.push(Notice::Conflict { element_id: element.id });
                self.store.apply_remote_upsert(element);
                true
            }
            SyncEvent::Loaded(elements) => {
                log::info!(
                    "board {} loaded with {} elements",
                    self.config.board_id,
                    elements.len()
                );
                if self.loaded {
                    self.store.replace_all(elements);
                } else {
                    self.store.load_state(elements);
                    self.loaded = true;
                }
                self.fetching = false;
                true
            }
            SyncEvent::SnapshotCreated(snapshot) => {
                self.notices.push(Notice::SnapshotCreated { id: snapshot.id });
                false
            }
            SyncEvent::History(history) => {
                self.server_history = history;
                false
            }
            SyncEvent::Restored(response) => {
                self.notices.push(Notice::Restored {
                    restored_elements: response.restored_elements,
                });
                false
            }
            SyncEvent::Failed { operation, message } => {
                if operation == "fetch" {
                    self.fetching = false;
                }
                self.notices.push(Notice::SyncFailed { operation, message });
                false
            }
        }
    }

    /// Record a server snapshot of the board as it is stored now.
    pub fn create_snapshot(&mut self) -> bool {
        self.sync.snapshot(CHANGE_MANUAL)
    }

    pub fn request_history(&mut self, limit: u32) -> bool {
        self.sync.history(limit)
    }

    /// Restore the latest server snapshot for every collaborator.
    pub fn server_undo(&mut self) -> bool {
        self.sync.server_undo()
    }

    // --- input -----------------------------------------------------------

    pub fn pointer_down(
        &mut self,
        screen: Point,
        button: MouseButton,
        modifiers: Modifiers,
    ) -> Response {
        let response = self.engine.pointer_down(&mut self.store, screen, button, modifiers);
        self.push(response)
    }

    pub fn pointer_move(&mut self, screen: Point) -> Response {
        let response = self.engine.pointer_move(&mut self.store, screen);
        self.push(response)
    }

    pub fn pointer_up(&mut self, screen: Point, button: MouseButton) -> Response {
        let response = self.engine.pointer_up(&mut self.store, screen, button);
        self.push(response)
    }

    pub fn pointer_leave(&mut self) -> Response {
        let response = self.engine.pointer_leave(&mut self.store);
        self.push(response)
    }

    pub fn wheel(&mut self, screen: Point, delta_y: f64) -> Response {
        self.engine.wheel(screen, delta_y)
    }

    pub fn double_click(&mut self, screen: Point) -> Response {
        self.engine.double_click(&self.store, screen)
    }

    pub fn text_input(&mut self, text: &str) -> bool {
        self.engine.text_input(text)
    }

    pub fn focus_lost(&mut self) -> Response {
        let response = self.engine.focus_lost(&mut self.store);
        self.push(response)
    }

    pub fn key(&mut self, key: &str, modifiers: Modifiers) -> Response {
        let response = self.engine.key(&mut self.store, key, modifiers);
        self.push(response)
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.engine.set_tool(tool);
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.engine.set_viewport(viewport);
    }

    pub fn set_settings(&mut self, settings: BoardSettings) {
        self.engine.set_settings(settings);
    }

    pub fn place_image(&mut self, position: Point, file: &UploadedFile) -> Response {
        let response = self.engine.place_image(&mut self.store, position, file);
        self.push(response)
    }

    pub fn place_file(&mut self, position: Point, file: &UploadedFile) -> Response {
        let response = self.engine.place_file(&mut self.store, position, file);
        self.push(response)
    }

    pub fn undo(&mut self) -> Response {
        let response = self.engine.undo(&mut self.store);
        self.push(response)
    }

    pub fn redo(&mut self) -> Response {
        let response = self.engine.redo(&mut self.store);
        self.push(response)
    }

    pub fn cursor(&self) -> CursorIcon {
        self.engine.cursor()
    }

    pub fn text_overlay(&self) -> Option<TextOverlay> {
        self.engine.text_overlay(&self.store)
    }

    // --- files -----------------------------------------------------------

    pub fn export(&self) -> BoardExport {
        BoardExport::capture(Some(&self.config.board_id), &self.store, self.engine.settings())
    }

    /// Replace the local board with `export`. Nothing is sent to the server.
    pub fn import(&mut self, export: BoardExport) {
        let settings = export.apply(&mut self.store);
        self.engine.set_settings(settings);
    }

    /// Stop the network workers. Local state stays readable.
    pub fn close(&mut self) {
        log::info!("closing board {}", self.config.board_id);
        self.sync.close();
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        self.close();
    }
}
