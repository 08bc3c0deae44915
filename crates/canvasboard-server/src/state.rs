use crate::auth::TokenAuth;
use crate::hub::Hub;
use crate::persist::Persister;
use crate::store::BoardStore;
use canvasboard_core::sync::protocol::BoardEvent;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub store: Arc<BoardStore>,
    pub hub: Hub,
    pub auth: TokenAuth,
    /// Default `limit` of the history endpoint.
    pub history_limit: u32,
    pub persister: Option<Persister>,
}

impl AppState {
    pub fn new(store: Arc<BoardStore>, auth: TokenAuth, history_limit: u32) -> Self {
        Self {
            store,
            hub: Hub::new(),
            auth,
            history_limit,
            persister: None,
        }
    }

    pub fn with_persister(mut self, persister: Persister) -> Self {
        self.persister = Some(persister);
        self
    }

    /// A board changed: schedule a save and broadcast `event`, if any.
    pub fn committed(&self, board_id: &str, event: Option<&BoardEvent>) {
        if let Some(persister) = &self.persister {
            persister.mark_dirty(board_id);
        }
        if let Some(event) = event {
            let receivers = self.hub.publish(board_id, event);
            tracing::debug!(board_id, kind = event.kind(), receivers, "broadcast");
        }
    }
}
