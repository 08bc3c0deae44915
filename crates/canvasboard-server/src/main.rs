//! Canvasboard Server
//!
//! Authoritative storage for board elements with per-element version
//! counters, an append-only snapshot log for whole-board undo, and a
//! WebSocket fan-out of every committed change.
//!
//! ## Protocol
//!
//! REST under `/boards/{id}` (bearer token), live events at
//! `/boards/{id}/ws?token=...`. Events are JSON tagged by `type`:
//! ```json
//! { "type": "element_updated", "element": { ... }, "userId": "alice" }
//! { "type": "element_deleted", "elementId": "...", "userId": "bob" }
//! { "type": "board_restored", "snapshotData": { "elements": [ ... ], "timestamp": "..." },
//!   "userId": "bob" }
//! ```

mod auth;
mod config;
mod error;
mod hub;
mod persist;
mod routes;
mod state;
mod store;

use crate::auth::TokenAuth;
use crate::config::ServerConfig;
use crate::state::AppState;
use crate::store::BoardStore;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canvasboard_server=info,tower_http=info".into()),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(BoardStore::new());
    let auth = TokenAuth::new(config.tokens);
    let mut state = AppState::new(Arc::clone(&store), auth, config.history_limit);

    let mut writer = None;
    if let Some(dir) = &config.data_dir {
        let loaded = persist::load_all(dir, &store).await?;
        info!("Loaded {} boards from {}", loaded, dir.display());
        let (persister, task) = persist::Persister::spawn(dir.clone(), Arc::clone(&store));
        state = state.with_persister(persister);
        writer = Some(task);
    }

    let app = routes::router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("Canvasboard server listening on {}", config.addr);
    info!("WebSocket endpoint: ws://{}/boards/{{id}}/ws", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    // Open WebSockets may still hold the state; don't wait on them forever.
    if let Some(task) = writer {
        if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
            error!("persistence writer did not finish within {:?}", SHUTDOWN_GRACE);
        }
    }
    Ok(())
}
