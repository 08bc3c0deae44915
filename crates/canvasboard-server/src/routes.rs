//! HTTP and WebSocket surface.

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use canvasboard_core::elements::{Element, ElementId, UserId};
use canvasboard_core::sync::protocol::{
    BoardEvent, CHANGE_MANUAL, CreateElementRequest, DEFAULT_PAGE_LIMIT, ElementPage, GroupRequest,
    Snapshot, SnapshotRequest, UndoResponse, UngroupRequest, UpdateElementRequest,
    UpdateElementResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/boards/{board_id}/elements", get(list_elements).post(create_element))
        .route("/boards/{board_id}/elements/group", post(group_elements))
        .route("/boards/{board_id}/elements/ungroup", post(ungroup_elements))
        .route(
            "/boards/{board_id}/elements/{element_id}",
            put(update_element).delete(delete_element),
        )
        .route("/boards/{board_id}/snapshot", post(create_snapshot))
        .route("/boards/{board_id}/history", get(history))
        .route("/boards/{board_id}/undo", post(undo))
        .route("/boards/{board_id}/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> &'static str {
    "Canvasboard Server - REST under /boards/{id}, live updates at /boards/{id}/ws"
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

async fn list_elements(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
    AuthUser(_user): AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ElementPage>> {
    let page = state.store.list(
        &board_id,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
    )?;
    Ok(Json(page))
}

async fn create_element(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateElementRequest>,
) -> ApiResult<(StatusCode, Json<Element>)> {
    let element = state.store.create(&board_id, request, &user)?;
    info!(%board_id, element_id = %element.id, %user, "element created");
    let event = BoardEvent::ElementCreated {
        element: element.clone(),
        user_id: user,
    };
    state.committed(&board_id, Some(&event));
    Ok((StatusCode::CREATED, Json(element)))
}

async fn update_element(
    State(state): State<Arc<AppState>>,
    Path((board_id, element_id)): Path<(String, ElementId)>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateElementRequest>,
) -> ApiResult<Json<UpdateElementResponse>> {
    let element = match state.store.put(&board_id, element_id, request, &user) {
        Ok(element) => element,
        Err(e) => {
            let err = ApiError::from(e);
            if let ApiError::Conflict { server, client_version } = &err {
                info!(
                    %board_id, %element_id, %user,
                    client_version, server_version = server.version,
                    "rejected stale update"
                );
            }
            return Err(err);
        }
    };
    info!(%board_id, %element_id, %user, version = element.version, "element updated");
    let event = BoardEvent::ElementUpdated {
        element: element.clone(),
        user_id: user,
    };
    state.committed(&board_id, Some(&event));
    Ok(Json(UpdateElementResponse { success: true, element }))
}

async fn delete_element(
    State(state): State<Arc<AppState>>,
    Path((board_id, element_id)): Path<(String, ElementId)>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    state.store.delete(&board_id, element_id)?;
    info!(%board_id, %element_id, %user, "element deleted");
    let event = BoardEvent::ElementDeleted {
        element_id,
        user_id: user,
    };
    state.committed(&board_id, Some(&event));
    Ok(Json(json!({ "message": "Element deleted successfully" })))
}

async fn group_elements(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
    AuthUser(user): AuthUser,
    Json(request): Json<GroupRequest>,
) -> ApiResult<(StatusCode, Json<Element>)> {
    let element_ids = request.element_ids.clone();
    let group = state.store.group(&board_id, request, &user)?;
    info!(
        %board_id,
        element_id = %group.id,
        %user,
        children = element_ids.len(),
        "elements grouped"
    );
    let event = BoardEvent::ElementsGrouped {
        group_element: group.clone(),
        element_ids,
        user_id: user,
    };
    state.committed(&board_id, Some(&event));
    Ok((StatusCode::CREATED, Json(group)))
}

async fn ungroup_elements(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
    AuthUser(user): AuthUser,
    Json(request): Json<UngroupRequest>,
) -> ApiResult<Json<Value>> {
    let elements = state.store.ungroup(&board_id, request.group_id, &user)?;
    info!(
        %board_id,
        element_id = %request.group_id,
        %user,
        released = elements.len(),
        "elements ungrouped"
    );
    let event = BoardEvent::ElementsUngrouped {
        group_id: request.group_id,
        elements,
        user_id: user,
    };
    state.committed(&board_id, Some(&event));
    Ok(Json(json!({ "message": "Elements ungrouped successfully" })))
}

async fn create_snapshot(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
    AuthUser(user): AuthUser,
    body: Option<Json<SnapshotRequest>>,
) -> ApiResult<(StatusCode, Json<Snapshot>)> {
    let change_type = body
        .and_then(|Json(request)| request.change_type)
        .unwrap_or_else(|| CHANGE_MANUAL.to_string());
    let snapshot = state.store.snapshot(&board_id, &change_type, &user)?;
    info!(
        %board_id, %user, snapshot_id = snapshot.id, %change_type,
        elements = snapshot.snapshot_data.elements.len(),
        "snapshot created"
    );
    state.committed(&board_id, None);
    Ok((StatusCode::CREATED, Json(snapshot)))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

async fn history(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
    AuthUser(_user): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<Snapshot>>> {
    let limit = query.limit.unwrap_or(state.history_limit);
    Ok(Json(state.store.history(&board_id, limit)?))
}

async fn undo(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<UndoResponse>> {
    let snapshot_data = state.store.undo(&board_id, &user)?;
    let restored_elements = snapshot_data.elements.len();
    info!(%board_id, %user, restored_elements, "board restored");
    let event = BoardEvent::BoardRestored {
        snapshot_data,
        user_id: user,
    };
    state.committed(&board_id, Some(&event));
    Ok(Json(UndoResponse {
        message: "Undo successful".into(),
        restored_elements,
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
    AuthUser(user): AuthUser,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, board_id, user))
}

/// Forward the board's events to one subscriber until either side goes away.
///
/// A subscriber that falls behind the broadcast buffer is disconnected; it
/// reconnects and refetches the board instead of silently missing events.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, board_id: String, user: UserId) {
    let mut events = state.hub.subscribe(&board_id);
    let subscribers = state.hub.subscriber_count(&board_id);
    info!(%board_id, %user, subscribers, "subscriber connected");

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!(%board_id, %user, "ignoring client message ({} bytes)", text.len());
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%board_id, %user, "WebSocket error: {}", e);
                        break;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(json) => {
                        if sender.send(Message::Text(json.as_ref().into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%board_id, %user, skipped, "subscriber lagged; disconnecting");
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
    info!(%board_id, %user, "subscriber disconnected");
}
