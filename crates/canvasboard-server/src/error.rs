//! HTTP error mapping.

use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use canvasboard_core::elements::Element;
use canvasboard_core::sync::protocol::{ConflictBody, ErrorBody};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("version conflict")]
    Conflict { server: Box<Element>, client_version: u64 },
    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(e) => ApiError::BadRequest(e.to_string()),
            StoreError::Conflict {
                server,
                client_version,
            } => ApiError::Conflict {
                server,
                client_version,
            },
            StoreError::NotFound(message) => ApiError::NotFound(message),
            StoreError::Rejected(message) => ApiError::BadRequest(message),
            StoreError::Internal(message) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Conflict { server, client_version } => {
                let body = ConflictBody {
                    error: "Version conflict".into(),
                    conflict: true,
                    server_version: server.version,
                    server_element: *server,
                    client_version,
                };
                return (StatusCode::CONFLICT, Json(body)).into_response();
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Access token required".to_string())
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => {
                tracing::error!("internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
