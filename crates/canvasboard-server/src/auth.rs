//! Bearer-token authentication.
//!
//! Tokens come from the `Authorization: Bearer` header, or from a `token`
//! query parameter for WebSocket upgrades where browsers cannot set headers.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use canvasboard_core::elements::UserId;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Known tokens and the users they act as.
#[derive(Debug, Clone, Default)]
pub struct TokenAuth {
    tokens: HashMap<String, UserId>,
}

impl TokenAuth {
    pub fn new(tokens: HashMap<String, UserId>) -> Self {
        Self { tokens }
    }

    /// User for a request, from its `Authorization` header value or its
    /// `token` query parameter. The header wins when both are present.
    pub fn verify(&self, header: Option<&str>, query_token: Option<&str>) -> Option<UserId> {
        let token = match header {
            Some(value) => value.strip_prefix("Bearer ")?.trim(),
            None => query_token?,
        };
        self.tokens.get(token).cloned()
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// The authenticated user of a request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let query = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.token);
        match state.auth.verify(header, query.as_deref()) {
            Some(user) => Ok(AuthUser(user)),
            None => {
                tracing::debug!(path = %parts.uri.path(), "rejected unauthenticated request");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> TokenAuth {
        TokenAuth::new(HashMap::from([("s3cret".to_string(), "alice".to_string())]))
    }

    #[test]
    fn test_header_and_query_tokens() {
        let auth = auth();
        assert_eq!(auth.verify(Some("Bearer s3cret"), None).as_deref(), Some("alice"));
        assert_eq!(auth.verify(None, Some("s3cret")).as_deref(), Some("alice"));
        assert_eq!(auth.verify(None, None), None);
    }

    #[test]
    fn test_rejects_bad_credentials() {
        let auth = auth();
        assert_eq!(auth.verify(Some("s3cret"), None), None);
        assert_eq!(auth.verify(Some("Bearer nope"), None), None);
        assert_eq!(auth.verify(None, Some("nope")), None);
        // A malformed header is not rescued by the query token.
        assert_eq!(auth.verify(Some("Basic s3cret"), Some("s3cret")), None);
    }
}
