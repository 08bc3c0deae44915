//! REST surface of the board service.

use super::SyncResult;
use super::protocol::{ElementPage, GroupRequest, Snapshot, UndoResponse, UpdateElementRequest};
use crate::elements::{Element, ElementId};

/// Blocking access to one board service.
///
/// Implementations are driven from the sync worker thread, never from the
/// input path.
pub trait BoardApi: Send {
    fn list_elements(&self, board_id: &str, page: u32, limit: u32) -> SyncResult<ElementPage>;

    /// Create-or-update. A stale `version` yields [`super::SyncError::Conflict`].
    fn put_element(
        &self,
        board_id: &str,
        element_id: ElementId,
        request: &UpdateElementRequest,
    ) -> SyncResult<Element>;

    fn delete_element(&self, board_id: &str, element_id: ElementId) -> SyncResult<()>;

    fn group_elements(&self, board_id: &str, request: &GroupRequest) -> SyncResult<Element>;

    fn ungroup_elements(&self, board_id: &str, group_id: ElementId) -> SyncResult<()>;

    fn create_snapshot(&self, board_id: &str, change_type: &str) -> SyncResult<Snapshot>;

    /// Newest first.
    fn history(&self, board_id: &str, limit: u32) -> SyncResult<Vec<Snapshot>>;

    fn undo(&self, board_id: &str) -> SyncResult<UndoResponse>;
}

/// Fetch every page of a board's elements.
pub fn fetch_all(api: &dyn BoardApi, board_id: &str, limit: u32) -> SyncResult<Vec<Element>> {
    let mut elements = Vec::new();
    let mut page = 1;
    loop {
        let batch = api.list_elements(board_id, page, limit)?;
        let done = batch.elements.is_empty() || page >= batch.pagination.pages;
        elements.extend(batch.elements);
        if done {
            break;
        }
        page += 1;
    }
    log::debug!("fetched {} elements of board {} in {} pages", elements.len(), board_id, page);
    Ok(elements)
}

#[cfg(feature = "client")]
pub use http::HttpBoardApi;

#[cfg(feature = "client")]
mod http {
    use super::BoardApi;
    use crate::elements::{Element, ElementId};
    use crate::sync::protocol::{
        ConflictBody, ElementPage, ErrorBody, GroupRequest, Snapshot, SnapshotRequest, UndoResponse,
        UngroupRequest, UpdateElementRequest, UpdateElementResponse,
    };
    use crate::sync::{SyncError, SyncResult};
    use reqwest::StatusCode;
    use reqwest::blocking::{Client, RequestBuilder, Response};
    use std::time::Duration;
    use url::Url;

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    fn transport(e: reqwest::Error) -> SyncError {
        SyncError::Transport(e.to_string())
    }

    /// [`BoardApi`] over HTTP with a bearer token.
    pub struct HttpBoardApi {
        client: Client,
        base: Url,
        token: String,
    }

    impl HttpBoardApi {
        pub fn new(server_url: &str, token: impl Into<String>) -> SyncResult<Self> {
            let base = Url::parse(server_url)
                .map_err(|e| SyncError::InvalidUrl(format!("{server_url}: {e}")))?;
            if base.scheme() != "http" && base.scheme() != "https" {
                return Err(SyncError::InvalidUrl(format!("unsupported scheme: {}", base.scheme())));
            }
            let client = Client::builder().timeout(REQUEST_TIMEOUT).build().map_err(transport)?;
            Ok(Self {
                client,
                base,
                token: token.into(),
            })
        }

        fn url(&self, board_id: &str, tail: &[&str]) -> SyncResult<Url> {
            let mut url = self.base.clone();
            {
                let mut segments = url
                    .path_segments_mut()
                    .map_err(|()| SyncError::InvalidUrl(self.base.to_string()))?;
                segments.pop_if_empty().push("boards").push(board_id).extend(tail);
            }
            Ok(url)
        }

        /// Send with credentials and map error statuses.
        fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
            let response = request.bearer_auth(&self.token).send().map_err(transport)?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if status == StatusCode::CONFLICT {
                let body: ConflictBody = response.json().map_err(transport)?;
                return Err(SyncError::Conflict(Box::new(body.server_element)));
            }
            let message = response
                .json::<ErrorBody>()
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            Err(match status {
                StatusCode::NOT_FOUND => SyncError::NotFound(message),
                s if s.is_client_error() => SyncError::Rejected(format!("{status}: {message}")),
                _ => SyncError::Transport(format!("{status}: {message}")),
            })
        }
    }

    impl BoardApi for HttpBoardApi {
        fn list_elements(&self, board_id: &str, page: u32, limit: u32) -> SyncResult<ElementPage> {
            let url = self.url(board_id, &["elements"])?;
            let request = self.client.get(url).query(&[("page", page), ("limit", limit)]);
            self.send(request)?.json().map_err(transport)
        }

        fn put_element(
            &self,
            board_id: &str,
            element_id: ElementId,
            request: &UpdateElementRequest,
        ) -> SyncResult<Element> {
            let url = self.url(board_id, &["elements", &element_id.to_string()])?;
            let response: UpdateElementResponse = self
                .send(self.client.put(url).json(request))?
                .json()
                .map_err(transport)?;
            Ok(response.element)
        }

        fn delete_element(&self, board_id: &str, element_id: ElementId) -> SyncResult<()> {
            let url = self.url(board_id, &["elements", &element_id.to_string()])?;
            self.send(self.client.delete(url)).map(|_| ())
        }

        fn group_elements(&self, board_id: &str, request: &GroupRequest) -> SyncResult<Element> {
            let url = self.url(board_id, &["elements", "group"])?;
            self.send(self.client.post(url).json(request))?.json().map_err(transport)
        }

        fn ungroup_elements(&self, board_id: &str, group_id: ElementId) -> SyncResult<()> {
            let url = self.url(board_id, &["elements", "ungroup"])?;
            self.send(self.client.post(url).json(&UngroupRequest { group_id })).map(|_| ())
        }

        fn create_snapshot(&self, board_id: &str, change_type: &str) -> SyncResult<Snapshot> {
            let url = self.url(board_id, &["snapshot"])?;
            let body = SnapshotRequest {
                change_type: Some(change_type.to_string()),
            };
            self.send(self.client.post(url).json(&body))?.json().map_err(transport)
        }

        fn history(&self, board_id: &str, limit: u32) -> SyncResult<Vec<Snapshot>> {
            let url = self.url(board_id, &["history"])?;
            self.send(self.client.get(url).query(&[("limit", limit)]))?
                .json()
                .map_err(transport)
        }

        fn undo(&self, board_id: &str) -> SyncResult<UndoResponse> {
            let url = self.url(board_id, &["undo"])?;
            self.send(self.client.post(url))?.json().map_err(transport)
        }
    }

}
