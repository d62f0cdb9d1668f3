//! Request routing and handlers for the list endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::list::ListState;
use std::sync::Arc;
use tasksync_protocol::{
    ElementRequest, ElementResponse, ItemId, ListRequest, ListResponse, Revision,
};
use tracing::debug;

const REVISION_HEADER: &str = "X-Last-Known-Revision";
const AUTHORIZATION_HEADER: &str = "Authorization";

/// A parsed request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/list`
    List,
    /// `/list/{id}`
    Item(ItemId),
}

impl Route {
    /// Parses a request path, ignoring any query string.
    pub fn parse(path: &str) -> ServerResult<Route> {
        let path = path.split('?').next().unwrap_or_default();
        let mut segments = path.trim_matches('/').split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some("list"), None, None) => Ok(Route::List),
            (Some("list"), Some(id), None) if !id.is_empty() => Ok(Route::Item(ItemId::new(id))),
            _ => Err(ServerError::UnknownRoute(path.to_string())),
        }
    }
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Handler for list requests.
pub(crate) struct RequestHandler {
    config: ServerConfig,
    list: Arc<ListState>,
}

impl RequestHandler {
    pub(crate) fn new(config: ServerConfig, list: Arc<ListState>) -> Self {
        Self { config, list }
    }

    /// Checks the bearer token when one is configured.
    pub(crate) fn authenticate(&self, headers: &[(String, String)]) -> ServerResult<()> {
        let Some(expected) = &self.config.token else {
            return Ok(());
        };
        let presented = header(headers, AUTHORIZATION_HEADER)
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ServerError::AuthenticationFailed("missing bearer token".into()))?;
        if presented != expected {
            return Err(ServerError::AuthenticationFailed("invalid token".into()));
        }
        Ok(())
    }

    fn known_revision(headers: &[(String, String)]) -> ServerResult<Option<Revision>> {
        header(headers, REVISION_HEADER)
            .map(|value| {
                value.parse::<Revision>().map_err(|_| {
                    ServerError::InvalidRequest(format!("unparsable revision {:?}", value))
                })
            })
            .transpose()
    }

    /// Handles an authenticated request and returns the response body.
    pub(crate) fn dispatch(
        &self,
        method: &str,
        route: &Route,
        headers: &[(String, String)],
        body: &[u8],
    ) -> ServerResult<Vec<u8>> {
        let known = Self::known_revision(headers)?;
        debug!(method, ?route, ?known, "handling request");

        let encoded = match (method, route) {
            ("GET", Route::List) => {
                let (items, revision) = self.list.snapshot();
                ListResponse::ok(items, revision).encode()
            }
            ("PATCH", Route::List) => {
                let request = ListRequest::decode(body)?;
                if request.list.len() > self.config.max_items {
                    return Err(ServerError::InvalidRequest(format!(
                        "too many items: {} > {}",
                        request.list.len(),
                        self.config.max_items
                    )));
                }
                let (items, revision) = self.list.replace_all(request.list, known)?;
                ListResponse::ok(items, revision).encode()
            }
            ("POST", Route::List) => {
                let request = ElementRequest::decode(body)?;
                if self.list.len() >= self.config.max_items {
                    return Err(ServerError::InvalidRequest("list is full".into()));
                }
                let (item, revision) = self.list.insert(request.element, known)?;
                ElementResponse::ok(item, revision).encode()
            }
            ("GET", Route::Item(id)) => {
                let (item, revision) = self.list.get(id)?;
                ElementResponse::ok(item, revision).encode()
            }
            ("PUT", Route::Item(id)) => {
                let request = ElementRequest::decode(body)?;
                let (item, revision) = self.list.update(id, request.element, known)?;
                ElementResponse::ok(item, revision).encode()
            }
            ("DELETE", Route::Item(id)) => {
                let (item, revision) = self.list.remove(id, known)?;
                ElementResponse::ok(item, revision).encode()
            }
            (method, _) => return Err(ServerError::MethodNotAllowed(method.to_string())),
        };

        encoded.map_err(|err| ServerError::Internal(err.to_string()))
    }
}
