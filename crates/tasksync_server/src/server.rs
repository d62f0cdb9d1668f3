//! Main list server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::faults::{Fault, FaultInjector};
use crate::handler::{RequestHandler, Route};
use crate::list::ListState;
use parking_lot::RwLock;
use std::sync::Arc;
use tasksync_protocol::{Revision, TodoItem};
use tracing::{debug, warn};

/// Body returned for [`Fault::Corrupt`].
const CORRUPT_BODY: &[u8] = b"<html><body>502 Bad Gateway</body></html>";

/// Request counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Requests received.
    pub requests: u64,
    /// Requests answered with 2xx.
    pub accepted: u64,
    /// Requests answered with an error status.
    pub rejected: u64,
    /// Requests answered from the fault injector.
    pub faulted: u64,
}

/// The list server.
///
/// Holds one list in memory and answers requests given as method, path,
/// headers and body.
///
/// # Example
///
/// ```
/// use tasksync_server::{ListServer, ServerConfig};
///
/// let server = ListServer::new(ServerConfig::default());
/// let (status, _body) = server.handle("GET", "/list", &[], b"");
/// assert_eq!(status, 200);
/// ```
pub struct ListServer {
    handler: RequestHandler,
    list: Arc<ListState>,
    faults: FaultInjector,
    stats: RwLock<ServerStats>,
}

impl ListServer {
    /// Creates a new list server.
    pub fn new(config: ServerConfig) -> Self {
        let list = Arc::new(ListState::new(config.initial_revision));
        Self::with_list(config, list)
    }

    /// Creates a list server over an existing list.
    pub fn with_list(config: ServerConfig, list: Arc<ListState>) -> Self {
        Self {
            handler: RequestHandler::new(config, Arc::clone(&list)),
            list,
            faults: FaultInjector::new(),
            stats: RwLock::new(ServerStats::default()),
        }
    }

    /// Handles one request and returns the status code and body.
    pub fn handle(
        &self,
        method: &str,
        path: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> (u16, Vec<u8>) {
        self.stats.write().requests += 1;

        if let Some(fault) = self.faults.take() {
            self.stats.write().faulted += 1;
            warn!(method, path, ?fault, "injecting fault");
            return match fault {
                Fault::Status(status) => (status, ServerError::Injected(status).body()),
                Fault::Corrupt => (200, CORRUPT_BODY.to_vec()),
            };
        }

        match self.process(method, path, headers, body) {
            Ok(body) => {
                self.stats.write().accepted += 1;
                (200, body)
            }
            Err(err) => {
                self.stats.write().rejected += 1;
                let status = err.status();
                if err.is_server_error() {
                    warn!(method, path, status, error = %err, "request failed");
                } else {
                    debug!(method, path, status, error = %err, "request rejected");
                }
                (status, err.body())
            }
        }
    }

    fn process(
        &self,
        method: &str,
        path: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> ServerResult<Vec<u8>> {
        let route = Route::parse(path)?;
        self.handler.authenticate(headers)?;
        self.handler.dispatch(method, &route, headers, body)
    }

    /// Returns the fault injector.
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Makes the next `count` requests fail with `status`.
    pub fn fail_next(&self, count: usize, status: u16) {
        self.faults.fail_next(count, status);
    }

    /// Makes the next `count` requests return an undecodable body.
    pub fn corrupt_next(&self, count: usize) {
        self.faults.corrupt_next(count);
    }

    /// Returns the current revision.
    pub fn revision(&self) -> Revision {
        self.list.revision()
    }

    /// Returns every item.
    pub fn items(&self) -> Vec<TodoItem> {
        self.list.snapshot().0
    }

    /// Returns the request counters.
    pub fn stats(&self) -> ServerStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_protocol::{ElementRequest, ElementResponse, ListRequest, ListResponse};

    fn revision_header(revision: u64) -> Vec<(String, String)> {
        vec![(
            "X-Last-Known-Revision".to_string(),
            revision.to_string(),
        )]
    }

    #[test]
    fn server_lifecycle() {
        let server = ListServer::new(ServerConfig::default());
        assert_eq!(server.revision(), Revision::INITIAL);
        assert!(server.items().is_empty());

        let (status, body) = server.handle("GET", "/list", &[], b"");
        assert_eq!(status, 200);
        let response = ListResponse::decode(&body).unwrap();
        assert!(response.list.is_empty());
        assert_eq!(response.revision, Revision::INITIAL);
    }

    #[test]
    fn full_item_flow() {
        let server = ListServer::new(ServerConfig::default());
        let item = TodoItem::new("bread", "d");

        // Create
        let body = ElementRequest::new(item.clone()).encode().unwrap();
        let (status, reply) = server.handle("POST", "/list", &revision_header(0), &body);
        assert_eq!(status, 200);
        assert_eq!(ElementResponse::decode(&reply).unwrap().revision, Revision::new(1));

        // Read
        let path = format!("/list/{}", item.id);
        let (status, reply) = server.handle("GET", &path, &[], b"");
        assert_eq!(status, 200);
        assert_eq!(ElementResponse::decode(&reply).unwrap().element, item);

        // Update with a stale revision is rejected
        let (status, _) = server.handle("PUT", &path, &revision_header(0), &body);
        assert_eq!(status, 400);

        // Delete
        let (status, reply) = server.handle("DELETE", &path, &revision_header(1), b"");
        assert_eq!(status, 200);
        assert_eq!(ElementResponse::decode(&reply).unwrap().revision, Revision::new(2));
        assert!(server.items().is_empty());

        let (status, _) = server.handle("GET", &path, &[], b"");
        assert_eq!(status, 404);
    }

    #[test]
    fn push_replaces_list() {
        let server = ListServer::new(ServerConfig::default().with_initial_revision(Revision::new(7)));
        let items = vec![TodoItem::new("a", "d"), TodoItem::new("b", "d")];
        let body = ListRequest::new(items.clone()).encode().unwrap();

        let (status, reply) = server.handle("PATCH", "/list", &revision_header(7), &body);
        assert_eq!(status, 200);
        let response = ListResponse::decode(&reply).unwrap();
        assert_eq!(response.list, items);
        assert_eq!(response.revision, Revision::new(8));
    }

    #[test]
    fn token_is_required_when_configured() {
        let server = ListServer::new(ServerConfig::default().with_token("secret"));
        let (status, _) = server.handle("GET", "/list", &[], b"");
        assert_eq!(status, 401);

        let headers = vec![("Authorization".to_string(), "Bearer secret".to_string())];
        let (status, _) = server.handle("GET", "/list", &headers, b"");
        assert_eq!(status, 200);
    }

    #[test]
    fn malformed_body_and_unknown_routes() {
        let server = ListServer::new(ServerConfig::default());
        let (status, _) = server.handle("PATCH", "/list", &revision_header(0), b"{");
        assert_eq!(status, 400);
        let (status, _) = server.handle("GET", "/nope", &[], b"");
        assert_eq!(status, 404);
        let (status, _) = server.handle("HEAD", "/list", &[], b"");
        assert_eq!(status, 405);
    }

    #[test]
    fn injected_faults_leave_list_untouched() {
        let server = ListServer::new(ServerConfig::default());
        server.fail_next(1, 503);
        server.corrupt_next(1);

        let (status, _) = server.handle("DELETE", "/list/x", &revision_header(0), b"");
        assert_eq!(status, 503);

        let (status, body) = server.handle("GET", "/list", &[], b"");
        assert_eq!(status, 200);
        assert!(ListResponse::decode(&body).is_err());

        let (status, _) = server.handle("GET", "/list", &[], b"");
        assert_eq!(status, 200);
        assert_eq!(server.revision(), Revision::INITIAL);

        let stats = server.stats();
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.faulted, 2);
        assert_eq!(stats.accepted, 1);
    }
}
