//! Error types for the list server.

use serde::Serialize;
use tasksync_protocol::{ProtocolError, Revision};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling a request.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request body could not be decoded.
    #[error("malformed body: {0}")]
    MalformedBody(#[from] ProtocolError),

    /// Missing or wrong bearer token.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The client's revision does not match the server's.
    #[error("revision mismatch: server is at {expected}, client sent {actual:?}")]
    RevisionConflict {
        /// Current server revision.
        expected: Revision,
        /// Revision sent by the client, if any.
        actual: Option<Revision>,
    },

    /// No item with the given id.
    #[error("item not found: {0}")]
    NotFound(String),

    /// No route for the path.
    #[error("no route for {0}")]
    UnknownRoute(String),

    /// The route exists but not for this method.
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    /// A failure injected by the fault injector.
    #[error("injected failure with status {0}")]
    Injected(u16),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::MalformedBody(_)
            | ServerError::RevisionConflict { .. } => 400,
            ServerError::AuthenticationFailed(_) => 401,
            ServerError::NotFound(_) | ServerError::UnknownRoute(_) => 404,
            ServerError::MethodNotAllowed(_) => 405,
            ServerError::Injected(status) => *status,
            ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }

    /// Encodes the JSON error body sent to the client.
    pub fn body(&self) -> Vec<u8> {
        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };
        serde_json::to_vec(&body).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}
