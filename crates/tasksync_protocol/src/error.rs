//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire bodies.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The body was not valid JSON for the expected shape.
    #[error("malformed body: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The body was empty.
    #[error("empty body")]
    Empty,

    /// The server reported a non-ok status in the body.
    #[error("unexpected status: {0}")]
    UnexpectedStatus(String),

    /// The item id cannot be placed in a request path.
    #[error("invalid item id: {0:?}")]
    InvalidItemId(String),
}
