//! Error types for the sync engine.

use crate::transport::TransportError;
use tasksync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Terminal outcomes of a sync operation that did not succeed.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The backoff ceiling was reached while the transport kept failing.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The error returned by the final attempt.
        last: TransportError,
    },

    /// A transport failure that the retry classification does not retry.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered successfully but the body could not be decoded.
    #[error("undecodable response: {0}")]
    Decode(#[source] ProtocolError),

    /// The request body could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[source] ProtocolError),

    /// The engine configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The local item store failed.
    #[error("item store error: {0}")]
    Store(String),

    /// The engine worker stopped before the operation finished.
    #[error("sync engine stopped")]
    EngineStopped,
}

impl SyncError {
    /// Returns the transport error behind this failure, if any.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            SyncError::RetriesExhausted { last, .. } => Some(last),
            SyncError::Transport(err) => Some(err),
            _ => None,
        }
    }

    /// Returns a short message suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self.transport_error() {
            Some(TransportError::Unauthorized) => "Sign-in expired. Check your access token.",
            Some(TransportError::NotFound) => "The task no longer exists on the server.",
            Some(TransportError::InvalidRequest(_)) => {
                "The server rejected the request. Try refreshing the list."
            }
            Some(TransportError::NetworkUnreachable(_)) | Some(TransportError::Timeout) => {
                "No connection to the server. Changes are kept on this device."
            }
            Some(TransportError::ServerUnavailable { .. }) => {
                "The server is unavailable right now. Try again later."
            }
            Some(TransportError::MalformedResponse(_)) | Some(TransportError::Message(_)) => {
                "Synchronization failed."
            }
            None => match self {
                SyncError::Decode(_) => "The server sent an unreadable response.",
                SyncError::Store(_) => "Could not read or write tasks on this device.",
                _ => "Synchronization failed.",
            },
        }
    }
}
