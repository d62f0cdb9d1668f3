//! Request and response bodies for the list service.

use crate::error::{ProtocolError, ProtocolResult};
use crate::item::TodoItem;
use crate::revision::Revision;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Status value carried by every successful response body.
pub const STATUS_OK: &str = "ok";

/// Body of `PATCH /list`: the full client list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    /// Items the client wants the server to hold.
    pub list: Vec<TodoItem>,
}

impl ListRequest {
    /// Creates a new list request.
    pub fn new(list: Vec<TodoItem>) -> Self {
        Self { list }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode_body(bytes)
    }
}

/// Body of element requests (`POST /list`, `PUT /list/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRequest {
    /// The element to create or replace.
    pub element: TodoItem,
}

impl ElementRequest {
    /// Creates a new element request.
    pub fn new(element: TodoItem) -> Self {
        Self { element }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode_body(bytes)
    }
}

/// Response of the list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Response status, `"ok"` on success.
    pub status: String,
    /// The server's list.
    pub list: Vec<TodoItem>,
    /// The server's revision after the request.
    pub revision: Revision,
}

impl ListResponse {
    /// Creates a successful list response.
    pub fn ok(list: Vec<TodoItem>, revision: Revision) -> Self {
        Self {
            status: STATUS_OK.into(),
            list,
            revision,
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON, rejecting bodies whose status is not `"ok"`.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let response: Self = decode_body(bytes)?;
        check_status(&response.status)?;
        Ok(response)
    }
}

/// Response of the element endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementResponse {
    /// Response status, `"ok"` on success.
    pub status: String,
    /// The element as stored (or removed) by the server.
    pub element: TodoItem,
    /// The server's revision after the request.
    pub revision: Revision,
}

impl ElementResponse {
    /// Creates a successful element response.
    pub fn ok(element: TodoItem, revision: Revision) -> Self {
        Self {
            status: STATUS_OK.into(),
            element,
            revision,
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON, rejecting bodies whose status is not `"ok"`.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let response: Self = decode_body(bytes)?;
        check_status(&response.status)?;
        Ok(response)
    }
}

fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_slice(bytes)?)
}

fn check_status(status: &str) -> ProtocolResult<()> {
    if status == STATUS_OK {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedStatus(status.to_string()))
    }
}
