//! # TaskSync Protocol
//!
//! Wire model and JSON codec for the TaskSync list service.
//!
//! This crate provides:
//! - `TodoItem` and `Importance`, the list element model
//! - `Revision`, the server's optimistic-concurrency token
//! - Request and response bodies for the list and element endpoints
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod item;
mod messages;
mod revision;

pub use error::{ProtocolError, ProtocolResult};
pub use item::{Importance, ItemId, TodoItem};
pub use messages::{ElementRequest, ElementResponse, ListRequest, ListResponse, STATUS_OK};
pub use revision::Revision;
