//! # TaskSync Server
//!
//! Reference list server for TaskSync.
//!
//! This crate provides:
//! - The list and element endpoints (`/list`, `/list/{id}`)
//! - Optimistic concurrency on a single list revision
//! - Optional bearer-token authentication
//! - Fault injection for exercising client retry paths
//!
//! # Architecture
//!
//! The server keeps the list in memory and is driven by plain
//! `(method, path, headers, body)` calls, so it can sit behind any HTTP
//! front end or be called in-process by a loopback client:
//!
//! ```rust,ignore
//! use tasksync_server::{ListServer, ServerConfig};
//!
//! let server = ListServer::new(ServerConfig::default().with_token("secret"));
//! let (status, body) = server.handle("GET", "/list", &headers, b"");
//! ```
//!
//! # Protocol
//!
//! Mutating requests must carry `X-Last-Known-Revision` equal to the
//! current revision. Accepted mutations increment the revision; every
//! successful response carries the revision after the request.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod faults;
mod handler;
mod list;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use faults::{Fault, FaultInjector};
pub use handler::Route;
pub use list::ListState;
pub use server::{ListServer, ServerStats};
