//! # TaskSync Engine
//!
//! Synchronization engine for the TaskSync list client.
//!
//! This crate provides:
//! - Exponential backoff with jitter (`RetryPolicy`)
//! - A serialization gate that keeps one request in flight (`OperationQueue`)
//! - Revision tracking and the dirty (needs-retry) flag
//! - The public `SyncEngine` with list and element operations
//! - Request building and transport abstractions, including an HTTP
//!   transport over any `HttpClient` and an in-process loopback client
//!
//! ## Architecture
//!
//! Every operation is a job on one FIFO queue drained by a single worker:
//! 1. The worker builds the request with the revision current at that moment
//! 2. The transport sends it; the worker waits for the outcome
//! 3. Success updates the revision; a failure schedules a delayed re-submit
//!
//! ## Key Invariants
//!
//! - At most one request is outstanding at any time
//! - Every request embeds the revision known when it was built
//! - Every operation delivers exactly one outcome
//! - The delay ceiling bounds the number of attempts

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod gate;
mod http;
mod operation;
mod request;
mod retry;
mod state;
mod store;
mod transport;

pub use config::{RetryClassification, RetryConfig, SyncConfig};
pub use engine::{OperationHandle, SyncEngine, SyncedItem, SyncedList};
pub use error::{SyncError, SyncResult};
pub use gate::{BoxFuture, Job, OperationQueue, Step};
pub use http::{
    classify_status, HttpClient, HttpFuture, HttpRequest, HttpTransport, LoopbackClient,
    LoopbackRequest, LoopbackServer,
};
pub use operation::{Operation, OperationKind};
pub use request::{
    Method, RequestBuilder, RequestDescriptor, RestRequestBuilder, AUTHORIZATION_HEADER,
    CONTENT_TYPE_HEADER, REVISION_HEADER,
};
pub use retry::{RetryAttempt, RetryPolicy};
pub use state::{EngineStatus, OperationPhase, RevisionState, SyncStats};
pub use store::{ItemStore, MemoryItemStore};
pub use transport::{
    MockReply, MockTransport, RequestTransport, TransportError, TransportFuture,
    TransportResponse, TransportResult,
};
