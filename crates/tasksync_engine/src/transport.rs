//! Transport layer abstraction for sync requests.

use crate::request::RequestDescriptor;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Classified failure of a single transport attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be formed or was rejected as invalid (bad URL, 400).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The server could not be reached.
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The server answered with a 5xx status.
    #[error("server unavailable (status {status})")]
    ServerUnavailable {
        /// HTTP status code.
        status: u16,
    },

    /// The server rejected the credentials.
    #[error("authentication failed")]
    Unauthorized,

    /// The addressed item does not exist.
    #[error("not found")]
    NotFound,

    /// The response could not be read at the transport level.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The attempt did not finish within its timeout.
    #[error("request timed out")]
    Timeout,

    /// Any other failure.
    #[error("{0}")]
    Message(String),
}

impl TransportError {
    /// Returns true if the failure is likely to go away on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::NetworkUnreachable(_)
                | TransportError::ServerUnavailable { .. }
                | TransportError::Timeout
                | TransportError::Message(_)
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A successful (2xx) response as received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Creates a 200 response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Future returned by [`RequestTransport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = TransportResult<TransportResponse>> + Send + 'a>>;

/// Sends one request descriptor to the list service.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, loopback, mock for testing, etc.). The engine
/// never calls `send` concurrently on the same transport.
pub trait RequestTransport: Send + Sync + 'static {
    /// Sends the request and returns the raw response or a classified error.
    fn send(&self, request: RequestDescriptor) -> TransportFuture<'_>;
}

impl<T: RequestTransport> RequestTransport for Arc<T> {
    fn send(&self, request: RequestDescriptor) -> TransportFuture<'_> {
        (**self).send(request)
    }
}

/// A scripted reply of the mock transport.
pub type MockReply = TransportResult<TransportResponse>;

/// A mock transport for testing.
///
/// Replies are served in the order they were queued; once the queue is empty
/// the fallback reply is returned. Every request is recorded, and the mock
/// tracks the largest number of sends that were ever outstanding at once.
#[derive(Debug)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: Mutex<MockReply>,
    requests: Mutex<Vec<RequestDescriptor>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Err(TransportError::Message("no mock reply queued".into()))),
            requests: Mutex::new(Vec::new()),
            latency: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queues a reply.
    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().push_back(reply);
    }

    /// Queues a 200 reply with the given body.
    pub fn push_ok(&self, body: impl Into<Vec<u8>>) {
        self.push_reply(Ok(TransportResponse::ok(body)));
    }

    /// Queues a failure.
    pub fn push_error(&self, error: TransportError) {
        self.push_reply(Err(error));
    }

    /// Sets the reply used once the queue is empty.
    pub fn set_fallback(&self, reply: MockReply) {
        *self.fallback.lock() = reply;
    }

    /// Makes every send take this long before replying.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().clone()
    }

    /// Returns the number of sends so far.
    pub fn send_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the largest number of concurrently outstanding sends observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> MockReply {
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts one outstanding send; released when the send future is dropped,
/// including when a timeout abandons it.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RequestTransport for MockTransport {
    fn send(&self, request: RequestDescriptor) -> TransportFuture<'_> {
        Box::pin(async move {
            self.requests.lock().push(request);
            let _in_flight = InFlight::enter(&self.in_flight, &self.peak_in_flight);

            let latency = *self.latency.lock();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            self.next_reply()
        })
    }
}
