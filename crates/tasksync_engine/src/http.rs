//! HTTP transport implementation.
//!
//! This module maps HTTP exchanges onto the engine's transport contract.
//! The actual HTTP client is abstracted via a trait to allow different
//! implementations (reqwest, hyper, an in-process loopback, etc.).

use crate::request::{Method, RequestDescriptor};
use crate::transport::{RequestTransport, TransportError, TransportFuture, TransportResponse};
use parking_lot::RwLock;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// A fully resolved HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

/// Future returned by [`HttpClient::execute`].
///
/// Resolves to the status and body, or to a description of why no response
/// was received.
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<(u16, Vec<u8>), String>> + Send + 'a>>;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP exchange.
pub trait HttpClient: Send + Sync + 'static {
    /// Executes the request and returns the status code and body.
    fn execute(&self, request: HttpRequest) -> HttpFuture<'_>;
}

/// Maps a response status onto the transport error taxonomy.
///
/// Returns `None` for 2xx statuses.
pub fn classify_status(status: u16) -> Option<TransportError> {
    match status {
        200..=299 => None,
        400 => Some(TransportError::InvalidRequest("server rejected request".into())),
        401 | 403 => Some(TransportError::Unauthorized),
        404 => Some(TransportError::NotFound),
        500..=599 => Some(TransportError::ServerUnavailable { status }),
        other => Some(TransportError::Message(format!("unexpected status {}", other))),
    }
}

/// HTTP-based request transport.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the list service (e.g., "https://todo.example.com/api").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn set_error(&self, err: &TransportError) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    fn resolve(&self, request: RequestDescriptor) -> Result<HttpRequest, TransportError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(TransportError::InvalidRequest(format!(
                "base URL {:?} is not an http(s) URL",
                self.base_url
            )));
        }
        Ok(HttpRequest {
            method: request.method,
            url: format!("{}{}", self.base_url, request.path),
            headers: request.headers,
            body: request.body,
        })
    }

    async fn exchange(&self, request: RequestDescriptor) -> Result<TransportResponse, TransportError> {
        let request = self.resolve(request)?;
        debug!(method = %request.method, url = %request.url, "http request");

        let (status, body) = self
            .client
            .execute(request)
            .await
            .map_err(TransportError::NetworkUnreachable)?;

        match classify_status(status) {
            Some(err) => Err(err),
            None => Ok(TransportResponse { status, body }),
        }
    }
}

impl<C: HttpClient> RequestTransport for HttpTransport<C> {
    fn send(&self, request: RequestDescriptor) -> TransportFuture<'_> {
        Box::pin(async move {
            let result = self.exchange(request).await;
            match &result {
                Ok(_) => self.clear_error(),
                Err(err) => self.set_error(err),
            }
            result
        })
    }
}

/// A request as seen by a loopback server.
#[derive(Debug, Clone, Copy)]
pub struct LoopbackRequest<'a> {
    /// HTTP method name.
    pub method: &'a str,
    /// Path with the base URL stripped.
    pub path: &'a str,
    /// Request headers.
    pub headers: &'a [(String, String)],
    /// Request body (empty if none).
    pub body: &'a [u8],
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync + 'static {
    /// Handles a request and returns the status code and body.
    fn handle(&self, request: LoopbackRequest<'_>) -> (u16, Vec<u8>);
}

impl<F> LoopbackServer for F
where
    F: Fn(LoopbackRequest<'_>) -> (u16, Vec<u8>) + Send + Sync + 'static,
{
    fn handle(&self, request: LoopbackRequest<'_>) -> (u16, Vec<u8>) {
        self(request)
    }
}

/// A loopback HTTP client that routes requests directly to an in-process server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
    prefix: String,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client serving URLs under `base_url`.
    pub fn new(base_url: impl Into<String>, server: S) -> Self {
        Self {
            server,
            prefix: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
        Box::pin(async move {
            let path = request
                .url
                .strip_prefix(&self.prefix)
                .ok_or_else(|| format!("no route to {}", request.url))?;
            let body = request.body.as_deref().unwrap_or_default();

            Ok(self.server.handle(LoopbackRequest {
                method: request.method.as_str(),
                path,
                headers: &request.headers,
                body,
            }))
        })
    }
}
