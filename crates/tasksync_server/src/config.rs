//! Server configuration.

use tasksync_protocol::Revision;

/// Configuration for the list server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bearer token every request must present, if set.
    pub token: Option<String>,
    /// Revision of the empty list the server starts with.
    pub initial_revision: Revision,
    /// Maximum number of items a pushed list may contain.
    pub max_items: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new() -> Self {
        Self {
            token: None,
            initial_revision: Revision::INITIAL,
            max_items: 10_000,
        }
    }

    /// Requires the given bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the starting revision.
    pub fn with_initial_revision(mut self, revision: Revision) -> Self {
        self.initial_revision = revision;
        self
    }

    /// Sets the maximum list size.
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = max;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
