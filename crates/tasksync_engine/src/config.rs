//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use crate::transport::TransportError;
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the list service (e.g., "https://todo.example.com/api").
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Identifier of this device, stamped into `last_updated_by`.
    pub device_id: String,
    /// Timeout applied to each individual attempt.
    pub request_timeout: Duration,
    /// Retry configuration.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(base_url: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            device_id: device_id.into(),
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Checks the configuration for values the engine cannot work with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.request_timeout.is_zero() {
            return Err(SyncError::InvalidConfig(
                "request timeout must be greater than zero".into(),
            ));
        }
        self.retry.validate()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("", "local")
    }
}

/// Which transport failures enter the backoff loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryClassification {
    /// Every transport failure is retried until the delay ceiling is reached.
    #[default]
    All,
    /// Only transient failures are retried; auth, not-found, invalid-request
    /// and malformed-response failures are reported on first occurrence.
    TransientOnly,
}

impl RetryClassification {
    /// Returns true if a failure of this kind should be retried.
    pub fn should_retry(&self, error: &TransportError) -> bool {
        match self {
            RetryClassification::All => true,
            RetryClassification::TransientOnly => error.is_transient(),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Ceiling on the delay; reaching it ends the retry loop.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub factor: f64,
    /// Fraction of the base delay used as the jitter half-range.
    pub jitter: f64,
    /// Which failures are retried.
    pub classification: RetryClassification,
}

impl RetryConfig {
    /// Creates a new retry configuration with the given delay bounds.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            ..Self::default()
        }
    }

    /// Sets the backoff multiplier.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Sets the jitter fraction.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the retry classification.
    pub fn with_classification(mut self, classification: RetryClassification) -> Self {
        self.classification = classification;
        self
    }

    /// Checks that the parameters describe a finite, growing schedule.
    pub fn validate(&self) -> SyncResult<()> {
        if self.min_delay.is_zero() {
            return Err(SyncError::InvalidConfig("min_delay must be greater than zero".into()));
        }
        if self.min_delay > self.max_delay {
            return Err(SyncError::InvalidConfig(format!(
                "min_delay {:?} exceeds max_delay {:?}",
                self.min_delay, self.max_delay
            )));
        }
        if !self.factor.is_finite() || self.factor <= 1.0 {
            return Err(SyncError::InvalidConfig(format!(
                "factor must be greater than 1, got {}",
                self.factor
            )));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(SyncError::InvalidConfig(format!(
                "jitter must be in [0, 1), got {}",
                self.jitter
            )));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            factor: 1.5,
            jitter: 0.05,
            classification: RetryClassification::All,
        }
    }
}
