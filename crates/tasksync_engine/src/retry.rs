//! Exponential backoff with jitter.
//!
//! The policy only answers two questions for a failed attempt: how long to
//! wait before the next one, and whether another one is allowed at all. The
//! ceiling on the delay is the only thing that ends a retry loop; there is no
//! separate attempt counter.
//!
//! Whether another attempt is allowed depends on the pre-jitter delay only,
//! so a configuration always yields the same number of attempts. A jittered
//! delay that is clamped to the ceiling still allows the retry.

use crate::config::RetryConfig;
use crate::error::SyncResult;
use rand::Rng;
use std::time::Duration;

/// The decision made after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryAttempt {
    /// The attempt that failed (1-based).
    pub attempt: u32,
    /// Delay before the next attempt, jitter included.
    pub delay: Duration,
    /// False once the pre-jitter delay has reached the ceiling.
    pub retry_enabled: bool,
}

/// Computes backoff delays from the attempt number.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    min_delay: f64,
    max_delay: f64,
    factor: f64,
    jitter: f64,
}

impl RetryPolicy {
    /// Creates a policy from a retry configuration.
    ///
    /// Fails with [`SyncError::InvalidConfig`](crate::SyncError::InvalidConfig)
    /// if the configuration does not describe a finite, growing schedule.
    pub fn new(config: &RetryConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: &RetryConfig) -> Self {
        Self {
            min_delay: config.min_delay.as_secs_f64(),
            max_delay: config.max_delay.as_secs_f64(),
            factor: config.factor,
            jitter: config.jitter,
        }
    }

    /// Returns the ceiling on any computed delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs_f64(self.max_delay)
    }

    fn raw_base(&self, attempt: u32) -> f64 {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        self.min_delay * self.factor.powi(exponent)
    }

    /// Returns the pre-jitter delay for an attempt, capped at the ceiling.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.raw_base(attempt).min(self.max_delay))
    }

    /// Computes the retry decision after `attempt` failed.
    ///
    /// `retry_enabled` is false once the pre-jitter delay reaches the
    /// ceiling; the jitter draw never changes it.
    pub fn next_attempt<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> RetryAttempt {
        let raw = self.raw_base(attempt);
        let base = raw.min(self.max_delay);
        let half_range = self.jitter * base;
        let offset = if half_range > 0.0 {
            rng.gen_range(-half_range..=half_range)
        } else {
            0.0
        };
        let delay = (base + offset).clamp(0.0, self.max_delay);

        RetryAttempt {
            attempt,
            delay: Duration::from_secs_f64(delay),
            retry_enabled: raw < self.max_delay,
        }
    }

    /// Returns the pre-jitter delays of every retry the policy allows.
    pub fn schedule(&self) -> Vec<Duration> {
        (1u32..)
            .take_while(|&attempt| self.raw_base(attempt) < self.max_delay)
            .map(|attempt| self.base_delay(attempt))
            .collect()
    }

    /// Returns how many attempts a permanently failing operation makes.
    pub fn max_attempts(&self) -> u32 {
        self.schedule().len() as u32 + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_valid(&RetryConfig::default())
    }
}
