//! Bounded retry with backoff for sink writes
//!
//! Only errors that [`Error::is_retryable`] classifies as transient are
//! retried. Once the retries are spent the last error is reported as
//! [`Error::MaxRetriesExceeded`].

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::types::BackoffType;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    /// Growth of the delay between retries
    pub backoff_type: BackoffType,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            backoff_type: config.backoff,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff delay before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.initial_backoff,
            BackoffType::Linear => self.initial_backoff.saturating_mul(attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.initial_backoff.saturating_mul(factor)
            }
        };
        std::cmp::min(delay, self.max_backoff)
    }

    /// Decide whether a failed attempt should be retried, returning the delay
    pub fn should_retry(&self, attempt: u32, error: &Error) -> Option<Duration> {
        if attempt < self.max_retries && error.is_retryable() {
            Some(self.delay_for(attempt))
        } else {
            None
        }
    }

    /// Final error after giving up on a transient failure
    pub fn give_up(&self, error: Error) -> Error {
        if error.is_retryable() && self.max_retries > 0 {
            Error::MaxRetriesExceeded {
                max_retries: self.max_retries,
                last_error: error.to_string(),
            }
        } else {
            error
        }
    }

    /// Run an async operation, retrying transient failures
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => match self.should_retry(attempt, &e) {
                    Some(delay) => {
                        warn!(
                            "{} failed, attempt {}/{}, retrying in {:?}: {}",
                            label,
                            attempt + 1,
                            self.max_retries + 1,
                            delay,
                            e
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(self.give_up(e)),
                },
            }
        }
    }
}
