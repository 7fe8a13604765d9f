//! Retry with exponential backoff and per-call timeouts for provider requests

use crate::error::{Result, ScopeError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }

    /// Execute an async operation, retrying transient failures
    ///
    /// Only errors for which [`ScopeError::is_retryable`] holds are retried;
    /// anything else is returned immediately. After the last attempt the last
    /// error is returned.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            debug!("Attempt {}/{} for {}", attempt + 1, attempts, operation_name);

            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{} succeeded after {} retries", operation_name, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    debug!("{} failed with non-retryable error: {}", operation_name, e);
                    return Err(e);
                }
                Err(e) if attempt + 1 >= attempts => {
                    warn!("{} failed after {} attempts: {}", operation_name, attempts, e);
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    let backoff = self.backoff_duration(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        operation_name, attempt, attempts, e, backoff
                    );
                    sleep(backoff).await;
                }
            }
        }
    }
}

/// Bound `future` by `after`, mapping expiry to [`ScopeError::Timeout`]
pub async fn with_timeout<T, Fut>(operation: &str, after: Duration, future: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(ScopeError::Timeout {
            operation: operation.to_string(),
            after,
        }),
    }
}
