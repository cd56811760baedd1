//! Bounded retries with a linear backoff schedule

use std::future::Future;
use std::time::Duration;

use super::ApiError;

/// Total attempts, first one included
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay unit; the wait before attempt n+1 is `n * DEFAULT_BASE_DELAY`
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Wraps an operation with up to `max_attempts` tries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts (at least 1)
    pub max_attempts: u32,
    /// Multiplied by the attempt number to get the next delay
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least one
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts
    ///
    /// `operation` receives the 1-based attempt number. `is_retryable` decides
    /// which failures earn another attempt; a failure it rejects is returned
    /// as-is. When attempts run out the last failure is returned inside
    /// `ApiError::Exhausted`.
    ///
    /// The backoff is a `tokio::time::sleep`, so dropping the returned future
    /// cancels any pending wait.
    pub async fn run<T, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> Result<T, ApiError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
        P: Fn(&ApiError) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let last_error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_retryable(&last_error) {
                tracing::debug!(attempt, error = %last_error, "not retrying");
                return Err(last_error);
            }

            if attempt >= max_attempts {
                tracing::warn!(attempts = attempt, error = %last_error, "giving up");
                return Err(ApiError::Exhausted {
                    attempts: attempt,
                    last: Box::new(last_error),
                });
            }

            let delay = self.delay_after(attempt);
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
