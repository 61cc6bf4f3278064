//! Retry policy with exponential backoff for reasoning service requests.
//!
//! Backoff doubles per retry up to the cap. Only transient errors are
//! retried; permanent errors (bad request, bad credentials) surface
//! immediately.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::ReasoningError;
use crate::domain::models::RetryConfig;

/// Retry policy with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl RetryPolicy {
    /// Build a policy from configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        }
    }

    /// Execute an operation, retrying transient errors with backoff.
    ///
    /// Returns the last error once retries are exhausted.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ReasoningError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ReasoningError>>,
    {
        let mut backoff_ms = self.initial_backoff_ms;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        backoff_ms,
                        error = %err,
                        "transient reasoning error, backing off"
                    );
                    sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(self.max_backoff_ms);
                }
                Err(err) => {
                    debug!(attempt = attempt + 1, error = %err, "reasoning request failed");
                    return Err(err);
                }
            }
        }
        unreachable!("loop returns on the final attempt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
        }
    }

    #[tokio::test]
    async fn test_success_needs_no_retry() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ReasoningError>(42)
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_then_succeed() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ReasoningError::Overloaded)
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(3)
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ReasoningError::AuthenticationFailed("bad key".into()))
            })
            .await;
        assert!(matches!(
            result,
            Err(ReasoningError::AuthenticationFailed(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(2)
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ReasoningError::RateLimitExceeded)
            })
            .await;
        assert!(matches!(result, Err(ReasoningError::RateLimitExceeded)));
        // Initial attempt plus two retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
