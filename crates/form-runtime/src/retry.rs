use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::BackendError;

/// Bounded retries with linear backoff for backend calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Per-attempt limit; an attempt over it counts as a timeout failure.
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            timeout_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Pause before attempt `attempt + 1`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let limit = Duration::from_millis(self.timeout_ms);
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(limit, call()).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout(self.timeout_ms)),
            };
            match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "backend call recovered");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "backend call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(operation, attempt, error = %err, "backend call failed");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            timeout_ms: 200,
        }
    }

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = fast(3)
            .run("save", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(BackendError::Transport("reset".into()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = fast(3)
            .run("submit", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(BackendError::Storage("disk full".into())) }
            })
            .await;
        assert_eq!(result, Err(BackendError::Storage("disk full".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = fast(3)
            .run("load", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(BackendError::NotFound("app".into())) }
            })
            .await;
        assert!(matches!(result, Err(BackendError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_attempts_time_out() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
            timeout_ms: 10,
        };
        let result: Result<(), _> = policy
            .run("schema", || async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(BackendError::Timeout(10)));
    }
}
