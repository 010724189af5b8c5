use crate::error::WorkflowError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff policy applied to transient failures inside a durable step.
/// Terminal errors (validation, parse, malformed responses) fail the run
/// on the first attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T, WorkflowError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, WorkflowError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let attempts = AtomicUsize::new(0);

        let result = with_retry(&fast_policy(), "embed", || async {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(WorkflowError::RateLimited {
                    backend: "openai".to_string(),
                })
            } else {
                Ok("vector")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "vector");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn terminal_errors_fail_on_first_attempt() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), _> = with_retry(&fast_policy(), "embed", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(WorkflowError::Validation("empty batch".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_stop_after_max_attempts() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), _> = with_retry(&fast_policy(), "search", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(WorkflowError::BackendUnavailable {
                backend: "qdrant".to_string(),
                details: "connection refused".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
