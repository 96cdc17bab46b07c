//! Bounded retry for API calls

use crate::buildkite::ApiError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry configuration for collaborator calls.
///
/// Injectable so tests can exercise both the exhausted-budget and the
/// immediate-abort paths without real delays.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,

    /// Fixed pause between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(1),
        }
    }
}

/// Run `op` until it succeeds, the attempt budget is exhausted, or it fails
/// with an error classified as non-retryable (see
/// [`ApiError::breaks_retry`]). Returns the last error on failure.
pub async fn retry_api<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.breaks_retry() || attempt >= policy.max_attempts.max(1) => {
                return Err(err);
            }
            Err(err) => {
                warn!(attempt, error = %err, "API call failed, retrying");
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn immediate_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            interval: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry_api(&immediate_policy(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ApiError>(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_retry_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_api(&immediate_policy(10), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(ApiError::Transport("connection reset".to_string()))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_api(&immediate_policy(4), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ApiError::Status {
                    status: 503,
                    url: "https://agent.example".to_string(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_authorization_failure_aborts_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_api(&immediate_policy(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ApiError::Status {
                    status: 401,
                    url: "https://agent.example".to_string(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
