// Guard for outbound classifier calls.
//
// Each attempt gets a hard timeout, transient failures get a small retry
// budget, and the whole thing races the caller's cancellation token. The
// result still goes back to the service, which decides to fail open.

use super::moderation_models::ModerationError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timeout and retry budget for one external call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    /// Hard limit for a single attempt
    pub timeout: Duration,
    /// Extra attempts after the first one fails transiently
    pub max_retries: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 1,
        }
    }
}

impl ModerationError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModerationError::Api(_) | ModerationError::Timeout(_))
    }
}

/// Run `op` under `policy`, giving up early if `cancel` fires.
///
/// `call` names the collaborator in log lines.
pub async fn guarded_call<T, F, Fut>(
    policy: &CallPolicy,
    cancel: &CancellationToken,
    call: &str,
    mut op: F,
) -> Result<T, ModerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ModerationError>>,
{
    let attempts = policy.max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ModerationError::Cancelled),
            res = tokio::time::timeout(policy.timeout, op()) => res,
        };

        let error = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => ModerationError::Timeout(policy.timeout),
        };

        if attempt >= attempts || !error.is_retryable() {
            return Err(error);
        }

        tracing::warn!(call, attempt, "External call failed, retrying: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(50),
            max_retries,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = guarded_call(&fast_policy(1), &CancellationToken::new(), "test", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ModerationError>(42)
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = guarded_call(&fast_policy(1), &CancellationToken::new(), "test", || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ModerationError::Api("503".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_budget_is_exhausted() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> =
            guarded_call(&fast_policy(1), &CancellationToken::new(), "test", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ModerationError::Api("down".to_string()))
            })
            .await;

        assert!(matches!(result, Err(ModerationError::Api(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_malformed_response_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> =
            guarded_call(&fast_policy(3), &CancellationToken::new(), "test", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ModerationError::MalformedResponse("no score".to_string()))
            })
            .await;

        assert!(matches!(result, Err(ModerationError::MalformedResponse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let result: Result<(), _> =
            guarded_call(&fast_policy(0), &CancellationToken::new(), "test", || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(ModerationError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = guarded_call(&fast_policy(3), &cancel, "test", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ModerationError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
