//! Exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::providers::ProviderError;

/// How often, and how patiently, a failed request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further one.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (zero-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.min(20)).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy is exhausted. The last error is returned as-is.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && retry < policy.max_retries => {
                let delay = policy.delay(retry);
                warn!(
                    request = what,
                    attempt = retry + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient provider failure, retrying"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::providers::{StatusSnafu, ValidationSnafu};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
        }
    }

    #[test]
    fn delay_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay(0), Duration::from_millis(200));
        assert_eq!(p.delay(1), Duration::from_millis(400));
        assert_eq!(p.delay(3), Duration::from_millis(1600));
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(fast(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StatusSnafu {
                        status: 503u16,
                        body: "busy",
                    }
                    .build())
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let err = with_retry(fast(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(
                    StatusSnafu {
                        status: 429u16,
                        body: "slow down",
                    }
                    .build(),
                )
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 429, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn client_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let err = with_retry(fast(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(
                    ValidationSnafu {
                        message: "bad request",
                    }
                    .build(),
                )
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
