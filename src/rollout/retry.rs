// ABOUTME: Timeouts and bounded exponential backoff for backend calls.
// ABOUTME: Every external call goes through with_timeout; cleanup paths also retry.

use std::future::Future;
use std::time::Duration;

use crate::backend::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub call_timeout: Duration,
    /// Failures tolerated before giving up; the next one is fatal.
    pub retry_budget: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            retry_budget: 4,
            backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failures`-th consecutive failure: backoff * 2^(n-1), capped.
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Whether another failure may still be retried.
    pub fn exhausted(&self, failures: u32) -> bool {
        failures > self.retry_budget
    }
}

/// Run a backend call, turning an elapsed timeout into `BackendError::Timeout`.
pub async fn with_timeout<T, F>(
    timeout: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout { operation, timeout }),
    }
}

/// Retry a call inline until it succeeds or the budget is spent.
pub async fn retry_call<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut failures = 0;
    loop {
        match with_timeout(policy.call_timeout, operation, call()).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                failures += 1;
                if policy.exhausted(failures) {
                    return Err(e);
                }
                let delay = policy.delay(failures);
                tracing::warn!(
                    operation,
                    attempt = failures,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "backend call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
