//! Bounded retry with exponential back-off for transient provider failures.
//!
//! The decision to retry is made solely from [`LlmError::retry_policy`]:
//! rate limiting, connection failures, and timeouts are retried, anything else
//! is returned on first occurrence.

use std::future::Future;
use std::time::Duration;

use pipeline::{LlmError, RetryPolicy};
use tracing::{debug, error, warn};

/// Attempt cap and back-off bounds shared by every provider call.
///
/// The wait before attempt `n + 1` is `multiplier * 2^(n - 1)`, raised to any
/// provider-supplied `Retry-After` hint, then clamped to
/// `[min_delay, max_delay]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base of the exponential schedule.
    pub multiplier: Duration,
    /// Lower bound on any wait.
    pub min_delay: Duration,
    /// Upper bound on any wait.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    /// 3 attempts, waits growing from 4s, capped at 10s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: Duration::from_secs(1),
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let exponential = self.multiplier.saturating_mul(factor);
        let wanted = hint.map_or(exponential, |h| exponential.max(h));
        wanted.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }
}

/// Runs `call` until it succeeds, fails with a non-transient error, or
/// `policy.max_attempts` is reached.
///
/// The error returned after exhaustion is the last one produced by `call`,
/// unchanged.
pub async fn with_retry<T, F, Fut>(
    policy: &BackoffPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "provider call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                let RetryPolicy::Retryable { after } = err.retry_policy() else {
                    debug!(operation, attempt, error = %err, "non-retryable provider failure");
                    return Err(err);
                };
                if attempt >= max_attempts {
                    error!(operation, attempts = attempt, error = %err, "provider call failed, retries exhausted");
                    return Err(err);
                }

                let delay = policy.delay_for(attempt, after);
                warn!(
                    operation,
                    attempt,
                    ?delay,
                    error = %err,
                    "transient provider failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
