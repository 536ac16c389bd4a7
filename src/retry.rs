//! Retry Wrapper
//!
//! Runs a fallible async operation under a per-attempt timeout, retrying with
//! capped exponential backoff.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::error::{FetchError, Result};

// == Retry Policy ==
/// Per call-site retry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero behaves like one.
    pub max_retries: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Deadline for each individual attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            timeout: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after the failed attempt number `attempt` (zero-based):
    /// `min(base_delay * 2^attempt, max_delay)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        1u32.checked_shl(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

// == With Retry ==
/// Calls `op` until it succeeds or the policy's attempts are used up.
///
/// Every error is retried, timeouts included. Once attempts run out the last
/// error is returned as-is, so callers cannot tell it apart from a
/// first-attempt failure. A timed-out attempt is dropped, not cancelled at
/// its source: work it shared with other callers carries on.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0;

    loop {
        let outcome = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout(policy.timeout)),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        attempt += 1;
        if attempt >= attempts {
            return Err(err);
        }

        let delay = policy.backoff(attempt - 1);
        warn!(
            attempt,
            max_attempts = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
