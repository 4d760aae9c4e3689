// --- File: crates/rapid_common/src/retry.rs ---
//! Shared bounded-retry helper.
//!
//! Any component that needs to retry a transient failure uses this policy
//! object instead of hand-rolling its own loop. Retries are strictly
//! sequential: the delay for attempt `n` elapses in full before attempt
//! `n + 1` starts, and a terminal failure short-circuits immediately.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial attempt).
    pub max_retries: u32,
    /// Base delay between retries. Attempt `n` (0-indexed) waits
    /// `base_delay * (n + 1)`, a linear schedule (1s, 2s, 3s for a 1s base).
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Linear-backoff policy: `max_retries` retries with delays of
    /// `base_delay`, `2 * base_delay`, `3 * base_delay`, ...
    pub fn linear(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Compute the delay before the retry following attempt number
    /// `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(attempt + 1)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    /// Two retries (three total attempts) with a one-second base delay.
    fn default() -> Self {
        Self::linear(2, Duration::from_secs(1))
    }
}

/// Result of a single attempt, used by the caller to signal retryability.
pub enum RetryAction<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed with a transient error; retry if budget remains.
    Retry(E),
    /// Operation failed terminally; never retried.
    Fail(E),
}

/// Execute an async operation with bounded, sequential retries.
///
/// The `operation` closure receives the current attempt number (0-indexed)
/// and returns a [`RetryAction`] indicating whether the result is a success,
/// a retryable failure, or a permanent failure. Permanent failures are
/// returned to the caller without consuming the retry budget.
pub async fn retry_with_policy<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = RetryAction<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            RetryAction::Success(value) => return Ok(value),
            RetryAction::Fail(err) => return Err(err),
            RetryAction::Retry(err) => {
                if attempt >= policy.max_retries {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_attempt_without_sleeping() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_policy(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { RetryAction::Success(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_consumes_no_retries() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_policy(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { RetryAction::Fail("denied".to_string()) }
        })
        .await;
        assert_eq!(result.unwrap_err(), "denied");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_then_returns_last_error() {
        let policy = RetryPolicy::linear(2, Duration::from_secs(1));
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_policy(&policy, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { RetryAction::Retry(format!("transient {attempt}")) }
        })
        .await;
        assert_eq!(result.unwrap_err(), "transient 2");
        // 1 initial attempt + 2 retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let policy = RetryPolicy::linear(3, Duration::from_secs(1));
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = retry_with_policy(&policy, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    RetryAction::Retry("flaky".to_string())
                } else {
                    RetryAction::Success("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn linear_schedule_matches_observed_delays() {
        let policy = RetryPolicy::linear(2, Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(3));
    }
}
