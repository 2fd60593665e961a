//! Bounded retry with linearly increasing backoff.

use std::fmt::Display;
use std::time::Duration;

/// How many times to try an operation and how long to wait in between.
///
/// The wait before attempt `n + 1` is `backoff * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Never below 1.
    pub attempts: u32,
    /// Base delay, multiplied by the number of failed attempts so far.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy, clamping `attempts` to at least one.
    #[must_use]
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts: attempts.max(1), backoff }
    }

    /// A policy that tries exactly once.
    #[must_use]
    pub const fn once() -> Self { Self { attempts: 1, backoff: Duration::ZERO } }

    /// Delay to wait after `failed` attempts have failed.
    #[must_use]
    pub fn delay_after(&self, failed: u32) -> Duration { self.backoff.saturating_mul(failed) }

    /// Runs `op` until it succeeds or the attempts are exhausted.
    ///
    /// Every failure but the last is logged at `warn` with `what` as context.
    /// The last error is returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns the error of the final attempt.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut failed = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    failed += 1;
                    if failed >= self.attempts {
                        return Err(err);
                    }

                    let delay = self.delay_after(failed);
                    tracing::warn!(
                        error = %err,
                        attempt = failed,
                        of = self.attempts,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "{what} failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::constants::retry::ATTEMPTS,
            Duration::from_millis(crate::constants::retry::BACKOFF_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn new_clamps_attempts_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(50));

        let counter = Arc::clone(&calls);
        let result: Result<u32, String> = policy
            .run("flaky op", || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 { Err(format!("failure {n}")) } else { Ok(n) }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_all_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(2, Duration::from_millis(50));

        let counter = Arc::clone(&calls);
        let result: Result<(), String> = policy
            .run("doomed op", || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("nope".to_string())
                }
            })
            .await;

        assert_eq!(result, Err("nope".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn once_does_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = RetryPolicy::once()
            .run("single shot", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("failed") }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
