//! Retry policy for remote cart calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Upper bound for a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Errors that can tell whether another attempt might succeed.
pub trait Retryable {
    /// True for transient failures (timeouts, throttling, server errors).
    fn is_retryable(&self) -> bool;
}

/// How many times a failed remote call is re-attempted.
///
/// Only use it for calls that are safe to repeat: a retry after a lost
/// response re-applies the call.
///
/// The default is [`RetryPolicy::none`]: a failed remote call degrades to the
/// local snapshot immediately. Retries are always bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Make exactly one attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Retry up to `retries` extra times, doubling `backoff` after each failure.
    #[must_use]
    pub const fn new(retries: u32, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    /// Extra attempts after the first.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Delay before retry number `attempt` (1-based), capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Run `op` until it succeeds, fails permanently, or the policy is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last error once every
    /// attempt has failed.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retries && e.is_retryable() => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = label,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Remote cart call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Failure {
        message: String,
        transient: bool,
    }

    impl Failure {
        fn transient(message: impl Into<String>) -> Self {
            Self {
                message: message.into(),
                transient: true,
            }
        }
    }

    impl std::fmt::Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.message)
        }
    }

    impl Retryable for Failure {
        fn is_retryable(&self) -> bool {
            self.transient
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(40), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_none_makes_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> = RetryPolicy::none()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure::transient("down"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, Failure> = RetryPolicy::new(3, Duration::from_millis(50))
            .run("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(Failure::transient(format!("attempt {n}"))) } else { Ok(n) }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> = RetryPolicy::new(2, Duration::from_millis(10))
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure::transient("down"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> = RetryPolicy::new(3, Duration::from_millis(10))
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure {
                    message: "forbidden".to_string(),
                    transient: false,
                })
            })
            .await;

        assert_eq!(result.map_err(|e| e.message), Err("forbidden".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
