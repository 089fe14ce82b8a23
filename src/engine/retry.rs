//! Bounded retry with exponential backoff.
//!
//! The executor is a pair of free functions with no shared state, so any
//! number of tasks may retry concurrently. Delays double after every failed
//! attempt (no jitter, no cap) and no sleep follows the final attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::warn;
use thiserror::Error;

/// How many times to try an operation and how long to wait after the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one (values below 1 are treated as 1)
    pub max_attempts: u32,

    /// Delay after the first failure; doubled after each subsequent failure
    pub initial_delay: Duration,
}

impl RetryConfig {
    /// Cancel calls: 3 attempts, waiting 4s then 8s.
    pub const CANCEL: Self = Self {
        max_attempts: 3,
        initial_delay: Duration::from_secs(4),
    };

    /// A single attempt, no retry.
    pub const ONCE: Self = Self {
        max_attempts: 1,
        initial_delay: Duration::ZERO,
    };

    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::CANCEL
    }
}

/// Every attempt failed.
#[derive(Debug, Error)]
#[error("max retry attempts exceeded after {attempts} attempts: {last_error}")]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Runs `operation` until it succeeds or `config.max_attempts` is reached,
/// sleeping on the tokio timer between attempts.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: RetryConfig,
    operation: F,
) -> Result<T, RetryExhausted<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_backoff_using(config, tokio::time::sleep, operation).await
}

/// Same as [`retry_with_backoff`] with a caller-supplied sleep.
pub async fn retry_with_backoff_using<T, E, F, Fut, S, SFut>(
    config: RetryConfig,
    mut sleep: S,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("Attempt {attempt}/{max_attempts} failed: {e}");

                if attempt >= max_attempts {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }

                sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn recording_sleep(
        log: &Arc<Mutex<Vec<Duration>>>,
    ) -> impl FnMut(Duration) -> std::future::Ready<()> {
        let log = Arc::clone(log);
        move |delay| {
            log.lock().unwrap().push(delay);
            std::future::ready(())
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt_after_two_sleeps() {
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let calls = AtomicU32::new(0);

        let result = retry_with_backoff_using(
            RetryConfig::new(3, Duration::from_secs(4)),
            recording_sleep(&sleeps),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(format!("failure {n}"))
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeps.lock().unwrap(),
            vec![Duration::from_secs(4), Duration::from_secs(8)]
        );
    }

    #[tokio::test]
    async fn test_always_failing_is_exhausted_after_max_attempts() {
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_backoff_using(
            RetryConfig::new(3, Duration::from_secs(4)),
            recording_sleep(&sleeps),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("nope") }
            },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "nope");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeps.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_immediate_success_never_sleeps() {
        let sleeps = Arc::new(Mutex::new(Vec::new()));

        let result = retry_with_backoff_using(
            RetryConfig::CANCEL,
            recording_sleep(&sleeps),
            || async { Ok::<_, String>("done") },
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert!(sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_backoff_using(
            RetryConfig::new(0, Duration::from_secs(1)),
            |_| std::future::ready(()),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("nope") }
            },
        )
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_backoff_elapses_expected_time() {
        let start = tokio::time::Instant::now();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_backoff(RetryConfig::CANCEL, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down") }
        })
        .await;

        tokio_test::assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }
}
