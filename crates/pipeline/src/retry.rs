//! Bounded exponential-backoff retries.
//!
//! [`retry_with_backoff`] repeats an operation while it fails with a
//! transient error, sleeping between attempts with growing delays, until
//! it succeeds, fails permanently, exhausts `max_attempts`, or the
//! [`CancellationToken`] is triggered.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Sum of all sleeps if every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        let mut delay = self.initial_delay;
        let mut total = Duration::ZERO;
        for _ in 1..self.max_attempts.max(1) {
            total += delay;
            delay = next_delay(delay, self);
        }
        total
    }
}

/// Calculate the next backoff delay from the current delay and policy.
///
/// The result is clamped to [`RetryPolicy::max_delay`].
pub fn next_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    let next_ms = (current.as_millis() as f64 * policy.multiplier) as u64;
    Duration::from_millis(next_ms).min(policy.max_delay)
}

/// Why [`retry_with_backoff`] gave up.
#[derive(Debug, PartialEq)]
pub enum RetryError<E> {
    /// A non-transient error; no further attempts were made.
    Permanent { attempts: u32, error: E },
    /// Every attempt failed transiently. Carries the last cause.
    Exhausted { attempts: u32, error: E },
    /// The token fired before an attempt succeeded.
    Cancelled { attempts: u32 },
}

/// Run `op` until it succeeds or the policy gives up.
///
/// Returns the value together with the number of attempts it took.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<(T, u32), RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(operation, attempt, "Retry loop cancelled");
                return Err(RetryError::Cancelled { attempts: attempt - 1 });
            }
            result = op() => result,
        };

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "Succeeded after retry");
                }
                return Ok((value, attempt));
            }
            Err(e) => e,
        };

        if !is_transient(&error) {
            tracing::warn!(operation, attempt, error = %error, "Permanent failure, not retrying");
            return Err(RetryError::Permanent {
                attempts: attempt,
                error,
            });
        }
        if attempt >= max_attempts {
            tracing::warn!(operation, attempt, error = %error, "Retry attempts exhausted");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                error,
            });
        }

        tracing::warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, backing off",
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, policy);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 2.0,
        }
    }

    // -- next_delay --

    #[test]
    fn next_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(next_delay(Duration::from_secs(1), &policy), Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(next_delay(Duration::from_secs(8), &policy), Duration::from_secs(10));
    }

    #[test]
    fn full_backoff_sequence() {
        let policy = RetryPolicy::default();
        let mut delay = policy.initial_delay;
        let expected = [1, 2, 4, 8, 16, 30, 30];

        for &expected_secs in &expected {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &policy);
        }
    }

    #[test]
    fn total_backoff_sums_sleeps() {
        // 4 attempts sleep 1 + 2 + 4 seconds.
        assert_eq!(RetryPolicy::default().total_backoff(), Duration::from_secs(7));
        assert_eq!(instant_policy(1).total_backoff(), Duration::ZERO);
    }

    // -- retry_with_backoff --

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = retry_with_backoff(
            &instant_policy(5),
            &cancel,
            "test",
            |_: &String| true,
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("flaky".to_string())
                } else {
                    Ok(42)
                }
            },
        )
        .await;

        assert_eq!(result, Ok((42, 3)));
    }

    #[tokio::test]
    async fn stops_at_max_attempts() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<((), u32), _> = retry_with_backoff(
            &instant_policy(3),
            &cancel,
            "test",
            |_: &String| true,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            },
        )
        .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                error: "down".to_string()
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<((), u32), _> = retry_with_backoff(
            &instant_policy(5),
            &cancel,
            "test",
            |_: &String| false,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("bad format".to_string())
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Permanent { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<((), u32), RetryError<String>> = retry_with_backoff(
            &instant_policy(5),
            &cancel,
            "test",
            |_: &String| true,
            || std::future::pending(),
        )
        .await;

        assert_eq!(result, Err(RetryError::Cancelled { attempts: 0 }));
    }
}
