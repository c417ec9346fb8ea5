//! Bounded retry with exponential backoff.
//!
//! Only errors marked transient are retried; anything else propagates
//! immediately. Exhausting the attempt budget yields a terminal failure
//! carrying the last error, the attempt count, and total elapsed time.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::RetryConfig;

/// Marks error kinds that are safe to re-attempt.
///
/// The tool contract assumes idempotent retries only; an error type must
/// opt in per variant.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Retry policy for fallible asynchronous actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay_ms: config.initial_delay_ms,
            ..Default::default()
        }
    }
}

impl RetryPolicy {
    /// Calculate delay for a specific attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Terminal failure after exhausting the attempt budget
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub last_error: E,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Outcome of a retried action that did not succeed
#[derive(Debug)]
pub enum RetryError<E> {
    /// Non-transient error; surfaced on the first occurrence
    Fatal(E),

    /// Transient failures on every attempt
    Exhausted(RetryFailure<E>),
}

/// Drives an async action under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run an action, retrying transient failures with exponential backoff.
    ///
    /// The backoff sleep is cooperative; callers must not hold a session
    /// lock they expect other sessions to contend on (each session has its
    /// own lock, so one session's backoff never blocks another).
    pub async fn run<T, E, F, Fut>(&self, mut action: F) -> Result<T, RetryError<E>>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match action().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => {
                    error!(attempt, error = %e, "Non-retryable failure");
                    return Err(RetryError::Fatal(e));
                }
                Err(e) => {
                    if self.policy.should_retry(attempt) {
                        let delay = self.policy.delay_for_attempt(attempt);
                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Transient failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    error!(attempt, error = %e, "Retry budget exhausted");
                    return Err(RetryError::Exhausted(RetryFailure {
                        last_error: e,
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use thiserror::Error;

    #[derive(Debug, Error)]
    enum TestError {
        #[error("flaky")]
        Flaky,
        #[error("broken")]
        Broken,
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Flaky)
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 4,
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 10000,
            ..Default::default()
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(8000));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(10000)); // Capped
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(fast_policy(3));

        let result: Result<u32, _> = executor
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(TestError::Flaky)
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(fast_policy(3));

        let result: Result<(), _> = executor
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Broken)
            })
            .await;

        assert!(matches!(result, Err(RetryError::Fatal(TestError::Broken))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let executor = RetryExecutor::new(fast_policy(3));

        let result: Result<(), _> = executor.run(|| async { Err(TestError::Flaky) }).await;

        match result {
            Err(RetryError::Exhausted(failure)) => {
                assert_eq!(failure.attempts, 3);
            }
            other => panic!("Expected exhaustion, got {:?}", other),
        }
    }
}
