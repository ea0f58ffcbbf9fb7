//! # Retry with Backoff
//!
//! Exponential backoff between attempts of a fallible async unit of work.
//! The delay before attempt `k + 1` is `min(max_delay, initial_delay *
//! multiplier^(k - 1))` for `k >= 1`, optionally jittered upwards and then
//! capped again. Errors the caller classifies as non-retryable abort at once;
//! exhausting the attempt budget returns the last error.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first try
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Cap applied after multiplication and after jitter
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter_enabled: bool,
    /// Maximum jitter percentage (0.0 to 1.0)
    pub max_jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_enabled: true,
            max_jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter_enabled: false,
            max_jitter: 0.0,
        }
    }

    /// Deterministic backoff (jitter disabled), mostly for tests
    pub fn fixed(max_attempts: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(300),
            multiplier,
            jitter_enabled: false,
            max_jitter: 0.0,
        }
    }

    /// Un-jittered delay after `failed_attempts` failures (1-indexed)
    pub fn base_delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1) as i32;
        let delay_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()).max(0.0))
    }

    /// Delay to sleep after `failed_attempts` failures, jitter included
    pub fn delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        let base = self.base_delay_for_attempt(failed_attempts);
        if !self.jitter_enabled || self.max_jitter <= 0.0 || base.is_zero() {
            return base;
        }
        self.apply_jitter(base)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        use rand::Rng;

        let jitter_fraction = rand::thread_rng().gen_range(0.0..=self.max_jitter);
        delay
            .mul_f64(1.0 + jitter_fraction)
            .min(self.max_delay)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err("multiplier must be a finite value >= 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.max_jitter) {
            return Err("max_jitter must be between 0.0 and 1.0".to_string());
        }
        if self.initial_delay > self.max_delay {
            return Err("initial_delay must not exceed max_delay".to_string());
        }
        Ok(())
    }
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or the attempt budget is spent.
///
/// `operation` receives the 1-indexed attempt number. No lock is held while
/// sleeping between attempts.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Debug,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "🔁 Succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if !should_retry(&error) => {
                debug!(
                    operation = operation_name,
                    attempt,
                    error = ?error,
                    "Non-retryable error, aborting"
                );
                return Err(error);
            }
            Err(error) if attempt >= max_attempts => {
                warn!(
                    operation = operation_name,
                    attempts = attempt,
                    error = ?error,
                    "Retry attempts exhausted"
                );
                return Err(error);
            }
            Err(error) => {
                let delay = policy.delay_for_attempt(attempt);
                debug!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = ?error,
                    "🔁 Retryable error, backing off"
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

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
    }

    #[test]
    fn test_exponential_delay_with_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
            jitter_enabled: false,
            max_jitter: 0.0,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(20), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(60),
            ..RetryPolicy::default()
        };
        for _ in 0..100 {
            let delay = policy.delay_for_attempt(2);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(220));
        }
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        }
        .validate()
        .is_err());
        assert!(RetryPolicy {
            max_jitter: 1.5,
            ..RetryPolicy::default()
        }
        .validate()
        .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::from_millis(100), 2.0);

        let started = tokio::time::Instant::now();
        let result = retry_with_backoff(
            &policy,
            "flaky",
            |e: &TestError| *e == TestError::Transient,
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(TestError::Transient)
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_aborts_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(5, Duration::from_millis(100), 2.0);

        let result: Result<(), _> = retry_with_backoff(
            &policy,
            "fatal",
            |e: &TestError| *e == TestError::Transient,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Fatal) }
            },
        )
        .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::from_millis(10), 1.0);

        let result: Result<(), _> = retry_with_backoff(
            &policy,
            "always_down",
            |_: &TestError| true,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            },
        )
        .await;

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
