//! Exponential backoff with jitter for backend calls.

use crate::{Result, SenvarError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy applied to every backend call.
///
/// The delay after the failure of attempt `n` (zero-based) is
/// `min(base_delay * 2^n + random(0, base_delay), max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of invocations, including the first one.
    pub attempts: u32,
    /// Base delay, doubled after each failure.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2_000),
        }
    }
}

impl RetryPolicy {
    /// A policy that invokes the operation exactly once.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Sets the total number of attempts, including the first call.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the delay before the first retry. It doubles on every retry
    /// and also bounds the random jitter.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the upper bound on any single delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Computes the delay after a failed attempt for a given jitter.
    pub fn delay_for_attempt(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let exponential = self.base_delay.saturating_mul(factor);
        exponential.saturating_add(jitter).min(self.max_delay)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let jitter = if base_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=base_ms))
        };
        self.delay_for_attempt(attempt, jitter)
    }

    /// Invokes `operation` until it succeeds or the attempt cap is reached.
    ///
    /// Every failure is retried. The error of the final attempt is returned.
    ///
    /// # Example
    ///
    /// ```
    /// use senvar::retry::RetryPolicy;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> senvar::Result<()> {
    /// let value = RetryPolicy::none()
    ///     .retry("demo", || async { Ok::<_, senvar::SenvarError>(42) })
    ///     .await?;
    /// assert_eq!(value, 42);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn retry<T, F, Fut>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retry_if(operation, f, |_| true).await
    }

    /// Like [`retry`](Self::retry), but stops at the first error for which
    /// `should_retry` returns false.
    pub async fn retry_if<T, F, Fut, P>(
        &self,
        operation: &str,
        mut f: F,
        should_retry: P,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&SenvarError) -> bool,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;

        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt + 1 < attempts && should_retry(&err) => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
