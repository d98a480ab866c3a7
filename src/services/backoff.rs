//! Bounded retry with exponential backoff.
//!
//! Some aggregator calls time out the first time they are made for a new
//! financial connection. Those calls are wrapped in [`BackoffPolicy::retry`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many times to try and how long to wait in between.
///
/// The first attempt runs immediately. The wait before attempt `n` (1-based,
/// `n >= 2`) is `start_delay * 2^(n-2)`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    pub start_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    /// Delay before the attempt with 0-based index `attempt`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.start_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, the error is not retryable, or attempts run out.
    ///
    /// The last error is returned unchanged once attempts are exhausted.
    pub async fn retry<T, E, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;

        loop {
            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts && is_retryable(&e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        retry_in_ms = self.delay_before(attempt + 1).as_millis() as u64,
                        "aggregator call failed, retrying: {}",
                        e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
