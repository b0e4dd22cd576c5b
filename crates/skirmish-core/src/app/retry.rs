//! Retry policy for persistence writes: bounded attempts, exponential backoff.

use std::time::Duration;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    pub multiplier: f64,

    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// 5 attempts, waiting 2s, 4s, 8s and 16s in between.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// A single attempt.
    pub fn never() -> Self {
        Self::immediate(1)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay after the `attempts`-th failure (1-indexed):
    /// `base_delay * multiplier^(attempts - 1)`, clamped to `max_delay`.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay_secs)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `op` until it succeeds or attempts run out; the last error is
    /// returned.
    pub async fn run<T, E, F, Fut>(&self, what: &str, op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(what, |_| true, op).await
    }

    /// Like [`run`](Self::run), but an error for which `retryable` is false
    /// is returned at once.
    pub async fn run_if<T, E, R, F, Fut>(
        &self,
        what: &str,
        retryable: R,
        mut op: F,
    ) -> Result<T, E>
    where
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !retryable(&e) => {
                    tracing::error!(what, attempts, error = %e, "permanent failure, not retrying");
                    return Err(e);
                }
                Err(e) if attempts >= max_attempts => {
                    tracing::error!(what, attempts, error = %e, "giving up");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.next_delay(attempts);
                    tracing::warn!(what, attempts, error = %e, retry_in = ?delay, "attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
