use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rand::Rng;
use tracing::warn;

/// Timeout plus bounded retry for a single external provider call.
///
/// Each attempt is bounded by `timeout`. Between attempts the delay is
/// `base_backoff * 3^attempt` plus up to 250ms of jitter. After
/// `max_attempts` the last error is returned; a call never blocks forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_attempts: u32) -> Self {
        Self {
            timeout,
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    /// Single attempt, no backoff. Handy for fakes in tests.
    pub fn immediate(timeout: Duration) -> Self {
        Self {
            timeout,
            max_attempts: 1,
            base_backoff: Duration::ZERO,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        if self.base_backoff.is_zero() {
            return Duration::ZERO;
        }
        let jitter = Duration::from_millis(rand::rng().random_range(0..250));
        self.base_backoff * 3u32.saturating_pow(attempt) + jitter
    }

    /// Run `f` until it succeeds or attempts are exhausted.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let error = match tokio::time::timeout(self.timeout, f()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => anyhow!(
                    "{operation} timed out after {}ms",
                    self.timeout.as_millis()
                ),
            };

            if attempt + 1 < attempts {
                let backoff = self.backoff(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %format!("{error:#}"),
                    "Provider call failed, retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| anyhow!("{operation} failed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(50), max_attempts).with_base_backoff(Duration::ZERO)
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .call("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow!("transient"))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_attempts_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy(2)
            .call("broken", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("failure {n}"))
            })
            .await;
        assert_eq!(result.unwrap_err().to_string(), "failure 1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let result: Result<()> = fast_policy(1)
            .call("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let _ = fast_policy(0)
            .call("once", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
