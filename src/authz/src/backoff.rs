//! Bounded retry with exponential backoff

use entitlements_core::{EntitlementsError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffRunner {
    /// Delay after the first failed attempt (default: 100ms)
    pub base_delay: Duration,

    /// Upper bound for any single delay (default: 10s)
    pub max_delay: Duration,

    /// Total attempts, including the first (default: 3)
    pub max_attempts: u32,
}

impl Default for BackoffRunner {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            max_attempts: 3,
        }
    }
}

impl BackoffRunner {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay to wait after failed attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `operation` until it succeeds or attempts run out
    ///
    /// Sleeps only between attempts, never after the last one. Errors that
    /// are not retryable (lifecycle, configuration, input) end the run at once.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(label, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    warn!(label, attempt, error = %e, "Attempt failed, not retryable");
                    return Err(e);
                }
                Err(e) => {
                    warn!(label, attempt, error = %e, "Attempt failed");

                    if attempt + 1 >= max_attempts {
                        return Err(EntitlementsError::RetriesExhausted {
                            label: label.to_string(),
                            attempts: max_attempts,
                            last_error: Box::new(e),
                        });
                    }

                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
