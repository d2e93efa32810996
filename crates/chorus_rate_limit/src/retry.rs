//! Retry with exponential backoff for transient failures.

use chorus_error::Classify;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_retry2::{Retry, RetryError, strategy::jitter};
use tracing::warn;

/// Backoff parameters shared by generation retries and schedule re-enqueues.
///
/// # Examples
///
/// ```
/// use chorus_rate_limit::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.delay_for(0), Duration::from_millis(2000));
/// assert_eq!(policy.delay_for(1), Duration::from_millis(4000));
/// assert_eq!(policy.delay_for(10), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// First delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Multiplier applied per attempt
    #[serde(default = "default_factor")]
    pub factor: u64,
    /// Delay ceiling in seconds
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Attempts before a transient failure is reported
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

fn default_factor() -> u64 {
    2
}

fn default_max_delay_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            factor: default_factor(),
            max_delay_secs: default_max_delay_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl RetryPolicy {
    /// Deterministic delay before attempt number `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.factor.max(1).saturating_pow(attempt);
        let millis = self.initial_backoff_ms.saturating_mul(multiplier);
        Duration::from_millis(millis).min(self.max_delay())
    }

    /// Delay ceiling.
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    /// Returns true once `attempts` reached the ceiling.
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Run `operation`, retrying transient failures with jittered backoff.
    ///
    /// Policy and account-fatal failures are returned immediately. After
    /// `max_attempts` transient failures the last error is returned.
    pub async fn run<F, Fut, R, E>(&self, mut operation: F) -> Result<R, E>
    where
        F: FnMut() -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Result<R, E>> + Send,
        R: Send,
        E: Classify + std::fmt::Display + Send,
    {
        let delays: Vec<Duration> = (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| jitter(self.delay_for(attempt)))
            .collect();

        Retry::spawn(delays.into_iter(), || {
            let attempt = operation();
            async move {
                match attempt.await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_retryable() => {
                        warn!(error = %e, "Transient error, will retry");
                        Err(RetryError::Transient {
                            err: e,
                            retry_after: None,
                        })
                    }
                    Err(e) => {
                        warn!(error = %e, "Permanent error, failing immediately");
                        Err(RetryError::Permanent(e))
                    }
                }
            }
        })
        .await
    }
}
