//! Requests-per-minute throttle for the AI backend.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Per-key RPM throttle (GCRA via `governor`).
///
/// Each backend credential gets its own quota, so rotating through several
/// keys multiplies the available throughput.
///
/// # Example
///
/// ```
/// use chorus_rate_limit::RequestThrottle;
///
/// # #[tokio::main]
/// # async fn main() {
/// let throttle = RequestThrottle::per_minute(2);
/// throttle.until_ready("key-a").await;
/// assert!(throttle.check("key-a"));
/// assert!(!throttle.check("key-a"));
/// assert!(throttle.check("key-b"));
/// # }
/// ```
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Option<Arc<DefaultKeyedRateLimiter<String>>>,
}

impl RequestThrottle {
    /// Throttle allowing `rpm` requests per minute per key. Zero disables it.
    pub fn per_minute(rpm: u32) -> Self {
        let limiter = NonZeroU32::new(rpm)
            .map(|n| Arc::new(GovernorRateLimiter::keyed(Quota::per_minute(n))));
        Self { limiter }
    }

    /// A throttle that never waits.
    pub fn unlimited() -> Self {
        Self { limiter: None }
    }

    /// Wait until `key` may issue another request.
    pub async fn until_ready(&self, key: &str) {
        if let Some(limiter) = &self.limiter {
            limiter.until_key_ready(&key.to_string()).await;
        }
    }

    /// Consume one request for `key` without waiting.
    ///
    /// Returns false if the key is over quota.
    pub fn check(&self, key: &str) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check_key(&key.to_string()).is_ok(),
            None => true,
        }
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("limited", &self.limiter.is_some())
            .finish()
    }
}
