//! Rate limiting and retry for the Chorus pipeline.
//!
//! - [`RateLimiter`]: persisted per-account, per-action sliding windows that
//!   gate every collection and publish call
//! - [`RateLimitConfig`]: budget tables loaded from bundled defaults plus
//!   user overrides
//! - [`RequestThrottle`]: RPM throttle in front of the AI backend
//! - [`RetryPolicy`]: exponential backoff for transient failures

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod limiter;
mod retry;
mod throttle;

pub use config::{ActionBudget, BackendQuota, BudgetTable, RateLimitConfig};
pub use limiter::{Acquisition, RateLimiter};
pub use retry::RetryPolicy;
pub use throttle::RequestThrottle;
