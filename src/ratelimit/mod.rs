//! Per-client, per-action request rate limiting.

mod counter;
mod key;
mod limiter;
mod rules;

pub use counter::{FixedWindow, TimeWindow};
pub use key::{Action, RateLimitKey};
pub use limiter::{RateLimiter, DEFAULT_MAX_TRACKED_KEYS, DEFAULT_SWEEP_INTERVAL_SECS};
pub use rules::{RateLimitRule, RateLimitRules};
