//! Core rate limiter implementation.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::counter::FixedWindow;
use super::key::{Action, RateLimitKey};
use super::rules::RateLimitRules;
use crate::config::RateLimitingConfig;
use crate::error::Result;

/// Default number of keys tracked before stale windows are swept.
pub const DEFAULT_MAX_TRACKED_KEYS: usize = 10_000;

/// Default minimum time between sweeps triggered by new keys.
pub const DEFAULT_SWEEP_INTERVAL_SECS: i64 = 60;

/// The core rate limiter that manages fixed-window counters.
///
/// This struct is thread-safe and can be shared across multiple tasks. The
/// read-modify-write of each window happens under the map's shard lock, so
/// concurrent requests on one key are never undercounted.
#[derive(Debug)]
pub struct RateLimiter {
    /// Rate limit windows indexed by key
    windows: DashMap<RateLimitKey, FixedWindow>,
    /// Per-action limits used by `check`
    rules: RateLimitRules,
    /// Sweep threshold: a new key arriving while this many are tracked
    /// triggers a sweep. Live windows are never evicted, so this is not a cap.
    max_tracked_keys: usize,
    /// Minimum time between threshold-triggered sweeps
    sweep_interval: Duration,
    last_sweep: Mutex<Option<DateTime<Utc>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with default rules.
    pub fn new() -> Self {
        Self::with_rules(RateLimitRules::default())
    }

    /// Create a new rate limiter with the given rules.
    pub fn with_rules(rules: RateLimitRules) -> Self {
        Self {
            windows: DashMap::new(),
            rules,
            max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
            sweep_interval: Duration::seconds(DEFAULT_SWEEP_INTERVAL_SECS),
            last_sweep: Mutex::new(None),
        }
    }

    /// Build a limiter from the `rate_limiting` configuration section.
    ///
    /// Fails if the rules file cannot be read or any rule is invalid.
    pub fn from_config(config: &RateLimitingConfig) -> Result<Self> {
        let rules = config.resolve_rules()?;
        debug!(create = ?rules.create, view = ?rules.view, "Rate limit rules loaded");
        Ok(Self::with_rules(rules).with_max_tracked_keys(config.max_tracked_keys))
    }

    pub fn with_max_tracked_keys(mut self, max_tracked_keys: usize) -> Self {
        self.max_tracked_keys = max_tracked_keys;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn rules(&self) -> &RateLimitRules {
        &self.rules
    }

    pub fn max_tracked_keys(&self) -> usize {
        self.max_tracked_keys
    }

    /// Count one request against `key`.
    ///
    /// Returns `true` if the request is admitted, `false` if the window
    /// already holds `max_requests`.
    pub fn allow(
        &self,
        key: &RateLimitKey,
        window: Duration,
        max_requests: u64,
        now: DateTime<Utc>,
    ) -> bool {
        trace!(key = %key, max_requests, "Checking rate limit");

        if self.windows.len() >= self.max_tracked_keys
            && !self.windows.contains_key(key)
            && self.sweep_due(now)
        {
            self.purge_expired(now);
        }

        let allowed = self
            .windows
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(key = %key, window_secs = window.num_seconds(), "Creating new rate limit window");
                FixedWindow::new(now, window)
            })
            .try_acquire(window, max_requests, now);

        if !allowed {
            debug!(key = %key, "Rate limit exceeded");
        }
        allowed
    }

    /// Count one request from `client` against the configured rule for
    /// `action`.
    pub fn check(&self, action: Action, client: &str, now: DateTime<Utc>) -> bool {
        let rule = self.rules.rule_for(action);
        let key = RateLimitKey::new(action, client);
        self.allow(&key, rule.window(), rule.requests_per_unit, now)
    }

    /// Get the count of the window current at `now` for a key.
    ///
    /// Returns `None` if no window exists for the key.
    pub fn current_count(&self, key: &RateLimitKey, now: DateTime<Utc>) -> Option<u64> {
        self.windows.get(key).map(|w| w.current_count(now))
    }

    /// Time left before the window for `key` resets.
    pub fn retry_after(&self, key: &RateLimitKey, now: DateTime<Utc>) -> Option<Duration> {
        self.windows.get(key).map(|w| w.duration_until_reset(now))
    }

    fn sweep_due(&self, now: DateTime<Utc>) -> bool {
        match *self.last_sweep.lock() {
            Some(last) => now - last >= self.sweep_interval,
            None => true,
        }
    }

    /// Drop windows whose length has fully elapsed.
    ///
    /// Returns the number of windows removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        *self.last_sweep.lock() = Some(now);
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_stale(now));
        let removed = before.saturating_sub(self.windows.len());

        if removed > 0 {
            debug!(removed, "Removed stale rate limit windows");
        }
        removed
    }

    /// Clear all windows.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Get the number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
