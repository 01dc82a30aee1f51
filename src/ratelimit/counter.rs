//! Fixed-window request counter.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Time window for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// Per-second rate limiting
    Second,
    /// Per-minute rate limiting
    Minute,
    /// Per-hour rate limiting
    Hour,
    /// Per-day rate limiting
    Day,
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Second => Duration::seconds(1),
            TimeWindow::Minute => Duration::seconds(60),
            TimeWindow::Hour => Duration::seconds(3600),
            TimeWindow::Day => Duration::seconds(86400),
        }
    }
}

/// Request count for one key within the current window.
///
/// Windows are fixed, not sliding: a client may fit up to twice the limit
/// into a short span straddling a window boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWindow {
    /// When the current window started
    window_start: DateTime<Utc>,
    /// Length of a window; also how long an idle entry is kept
    length: Duration,
    /// Requests admitted in the current window
    count: u64,
}

impl FixedWindow {
    /// Create an empty window starting at `now`.
    pub fn new(now: DateTime<Utc>, length: Duration) -> Self {
        Self {
            window_start: now,
            length,
            count: 0,
        }
    }

    /// Admit one request if the window has room.
    ///
    /// Returns `true` if the request is within the limit, `false` if over
    /// limit. A rejected request does not change the window.
    pub fn try_acquire(&mut self, length: Duration, max_requests: u64, now: DateTime<Utc>) -> bool {
        self.length = length;
        self.maybe_reset_window(now);

        if self.count >= max_requests {
            return false;
        }

        self.count += 1;
        true
    }

    /// Requests counted in the window that is current at `now`.
    pub fn current_count(&self, now: DateTime<Utc>) -> u64 {
        if self.is_stale(now) {
            0
        } else {
            self.count
        }
    }

    /// Get the duration until the current window resets.
    pub fn duration_until_reset(&self, now: DateTime<Utc>) -> Duration {
        let elapsed = now - self.window_start;
        if elapsed >= self.length {
            Duration::zero()
        } else {
            self.length - elapsed
        }
    }

    /// Whether the window has run its full length and can be forgotten.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.window_start >= self.length
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    /// Reset the window if it has expired.
    fn maybe_reset_window(&mut self, now: DateTime<Utc>) {
        if self.is_stale(now) {
            self.window_start = now;
            self.count = 0;
        }
    }
}
