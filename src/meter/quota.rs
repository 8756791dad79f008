//! Per-key quota tracking over a rolling window.
//!
//! A window starts on the first metered request for a key and resets lazily
//! on the first request after it has elapsed. There is no background timer.
//!
//! The check-and-increment sequence runs under one mutex for all keys, so
//! two concurrent requests can never both see the last free slot.

use crate::clock::{Clock, SystemClock};
use crate::QuotagateError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Smallest backoff hint handed out after the limit is hit.
pub const BACKOFF_FLOOR_MS: u64 = 1_000;

/// Largest backoff hint.
pub const BACKOFF_CEILING_MS: u64 = 60_000;

/// Quota bookkeeping for one metered key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaState {
    /// Requests admitted in the current window.
    pub count: u32,

    /// When the current window started.
    pub window_start: DateTime<Utc>,

    /// Retry pacing hint, doubled on every over-limit request.
    pub backoff_ms: u64,
}

impl QuotaState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
            backoff_ms: 0,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now - self.window_start > window
    }

    /// Start a fresh window if the current one has elapsed.
    fn roll(&mut self, now: DateTime<Utc>, window: chrono::Duration) {
        if self.is_expired(now, window) {
            *self = Self::new(now);
        }
    }

    fn bump_backoff(&mut self) {
        self.backoff_ms = self
            .backoff_ms
            .saturating_mul(2)
            .clamp(BACKOFF_FLOOR_MS, BACKOFF_CEILING_MS);
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    /// The request fits in the window and has been counted.
    Allowed {
        /// Requests admitted in this window, including this one.
        used: u32,
        /// Requests still available in this window.
        remaining: u32,
    },

    /// The window is exhausted; nothing was counted.
    Denied {
        /// First instant at which the window will reset.
        resets_at: DateTime<Utc>,
        /// Whole seconds until `resets_at` has passed.
        retry_after_secs: u64,
        /// Retry pacing hint.
        backoff_ms: u64,
    },
}

impl QuotaDecision {
    /// Whether the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed { .. })
    }
}

/// In-memory per-key quota tracker.
///
/// State starts empty at boot and lives for the life of the process.
pub struct QuotaTracker {
    states: Mutex<HashMap<String, QuotaState>>,
    window: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    /// Create a tracker on the system clock.
    pub fn new(window: Duration) -> Result<Self, QuotagateError> {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    /// Create a tracker with a custom clock.
    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Result<Self, QuotagateError> {
        if window.is_zero() {
            return Err(QuotagateError::ConfigError(
                "quota window cannot be zero".to_string(),
            ));
        }
        let window = chrono::Duration::from_std(window)
            .map_err(|e| QuotagateError::ConfigError(format!("quota window out of range: {}", e)))?;

        Ok(Self {
            states: Mutex::new(HashMap::new()),
            window,
            clock,
        })
    }

    /// Count one request for `key` against `daily_limit`.
    pub fn check(&self, key: &str, daily_limit: u32) -> QuotaDecision {
        let now = self.clock.now_utc();
        let mut states = self.states.lock();

        let state = states
            .entry(key.to_string())
            .or_insert_with(|| QuotaState::new(now));
        state.roll(now, self.window);

        if state.count >= daily_limit {
            state.bump_backoff();
            let resets_at = state
                .window_start
                .checked_add_signed(self.window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            return QuotaDecision::Denied {
                resets_at,
                retry_after_secs: seconds_until_after(now, resets_at),
                backoff_ms: state.backoff_ms,
            };
        }

        state.count += 1;
        state.backoff_ms = 0;
        QuotaDecision::Allowed {
            used: state.count,
            remaining: daily_limit - state.count,
        }
    }

    /// Current state for `key`, if it has ever been metered.
    pub fn snapshot(&self, key: &str) -> Option<QuotaState> {
        self.states.lock().get(key).cloned()
    }

    /// Drop state whose window has already elapsed.
    ///
    /// Such state would be reset on its next check anyway, so this only
    /// reclaims memory for keys that stopped calling. Returns the number of
    /// entries removed.
    pub fn prune(&self) -> usize {
        let now = self.clock.now_utc();
        let mut states = self.states.lock();
        let before = states.len();
        states.retain(|_, state| !state.is_expired(now, self.window));
        before - states.len()
    }

    /// Number of keys with tracked state.
    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    /// Whether no key has been metered yet.
    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }

    /// Window length.
    pub fn window(&self) -> chrono::Duration {
        self.window
    }
}

/// Whole seconds from `now` until strictly after `at`.
fn seconds_until_after(now: DateTime<Utc>, at: DateTime<Utc>) -> u64 {
    let millis = (at - now).num_milliseconds().max(0);
    u64::try_from(millis / 1000).unwrap_or(0) + 1
}
