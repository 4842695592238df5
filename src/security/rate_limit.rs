//! Fixed-window rate limiting.
//!
//! A window opens on the first request for a key and admits up to `limit`
//! requests until `reset_at`. The first request at or after `reset_at` opens a
//! fresh window. Bursts of up to `2 × limit` across a window boundary are
//! accepted.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::clock::Clock;
use crate::config::RateLimitRule;
use crate::http::ApiError;
use crate::observability::metrics;
use crate::security::client_ip::client_ip;

/// One key's current admission window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests admitted in this window; at least 1 while the entry exists.
    pub count: u32,
    /// Absolute expiry in milliseconds since the epoch.
    pub reset_at_ms: u64,
}

impl RateWindow {
    fn is_stale(&self, now_ms: u64) -> bool {
        now_ms >= self.reset_at_ms
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32, reset_at_ms: u64 },
    Rejected { retry_after_secs: u64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Process-wide mapping from rate-limit key to its window.
///
/// Staleness is detected lazily by the limiter; nothing expires on its own
/// unless [`RateLimitStore::purge_expired`] is called.
#[derive(Debug, Default)]
pub struct RateLimitStore {
    windows: DashMap<String, RateWindow>,
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<RateWindow> {
        self.windows.get(key).map(|w| *w.value())
    }

    pub fn set(&self, key: impl Into<String>, window: RateWindow) {
        self.windows.insert(key.into(), window);
    }

    /// Number of tracked keys, stale ones included.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drop every window that has expired at `now_ms`. Returns how many went.
    pub fn purge_expired(&self, now_ms: u64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_stale(now_ms));
        before.saturating_sub(self.windows.len())
    }
}

/// The admission controller.
pub struct RateLimiter {
    store: Arc<RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &RateLimitStore {
        &self.store
    }

    /// Admit or reject one request for `key`.
    ///
    /// The lookup and the increment happen under the key's shard lock, so
    /// concurrent callers can never both observe `count < limit` for the last
    /// free slot. Rejection leaves the store untouched.
    pub fn check_and_admit(&self, key: &str, limit: u32, window: Duration) -> Decision {
        debug_assert!(limit > 0, "rate limit must be positive");
        let now = self.clock.now_ms();
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);

        match self.store.windows.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                let fresh = RateWindow {
                    count: 1,
                    reset_at_ms: now.saturating_add(window_ms),
                };
                vacant.insert(fresh);
                Decision::Allowed {
                    remaining: limit.saturating_sub(1),
                    reset_at_ms: fresh.reset_at_ms,
                }
            }
            Entry::Occupied(mut occupied) => {
                let current = occupied.get_mut();
                if current.is_stale(now) {
                    *current = RateWindow {
                        count: 1,
                        reset_at_ms: now.saturating_add(window_ms),
                    };
                    return Decision::Allowed {
                        remaining: limit.saturating_sub(1),
                        reset_at_ms: current.reset_at_ms,
                    };
                }

                if current.count < limit {
                    current.count += 1;
                    return Decision::Allowed {
                        remaining: limit - current.count,
                        reset_at_ms: current.reset_at_ms,
                    };
                }

                Decision::Rejected {
                    retry_after_secs: (current.reset_at_ms - now).div_ceil(1000),
                }
            }
        }
    }

    /// Admit a request to a route scope, keyed by the caller's IP.
    ///
    /// Returns the remaining budget, or [`ApiError::RateLimited`] which renders
    /// as a 429 with `Retry-After`.
    pub fn admit(
        &self,
        scope: &'static str,
        rule: &RateLimitRule,
        headers: &HeaderMap,
    ) -> Result<u32, ApiError> {
        let key = format!("{}:{}", scope, client_ip(headers));
        match self.check_and_admit(&key, rule.limit, rule.window()) {
            Decision::Allowed { remaining, .. } => Ok(remaining),
            Decision::Rejected { retry_after_secs } => {
                tracing::warn!(key = %key, retry_after_secs, "Rate limit exceeded");
                metrics::record_rate_limited(scope);
                Err(ApiError::RateLimited { retry_after_secs })
            }
        }
    }

    /// Remove expired windows. Called by the background sweeper.
    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired(self.clock.now_ms())
    }
}
