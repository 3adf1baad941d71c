//! Fixed-window rate limiting shared by every form endpoint.
//!
//! Each bucket is addressed by a composite key, `"<endpoint>:<client>"`, so the
//! same client is counted independently per endpoint. Expired buckets are
//! treated as absent and swept opportunistically from inside `check`, at most
//! once per window, so the store needs no background timer.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum::http::HeaderMap;
use dashmap::DashMap;
use serde::Serialize;

/// Placeholder identity for requests without forwarding headers.
pub const UNKNOWN_CLIENT: &str = "unknown";

// Rate limit entry - tracks attempts per key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: i64, // ms since epoch
}

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_seconds: u64,
}

/// Maximum attempts per window for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub limit: u32,
    pub window: Duration,
}

impl RatePolicy {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Source of "now" in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock backed by `chrono`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Used by tests to step across windows.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now.fetch_add(by, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// In-memory fixed-window rate limiter. Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    store: DashMap<String, RateLimitEntry>,
    last_cleanup_at: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let started = clock.now_ms();
        Self {
            inner: Arc::new(RateLimiterInner {
                store: DashMap::new(),
                last_cleanup_at: AtomicI64::new(started),
                clock,
            }),
        }
    }

    /// Decides whether one more attempt for `key` fits in the current window.
    ///
    /// The first attempt (or the first after `reset_at`) opens a window of
    /// `window_ms`. Denied attempts are not counted and never move `reset_at`.
    pub fn check(&self, key: &str, limit: u32, window_ms: i64) -> RateLimitResult {
        let now = self.inner.clock.now_ms();

        // Sweep before taking the entry guard: retain locks every shard.
        self.maybe_cleanup(now, window_ms);

        let mut entry = self
            .inner
            .store
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                reset_at: now,
            });

        // absent or expired: fresh window
        if entry.reset_at <= now {
            *entry = RateLimitEntry {
                count: 1,
                reset_at: now.saturating_add(window_ms),
            };
            return RateLimitResult {
                allowed: true,
                remaining: limit.saturating_sub(1),
                retry_after_seconds: 0,
            };
        }

        if entry.count >= limit {
            let wait_ms = entry.reset_at - now;
            let retry_after_seconds = u64::try_from((wait_ms + 999) / 1000).unwrap_or(0).max(1);
            return RateLimitResult {
                allowed: false,
                remaining: 0,
                retry_after_seconds,
            };
        }

        entry.count += 1;
        RateLimitResult {
            allowed: true,
            remaining: limit.saturating_sub(entry.count),
            retry_after_seconds: 0,
        }
    }

    /// Checks `policy` for `client` on `endpoint`, keyed as `"<endpoint>:<client>"`.
    pub fn check_policy(&self, endpoint: &str, client: &str, policy: RatePolicy) -> RateLimitResult {
        let key = format!("{endpoint}:{client}");
        self.check(&key, policy.limit, policy.window_ms())
    }

    /// Number of buckets currently held, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Drops every expired bucket if more than `window_ms` passed since the last sweep.
    /// Returns the number of buckets removed.
    fn maybe_cleanup(&self, now: i64, window_ms: i64) -> usize {
        let last = self.inner.last_cleanup_at.load(Ordering::Acquire);
        if now.saturating_sub(last) <= window_ms {
            return 0;
        }

        // only the caller that wins the swap sweeps
        if self
            .inner
            .last_cleanup_at
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }

        let before = self.inner.store.len();
        self.inner.store.retain(|_, entry| entry.reset_at > now);
        let removed = before.saturating_sub(self.inner.store.len());
        if removed > 0 {
            tracing::debug!(removed, "swept expired rate-limit buckets");
        }
        removed
    }

    #[cfg(test)]
    fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.inner.store.get(key).map(|e| *e)
    }
}

/// Identifies the client behind a request from its proxy headers.
///
/// First value of `x-forwarded-for`, then `x-real-ip`, otherwise
/// [`UNKNOWN_CLIENT`]. Unidentifiable clients share one bucket.
pub fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(xff) = headers.get("x-forwarded-for")
        && let Ok(s) = xff.to_str()
        && let Some(first) = s.split(',').next()
        && !first.trim().is_empty()
    {
        return first.trim().to_string();
    }

    if let Some(real) = headers.get("x-real-ip")
        && let Ok(s) = real.to_str()
        && !s.trim().is_empty()
    {
        return s.trim().to_string();
    }

    UNKNOWN_CLIENT.to_string()
}
