//! Fixed-window rate limiting.
//!
//! Counters are keyed by `(caller_id, bucket)` where the bucket is either the
//! operation name or [`GLOBAL_BUCKET`]. Each counter tracks the start of its
//! current window and the number of admitted calls in it. A call arriving at
//! or after `window_start + window` opens a fresh window before it is
//! evaluated, so a request exactly on the boundary counts against the new
//! window.
//!
//! Entries live in a `moka` cache. Each entry expires once it has gone
//! untouched for its own window length, which is never before its current
//! window closes. The table holds at most `max_tracked_keys` entries and
//! live entries are never evicted to make room: a new key arriving at a full
//! table is denied until expired entries free a slot.

use larder_core::{Error, Result};
use moka::Expiry;
use moka::sync::Cache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Bucket name used when limits apply across all operations.
pub const GLOBAL_BUCKET: &str = "*";

/// A maximum count per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    /// Maximum admitted calls per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl Limit {
    /// Create a limit of `max_requests` per `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// `max_requests` per minute.
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// How calls without an explicit override are bucketed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BucketScope {
    /// One counter per caller and operation.
    #[default]
    PerOperation,
    /// One counter per caller shared by every operation.
    Global,
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// When false every call is admitted.
    pub enabled: bool,
    /// Limit applied to calls without an override.
    pub limit: Limit,
    /// Bucketing for calls without an override.
    pub scope: BucketScope,
    /// Per-operation limits. An operation listed here always gets its own
    /// bucket, whatever the scope.
    pub overrides: HashMap<String, Limit>,
    /// Upper bound on tracked `(caller, bucket)` entries. New keys are
    /// denied while the table is full.
    pub max_tracked_keys: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: Limit::per_minute(60),
            scope: BucketScope::PerOperation,
            overrides: HashMap::new(),
            max_tracked_keys: 100_000,
        }
    }
}

impl RateLimitConfig {
    /// Create an enabled config with the given default limit.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            limit: Limit::new(max_requests, window),
            ..Default::default()
        }
    }

    /// Config that admits everything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the bucketing scope.
    pub fn with_scope(mut self, scope: BucketScope) -> Self {
        self.scope = scope;
        self
    }

    /// Add a per-operation limit.
    pub fn with_override(mut self, operation: impl Into<String>, limit: Limit) -> Self {
        self.overrides.insert(operation.into(), limit);
        self
    }

    /// Check that every window is non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.limit.window.is_zero() {
            return Err(Error::invalid_data("rate limit window must be non-zero"));
        }
        if let Some((op, _)) = self.overrides.iter().find(|(_, l)| l.window.is_zero()) {
            return Err(Error::invalid_data(format!(
                "rate limit window for '{op}' must be non-zero"
            )));
        }
        Ok(())
    }

    fn resolve<'a>(&'a self, operation: &'a str) -> (&'a str, Limit) {
        if let Some(limit) = self.overrides.get(operation) {
            return (operation, *limit);
        }
        match self.scope {
            BucketScope::PerOperation => (operation, self.limit),
            BucketScope::Global => (GLOBAL_BUCKET, self.limit),
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed.
    Allowed {
        /// Calls left in the current window after this one.
        remaining: u32,
    },
    /// The call must not execute.
    Denied {
        /// Time until the current window closes. Always positive.
        retry_after: Duration,
    },
}

impl Admission {
    /// Returns `true` if the call was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// One `(caller, bucket)` counter and the window length it is judged by.
#[derive(Debug)]
struct Bucket {
    window: Duration,
    state: Mutex<Window>,
}

type BucketKey = (String, String);

/// Expires a bucket after it has been idle for one full window.
struct IdleForWindow;

impl Expiry<BucketKey, Arc<Bucket>> for IdleForWindow {
    fn expire_after_create(
        &self,
        _key: &BucketKey,
        value: &Arc<Bucket>,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.window)
    }

    fn expire_after_read(
        &self,
        _key: &BucketKey,
        value: &Arc<Bucket>,
        _read_at: std::time::Instant,
        _remaining: Option<Duration>,
        _last_modified_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.window)
    }

    fn expire_after_update(
        &self,
        _key: &BucketKey,
        value: &Arc<Bucket>,
        _updated_at: std::time::Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.window)
    }
}

/// Keyed fixed-window rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Cache<BucketKey, Arc<Bucket>>,
    tracked: Arc<AtomicU64>,
}

impl RateLimiter {
    /// Create a limiter from `config`.
    pub fn new(config: RateLimitConfig) -> Self {
        let tracked = Arc::new(AtomicU64::new(0));
        let released = Arc::clone(&tracked);
        let windows = Cache::builder()
            .expire_after(IdleForWindow)
            .eviction_listener(move |_key, _value, _cause| {
                let _ = released.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    n.checked_sub(1)
                });
            })
            .build();
        Self {
            config,
            windows,
            tracked,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check and, if admitted, count one call by `caller_id` to `operation`.
    ///
    /// The check and the increment happen under the bucket's lock, so
    /// concurrent callers can never push a window past its maximum.
    pub fn admit(&self, caller_id: &str, operation: &str) -> Admission {
        if !self.config.enabled {
            return Admission::Allowed {
                remaining: self.config.limit.max_requests,
            };
        }

        let (bucket, limit) = self.config.resolve(operation);
        let key = (caller_id.to_string(), bucket.to_string());
        let entry = match self.windows.get(&key) {
            Some(entry) => entry,
            None => {
                if !self.reserve_slot() {
                    log::debug!(
                        "rate limiter full ({} keys), denying new caller '{caller_id}' on bucket '{bucket}'",
                        self.config.max_tracked_keys
                    );
                    return Admission::Denied {
                        retry_after: limit.window,
                    };
                }
                let now = Instant::now();
                let inserted = self.windows.entry(key).or_insert_with(|| {
                    Arc::new(Bucket {
                        window: limit.window,
                        state: Mutex::new(Window {
                            started: now,
                            count: 0,
                        }),
                    })
                });
                if !inserted.is_fresh() {
                    // Another thread created the bucket first.
                    self.tracked.fetch_sub(1, Ordering::AcqRel);
                }
                inserted.into_value()
            }
        };

        let mut window = entry.state.lock();
        let now = Instant::now();
        if now >= window.started + limit.window {
            window.started = now;
            window.count = 0;
        }

        if window.count < limit.max_requests {
            window.count += 1;
            Admission::Allowed {
                remaining: limit.max_requests - window.count,
            }
        } else {
            let retry_after = (window.started + limit.window).saturating_duration_since(now);
            log::debug!(
                "rate limit hit for caller '{caller_id}' on bucket '{bucket}', retry after {retry_after:?}"
            );
            Admission::Denied { retry_after }
        }
    }

    /// Claim a slot for a new key, sweeping expired entries once if the
    /// table looks full.
    fn reserve_slot(&self) -> bool {
        let max = self.config.max_tracked_keys;
        let claim = |tracked: &AtomicU64| {
            tracked
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < max).then_some(n + 1)
                })
                .is_ok()
        };
        if claim(&self.tracked) {
            return true;
        }
        self.windows.run_pending_tasks();
        claim(&self.tracked)
    }

    /// Calls counted so far in the current window for a caller and operation.
    ///
    /// Returns 0 for buckets that have never been touched or whose window has
    /// closed.
    pub fn current_count(&self, caller_id: &str, operation: &str) -> u32 {
        let (bucket, limit) = self.config.resolve(operation);
        match self
            .windows
            .get(&(caller_id.to_string(), bucket.to_string()))
        {
            Some(entry) => {
                let window = entry.state.lock();
                if Instant::now() >= window.started + limit.window {
                    0
                } else {
                    window.count
                }
            }
            None => 0,
        }
    }

    /// Number of tracked `(caller, bucket)` entries.
    pub fn tracked_keys(&self) -> u64 {
        self.windows.run_pending_tasks();
        self.tracked.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
