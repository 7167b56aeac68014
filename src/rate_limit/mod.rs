//! Fixed-window admission control.
//!
//! Each admission key owns one [`RateRecord`]. A request is admitted when the
//! record still has quota; the slot is reserved at admission so concurrent
//! bursts on the same key cannot overrun the limit, and handed back once the
//! response status shows the request should not count.

pub mod key;
pub mod policies;

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::clock::{self, SharedClock};

pub use key::{KeyFn, SubmittedIdentity};

/// How expired records are removed from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Scan the whole table on every request.
    EveryRequest,
    /// Leave it to a background task started by [`RateLimiter::spawn_sweeper`].
    Periodic(Duration),
}

#[derive(Clone)]
pub struct RateLimitConfig {
    pub name: &'static str,
    pub window: Duration,
    pub max_requests: u32,
    pub key_fn: KeyFn,
    /// Whether 1xx/2xx/3xx responses consume quota.
    pub count_on_success: bool,
    /// Whether 4xx/5xx responses consume quota.
    pub count_on_failure: bool,
    pub sweep: SweepMode,
}

impl RateLimitConfig {
    pub fn new(name: &'static str, window: Duration, max_requests: u32) -> Self {
        Self {
            name,
            window,
            max_requests,
            key_fn: key::by_address(),
            count_on_success: true,
            count_on_failure: true,
            sweep: SweepMode::EveryRequest,
        }
    }

    pub fn key_fn(mut self, key_fn: KeyFn) -> Self {
        self.key_fn = key_fn;
        self
    }

    pub fn skip_successful(mut self) -> Self {
        self.count_on_success = false;
        self
    }

    pub fn skip_failed(mut self) -> Self {
        self.count_on_failure = false;
        self
    }

    pub fn sweep(mut self, sweep: SweepMode) -> Self {
        self.sweep = sweep;
        self
    }

    fn window_millis(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    fn counts(&self, status: StatusCode) -> bool {
        if status.as_u16() >= 400 {
            self.count_on_failure
        } else {
            self.count_on_success
        }
    }
}

impl fmt::Debug for RateLimitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitConfig")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .field("count_on_success", &self.count_on_success)
            .field("count_on_failure", &self.count_on_failure)
            .field("sweep", &self.sweep)
            .finish_non_exhaustive()
    }
}

/// Per-key counter for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRecord {
    pub count: u32,
    /// Epoch milliseconds at which `count` goes back to zero.
    pub window_reset_at: i64,
}

impl RateRecord {
    fn fresh(now: i64, window_millis: i64) -> Self {
        Self {
            count: 0,
            window_reset_at: now.saturating_add(window_millis),
        }
    }

    fn is_expired(&self, now: i64) -> bool {
        now >= self.window_reset_at
    }
}

/// Quota view rendered into the `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: i64,
}

impl Quota {
    pub fn reset_iso8601(&self) -> String {
        clock::to_iso8601(self.reset_at)
    }
}

/// A slot held by an admitted request until its response is known.
#[derive(Debug)]
#[must_use = "a reservation must be settled with RateLimiter::settle"]
pub struct Reservation {
    key: String,
    window_reset_at: i64,
    quota: Quota,
}

impl Reservation {
    pub fn quota(&self) -> Quota {
        self.quota
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub limit: u32,
    pub reset_at: i64,
    /// Whole seconds until the window resets, rounded up.
    pub retry_after_secs: u64,
}

#[derive(Debug)]
pub enum Admission {
    Admitted(Reservation),
    Rejected(Rejection),
}

pub struct RateLimiter {
    config: RateLimitConfig,
    records: DashMap<String, RateRecord>,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, clock::system())
    }

    pub fn with_clock(config: RateLimitConfig, clock: SharedClock) -> Self {
        Self {
            config,
            records: DashMap::new(),
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn key_for(&self, req: &Request<Body>) -> String {
        (self.config.key_fn)(req)
    }

    /// Decides whether a request under `key` may proceed.
    pub fn admit(&self, key: &str) -> Admission {
        let now = self.clock.now_millis();
        if self.config.sweep == SweepMode::EveryRequest {
            self.sweep_at(now);
        }

        let window = self.config.window_millis();
        let limit = self.config.max_requests;
        let mut record = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| RateRecord::fresh(now, window));
        if record.is_expired(now) {
            *record = RateRecord::fresh(now, window);
        }

        if record.count >= limit {
            let wait_ms = record.window_reset_at.saturating_sub(now).max(0);
            return Admission::Rejected(Rejection {
                limit,
                reset_at: record.window_reset_at,
                retry_after_secs: ceil_secs(wait_ms),
            });
        }

        record.count += 1;
        Admission::Admitted(Reservation {
            key: key.to_string(),
            window_reset_at: record.window_reset_at,
            quota: Quota {
                limit,
                remaining: limit.saturating_sub(record.count),
                reset_at: record.window_reset_at,
            },
        })
    }

    /// Applies the outcome policy to a finished request and returns the quota
    /// to report. The slot is handed back when the status should not count,
    /// unless the window it was taken from has already rolled over.
    pub fn settle(&self, reservation: Reservation, status: StatusCode) -> Quota {
        let counted = self.config.counts(status);
        let limit = self.config.max_requests;

        match self.records.get_mut(&reservation.key) {
            Some(mut record) if record.window_reset_at == reservation.window_reset_at => {
                if !counted {
                    record.count = record.count.saturating_sub(1);
                }
                Quota {
                    limit,
                    remaining: limit.saturating_sub(record.count),
                    reset_at: record.window_reset_at,
                }
            }
            _ => reservation.quota,
        }
    }

    /// Current record for `key`, if one is tracked and its window is still open.
    pub fn record(&self, key: &str) -> Option<RateRecord> {
        let now = self.clock.now_millis();
        self.records
            .get(key)
            .map(|r| *r)
            .filter(|r| !r.is_expired(now))
    }

    pub fn tracked_keys(&self) -> usize {
        self.records.len()
    }

    /// Drops every record whose window has ended. Returns how many went.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_at(self.clock.now_millis())
    }

    fn sweep_at(&self, now: i64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        before.saturating_sub(self.records.len())
    }

    /// Starts the background sweeper for [`SweepMode::Periodic`]. The task
    /// ends once the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let SweepMode::Periodic(every) = self.config.sweep else {
            return None;
        };
        let weak: Weak<Self> = Arc::downgrade(self);
        let name = self.config.name;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = weak.upgrade() else {
                    tracing::debug!(policy = name, "Rate limiter dropped, stopping sweeper");
                    break;
                };
                let removed = limiter.sweep_expired();
                if removed > 0 {
                    tracing::debug!(policy = name, removed, "Swept expired rate limit records");
                }
            }
        }))
    }
}

fn ceil_secs(millis: i64) -> u64 {
    u64::try_from(millis).unwrap_or(0).div_ceil(1000)
}
