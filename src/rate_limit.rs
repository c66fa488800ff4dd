//! Token bucket rate limiting, per (venue, API class).
//!
//! Acquisition is non-blocking (`try_acquire`) for the hot path and blocking
//! (`acquire`) for occasional calls. Refill uses a monotonic clock and
//! accumulates fractional tokens in a single atomic so the hot path never
//! takes a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use quanta::Clock;

use crate::error::CoreError;
use crate::venue::Venue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiClass {
    Order,
    Query,
}

/// Token bucket storing `tokens * SCALE` as a single u64 so refill and
/// acquisition are lock-free compare-and-swap loops.
pub struct TokenBucket {
    rate_per_sec: f64,
    burst: f64,
    clock: Clock,
    start: quanta::Instant,
    tokens_scaled: AtomicU64,
    last_refill_ns: AtomicU64,
}

const SCALE: f64 = 1_000_000.0;

impl TokenBucket {
    pub fn new(rate_per_sec: f64, burst: f64) -> Self {
        let clock = Clock::new();
        let start = clock.now();
        Self {
            rate_per_sec,
            burst,
            clock,
            start,
            tokens_scaled: AtomicU64::new((burst * SCALE) as u64),
            last_refill_ns: AtomicU64::new(0),
        }
    }

    fn refill(&self) {
        let now_ns = self.clock.now().duration_since(self.start).as_nanos() as u64;
        let last = self.last_refill_ns.load(Ordering::Relaxed);
        if now_ns <= last {
            return;
        }
        let elapsed_secs = (now_ns - last) as f64 / 1_000_000_000.0;
        let refill_amount = elapsed_secs * self.rate_per_sec * SCALE;
        if refill_amount < 1.0 {
            return;
        }
        if self
            .last_refill_ns
            .compare_exchange(last, now_ns, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return; // another thread is refilling concurrently; fine to skip.
        }
        let cap = (self.burst * SCALE) as u64;
        self.tokens_scaled
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |t| {
                Some((t + refill_amount as u64).min(cap))
            })
            .ok();
    }

    /// Non-blocking: never sleeps, returns `false` immediately if a token
    /// isn't available. This is the hot-path entry point — the data plane
    /// never silently delays.
    pub fn try_acquire(&self) -> bool {
        self.refill();
        let need = SCALE as u64;
        self.tokens_scaled
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |t| {
                if t >= need {
                    Some(t - need)
                } else {
                    None
                }
            })
            .is_ok()
    }

    /// Blocking acquire for occasional (non-hot-path) calls.
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub fn available(&self) -> f64 {
        self.refill();
        self.tokens_scaled.load(Ordering::Relaxed) as f64 / SCALE
    }
}

/// Registry of one `TokenBucket` per (venue, API class).
pub struct RateLimiterRegistry {
    buckets: Mutex<std::collections::HashMap<(Venue, ApiClass), TokenBucket>>,
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Configure empirical limits per venue (spec.md §4.7: Upbit 8/s order,
    /// Binance 1200/min, etc).
    pub fn configure(&self, venue: Venue, class: ApiClass, rate_per_sec: f64, burst: f64) {
        self.buckets
            .lock()
            .unwrap()
            .insert((venue, class), TokenBucket::new(rate_per_sec, burst));
    }

    pub fn try_acquire(&self, venue: Venue, class: ApiClass) -> Result<(), CoreError> {
        let buckets = self.buckets.lock().unwrap();
        match buckets.get(&(venue, class)) {
            Some(bucket) if bucket.try_acquire() => Ok(()),
            Some(_) => Err(CoreError::rate_limited(format!(
                "{venue} {class:?} rate limit exceeded"
            ))),
            None => Ok(()), // unconfigured bucket: no limit enforced
        }
    }

    pub fn default_for_venues() -> Self {
        let reg = Self::new();
        reg.configure(Venue::Upbit, ApiClass::Order, 8.0, 8.0);
        reg.configure(Venue::Upbit, ApiClass::Query, 30.0, 30.0);
        reg.configure(Venue::Bithumb, ApiClass::Order, 10.0, 10.0);
        reg.configure(Venue::Bithumb, ApiClass::Query, 30.0, 30.0);
        reg.configure(Venue::Binance, ApiClass::Order, 20.0, 50.0);
        reg.configure(Venue::Binance, ApiClass::Query, 1200.0 / 60.0, 100.0);
        reg.configure(Venue::Mexc, ApiClass::Order, 20.0, 50.0);
        reg.configure(Venue::Mexc, ApiClass::Query, 1200.0 / 60.0, 100.0);
        reg
    }
}
