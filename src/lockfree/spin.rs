//! Spin primitives: a TTAS spinlock, an adaptive spin/yield/sleep waiter,
//! and an exponential backoff helper. Used only where hold times are known
//! to be sub-microsecond — matrix updates and queue fallback paths — never
//! around a network call.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Test-and-test-and-set spinlock. Spins on a relaxed load before attempting
/// the CAS, so contended waiters don't hammer the cache line with RFOs.
pub struct TtasSpinlock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for TtasSpinlock<T> {}
unsafe impl<T: Send> Sync for TtasSpinlock<T> {}

pub struct TtasGuard<'a, T> {
    lock: &'a TtasSpinlock<T>,
}

impl<T> TtasSpinlock<T> {
    pub fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    pub fn lock(&self) -> TtasGuard<'_, T> {
        loop {
            // Test: cheap relaxed read, avoids the exclusive cache line
            // request a failed CAS would cause under contention.
            while self.locked.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
            // Test-and-set: the actual acquisition attempt.
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return TtasGuard { lock: self };
            }
        }
    }

    pub fn try_lock(&self) -> Option<TtasGuard<'_, T>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(TtasGuard { lock: self })
        } else {
            None
        }
    }
}

impl<T> Deref for TtasGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for TtasGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for TtasGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// Spin -> yield -> short sleep, escalating based on how long a waiter has
/// already been waiting. Used by waiters that can't busy-spin forever
/// (e.g. a producer backed off behind a temporarily full ring).
pub struct AdaptiveWaiter {
    attempts: u32,
}

impl Default for AdaptiveWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveWaiter {
    const SPIN_THRESHOLD: u32 = 100;
    const YIELD_THRESHOLD: u32 = 1_000;

    pub fn new() -> Self {
        Self { attempts: 0 }
    }

    /// Call once per failed attempt; escalates spin -> yield -> sleep.
    pub fn wait(&mut self) {
        self.attempts += 1;
        if self.attempts < Self::SPIN_THRESHOLD {
            std::hint::spin_loop();
        } else if self.attempts < Self::YIELD_THRESHOLD {
            std::thread::yield_now();
        } else {
            std::thread::sleep(Duration::from_micros(50));
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Exponential backoff with a hard cap, used by session reconnect loops.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    multiplier: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            base,
            max,
            multiplier,
            attempt: 0,
        }
    }

    /// Duration for the current attempt, then advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let factor = self.multiplier.powi(self.attempt as i32);
        let ms = (self.base.as_millis() as f64 * factor).min(self.max.as_millis() as f64);
        self.attempt += 1;
        Duration::from_millis(ms as u64)
    }

    /// Reset on a successful Connected transition, per spec.md §4.2.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttas_spinlock_mutual_exclusion() {
        use std::sync::Arc;
        let lock = Arc::new(TtasSpinlock::new(0u64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    let mut guard = lock.lock();
                    *guard += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.lock(), 8000);
    }

    #[test]
    fn backoff_doubles_and_caps_and_resets() {
        let mut b = Backoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0);
        assert_eq!(b.next_delay(), Duration::from_secs(1));
        assert_eq!(b.next_delay(), Duration::from_secs(2));
        assert_eq!(b.next_delay(), Duration::from_secs(4));
        b.reset();
        assert_eq!(b.attempt(), 0);
        assert_eq!(b.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn backoff_caps_at_max() {
        let mut b = Backoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0);
        for _ in 0..10 {
            b.next_delay();
        }
        assert_eq!(b.next_delay(), Duration::from_secs(60));
    }
}
