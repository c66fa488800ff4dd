//! Fixed-capacity object pool with heap fallback.
//!
//! An optimization, not a correctness requirement (spec.md §9): `acquire`
//! never blocks and never fails. On exhaustion of the pre-allocated slab it
//! falls back to a heap allocation and bumps `exhausted`, so the hot path
//! stays wait-free while exhaustion is still observable for dashboards.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;

/// A handle returned by `ObjectPool::acquire`. Returns the value to the pool
/// free list on drop if the pool still has room, otherwise it is simply
/// deallocated like any other `Box`.
pub struct Pooled<T> {
    value: Option<Box<T>>,
    pool: *const ObjectPool<T>,
}

// SAFETY: `Pooled<T>` only touches `pool` to push the boxed value back onto
// a lock-free queue on drop; the pointed-to pool outlives every handle it
// issued for the lifetime discipline this crate uses it under (pools are
// process-lifetime statics or `Arc`-held singletons, never dropped while
// handles are outstanding).
unsafe impl<T: Send> Send for Pooled<T> {}

impl<T> std::ops::Deref for Pooled<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.value.as_ref().expect("Pooled value taken")
    }
}

impl<T> std::ops::DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("Pooled value taken")
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            // SAFETY: the pool is guaranteed live for the handle's lifetime
            // per the invariant documented on the `Send` impl above.
            let pool = unsafe { &*self.pool };
            pool.release(value);
        }
    }
}

/// Free-list pool of pre-allocated `T` values.
pub struct ObjectPool<T> {
    free: ArrayQueue<Box<T>>,
    capacity: usize,
    exhausted: AtomicU64,
    allocated: AtomicU64,
}

impl<T: Default> ObjectPool<T> {
    pub fn new(capacity: usize) -> Self {
        let free = ArrayQueue::new(capacity.max(1));
        for _ in 0..capacity {
            let _ = free.push(Box::new(T::default()));
        }
        Self {
            free,
            capacity,
            exhausted: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
        }
    }

    /// Take a value from the free list, or heap-allocate a fresh default on
    /// exhaustion. Never returns `None`.
    pub fn acquire(self: &std::sync::Arc<Self>) -> Pooled<T> {
        self.allocated.fetch_add(1, Ordering::Relaxed);
        let value = match self.free.pop() {
            Some(v) => v,
            None => {
                self.exhausted.fetch_add(1, Ordering::Relaxed);
                Box::new(T::default())
            }
        };
        Pooled {
            value: Some(value),
            pool: std::sync::Arc::as_ptr(self),
        }
    }

    fn release(&self, mut value: Box<T>) {
        *value = T::default();
        // If the free list is full (more returns than the pool was sized
        // for, e.g. after an exhaustion episode) the box is just dropped.
        let _ = self.free.push(value);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            available: self.free.len(),
            total_acquired: self.allocated.load(Ordering::Relaxed),
            exhausted_count: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub capacity: usize,
    pub available: usize,
    pub total_acquired: u64,
    pub exhausted_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Default)]
    struct Dummy {
        value: u64,
    }

    #[test]
    fn acquire_never_fails_and_exhaustion_is_observable() {
        let pool = Arc::new(ObjectPool::<Dummy>::new(2));
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire(); // exhausts the pre-allocated slab
        assert_eq!(pool.stats().exhausted_count, 1);
        drop(a);
        drop(b);
        drop(c);
    }

    #[test]
    fn released_values_are_reset_to_default() {
        let pool = Arc::new(ObjectPool::<Dummy>::new(1));
        {
            let mut h = pool.acquire();
            h.value = 42;
        }
        let h2 = pool.acquire();
        assert_eq!(h2.value, 0);
    }
}
