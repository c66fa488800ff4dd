//! Single-producer single-consumer bounded queue.
//!
//! `push` is wait-free on non-full, `pop` is wait-free on non-empty; both
//! return `false` (never an error) when the queue is full or empty — a
//! control signal, not a failure. Capacity must be a power of two.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;

pub struct SpscQueue<T> {
    ring: ArrayQueue<T>,
    pushed: AtomicU64,
    popped: AtomicU64,
    dropped: AtomicU64,
}

impl<T> SpscQueue<T> {
    /// Panics if `capacity` is not a power of two, per the construction
    /// invariant in spec.md §4.1.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity > 0,
            "SpscQueue capacity must be a nonzero power of two, got {capacity}"
        );
        Self {
            ring: ArrayQueue::new(capacity),
            pushed: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Returns `false` if the ring is full; the caller (a venue I/O thread)
    /// must treat that as backpressure, not an error.
    pub fn push(&self, item: T) -> bool {
        match self.ring.push(item) {
            Ok(()) => {
                self.pushed.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn pop(&self) -> Option<T> {
        let item = self.ring.pop();
        if item.is_some() {
            self.popped.fetch_add(1, Ordering::Relaxed);
        }
        item
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn stats(&self) -> SpscStats {
        SpscStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            depth: self.len(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpscStats {
    pub pushed: u64,
    pub popped: u64,
    pub dropped: u64,
    pub depth: usize,
}
