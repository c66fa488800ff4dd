//! Multi-producer single-consumer bounded queue.
//!
//! `crossbeam::queue::ArrayQueue` is already lock-free MPMC internally (a
//! CAS-advanced head shared across producers, single-consumer usage here is
//! just a usage discipline), so it satisfies the MPSC contract in
//! spec.md §4.1 directly: producers that find the ring full return `false`
//! rather than blocking.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;

pub struct MpscQueue<T> {
    ring: ArrayQueue<T>,
    pushed: AtomicU64,
    popped: AtomicU64,
    dropped: AtomicU64,
}

impl<T> MpscQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity > 0,
            "MpscQueue capacity must be a nonzero power of two, got {capacity}"
        );
        Self {
            ring: ArrayQueue::new(capacity),
            pushed: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Multiple producers may call this concurrently. Returns `false` when
    /// the ring is observed full — the producer's signal to apply its own
    /// backpressure policy, never a panic or block.
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

    /// Single consumer only; calling from multiple threads is safe but
    /// breaks the ordering guarantees callers usually rely on.
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

    pub fn stats(&self) -> MpscStats {
        MpscStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            depth: self.len(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MpscStats {
    pub pushed: u64,
    pub popped: u64,
    pub dropped: u64,
    pub depth: usize,
}
