//! Fan-in from per-venue SPSC queues into the single strategy thread.
//!
//! Each venue's feed session owns the producing end of one
//! [`SpscQueue`]; the strategy thread is the sole consumer of all four. This
//! is a plain round-robin poll rather than a park/wake mechanism — the
//! strategy thread is expected to run hot, and an `AdaptiveWaiter` backs off
//! to a short sleep only when every queue comes up empty.

use std::sync::Arc;

use crate::lockfree::spin::AdaptiveWaiter;
use crate::lockfree::spsc::SpscQueue;
use crate::model::FeedEvent;
use crate::venue::{Venue, ALL_VENUES, VENUE_COUNT};

pub struct FanIn {
    queues: [Arc<SpscQueue<FeedEvent>>; VENUE_COUNT],
    next: usize,
}

impl FanIn {
    pub fn new(queues_by_index: [Arc<SpscQueue<FeedEvent>>; VENUE_COUNT]) -> Self {
        Self {
            queues: queues_by_index,
            next: 0,
        }
    }

    pub fn queue_for(&self, venue: Venue) -> &Arc<SpscQueue<FeedEvent>> {
        &self.queues[venue.index()]
    }

    /// Pops one event from the next non-empty queue in round-robin order,
    /// or `None` if all four are currently empty.
    pub fn try_next(&mut self) -> Option<FeedEvent> {
        for offset in 0..VENUE_COUNT {
            let idx = (self.next + offset) % VENUE_COUNT;
            if let Some(event) = self.queues[idx].pop() {
                self.next = (idx + 1) % VENUE_COUNT;
                return Some(event);
            }
        }
        None
    }

    /// Blocks (via spin/yield/sleep escalation, never a true OS wait) until
    /// an event is available from any venue.
    pub fn next_blocking(&mut self) -> FeedEvent {
        let mut waiter = AdaptiveWaiter::new();
        loop {
            if let Some(event) = self.try_next() {
                return event;
            }
            waiter.wait();
        }
    }

    pub fn total_depth(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }
}

/// Builds the four backing queues and a `FanIn` over them, returning the
/// producer-side handles keyed by venue for the feed sessions to push into.
pub fn build(capacity: usize) -> (FanIn, [Arc<SpscQueue<FeedEvent>>; VENUE_COUNT]) {
    let queues: [Arc<SpscQueue<FeedEvent>>; VENUE_COUNT] =
        std::array::from_fn(|_| Arc::new(SpscQueue::new(capacity)));
    let fanin = FanIn::new(queues.clone());
    (fanin, queues)
}

impl Clone for FanIn {
    fn clone(&self) -> Self {
        Self {
            queues: self.queues.clone(),
            next: self.next,
        }
    }
}
