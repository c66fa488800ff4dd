//! Lock-free primitives for the hot data plane.
//!
//! Wraps `crossbeam::queue::ArrayQueue` (already on the dependency graph for
//! HFT work) with the SPSC/MPSC naming and stats surface the strategy and
//! executor code expects, plus a pool-backed free list and spin helpers for
//! sub-microsecond critical sections.

pub mod mpsc;
pub mod pool;
pub mod spin;
pub mod spsc;

pub use mpsc::MpscQueue;
pub use pool::ObjectPool;
pub use spin::{AdaptiveWaiter, Backoff};
pub use spsc::SpscQueue;
