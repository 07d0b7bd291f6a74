//! Address Allocator
//!
//! Hands out non-overlapping byte ranges of the unbounded log address
//! space with a single `fetch_add`.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

/// Monotonic allocator for logical log addresses
///
/// ## Memory Ordering
/// `Relaxed` is enough: atomicity of `fetch_add` alone guarantees ranges
/// never overlap, and the bytes themselves are published through the slot
/// locks, not through this counter.
#[derive(Debug, Default)]
pub struct AddressAllocator {
    next: CachePadded<AtomicU64>,
}

impl AddressAllocator {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Start allocating at `address` instead of zero
    pub fn starting_at(address: u64) -> Self {
        Self {
            next: CachePadded::new(AtomicU64::new(address)),
        }
    }

    /// Reserve `len` bytes; returns the first address of the range
    pub fn reserve(&self, len: u64) -> u64 {
        self.next.fetch_add(len, Ordering::Relaxed)
    }

    /// First address not yet handed out
    pub fn position(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
