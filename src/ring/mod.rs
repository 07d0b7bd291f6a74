//! Slot Ring Module
//!
//! Fixed array of slots that the logical address space is folded onto.
//!
//! ## Responsibilities
//! - Map an address to its slot: `(address >> capacity_bits) & (ring_size - 1)`
//! - Generation arithmetic: slot base (tag), offset, gap between generations
//! - Split a reserved range into head / aligned middle / tail portions
//! - Poison every slot when a write fails
//!
//! ## Address Folding (capacity C, ring size R = 4)
//! ```text
//!  address:  0      C      2C     3C     4C     5C   ...
//!            ├──────┼──────┼──────┼──────┼──────┼──────
//!  slot:     │  0   │  1   │  2   │  3   │  0   │  1
//!  tag:      │  0   │  C   │  2C  │  3C  │  4C  │  5C
//! ```
//! Each slot is revisited every R generations; its tag advances by the
//! gap `C × R` each time a generation is retired.

mod allocator;
mod slot;

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::utils::CachePadded;

use crate::config::Config;

pub use allocator::AddressAllocator;
pub use slot::{FillTicket, Flush, FlushKind, Slot, SlotPhase, SlotSnapshot};

/// The ring of slots
#[derive(Debug)]
pub struct SlotRing {
    slots: Box<[CachePadded<Slot>]>,
    capacity: usize,
    capacity_bits: u32,
    ring_mask: u64,
    poisoned: AtomicBool,
}

impl SlotRing {
    /// Create a ring of `ring_size` slots of `capacity` bytes each
    ///
    /// Both must be powers of two.
    pub fn new(capacity: usize, ring_size: usize, timeout: Duration) -> Self {
        assert!(capacity.is_power_of_two(), "slot capacity must be a power of two");
        assert!(ring_size.is_power_of_two(), "ring size must be a power of two");

        let slots = (0..ring_size)
            .map(|index| CachePadded::new(Slot::new(index, capacity, ring_size, timeout)))
            .collect();

        Self {
            slots,
            capacity,
            capacity_bits: capacity.trailing_zeros(),
            ring_mask: ring_size as u64 - 1,
            poisoned: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.slot_capacity, config.ring_size, config.wait_timeout())
    }

    /// Capacity of each slot in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Distance between two generations of the same slot
    pub fn gap(&self) -> u64 {
        self.capacity as u64 * self.slots.len() as u64
    }

    // =========================================================================
    // Address Arithmetic
    // =========================================================================

    /// Ring index of the slot holding `address`
    pub fn index_of(&self, address: u64) -> usize {
        ((address >> self.capacity_bits) & self.ring_mask) as usize
    }

    /// The slot holding `address`
    pub fn slot(&self, address: u64) -> &Slot {
        &self.slots[self.index_of(address)]
    }

    /// Generation tag of `address` (its slot-aligned base)
    pub fn slot_base(&self, address: u64) -> u64 {
        address & !(self.capacity as u64 - 1)
    }

    /// Offset of `address` within its slot
    pub fn slot_offset(&self, address: u64) -> usize {
        (address & (self.capacity as u64 - 1)) as usize
    }

    /// Split the range `[head, head + total)` along slot boundaries
    pub fn span(&self, head: u64, total: usize) -> RecordSpan {
        assert!(total > 0, "empty reservation at {}", head);
        let end = head + total as u64;
        RecordSpan {
            head,
            total,
            head_tag: self.slot_base(head),
            tail_tag: self.slot_base(end - 1),
            head_offset: self.slot_offset(head),
            tail_len: self.slot_offset(end),
            capacity: self.capacity,
        }
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().map(|slot| &**slot)
    }

    // =========================================================================
    // Poisoning
    // =========================================================================

    /// Poison every slot; all current and future waiters fail
    pub fn poison(&self, reason: &str) {
        if !self.poisoned.swap(true, Ordering::AcqRel) {
            tracing::error!(reason, "poisoning group commit log");
        }
        for slot in self.slots() {
            slot.poison(reason);
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }
}

/// A reserved address range split along slot boundaries
///
/// ```text
///        head_offset        middle (slot-aligned)          tail_len
///   ┌─────┬────────┬──────────────────────────────┬────────┬─────┐
///   │     │ head   │  C  │  C  │ ...              │ tail   │     │
///   └─────┴────────┴──────────────────────────────┴────────┴─────┘
///   head_tag       ▲                              tail_tag
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    /// First reserved address
    pub head: u64,
    /// Reserved length in bytes
    pub total: usize,
    /// Generation of the first byte
    pub head_tag: u64,
    /// Generation of the last byte
    pub tail_tag: u64,
    /// Offset of the first byte within its slot
    pub head_offset: usize,
    /// Bytes in the final, partially covered slot (0 if the range ends on
    /// a slot boundary)
    pub tail_len: usize,
    capacity: usize,
}

impl RecordSpan {
    /// One past the last reserved address
    pub fn end(&self) -> u64 {
        self.head + self.total as u64
    }

    pub fn is_single_slot(&self) -> bool {
        self.head_tag == self.tail_tag
    }

    /// Bytes routed through the head slot of a spanning record
    pub fn head_len(&self) -> usize {
        if self.head_offset > 0 {
            self.capacity - self.head_offset
        } else {
            0
        }
    }

    /// Slot-aligned addresses between the head and tail portions
    ///
    /// These bytes bypass the slots and are written directly.
    pub fn middle(&self) -> Range<u64> {
        let start = if self.head_offset > 0 {
            self.head_tag + self.capacity as u64
        } else {
            self.head_tag
        };
        let end = if self.tail_len > 0 {
            self.tail_tag
        } else {
            self.end()
        };
        start..end.max(start)
    }

    /// Generations covered by [`middle`](Self::middle)
    pub fn middle_generations(&self) -> impl Iterator<Item = u64> {
        self.middle().step_by(self.capacity)
    }
}
