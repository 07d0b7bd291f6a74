//! Slot
//!
//! One fixed-capacity buffer of the ring, plus the state machine that
//! decides which thread flushes each generation.
//!
//! ## State Machine
//! ```text
//!              fill reaches C (non-claiming)
//!   Filling ─────────────────────────────────► Full
//!     │  ▲  │                                    │ joiner claims
//!     │  │  │ fill_join reaches C                ▼
//!     │  │  └─────────────────────────────► Flushing ──release──► Filling
//!     │  │                                                      (tag += gap)
//!     │  └──────── partial write done ───────┐
//!     │ wait deadline passed                 │
//!     └───────────────────────────────► Reserving   (tag unchanged)
//! ```
//!
//! All fields live behind the slot's own [`Notifier`], so a state check and
//! the transition it guards happen under one lock. The flusher takes the
//! buffer out of the slot while the Writer runs and hands it back through
//! [`Slot::release`]; fillers of the same generation wait meanwhile.
//!
//! A partial write releases every filler whose bytes it covered: each fill
//! hands out a [`FillTicket`] recording the partial writes claimed before
//! it, so a later partial write below the ticket's end is known to hold it.
//! Retired buffers are zeroed, so holes in a partial write read as zeros.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{Result, WalError};
use crate::notifier::Notifier;

/// Lifecycle phase of the slot's current generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    /// Accepting bytes for the current tag
    Filling,
    /// Every byte is in; waiting for a joiner to claim the flush
    Full,
    /// One thread is writing the full slot
    Flushing,
    /// One thread is writing a partial slot after its wait deadline
    Reserving,
    /// A write failed somewhere in the log; no further progress
    Poisoned,
}

/// Whether a claimed flush covers the whole slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    Full,
    Partial,
}

/// Point-in-time view of a slot, for tests and diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub tag: u64,
    pub dirty_size: usize,
    pub high_water: usize,
    pub phase: SlotPhase,
    /// Threads currently blocked in `join`
    pub waiters: usize,
}

/// The right (and obligation) to write one slot generation
///
/// Owns the slot buffer until handed back with [`Slot::release`] or
/// [`Slot::abandon`].
#[must_use = "a claimed flush must be handed back with Slot::release or Slot::abandon"]
#[derive(Debug)]
pub struct Flush {
    tag: u64,
    len: usize,
    kind: FlushKind,
    data: Vec<u8>,
}

impl Flush {
    /// Logical address of the first byte to write (the generation tag)
    pub fn address(&self) -> u64 {
        self.tag
    }

    /// Number of bytes to write
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn kind(&self) -> FlushKind {
        self.kind
    }

    /// The bytes to hand to the Writer
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// Proof of a fill, consumed by [`Slot::join`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket {
    tag: u64,
    end: usize,
    /// Partial writes claimed in this slot before the fill
    partials: u64,
}

impl FillTicket {
    /// Generation the bytes went into
    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Slot offset one past the last filled byte
    pub fn end(&self) -> usize {
        self.end
    }
}

/// Outcome of one bounded wait in `join`
enum Joined {
    /// The generation was flushed by someone else
    Released,
    /// The caller must write this flush
    Flush(Flush),
    /// Someone else is mid-write at our deadline; wait again
    Busy,
    Poisoned(WalError),
}

struct SlotState {
    /// Base address of the generation this slot currently accepts
    tag: u64,
    /// Bytes copied in for the current generation
    dirty: usize,
    /// Furthest byte offset filled this generation
    high_water: usize,
    phase: SlotPhase,
    waiters: usize,
    /// Future generations of this slot that no filler will touch
    skipped: BTreeSet<u64>,
    /// Partial writes claimed over the slot's lifetime
    partials: u64,
    /// Prefix length and claim number of the last completed partial write
    durable: (usize, u64),
    /// Slot buffer; empty while a flusher owns it
    data: Vec<u8>,
    poison: Option<String>,
}

impl SlotState {
    fn poisoned(&self) -> WalError {
        WalError::Poisoned(
            self.poison
                .clone()
                .unwrap_or_else(|| "slot poisoned".to_string()),
        )
    }

    /// `Some` once the caller may copy bytes for `tag`
    fn accepts(&self, tag: u64) -> Option<Result<()>> {
        if self.phase == SlotPhase::Poisoned {
            return Some(Err(self.poisoned()));
        }
        assert!(
            self.tag <= tag,
            "generation {} already retired (slot is at {})",
            tag,
            self.tag
        );
        (self.tag == tag && self.phase == SlotPhase::Filling).then_some(Ok(()))
    }

    /// Copy `bytes` at `offset`. Returns true if the slot is now full.
    fn copy_in(&mut self, offset: usize, bytes: &[u8], capacity: usize) -> (bool, FillTicket) {
        let end = offset + bytes.len();
        assert!(
            end <= capacity,
            "fill [{}, {}) exceeds slot capacity {}",
            offset,
            end,
            capacity
        );
        self.data[offset..end].copy_from_slice(bytes);
        self.dirty += bytes.len();
        assert!(
            self.dirty <= capacity,
            "slot overflow at tag {}: dirty {} > capacity {}",
            self.tag,
            self.dirty,
            capacity
        );
        self.high_water = self.high_water.max(end);
        let ticket = FillTicket {
            tag: self.tag,
            end,
            partials: self.partials,
        };
        (self.dirty == capacity, ticket)
    }

    fn claim(&mut self, kind: FlushKind, capacity: usize) -> Flush {
        let (len, phase) = match kind {
            FlushKind::Full => (capacity, SlotPhase::Flushing),
            FlushKind::Partial => {
                self.partials += 1;
                (self.high_water, SlotPhase::Reserving)
            }
        };
        self.phase = phase;
        Flush {
            tag: self.tag,
            len,
            kind,
            data: std::mem::take(&mut self.data),
        }
    }

    /// Whether a partial write claimed after `ticket` has completed over it
    fn covers(&self, ticket: &FillTicket) -> bool {
        let (upto, claim) = self.durable;
        claim > ticket.partials && upto >= ticket.end
    }

    /// Released, claim a full slot, or keep waiting
    fn poll_join(&mut self, ticket: &FillTicket, capacity: usize) -> Option<Joined> {
        if self.phase == SlotPhase::Poisoned {
            return Some(Joined::Poisoned(self.poisoned()));
        }
        if self.tag != ticket.tag {
            assert!(
                self.tag > ticket.tag,
                "join on generation {} before the slot reached it (slot is at {})",
                ticket.tag,
                self.tag
            );
            return Some(Joined::Released);
        }
        if self.covers(ticket) {
            return Some(Joined::Released);
        }
        if self.phase == SlotPhase::Full {
            return Some(Joined::Flush(self.claim(FlushKind::Full, capacity)));
        }
        None
    }

    /// Move to the next generation, consuming any generations skipped ahead
    fn advance(&mut self, gap: u64) {
        self.data[..self.high_water].fill(0);
        self.tag += gap;
        self.dirty = 0;
        self.high_water = 0;
        self.phase = SlotPhase::Filling;
        while self.skipped.remove(&self.tag) {
            self.tag += gap;
        }
    }

    fn poison_with(&mut self, reason: &str) {
        self.phase = SlotPhase::Poisoned;
        if self.poison.is_none() {
            self.poison = Some(reason.to_string());
        }
    }
}

/// One element of the slot ring
pub struct Slot {
    index: usize,
    capacity: usize,
    gap: u64,
    timeout: Duration,
    notifier: Notifier<SlotState>,
}

impl Slot {
    /// Create slot `index` of a ring of `ring_size` slots
    ///
    /// The first generation of slot `i` is `i * capacity`.
    pub fn new(index: usize, capacity: usize, ring_size: usize, timeout: Duration) -> Self {
        let state = SlotState {
            tag: index as u64 * capacity as u64,
            dirty: 0,
            high_water: 0,
            phase: SlotPhase::Filling,
            waiters: 0,
            skipped: BTreeSet::new(),
            partials: 0,
            durable: (0, 0),
            data: vec![0; capacity],
            poison: None,
        };

        Self {
            index,
            capacity,
            gap: capacity as u64 * ring_size as u64,
            timeout,
            notifier: Notifier::new(state),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        self.notifier.with(|s| SlotSnapshot {
            tag: s.tag,
            dirty_size: s.dirty,
            high_water: s.high_water,
            phase: s.phase,
            waiters: s.waiters,
        })
    }

    // =========================================================================
    // Ownership
    // =========================================================================

    /// Block until the slot accepts bytes for generation `tag`
    pub fn tag(&self, tag: u64) -> Result<()> {
        self.notifier.wait(|s| s.accepts(tag), |s| s.accepts(tag))
    }

    /// Non-blocking [`tag`](Self::tag): `Ok(false)` if the slot is still
    /// busy with an earlier generation
    pub fn try_tag(&self, tag: u64) -> Result<bool> {
        self.notifier
            .with(|s| s.accepts(tag).transpose().map(|accepted| accepted.is_some()))
    }

    // =========================================================================
    // Filling
    // =========================================================================

    /// Copy bytes in without joining the group
    ///
    /// If this fill completes the slot it is marked `Full` and waiters are
    /// woken so one of them claims the flush. Only waits while a partial
    /// write of this generation is in flight. Pass the ticket to
    /// [`join`](Self::join) to wait for the bytes to be written.
    pub fn fill(&self, tag: u64, offset: usize, bytes: &[u8]) -> Result<FillTicket> {
        let try_fill = |s: &mut SlotState| -> Option<Result<(bool, FillTicket)>> {
            match s.accepts(tag)? {
                Err(e) => Some(Err(e)),
                Ok(()) => {
                    let (full, ticket) = s.copy_in(offset, bytes, self.capacity);
                    if full {
                        s.phase = SlotPhase::Full;
                    }
                    Some(Ok((full, ticket)))
                }
            }
        };

        let (full, ticket) = self.notifier.wait(|s| try_fill(s), |s| try_fill(s))?;
        if full {
            self.notifier.notify_all();
        }
        Ok(ticket)
    }

    /// Copy bytes in and wait for the group to be written
    ///
    /// Returns `Some(flush)` when the caller must write the slot: either its
    /// fill completed the slot, or its wait deadline passed first (a partial
    /// flush). Returns `None` once another thread has written the bytes,
    /// either with the whole generation or in a partial write.
    pub fn fill_join(&self, tag: u64, offset: usize, bytes: &[u8]) -> Result<Option<Flush>> {
        let capacity = self.capacity;
        // Ok: this fill completed the slot; Err: wait with the ticket
        type Filled = std::result::Result<Flush, FillTicket>;
        let try_fill = |s: &mut SlotState| -> Option<Result<Filled>> {
            match s.accepts(tag)? {
                Err(e) => Some(Err(e)),
                Ok(()) => match s.copy_in(offset, bytes, capacity) {
                    (true, _) => Some(Ok(Ok(s.claim(FlushKind::Full, capacity)))),
                    (false, ticket) => Some(Ok(Err(ticket))),
                },
            }
        };

        match self.notifier.wait(|s| try_fill(s), |s| try_fill(s))? {
            Ok(flush) => {
                tracing::trace!(slot = self.index, tag, "fill completed slot, claiming flush");
                Ok(Some(flush))
            }
            Err(ticket) => self.join(ticket),
        }
    }

    /// Wait for the bytes behind `ticket` to be written
    ///
    /// Same election rules as [`fill_join`](Self::fill_join).
    pub fn join(&self, ticket: FillTicket) -> Result<Option<Flush>> {
        let capacity = self.capacity;
        let tag = ticket.tag;
        let wake = |s: &mut SlotState| {
            let joined = s.poll_join(&ticket, capacity);
            if joined.is_some() {
                s.waiters -= 1;
            }
            joined
        };

        loop {
            let joined = self.notifier.wait_timeout(
                self.timeout,
                |s| {
                    s.waiters += 1;
                    wake(s)
                },
                |s| wake(s),
                |s| {
                    s.waiters -= 1;
                    if let Some(joined) = s.poll_join(&ticket, capacity) {
                        return joined;
                    }
                    match s.phase {
                        SlotPhase::Filling => {
                            assert!(s.high_water > 0, "joined an empty generation {}", tag);
                            Joined::Flush(s.claim(FlushKind::Partial, capacity))
                        }
                        _ => Joined::Busy,
                    }
                },
            );

            match joined {
                Joined::Released => return Ok(None),
                Joined::Flush(flush) => {
                    if flush.kind() == FlushKind::Partial {
                        tracing::debug!(
                            slot = self.index,
                            tag,
                            len = flush.len(),
                            "wait deadline passed, flushing partial group"
                        );
                    }
                    return Ok(Some(flush));
                }
                Joined::Poisoned(e) => return Err(e),
                Joined::Busy => {
                    tracing::debug!(slot = self.index, tag, "slot busy at deadline, waiting again");
                }
            }
        }
    }

    // =========================================================================
    // Generation Control
    // =========================================================================

    /// Hand back a flush after the Writer succeeded
    ///
    /// A full flush retires the generation (`tag += gap`); a partial flush
    /// releases the fillers it covered and reopens the same generation for
    /// the bytes still to come. Returns
    /// `Poisoned` if the log was poisoned while the write was in flight.
    pub fn release(&self, flush: Flush) -> Result<()> {
        let gap = self.gap;
        let index = self.index;
        let result = self.notifier.with(|s| {
            assert_eq!(
                s.tag, flush.tag,
                "slot {} released generation {} while at {}",
                index, flush.tag, s.tag
            );
            s.data = flush.data;
            match (s.phase, flush.kind) {
                (SlotPhase::Poisoned, _) => Err(s.poisoned()),
                (SlotPhase::Flushing, FlushKind::Full) => {
                    s.advance(gap);
                    Ok(())
                }
                (SlotPhase::Reserving, FlushKind::Partial) => {
                    s.durable = (flush.len, s.partials);
                    s.phase = SlotPhase::Filling;
                    Ok(())
                }
                (phase, kind) => panic!(
                    "slot {} released a {:?} flush while {:?}",
                    index, kind, phase
                ),
            }
        });
        self.notifier.notify_all();
        result
    }

    /// Retire generation `tag` without any bytes passing through the slot
    ///
    /// Never blocks: if the slot has not reached `tag` yet, the skip is
    /// recorded and applied when it does.
    pub fn skip(&self, tag: u64) {
        let gap = self.gap;
        self.notifier.with(|s| {
            if s.phase == SlotPhase::Poisoned {
                return;
            }
            if s.tag == tag {
                assert!(
                    s.phase == SlotPhase::Filling && s.dirty == 0,
                    "skipped generation {} already holds {} bytes",
                    tag,
                    s.dirty
                );
                s.advance(gap);
            } else {
                assert!(tag > s.tag, "generation {} already retired", tag);
                assert!(s.skipped.insert(tag), "generation {} skipped twice", tag);
            }
        });
        self.notifier.notify_all();
    }

    // =========================================================================
    // Failure
    // =========================================================================

    /// Hand back a flush whose write failed, poisoning the slot
    pub fn abandon(&self, flush: Flush, reason: &str) {
        self.notifier.with(|s| {
            s.data = flush.data;
            s.poison_with(reason);
        });
        self.notifier.notify_all();
    }

    /// Stop all progress on this slot and wake every waiter with an error
    pub fn poison(&self, reason: &str) {
        self.notifier.with(|s| s.poison_with(reason));
        self.notifier.notify_all();
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("index", &self.index)
            .field("capacity", &self.capacity)
            .field("state", &self.snapshot())
            .finish()
    }
}
