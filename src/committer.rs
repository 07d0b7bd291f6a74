//! Group Committer Module
//!
//! Orchestrates one `commit` call: reserves an address range, copies the
//! encoded record into one or two slots, elects a flusher and drives the
//! Writer.
//!
//! ## Responsibilities
//! - Encode and pad the record
//! - Reserve `[head, head + total)` from the address allocator
//! - Route the record through the head slot, the aligned middle and the
//!   tail slot
//! - Write any slot this thread was elected to flush, then release it
//! - Poison the log when a Writer call fails
//!
//! ## Concurrency Model: Self-Organizing Flushers
//!
//! There is no dedicated flusher thread. Whichever caller completes a slot
//! (or whose wait deadline passes first) writes it on behalf of every
//! record in the group, then wakes the rest. A caller holds at most one
//! slot lock at a time; head and tail slots are coordinated sequentially,
//! and the tail is only claimed early through the non-blocking `try_tag`.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::codec::RecordFormat;
use crate::config::Config;
use crate::error::{Result, WalError};
use crate::ring::{AddressAllocator, Flush, FlushKind, RecordSpan, Slot, SlotRing};
use crate::writer::Writer;

/// Running counters of a committer
#[derive(Debug, Default)]
pub struct CommitStats {
    commits: AtomicU64,
    full_flushes: AtomicU64,
    partial_flushes: AtomicU64,
    direct_writes: AtomicU64,
    bytes_written: AtomicU64,
}

/// Point-in-time copy of [`CommitStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStatsSnapshot {
    /// Successful `commit` calls
    pub commits: u64,
    /// Slots written once completely filled
    pub full_flushes: u64,
    /// Slot prefixes written after a wait deadline
    pub partial_flushes: u64,
    /// Aligned middle regions written without a slot
    pub direct_writes: u64,
    /// Bytes handed to the Writer (partial rewrites count again)
    pub bytes_written: u64,
}

impl CommitStats {
    pub fn snapshot(&self) -> CommitStatsSnapshot {
        CommitStatsSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            full_flushes: self.full_flushes.load(Ordering::Relaxed),
            partial_flushes: self.partial_flushes.load(Ordering::Relaxed),
            direct_writes: self.direct_writes.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }

    fn record_flush(&self, kind: FlushKind, len: usize) {
        let counter = match kind {
            FlushKind::Full => &self.full_flushes,
            FlushKind::Partial => &self.partial_flushes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(len as u64, Ordering::Relaxed);
    }

    fn record_direct(&self, len: usize) {
        self.direct_writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(len as u64, Ordering::Relaxed);
    }
}

/// The write-ahead group-commit log
///
/// Shared by reference (or `Arc`) between any number of committing threads.
pub struct GroupCommitter<W: Writer> {
    config: Config,
    format: RecordFormat,
    allocator: AddressAllocator,
    ring: SlotRing,
    writer: W,
    stats: CommitStats,
}

impl<W: Writer> GroupCommitter<W> {
    /// Create a committer over `writer`, starting at logical address 0
    pub fn new(config: Config, writer: W) -> Result<Self> {
        config.validate()?;

        tracing::debug!(
            slot_capacity = config.slot_capacity,
            ring_size = config.ring_size,
            min_write_size = config.min_write_size,
            wait_timeout_ms = config.wait_timeout_ms,
            "creating group committer"
        );

        Ok(Self {
            format: config.record_format(),
            allocator: AddressAllocator::new(),
            ring: SlotRing::from_config(&config),
            config,
            writer,
            stats: CommitStats::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn ring(&self) -> &SlotRing {
        &self.ring
    }

    pub fn format(&self) -> &RecordFormat {
        &self.format
    }

    /// Next logical address the allocator will hand out
    pub fn position(&self) -> u64 {
        self.allocator.position()
    }

    pub fn stats(&self) -> CommitStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_poisoned(&self) -> bool {
        self.ring.is_poisoned()
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Durably append one record; returns its logical head address
    ///
    /// Does not return `Ok` until a Writer call covering every byte of the
    /// record has succeeded.
    ///
    /// Steps:
    /// 1. Encode and pad the record
    /// 2. Reserve its address range
    /// 3. Route it through one slot, or through head / middle / tail
    pub fn commit(&self, timestamp: u64, payload: &[u8], hint: i32) -> Result<u64> {
        if self.ring.is_poisoned() {
            tracing::warn!(len = payload.len(), "commit rejected, log is poisoned");
            return Err(WalError::Poisoned(
                "log poisoned by an earlier write failure".to_string(),
            ));
        }

        // Step 1: Encode (timestamp | payload | crc | padding)
        let record = self.format.encode(timestamp, payload);
        let total = record.len();

        // Step 2: Reserve [head, head + total)
        let head = self.allocator.reserve(total as u64);
        let span = self.ring.span(head, total);

        tracing::trace!(head, total, hint, single = span.is_single_slot(), "committing record");

        // Step 3: Route through the ring
        if span.is_single_slot() {
            self.commit_single(&span, &record, hint)?;
        } else {
            self.commit_spanning(&span, &record, hint)?;
        }

        self.stats.commits.fetch_add(1, Ordering::Relaxed);
        Ok(head)
    }

    /// The whole record lands in one slot
    fn commit_single(&self, span: &RecordSpan, record: &[u8], hint: i32) -> Result<()> {
        let slot = self.ring.slot(span.head_tag);
        slot.tag(span.head_tag)?;
        let elected = slot.fill_join(span.head_tag, span.head_offset, record)?;
        self.flush_if_elected(slot, elected, hint)
    }

    /// The record crosses at least one slot boundary
    ///
    /// Steps:
    /// 1. Try to claim the tail slot early and fill it without joining
    /// 2. Write the head portion through its slot
    /// 3. Retry the tail claim if it was busy
    /// 4. Skip the middle generations and write the aligned middle directly
    /// 5. Finish the tail: join it, or claim + fill + join it now
    fn commit_spanning(&self, span: &RecordSpan, record: &[u8], hint: i32) -> Result<()> {
        let total = span.total;
        let tail_bytes = &record[total - span.tail_len..];
        let tail_slot = self.ring.slot(span.tail_tag);

        // Step 1: Early tail fill, never blocking on the tail slot
        let mut tail_ticket = None;
        if span.tail_len > 0 && tail_slot.try_tag(span.tail_tag)? {
            tail_ticket = Some(tail_slot.fill(span.tail_tag, 0, tail_bytes)?);
        }

        // Step 2: Head portion, completing the head slot
        let head_len = span.head_len();
        if head_len > 0 {
            let head_slot = self.ring.slot(span.head_tag);
            head_slot.tag(span.head_tag)?;
            let elected =
                head_slot.fill_join(span.head_tag, span.head_offset, &record[..head_len])?;
            self.flush_if_elected(head_slot, elected, hint)?;

            // Step 3: Retry the tail claim
            if span.tail_len > 0 && tail_ticket.is_none() && tail_slot.try_tag(span.tail_tag)? {
                tail_ticket = Some(tail_slot.fill(span.tail_tag, 0, tail_bytes)?);
            }
        }

        // Step 4: Aligned middle bypasses the slots
        let middle = span.middle();
        if !middle.is_empty() {
            for generation in span.middle_generations() {
                self.ring.slot(generation).skip(generation);
            }

            let start = (middle.start - span.head) as usize;
            let end = (middle.end - span.head) as usize;
            self.write_direct(&record[start..end], middle.start, hint)?;
        }

        // Step 5: Tail portion
        if span.tail_len > 0 {
            let elected = match tail_ticket {
                Some(ticket) => tail_slot.join(ticket)?,
                None => {
                    tail_slot.tag(span.tail_tag)?;
                    tail_slot.fill_join(span.tail_tag, 0, tail_bytes)?
                }
            };
            self.flush_if_elected(tail_slot, elected, hint)?;
        }

        Ok(())
    }

    // =========================================================================
    // Writing
    // =========================================================================

    fn flush_if_elected(&self, slot: &Slot, elected: Option<Flush>, hint: i32) -> Result<()> {
        match elected {
            Some(flush) => self.flush(slot, flush, hint),
            None => Ok(()),
        }
    }

    /// Write a claimed slot generation and hand it back
    fn flush(&self, slot: &Slot, flush: Flush, hint: i32) -> Result<()> {
        let address = flush.address();
        let len = flush.len();
        let kind = flush.kind();

        tracing::trace!(slot = slot.index(), address, len, ?kind, "flushing slot");

        match self.writer.write(flush.bytes(), address, hint) {
            Ok(()) => {
                self.stats.record_flush(kind, len);
                slot.release(flush)
            }
            Err(e) => {
                tracing::error!(slot = slot.index(), address, len, error = %e, "slot write failed");
                let reason = format!("write of {} bytes at {} failed: {}", len, address, e);
                slot.abandon(flush, &reason);
                self.ring.poison(&reason);
                Err(WalError::Io(e))
            }
        }
    }

    /// Write slot-aligned bytes that never pass through a slot
    fn write_direct(&self, bytes: &[u8], address: u64, hint: i32) -> Result<()> {
        tracing::trace!(address, len = bytes.len(), "writing aligned middle directly");

        match self.writer.write(bytes, address, hint) {
            Ok(()) => {
                self.stats.record_direct(bytes.len());
                Ok(())
            }
            Err(e) => {
                tracing::error!(address, len = bytes.len(), error = %e, "direct write failed");
                self.ring.poison(&format!(
                    "direct write of {} bytes at {} failed: {}",
                    bytes.len(),
                    address,
                    e
                ));
                Err(WalError::Io(e))
            }
        }
    }
}

impl<W: Writer> std::fmt::Debug for GroupCommitter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupCommitter")
            .field("config", &self.config)
            .field("position", &self.position())
            .field("poisoned", &self.is_poisoned())
            .field("stats", &self.stats())
            .finish()
    }
}
