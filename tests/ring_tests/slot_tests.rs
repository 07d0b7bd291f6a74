//! Tests for the Slot state machine
//!
//! These tests verify:
//! - Full slots elect exactly one flusher and advance by the gap
//! - Non-claiming fills leave the flush to a joiner
//! - Wait deadlines force a partial flush that keeps the generation
//!   and releases the fillers it wrote
//! - Skips apply immediately or once the slot reaches the generation
//! - Poisoning releases every waiter with an error
//! - Overflow is a panic, not an error

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use groupwal::ring::{FlushKind, Slot, SlotPhase};
use groupwal::WalError;

// =============================================================================
// Helper Functions
// =============================================================================

const CAPACITY: usize = 64;
const RING_SIZE: usize = 2;
const GAP: u64 = (CAPACITY * RING_SIZE) as u64;

fn setup_slot(index: usize, timeout: Duration) -> Slot {
    Slot::new(index, CAPACITY, RING_SIZE, timeout)
}

fn wait_for_waiters(slot: &Slot, count: usize) {
    for _ in 0..500 {
        if slot.snapshot().waiters == count {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("slot never reached {} waiters", count);
}

// =============================================================================
// Initial State Tests
// =============================================================================

#[test]
fn test_initial_tags_are_deterministic() {
    let first = setup_slot(0, Duration::from_secs(1));
    let second = setup_slot(1, Duration::from_secs(1));

    assert_eq!(first.snapshot().tag, 0);
    assert_eq!(second.snapshot().tag, CAPACITY as u64);
    assert_eq!(first.snapshot().phase, SlotPhase::Filling);
    assert_eq!(first.snapshot().dirty_size, 0);
}

#[test]
fn test_try_tag() {
    let slot = setup_slot(1, Duration::from_secs(1));

    assert!(slot.try_tag(64).unwrap());
    // Next generation of this slot is still ahead
    assert!(!slot.try_tag(64 + GAP).unwrap());
}

// =============================================================================
// Full Flush Tests
// =============================================================================

#[test]
fn test_fill_join_completing_slot_claims_flush() {
    let slot = setup_slot(0, Duration::from_secs(5));
    slot.tag(0).unwrap();

    let flush = slot.fill_join(0, 0, &[7u8; CAPACITY]).unwrap().unwrap();
    assert_eq!(flush.address(), 0);
    assert_eq!(flush.len(), CAPACITY);
    assert_eq!(flush.kind(), FlushKind::Full);
    assert_eq!(flush.bytes(), &[7u8; CAPACITY][..]);
    assert_eq!(slot.snapshot().phase, SlotPhase::Flushing);

    slot.release(flush).unwrap();

    let snapshot = slot.snapshot();
    assert_eq!(snapshot.tag, GAP);
    assert_eq!(snapshot.phase, SlotPhase::Filling);
    assert_eq!(snapshot.dirty_size, 0);
    assert_eq!(snapshot.high_water, 0);
}

#[test]
fn test_fill_marks_full_and_join_claims() {
    let slot = setup_slot(0, Duration::from_secs(5));

    slot.fill(0, 0, &[1u8; 32]).unwrap();
    assert_eq!(slot.snapshot().phase, SlotPhase::Filling);
    let ticket = slot.fill(0, 32, &[2u8; 32]).unwrap();
    assert_eq!(slot.snapshot().phase, SlotPhase::Full);
    assert_eq!((ticket.tag(), ticket.end()), (0, 64));

    let flush = slot.join(ticket).unwrap().unwrap();
    assert_eq!(flush.kind(), FlushKind::Full);
    assert_eq!(&flush.bytes()[..32], &[1u8; 32][..]);
    assert_eq!(&flush.bytes()[32..], &[2u8; 32][..]);

    slot.release(flush).unwrap();
    assert_eq!(slot.snapshot().tag, GAP);
    assert_eq!(slot.snapshot().waiters, 0);
}

#[test]
fn test_blocked_joiner_released_by_flusher() {
    let slot = Arc::new(setup_slot(0, Duration::from_secs(10)));

    let joiner = {
        let slot = Arc::clone(&slot);
        thread::spawn(move || slot.fill_join(0, 0, &[1u8; 32]).map(|f| f.is_some()))
    };
    wait_for_waiters(&slot, 1);

    let flush = slot.fill_join(0, 32, &[2u8; 32]).unwrap().unwrap();
    assert_eq!(flush.kind(), FlushKind::Full);
    slot.release(flush).unwrap();

    let elected = joiner.join().unwrap().unwrap();
    assert!(!elected, "only the completing filler may flush");
    assert_eq!(slot.snapshot().waiters, 0);
}

#[test]
fn test_tag_blocks_until_generation_arrives() {
    let slot = Arc::new(Slot::new(0, CAPACITY, 1, Duration::from_secs(5)));

    let next = {
        let slot = Arc::clone(&slot);
        thread::spawn(move || slot.tag(CAPACITY as u64))
    };
    thread::sleep(Duration::from_millis(20));
    assert!(!next.is_finished());

    let flush = slot.fill_join(0, 0, &[0u8; CAPACITY]).unwrap().unwrap();
    slot.release(flush).unwrap();

    next.join().unwrap().unwrap();
    assert_eq!(slot.snapshot().tag, CAPACITY as u64);
}

// =============================================================================
// Partial Flush Tests
// =============================================================================

#[test]
fn test_join_deadline_claims_partial_flush() {
    let slot = setup_slot(0, Duration::from_millis(20));

    let flush = slot.fill_join(0, 0, &[7u8; 40]).unwrap().unwrap();
    assert_eq!(flush.kind(), FlushKind::Partial);
    assert_eq!(flush.address(), 0);
    assert_eq!(flush.len(), 40);
    assert_eq!(slot.snapshot().phase, SlotPhase::Reserving);

    slot.release(flush).unwrap();

    // Same generation stays open for the rest of the slot
    let snapshot = slot.snapshot();
    assert_eq!(snapshot.tag, 0);
    assert_eq!(snapshot.phase, SlotPhase::Filling);
    assert_eq!(snapshot.dirty_size, 40);

    let flush = slot.fill_join(0, 40, &[8u8; 24]).unwrap().unwrap();
    assert_eq!(flush.kind(), FlushKind::Full);
    assert_eq!(&flush.bytes()[..40], &[7u8; 40][..]);
    assert_eq!(&flush.bytes()[40..], &[8u8; 24][..]);
    slot.release(flush).unwrap();

    assert_eq!(slot.snapshot().tag, GAP);
}

#[test]
fn test_partial_flush_covers_high_water() {
    let slot = setup_slot(0, Duration::from_millis(20));

    // Bytes at [16, 32) arrive before [0, 16)
    let ticket = slot.fill(0, 16, &[3u8; 16]).unwrap();
    let flush = slot.join(ticket).unwrap().unwrap();

    assert_eq!(flush.kind(), FlushKind::Partial);
    assert_eq!(flush.len(), 32);
    assert_eq!(&flush.bytes()[16..], &[3u8; 16][..]);
    slot.release(flush).unwrap();
}

#[test]
fn test_partial_flush_releases_covered_fillers() {
    let slot = Arc::new(setup_slot(0, Duration::from_millis(200)));

    let fillers: Vec<_> = [(0usize, 1u8), (16, 2)]
        .into_iter()
        .map(|(offset, byte)| {
            let slot = Arc::clone(&slot);
            thread::spawn(move || -> groupwal::Result<usize> {
                match slot.fill_join(0, offset, &[byte; 16])? {
                    Some(flush) => {
                        let len = flush.len();
                        assert_eq!(flush.kind(), FlushKind::Partial);
                        slot.release(flush)?;
                        Ok(len)
                    }
                    None => Ok(0),
                }
            })
        })
        .collect();

    let mut written: Vec<usize> = fillers
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    written.sort();

    // One partial write of both fills; the other filler rides along
    assert_eq!(written, vec![0, 32]);
    assert_eq!(slot.snapshot().waiters, 0);
    assert_eq!(slot.snapshot().tag, 0);
}

#[test]
fn test_fill_after_partial_flush_needs_new_write() {
    let slot = setup_slot(0, Duration::from_millis(20));

    let ticket = slot.fill(0, 32, &[5u8; 16]).unwrap();
    let flush = slot.join(ticket).unwrap().unwrap();
    assert_eq!(flush.len(), 48);
    slot.release(flush).unwrap();

    // Lands below the written prefix, but after it was written
    let flush = slot.fill_join(0, 0, &[6u8; 16]).unwrap().unwrap();
    assert_eq!(flush.kind(), FlushKind::Partial);
    assert_eq!(flush.len(), 48);
    assert_eq!(&flush.bytes()[..16], &[6u8; 16][..]);
    slot.release(flush).unwrap();
}

#[test]
fn test_partial_flush_holes_are_zeroed() {
    let slot = setup_slot(0, Duration::from_millis(20));

    let flush = slot.fill_join(0, 0, &[0xAB; CAPACITY]).unwrap().unwrap();
    slot.release(flush).unwrap();

    // Next generation leaves [16, 32) unfilled
    slot.fill(GAP, 0, &[1u8; 16]).unwrap();
    let ticket = slot.fill(GAP, 32, &[2u8; 16]).unwrap();
    let flush = slot.join(ticket).unwrap().unwrap();

    assert_eq!(flush.address(), GAP);
    assert_eq!(flush.len(), 48);
    assert_eq!(&flush.bytes()[..16], &[1u8; 16][..]);
    assert!(flush.bytes()[16..32].iter().all(|&b| b == 0));
    assert_eq!(&flush.bytes()[32..], &[2u8; 16][..]);
    slot.release(flush).unwrap();
}

// =============================================================================
// Skip Tests
// =============================================================================

#[test]
fn test_skip_current_generation() {
    let slot = setup_slot(0, Duration::from_secs(1));

    slot.skip(0);

    assert_eq!(slot.snapshot().tag, GAP);
    assert!(slot.try_tag(GAP).unwrap());
}

#[test]
fn test_skip_future_generation_is_deferred() {
    let slot = setup_slot(0, Duration::from_secs(5));

    slot.skip(GAP);
    assert_eq!(slot.snapshot().tag, 0);

    let flush = slot.fill_join(0, 0, &[0u8; CAPACITY]).unwrap().unwrap();
    slot.release(flush).unwrap();

    // Generation GAP was consumed on the way past
    assert_eq!(slot.snapshot().tag, 2 * GAP);
}

#[test]
fn test_skip_unblocks_later_tag() {
    let slot = Arc::new(setup_slot(0, Duration::from_secs(5)));

    let later = {
        let slot = Arc::clone(&slot);
        thread::spawn(move || slot.tag(GAP))
    };
    thread::sleep(Duration::from_millis(20));

    slot.skip(0);
    later.join().unwrap().unwrap();
}

// =============================================================================
// Poisoning Tests
// =============================================================================

#[test]
fn test_poison_releases_joiners() {
    let slot = Arc::new(setup_slot(0, Duration::from_secs(30)));

    let joiner = {
        let slot = Arc::clone(&slot);
        thread::spawn(move || slot.fill_join(0, 0, &[1u8; 8]).map(|f| f.is_some()))
    };
    wait_for_waiters(&slot, 1);

    slot.poison("device lost");

    let result = joiner.join().unwrap();
    assert!(matches!(result, Err(WalError::Poisoned(ref reason)) if reason == "device lost"));
    assert_eq!(slot.snapshot().phase, SlotPhase::Poisoned);
}

#[test]
fn test_release_after_poison_fails() {
    let slot = setup_slot(0, Duration::from_secs(5));

    let flush = slot.fill_join(0, 0, &[0u8; CAPACITY]).unwrap().unwrap();
    slot.poison("another write failed");

    let result = slot.release(flush);
    assert!(result.unwrap_err().is_poisoned());
}

#[test]
fn test_abandon_poisons_slot() {
    let slot = setup_slot(0, Duration::from_secs(5));

    let flush = slot.fill_join(0, 0, &[0u8; CAPACITY]).unwrap().unwrap();
    slot.abandon(flush, "write failed");

    assert_eq!(slot.snapshot().phase, SlotPhase::Poisoned);
    assert!(slot.tag(0).unwrap_err().is_poisoned());
    assert!(slot.try_tag(0).is_err());
    assert!(slot.fill(0, 0, &[1]).is_err());
}

// =============================================================================
// Invariant Tests
// =============================================================================

#[test]
#[should_panic(expected = "exceeds slot capacity")]
fn test_fill_past_capacity_panics() {
    let slot = setup_slot(0, Duration::from_secs(1));
    let _ = slot.fill(0, 60, &[0u8; 8]);
}

#[test]
#[should_panic(expected = "slot overflow")]
fn test_overlapping_fills_panic() {
    let slot = setup_slot(0, Duration::from_secs(1));
    let _ = slot.fill(0, 0, &[0u8; 40]);
    let _ = slot.fill(0, 0, &[0u8; 40]);
}
