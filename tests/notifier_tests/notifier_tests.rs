//! Tests for the Notifier
//!
//! These tests verify:
//! - A satisfied precondition returns without waiting
//! - Waiters are released by state changes plus notify_all
//! - Deadlines run the timeout action, and a release beats the deadline

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use groupwal::notifier::Notifier;

// =============================================================================
// Immediate Release Tests
// =============================================================================

#[test]
fn test_wait_pre_releases_immediately() {
    let notifier = Notifier::new(5u32);

    let result = notifier.wait(|n| (*n == 5).then_some("ready"), |_| None);

    assert_eq!(result, "ready");
}

#[test]
fn test_with_mutates_state() {
    let notifier = Notifier::new(Vec::<u32>::new());

    notifier.with(|v| v.push(1));
    notifier.with(|v| v.push(2));

    assert_eq!(notifier.with(|v| v.clone()), vec![1, 2]);
}

#[test]
fn test_wait_timeout_pre_skips_deadline() {
    let notifier = Notifier::new(true);
    let start = Instant::now();

    let result = notifier.wait_timeout(
        Duration::from_secs(5),
        |ready| ready.then_some(1),
        |_| None,
        |_| 2,
    );

    assert_eq!(result, 1);
    assert!(start.elapsed() < Duration::from_secs(1));
}

// =============================================================================
// Wakeup Tests
// =============================================================================

#[test]
fn test_wait_released_by_notify() {
    let notifier = Arc::new(Notifier::new(0u64));

    let waiter = {
        let notifier = Arc::clone(&notifier);
        thread::spawn(move || notifier.wait(|n| (*n > 0).then_some(*n), |n| (*n > 0).then_some(*n)))
    };

    thread::sleep(Duration::from_millis(20));
    notifier.with(|n| *n = 42);
    notifier.notify_all();

    assert_eq!(waiter.join().unwrap(), 42);
}

#[test]
fn test_notify_all_wakes_every_waiter() {
    let notifier = Arc::new(Notifier::new(false));

    let waiters: Vec<_> = (0..4)
        .map(|i| {
            let notifier = Arc::clone(&notifier);
            thread::spawn(move || notifier.wait(|go| go.then_some(i), |go| go.then_some(i)))
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    notifier.with(|go| *go = true);
    notifier.notify_all();

    let mut released: Vec<_> = waiters.into_iter().map(|h| h.join().unwrap()).collect();
    released.sort();
    assert_eq!(released, vec![0, 1, 2, 3]);
}

#[test]
fn test_wake_without_state_change_keeps_waiting() {
    let notifier = Arc::new(Notifier::new(0u32));

    let waiter = {
        let notifier = Arc::clone(&notifier);
        thread::spawn(move || notifier.wait(|_| None, |n| (*n == 2).then_some(*n)))
    };

    // First notification does not satisfy the predicate
    thread::sleep(Duration::from_millis(20));
    notifier.with(|n| *n = 1);
    notifier.notify_all();
    thread::sleep(Duration::from_millis(20));
    assert!(!waiter.is_finished());

    notifier.with(|n| *n = 2);
    notifier.notify_all();
    assert_eq!(waiter.join().unwrap(), 2);
}

// =============================================================================
// Timeout Tests
// =============================================================================

#[test]
fn test_wait_timeout_runs_timeout_action() {
    let notifier = Notifier::new(0u32);
    let start = Instant::now();

    let result = notifier.wait_timeout(
        Duration::from_millis(30),
        |_| None,
        |_| None,
        |n| {
            *n += 1;
            "timed out"
        },
    );

    assert_eq!(result, "timed out");
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert_eq!(notifier.with(|n| *n), 1);
}

#[test]
fn test_wait_timeout_release_before_deadline() {
    let notifier = Arc::new(Notifier::new(false));

    let waiter = {
        let notifier = Arc::clone(&notifier);
        thread::spawn(move || {
            notifier.wait_timeout(
                Duration::from_secs(5),
                |_| None,
                |go| go.then_some("released"),
                |_| "timed out",
            )
        })
    };

    thread::sleep(Duration::from_millis(20));
    notifier.with(|go| *go = true);
    notifier.notify_all();

    assert_eq!(waiter.join().unwrap(), "released");
}
