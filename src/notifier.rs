//! Notifier
//!
//! Blocking wait/notify primitive shared by every slot.
//!
//! A `Notifier<S>` owns the state `S` it coordinates: every closure handed
//! to it runs with the lock held and gets `&mut S`, so a predicate and the
//! transition it guards are always evaluated together.
//!
//! ## Waiting Protocol
//! ```text
//!   lock ──► pre(state) ──Some(r)──► return r
//!                │
//!               None
//!                ▼
//!   ┌──► condvar wait (until notify or deadline)
//!   │            │
//!   │            ▼
//!   │      wake(state) ──Some(r)──► return r
//!   │            │
//!   │           None ──deadline passed──► on_timeout(state)
//!   └────────────┘
//! ```

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Mutex-protected state plus a condition variable for its waiters
#[derive(Debug, Default)]
pub struct Notifier<S> {
    state: Mutex<S>,
    condvar: Condvar,
}

impl<S> Notifier<S> {
    /// Create a notifier guarding `state`
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            condvar: Condvar::new(),
        }
    }

    /// Run `action` under the lock without waiting on the condition.
    pub fn with<R>(&self, action: impl FnOnce(&mut S) -> R) -> R {
        let mut state = self.state.lock();
        action(&mut state)
    }

    /// Block until `pre` or `wake` release the caller by returning `Some`.
    ///
    /// `pre` runs once before the first wait; `wake` runs after every
    /// wakeup, so spurious wakeups simply wait again.
    pub fn wait<R>(
        &self,
        pre: impl FnOnce(&mut S) -> Option<R>,
        mut wake: impl FnMut(&mut S) -> Option<R>,
    ) -> R {
        let mut state = self.state.lock();
        if let Some(result) = pre(&mut state) {
            return result;
        }
        loop {
            self.condvar.wait(&mut state);
            if let Some(result) = wake(&mut state) {
                return result;
            }
        }
    }

    /// Like [`wait`](Self::wait), bounded by `timeout`.
    ///
    /// When the deadline passes without a release, `on_timeout` runs under
    /// the lock and its result is returned. A release observed on the final
    /// wakeup wins over the timeout.
    pub fn wait_timeout<R>(
        &self,
        timeout: Duration,
        pre: impl FnOnce(&mut S) -> Option<R>,
        mut wake: impl FnMut(&mut S) -> Option<R>,
        on_timeout: impl FnOnce(&mut S) -> R,
    ) -> R {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        if let Some(result) = pre(&mut state) {
            return result;
        }
        loop {
            let status = self.condvar.wait_until(&mut state, deadline);
            if let Some(result) = wake(&mut state) {
                return result;
            }
            if status.timed_out() {
                return on_timeout(&mut state);
            }
        }
    }

    /// Wake every blocked waiter. Returns how many were woken.
    pub fn notify_all(&self) -> usize {
        self.condvar.notify_all()
    }
}
