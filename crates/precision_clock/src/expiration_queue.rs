// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::wait_handle::WaitHandle;

/// A sleep waiting to be released by the scheduler.
#[derive(Debug)]
pub(crate) struct PendingWait {
    expiration: u64,
    handle: Arc<WaitHandle>,
}

impl PendingWait {
    #[cfg(test)]
    pub const fn expiration(&self) -> u64 {
        self.expiration
    }

    fn signal(&self) {
        if let Err(err) = self.handle.signal() {
            error!(error = %err, expiration = self.expiration, "failed to signal wait handle");
        }
    }
}

// Waits are ordered by expiration only; ties are released in arbitrary order.
impl PartialEq for PendingWait {
    fn eq(&self, other: &Self) -> bool {
        self.expiration == other.expiration
    }
}

impl Eq for PendingWait {}

impl PartialOrd for PendingWait {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingWait {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expiration.cmp(&other.expiration)
    }
}

/// Pending waits of one clock, ordered by absolute expiration tick.
///
/// The queue only accepts waits while it is open, which is exactly while a scheduler thread is
/// around to drain it. Closing the queue abandons everything still in it.
#[derive(Debug, Default)]
pub(crate) struct ExpirationQueue {
    // The lock is held for heap mutation and signal dispatch only. The scheduler thread takes it
    // once per period, so keeping it short bounds the scheduler's jitter.
    inner: Mutex<QueueInner>,
}

#[derive(Debug, Default)]
struct QueueInner {
    heap: BinaryHeap<Reverse<PendingWait>>,
    open: bool,
}

impl ExpirationQueue {
    /// Queues `handle` to be signaled once the scheduler reaches `expiration`.
    ///
    /// Returns `false` without queuing anything if the queue is closed.
    pub fn push(&self, expiration: u64, handle: Arc<WaitHandle>) -> bool {
        let mut inner = self.inner.lock();
        if !inner.open {
            return false;
        }

        inner.heap.push(Reverse(PendingWait { expiration, handle }));
        true
    }

    /// Removes and signals every wait that expires before `before`.
    ///
    /// Returns the number of waits released.
    pub fn drain_expired(&self, before: u64) -> usize {
        self.drain_expired_with(before, PendingWait::signal)
    }

    /// Removes every wait that expires before `before`, in non-decreasing expiration order,
    /// handing each one to `release` while the lock is held.
    pub fn drain_expired_with(&self, before: u64, mut release: impl FnMut(&PendingWait)) -> usize {
        let mut inner = self.inner.lock();
        let mut released = 0_usize;

        while inner.heap.peek().is_some_and(|next| next.0.expiration < before) {
            if let Some(Reverse(wait)) = inner.heap.pop() {
                release(&wait);
                released = released.saturating_add(1);
            }
        }

        released
    }

    pub fn open(&self) {
        self.inner.lock().open = true;
    }

    /// Stops accepting waits. Waits already queued stay queued until drained or closed.
    pub fn stop_accepting(&self) {
        self.inner.lock().open = false;
    }

    /// Stops accepting waits and abandons the ones still queued.
    ///
    /// Abandoned waits are never signaled. Returns how many were abandoned.
    pub fn close(&self) -> usize {
        let abandoned = {
            let mut inner = self.inner.lock();
            inner.open = false;
            inner.heap.drain().count()
        };

        if abandoned > 0 {
            warn!(abandoned, "scheduler stopped with pending waits, they will never be released");
        }

        abandoned
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Expiration of the earliest pending wait.
    #[cfg(test)]
    pub fn next_expiration(&self) -> Option<u64> {
        self.inner.lock().heap.peek().map(|next| next.0.expiration)
    }
}
