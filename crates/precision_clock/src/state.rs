// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use tracing::error;

use crate::WaitMode;
use crate::expiration_queue::ExpirationQueue;
use crate::registry::WaitHandleRegistry;
use crate::sys;
use crate::time_source::MonotonicTimeSource;

/// State shared between a clock, its callers and its scheduler thread.
#[derive(Debug)]
pub(crate) struct ClockState {
    time: MonotonicTimeSource,
    queue: ExpirationQueue,
    registry: WaitHandleRegistry,
    wait_mode: WaitMode,
}

impl ClockState {
    pub fn new(time: MonotonicTimeSource, registry: WaitHandleRegistry, wait_mode: WaitMode) -> Self {
        Self {
            time,
            queue: ExpirationQueue::default(),
            registry,
            wait_mode,
        }
    }

    pub const fn time(&self) -> &MonotonicTimeSource {
        &self.time
    }

    pub const fn queue(&self) -> &ExpirationQueue {
        &self.queue
    }

    pub const fn registry(&self) -> &WaitHandleRegistry {
        &self.registry
    }

    pub const fn wait_mode(&self) -> WaitMode {
        self.wait_mode
    }

    /// Blocks the calling thread until the monotonic counter reaches `deadline`.
    ///
    /// In coalesced mode the wait is queued for the scheduler thread, which releases it at the
    /// period boundary preceding the deadline. The remainder is then waited out directly, so the
    /// call never returns early. When no scheduler is running or no wait handle is available,
    /// the whole wait is direct.
    pub fn sleep_until(&self, deadline: u64) {
        if self.wait_mode == WaitMode::Coalesced {
            self.coalesced_wait(deadline);
        }

        if self.time.now() < deadline {
            direct_wait(deadline);
        }
    }

    fn coalesced_wait(&self, deadline: u64) {
        let Some(handle) = self.registry.get_or_create_handle() else {
            return;
        };

        if !self.queue.push(deadline, Arc::clone(&handle)) {
            return;
        }

        // Blocks forever if the scheduler stops before reaching the deadline.
        if let Err(err) = handle.wait() {
            error!(error = %err, "failed to wait on wait handle, falling back to direct wait");
        }
    }
}

fn direct_wait(deadline: u64) {
    if let Err(err) = sys::wait_until(deadline) {
        error!(error = %err, deadline, "absolute-deadline wait failed");
    }
}
