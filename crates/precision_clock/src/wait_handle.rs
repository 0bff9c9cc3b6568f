// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io;

use crate::sys::Semaphore;

/// A reusable kernel wait primitive owned by a single thread.
///
/// Only the owning thread ever waits on the handle. The scheduler signals it once for each
/// sleep the owner has queued. The kernel resource is released when the last reference drops.
#[derive(Debug)]
pub(crate) struct WaitHandle {
    semaphore: Semaphore,
}

impl WaitHandle {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            semaphore: Semaphore::new()?,
        })
    }

    /// Releases the owner from [`wait`][Self::wait].
    pub fn signal(&self) -> io::Result<()> {
        self.semaphore.post()
    }

    /// Blocks until the handle is signaled.
    pub fn wait(&self) -> io::Result<()> {
        self.semaphore.wait()
    }
}
