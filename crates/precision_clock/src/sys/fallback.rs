// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Portable backend for platforms without a native absolute-deadline wait.

use std::sync::OnceLock;
use std::time::{Duration, Instant};
use std::{io, thread};

use parking_lot::{Condvar, Mutex};

use super::RealTimeBudget;
use crate::Timebase;

/// Ticks are derived from `Instant`, which already counts in nanoseconds.
pub(crate) const fn timebase() -> Timebase {
    Timebase::NANOSECOND
}

fn anchor() -> Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    *ANCHOR.get_or_init(Instant::now)
}

pub(crate) fn monotonic_now() -> u64 {
    u64::try_from(anchor().elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Converts the absolute deadline into a relative sleep against the monotonic anchor.
#[expect(clippy::unnecessary_wraps, reason = "infallible here, the signature mirrors the fallible Linux backend")]
pub(crate) fn wait_until(deadline: u64) -> io::Result<()> {
    loop {
        let now = monotonic_now();
        if now >= deadline {
            return Ok(());
        }

        thread::sleep(Duration::from_nanos(deadline - now));
    }
}

pub(crate) fn set_realtime(_budget: RealTimeBudget) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "the real-time scheduling class is not available on this platform",
    ))
}

/// A binary semaphore built from a mutex and a condition variable.
#[derive(Debug, Default)]
pub(crate) struct Semaphore {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl Semaphore {
    #[expect(clippy::unnecessary_wraps, reason = "infallible here, the signature mirrors the fallible Linux backend")]
    pub fn new() -> io::Result<Self> {
        Ok(Self::default())
    }

    #[expect(clippy::unnecessary_wraps, reason = "infallible here, the signature mirrors the fallible Linux backend")]
    pub fn post(&self) -> io::Result<()> {
        *self.signaled.lock() = true;
        self.condvar.notify_one();
        Ok(())
    }

    #[expect(clippy::unnecessary_wraps, reason = "infallible here, the signature mirrors the fallible Linux backend")]
    pub fn wait(&self) -> io::Result<()> {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.condvar.wait(&mut signaled);
        }
        *signaled = false;
        Ok(())
    }
}
