// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{Error, Result, Timebase, sys};

/// Reads the platform's raw monotonic counter relative to a baseline captured at construction.
///
/// All readings are in nanoseconds because construction refuses any timebase other than 1:1.
#[derive(Debug)]
pub(crate) struct MonotonicTimeSource {
    base: u64,
}

impl MonotonicTimeSource {
    pub fn new(timebase: Timebase) -> Result<Self> {
        if !timebase.is_nanosecond() {
            return Err(Error::unsupported_platform(timebase));
        }

        Ok(Self { base: sys::monotonic_now() })
    }

    /// Raw tick count of the monotonic counter.
    #[expect(clippy::unused_self, reason = "readings are tied to a validated time source")]
    pub fn now(&self) -> u64 {
        sys::monotonic_now()
    }

    pub const fn base(&self) -> u64 {
        self.base
    }

    pub fn current_time_ns(&self) -> i64 {
        to_signed(self.now().saturating_sub(self.base))
    }

    pub fn system_time_ns(&self) -> i64 {
        to_signed(self.now())
    }

    pub fn system_base_time_ns(&self) -> i64 {
        to_signed(self.base)
    }
}

// Overflow takes centuries of uptime.
fn to_signed(ticks: u64) -> i64 {
    i64::try_from(ticks).unwrap_or(i64::MAX)
}
