// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::PrecisionClock;
use crate::sys;

/// Measures elapsed time on the monotonic counter of a [`PrecisionClock`].
///
/// An instance of `Stopwatch` is created by calling [`PrecisionClock::stopwatch()`] or by passing
/// a clock to [`Stopwatch::new()`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use precision_clock::PrecisionClock;
///
/// # fn measure(clock: &PrecisionClock) -> Duration {
/// let stopwatch = clock.stopwatch();
/// clock.sleep_ns(1_000);
/// stopwatch.elapsed()
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: u64,
}

impl Stopwatch {
    /// Creates a stopwatch that starts measuring now.
    #[must_use]
    pub fn new(clock: &PrecisionClock) -> Self {
        Self {
            start: u64::try_from(clock.system_time_ns()).unwrap_or(0),
        }
    }

    /// Returns the elapsed time since the stopwatch was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(sys::monotonic_now().saturating_sub(self.start))
    }

    /// Returns the elapsed time since the stopwatch was created, in nanoseconds.
    #[must_use]
    pub fn elapsed_ns(&self) -> i64 {
        i64::try_from(sys::monotonic_now().saturating_sub(self.start)).unwrap_or(i64::MAX)
    }
}

impl From<Stopwatch> for Duration {
    fn from(stopwatch: Stopwatch) -> Self {
        stopwatch.elapsed()
    }
}
