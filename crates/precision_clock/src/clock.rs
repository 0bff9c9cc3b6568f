// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::Duration;

use crate::scheduler::{RealTimeParams, RealTimeScheduler, SchedulerState};
use crate::state::ClockState;
use crate::{ClockBuilder, Result, Stopwatch, WaitMode};

/// A monotonic nanosecond clock with precisely timed sleeps.
///
/// The clock reports time on two timelines:
///
/// - [`current_time_ns()`][Self::current_time_ns] counts nanoseconds since the clock was created.
/// - [`system_time_ns()`][Self::system_time_ns] is the raw platform monotonic counter, whose origin
///   is arbitrary. [`system_base_time_ns()`][Self::system_base_time_ns] is its reading at creation.
///
/// Neither timeline is related to wall-clock time.
///
/// # Sleeping
///
/// Any number of threads may call [`sleep_ns()`][Self::sleep_ns] concurrently. While the
/// scheduler is running, each sleep is queued and released by one dedicated real-time thread
/// that wakes up once per [period][RealTimeParams::period]. Batching wakeups at period boundaries
/// bounds the wake jitter by the period and keeps the number of wakeups low when many threads
/// sleep at once.
///
/// A sleep never returns before its deadline. While the scheduler is running, it returns at most
/// one period plus scheduling slack after it.
///
/// When the scheduler is not running, because it was never started, was stopped or failed to
/// start, every sleep waits on its own deadline instead.
///
/// # Lifecycle
///
/// The owner starts the scheduler with [`start()`][Self::start] and stops it with
/// [`stop()`][Self::stop]. Both are idempotent. Sleeps still queued when the scheduler stops
/// are abandoned: they never return. Dropping the clock stops the scheduler.
///
/// # Examples
///
/// ```
/// use precision_clock::PrecisionClock;
///
/// let clock = PrecisionClock::new()?;
/// clock.start();
///
/// let start = clock.current_time_ns();
/// clock.sleep_ns(2_000_000);
/// assert!(clock.current_time_ns() - start >= 2_000_000);
///
/// clock.stop();
/// # Ok::<(), precision_clock::Error>(())
/// ```
#[derive(Debug)]
pub struct PrecisionClock {
    state: Arc<ClockState>,
    scheduler: RealTimeScheduler,
}

impl PrecisionClock {
    /// Creates a clock with the default configuration. The scheduler is not started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`][crate::Error::UnsupportedPlatform] if the platform's
    /// monotonic counter does not tick exactly once per nanosecond.
    pub fn new() -> Result<Self> {
        ClockBuilder::default().build()
    }

    /// Returns a builder to configure the clock before creating it.
    #[must_use]
    pub fn builder() -> ClockBuilder {
        ClockBuilder::default()
    }

    pub(crate) const fn from_parts(state: Arc<ClockState>, scheduler: RealTimeScheduler) -> Self {
        Self { state, scheduler }
    }

    /// Nanoseconds elapsed since the clock was created.
    #[must_use]
    pub fn current_time_ns(&self) -> i64 {
        self.state.time().current_time_ns()
    }

    /// Raw reading of the platform monotonic counter, in nanoseconds since an arbitrary origin.
    #[must_use]
    pub fn system_time_ns(&self) -> i64 {
        self.state.time().system_time_ns()
    }

    /// Reading of the platform monotonic counter when the clock was created.
    ///
    /// `system_time_ns() - system_base_time_ns()` equals `current_time_ns()`.
    #[must_use]
    pub fn system_base_time_ns(&self) -> i64 {
        self.state.time().system_base_time_ns()
    }

    /// Blocks the calling thread for `duration` nanoseconds.
    ///
    /// Zero and negative durations are legal. While the scheduler is running they are released
    /// by its next period rather than returning immediately.
    pub fn sleep_ns(&self, duration: i64) {
        let duration = u64::try_from(duration).unwrap_or(0);
        let deadline = self.state.time().now().saturating_add(duration);

        self.state.sleep_until(deadline);
    }

    /// Blocks the calling thread for `duration`.
    ///
    /// Durations beyond `i64::MAX` nanoseconds are clamped.
    pub fn sleep(&self, duration: Duration) {
        self.sleep_ns(i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX));
    }

    /// Blocks the calling thread until [`current_time_ns()`][Self::current_time_ns] reaches `target`.
    ///
    /// Targets in the past are treated like a zero-length sleep.
    pub fn sleep_until_ns(&self, target: i64) {
        let target = u64::try_from(target).unwrap_or(0);
        let deadline = self.state.time().base().saturating_add(target);

        self.state.sleep_until(deadline);
    }

    /// Starts the scheduler thread. Does nothing if it is already running.
    ///
    /// If the thread cannot be created, the failure is logged and sleeps keep working without
    /// the scheduler.
    pub fn start(&self) {
        self.scheduler.start();
    }

    /// Stops the scheduler thread and waits for it to exit. Does nothing if it is not running.
    ///
    /// Sleeps still queued when the thread exits are abandoned and never return.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Current lifecycle state of the scheduler thread.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Returns `true` while the scheduler thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Number of sleeps currently waiting to be released by the scheduler.
    #[must_use]
    pub fn pending_waits(&self) -> usize {
        self.state.queue().len()
    }

    /// Releases the calling thread's wait handle ahead of thread exit.
    ///
    /// Threads create a wait handle on their first coalesced sleep and release it when they exit.
    /// Long-lived threads that will not sleep on this clock again can release it early; the
    /// next sleep creates a new one. Returns `false` if the thread held no handle.
    pub fn release_thread_handle(&self) -> bool {
        self.state.registry().unregister()
    }

    /// Number of threads currently holding a wait handle of this clock.
    #[must_use]
    pub fn wait_handles(&self) -> usize {
        self.state.registry().live_handles()
    }

    /// Real-time budget of the scheduler thread.
    #[must_use]
    pub fn real_time_params(&self) -> RealTimeParams {
        self.scheduler.params()
    }

    /// How sleeps are served while the scheduler is running.
    #[must_use]
    pub fn wait_mode(&self) -> WaitMode {
        self.state.wait_mode()
    }

    /// Creates a [`Stopwatch`] measuring time on this clock.
    #[must_use]
    pub fn stopwatch(&self) -> Stopwatch {
        Stopwatch::new(self)
    }
}
