// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::Duration;

use crate::registry::WaitHandleRegistry;
use crate::scheduler::{RealTimeParams, RealTimeScheduler};
use crate::state::ClockState;
use crate::time_source::MonotonicTimeSource;
use crate::{PrecisionClock, Result, Timebase};

/// How a [`PrecisionClock`] serves sleeps while its scheduler is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WaitMode {
    /// Sleeps are queued and released in batches by the scheduler thread at period boundaries.
    ///
    /// Sleeps still queued when the scheduler stops are abandoned and never return.
    #[default]
    Coalesced,

    /// Every sleep waits on its own absolute deadline and never involves the scheduler thread.
    ///
    /// Sleeps are never abandoned, at the cost of one independent kernel wakeup per sleep.
    Direct,
}

/// Collects the configuration of a [`PrecisionClock`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use precision_clock::{PrecisionClock, WaitMode};
///
/// let clock = PrecisionClock::builder()
///     .with_period(Duration::from_micros(500))
///     .with_computation(Duration::from_micros(100))
///     .with_constraint(Duration::from_micros(250))
///     .with_wait_mode(WaitMode::Coalesced)
///     .build()?;
///
/// assert_eq!(clock.real_time_params().period(), Duration::from_micros(500));
/// # Ok::<(), precision_clock::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ClockBuilder {
    period: Duration,
    computation: Duration,
    constraint: Duration,
    thread_name: String,
    wait_mode: WaitMode,
    timebase: Option<Timebase>,
}

impl ClockBuilder {
    /// Default interval between two wakeups of the scheduler thread.
    pub const DEFAULT_PERIOD: Duration = Duration::from_micros(200);

    /// Default CPU time reserved for the scheduler thread in every period.
    pub const DEFAULT_COMPUTATION: Duration = Duration::from_micros(50);

    /// Default deadline for the computation, measured from the period start.
    pub const DEFAULT_CONSTRAINT: Duration = Duration::from_micros(100);

    /// Default name of the scheduler thread.
    pub const DEFAULT_THREAD_NAME: &'static str = "precision-clock";

    /// Sets the interval between two wakeups of the scheduler thread.
    ///
    /// This bounds how much later than its deadline a coalesced sleep may return.
    #[must_use]
    pub const fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sets the CPU time reserved for the scheduler thread in every period.
    #[must_use]
    pub const fn with_computation(mut self, computation: Duration) -> Self {
        self.computation = computation;
        self
    }

    /// Sets the deadline for the computation, measured from the period start.
    #[must_use]
    pub const fn with_constraint(mut self, constraint: Duration) -> Self {
        self.constraint = constraint;
        self
    }

    /// Sets the name of the scheduler thread.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets how sleeps are served while the scheduler is running.
    #[must_use]
    pub const fn with_wait_mode(mut self, wait_mode: WaitMode) -> Self {
        self.wait_mode = wait_mode;
        self
    }

    /// Pretends the platform counter runs at the given timebase.
    ///
    /// Used to exercise platform validation in tests.
    #[cfg(any(feature = "test-util", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
    #[must_use]
    pub const fn with_timebase(mut self, timebase: Timebase) -> Self {
        self.timebase = Some(timebase);
        self
    }

    /// Builds the clock. The scheduler is not started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`][crate::Error::InvalidConfiguration] if the
    /// real-time parameters are inconsistent, and
    /// [`Error::UnsupportedPlatform`][crate::Error::UnsupportedPlatform] if the monotonic counter
    /// does not tick exactly once per nanosecond.
    pub fn build(self) -> Result<PrecisionClock> {
        let params = RealTimeParams::new(self.period, self.computation, self.constraint)?;
        let timebase = self.timebase.unwrap_or_else(Timebase::platform);
        let time = MonotonicTimeSource::new(timebase)?;

        let state = Arc::new(ClockState::new(time, WaitHandleRegistry::new(), self.wait_mode));
        let scheduler = RealTimeScheduler::new(Arc::clone(&state), params, self.thread_name);

        Ok(PrecisionClock::from_parts(state, scheduler))
    }
}

impl Default for ClockBuilder {
    fn default() -> Self {
        Self {
            period: Self::DEFAULT_PERIOD,
            computation: Self::DEFAULT_COMPUTATION,
            constraint: Self::DEFAULT_CONSTRAINT,
            thread_name: Self::DEFAULT_THREAD_NAME.to_string(),
            wait_mode: WaitMode::default(),
            timebase: None,
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, SchedulerState};

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(ClockBuilder: Send, Sync, Clone);
    }

    #[test]
    fn defaults_are_valid() {
        let clock = ClockBuilder::default().build().unwrap();

        let params = clock.real_time_params();
        assert_eq!(params.period(), ClockBuilder::DEFAULT_PERIOD);
        assert_eq!(params.computation(), ClockBuilder::DEFAULT_COMPUTATION);
        assert_eq!(params.constraint(), ClockBuilder::DEFAULT_CONSTRAINT);
        assert_eq!(clock.wait_mode(), WaitMode::Coalesced);
    }

    #[test]
    fn foreign_timebase_is_rejected() {
        let error = ClockBuilder::default().with_timebase(Timebase::new(1, 2)).build().unwrap_err();

        assert!(matches!(error, Error::UnsupportedPlatform { numer: 1, denom: 2 }));
    }

    #[test]
    fn invalid_params_reported_before_timebase() {
        let error = ClockBuilder::default()
            .with_period(Duration::from_micros(10))
            .with_timebase(Timebase::new(1, 2))
            .build()
            .unwrap_err();

        assert!(matches!(error, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn build_does_not_start_scheduler() {
        let clock = ClockBuilder::default().with_wait_mode(WaitMode::Direct).build().unwrap();

        assert_eq!(clock.state(), SchedulerState::NotStarted);
        assert_eq!(clock.wait_mode(), WaitMode::Direct);
    }
}
