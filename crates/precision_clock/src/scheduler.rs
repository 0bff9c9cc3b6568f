// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::state::ClockState;
use crate::sys::{self, RealTimeBudget};
use crate::{Error, Result};

/// Lifecycle of a clock's scheduler thread.
///
/// ```text
/// NotStarted ──start()──► Running ──stop()──► Stopping ──► Stopped
///                            ▲                                │
///                            └────────────start()─────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    /// The scheduler has never run. Sleeps wait directly.
    NotStarted,
    /// The scheduler thread is releasing queued sleeps every period.
    Running,
    /// [`stop()`][crate::PrecisionClock::stop] is waiting for the scheduler thread to exit.
    Stopping,
    /// The scheduler thread has exited. Sleeps wait directly until the next start.
    Stopped,
}

impl SchedulerState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Running => 1,
            Self::Stopping => 2,
            Self::Stopped => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Real-time budget of the scheduler thread.
///
/// Every `period` the thread is guaranteed `computation` of CPU time, delivered within
/// `constraint` of the period start. Sleeps are released in batches at period boundaries,
/// so the period also bounds how late a sleep can be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealTimeParams {
    budget: RealTimeBudget,
}

impl RealTimeParams {
    /// Validates and creates a real-time budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] unless `0 < computation <= constraint <= period`
    /// and every value fits into 64-bit nanoseconds.
    pub fn new(period: Duration, computation: Duration, constraint: Duration) -> Result<Self> {
        let period = to_nanos("period", period)?;
        let computation = to_nanos("computation", computation)?;
        let constraint = to_nanos("constraint", constraint)?;

        if computation == 0 {
            return Err(Error::invalid_configuration("computation must be greater than zero"));
        }

        if computation > constraint {
            return Err(Error::invalid_configuration(format!(
                "computation ({computation} ns) must not exceed constraint ({constraint} ns)"
            )));
        }

        if constraint > period {
            return Err(Error::invalid_configuration(format!(
                "constraint ({constraint} ns) must not exceed period ({period} ns)"
            )));
        }

        Ok(Self {
            budget: RealTimeBudget {
                period,
                computation,
                constraint,
            },
        })
    }

    /// Interval between two wakeups of the scheduler thread.
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_nanos(self.budget.period)
    }

    /// CPU time reserved for the scheduler thread in every period.
    #[must_use]
    pub const fn computation(&self) -> Duration {
        Duration::from_nanos(self.budget.computation)
    }

    /// Time after the period start by which the computation must have been delivered.
    #[must_use]
    pub const fn constraint(&self) -> Duration {
        Duration::from_nanos(self.budget.constraint)
    }

    pub(crate) const fn budget(&self) -> RealTimeBudget {
        self.budget
    }
}

fn to_nanos(name: &str, value: Duration) -> Result<u64> {
    u64::try_from(value.as_nanos())
        .map_err(|_overflow| Error::invalid_configuration(format!("{name} does not fit into 64-bit nanoseconds")))
}

pub(crate) type SpawnFn = fn(thread::Builder, Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>>;

fn spawn_thread(builder: thread::Builder, body: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> {
    builder.spawn(body)
}

/// Owns the background thread that releases queued sleeps of one clock.
#[derive(Debug)]
pub(crate) struct RealTimeScheduler {
    state: Arc<ClockState>,
    params: RealTimeParams,
    thread_name: String,

    // Readable without the lifecycle lock, so the state can be observed while stop() joins.
    current: AtomicU8,

    // Serializes start() and stop().
    lifecycle: Mutex<Lifecycle>,

    spawn: SpawnFn,
}

#[derive(Debug, Default)]
struct Lifecycle {
    thread: Option<JoinHandle<()>>,

    // A fresh flag per run, so a late observer of an old run never cancels a new one.
    cancel: Arc<AtomicBool>,
}

impl RealTimeScheduler {
    pub fn new(state: Arc<ClockState>, params: RealTimeParams, thread_name: String) -> Self {
        Self::with_spawn(state, params, thread_name, spawn_thread)
    }

    pub fn with_spawn(state: Arc<ClockState>, params: RealTimeParams, thread_name: String, spawn: SpawnFn) -> Self {
        Self {
            state,
            params,
            thread_name,
            current: AtomicU8::new(SchedulerState::NotStarted.to_u8()),
            lifecycle: Mutex::default(),
            spawn,
        }
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.current.load(Ordering::Acquire))
    }

    pub const fn params(&self) -> RealTimeParams {
        self.params
    }

    #[cfg(test)]
    fn running_thread_name(&self) -> Option<String> {
        let lifecycle = self.lifecycle.lock();
        let thread = lifecycle.thread.as_ref()?;
        thread.thread().name().map(str::to_string)
    }

    fn set_state(&self, state: SchedulerState) {
        self.current.store(state.to_u8(), Ordering::Release);
    }

    /// Spawns the scheduler thread unless it is already running.
    ///
    /// If the thread cannot be spawned, the failure is logged and the clock keeps serving
    /// sleeps with direct waits.
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if self.state() == SchedulerState::Running {
            return;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let body: Box<dyn FnOnce() + Send> = {
            let state = Arc::clone(&self.state);
            let cancel = Arc::clone(&cancel);
            let budget = self.params.budget();
            Box::new(move || run(&state, budget, &cancel))
        };

        match (self.spawn)(thread::Builder::new().name(self.thread_name.clone()), body) {
            Ok(thread) => {
                lifecycle.thread = Some(thread);
                lifecycle.cancel = cancel;

                // Only now is there a thread to drain what gets queued.
                self.state.queue().open();
                self.set_state(SchedulerState::Running);

                debug!(thread_name = %self.thread_name, "scheduler started");
            }
            Err(err) => {
                error!(
                    error = %err,
                    thread_name = %self.thread_name,
                    "failed to spawn the scheduler thread, sleeps fall back to direct waits"
                );
            }
        }
    }

    /// Stops the scheduler thread and waits for it to exit.
    ///
    /// Sleeps still queued once the thread has exited are abandoned.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if self.state() != SchedulerState::Running {
            return;
        }

        self.set_state(SchedulerState::Stopping);

        // Sleeps arriving from now on wait directly. The thread's last drain happens after it
        // observes the cancellation, so it releases everything accepted before this point.
        self.state.queue().stop_accepting();
        lifecycle.cancel.store(true, Ordering::Release);

        if let Some(thread) = lifecycle.thread.take()
            && thread.join().is_err()
        {
            error!(thread_name = %self.thread_name, "the scheduler thread panicked and could not be joined cleanly");
        }

        let abandoned = self.state.queue().close();
        self.set_state(SchedulerState::Stopped);

        debug!(thread_name = %self.thread_name, abandoned, "scheduler stopped");
    }
}

impl Drop for RealTimeScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Scheduler thread entrypoint.
///
/// Every period releases the sleeps that expire before the next period boundary, then waits
/// for that boundary. The thread wakes up even with nothing queued so that its real-time
/// reservation stays active.
#[cfg_attr(test, mutants::skip)] // Causes test timeout.
fn run(state: &ClockState, budget: RealTimeBudget, cancel: &AtomicBool) {
    if let Err(err) = sys::set_realtime(budget) {
        error!(error = %err, "failed to enter the real-time scheduling class, continuing at best-effort priority");
    }

    loop {
        // Read before draining, so the final drain sees every wait the queue accepted.
        let cancelled = cancel.load(Ordering::Acquire);
        let next_period_start = state.time().now().saturating_add(budget.period);

        state.queue().drain_expired(next_period_start);

        if cancelled {
            break;
        }

        if state.time().now() < next_period_start
            && let Err(err) = sys::wait_until(next_period_start)
        {
            error!(error = %err, "failed to wait for the next scheduler period");
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use rstest::rstest;
    use testing_aids::{LogCapture, TEST_TIMEOUT};

    use super::*;
    use crate::registry::WaitHandleRegistry;
    use crate::time_source::MonotonicTimeSource;
    use crate::{Timebase, WaitMode};

    const PERIOD: Duration = Duration::from_micros(500);

    fn params() -> RealTimeParams {
        RealTimeParams::new(PERIOD, Duration::from_micros(100), Duration::from_micros(250)).unwrap()
    }

    fn clock_state() -> Arc<ClockState> {
        Arc::new(ClockState::new(
            MonotonicTimeSource::new(Timebase::NANOSECOND).unwrap(),
            WaitHandleRegistry::new(),
            WaitMode::Coalesced,
        ))
    }

    fn scheduler(state: &Arc<ClockState>) -> RealTimeScheduler {
        RealTimeScheduler::new(Arc::clone(state), params(), "scheduler-test".to_string())
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(RealTimeScheduler: Send, Sync);
        static_assertions::assert_impl_all!(RealTimeParams: Send, Sync, Copy);
        static_assertions::assert_impl_all!(SchedulerState: Send, Sync, Copy);
    }

    #[rstest]
    #[case(SchedulerState::NotStarted)]
    #[case(SchedulerState::Running)]
    #[case(SchedulerState::Stopping)]
    #[case(SchedulerState::Stopped)]
    fn state_encoding(#[case] state: SchedulerState) {
        assert_eq!(SchedulerState::from_u8(state.to_u8()), state);
    }

    #[rstest]
    #[case::zero_period(0, 0, 0, "computation must be greater than zero")]
    #[case::zero_computation(100, 0, 50, "computation must be greater than zero")]
    #[case::computation_over_constraint(100, 60, 50, "must not exceed constraint")]
    #[case::constraint_over_period(100, 50, 150, "must not exceed period")]
    fn invalid_params(#[case] period: u64, #[case] computation: u64, #[case] constraint: u64, #[case] message: &str) {
        let error = RealTimeParams::new(
            Duration::from_micros(period),
            Duration::from_micros(computation),
            Duration::from_micros(constraint),
        )
        .unwrap_err();

        assert!(error.to_string().contains(message), "unexpected error: {error}");
    }

    #[test]
    fn oversized_params_rejected() {
        let error = RealTimeParams::new(Duration::MAX, Duration::from_micros(1), Duration::from_micros(1)).unwrap_err();

        assert!(error.to_string().contains("period does not fit"));
    }

    #[test]
    fn equal_budgets_accepted() {
        let params = RealTimeParams::new(PERIOD, PERIOD, PERIOD).unwrap();

        assert_eq!(params.period(), PERIOD);
        assert_eq!(params.computation(), PERIOD);
        assert_eq!(params.constraint(), PERIOD);
    }

    #[test]
    fn start_is_idempotent() {
        static SPAWNED: AtomicUsize = AtomicUsize::new(0);

        fn counting_spawn(builder: thread::Builder, body: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> {
            SPAWNED.fetch_add(1, Ordering::SeqCst);
            builder.spawn(body)
        }

        let state = clock_state();
        let scheduler = RealTimeScheduler::with_spawn(Arc::clone(&state), params(), "counted".to_string(), counting_spawn);

        scheduler.start();
        scheduler.start();

        assert_eq!(SPAWNED.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), SchedulerState::Running);

        scheduler.stop();
        scheduler.start();

        assert_eq!(SPAWNED.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn thread_is_named() {
        let state = clock_state();
        let scheduler = scheduler(&state);
        assert_eq!(scheduler.running_thread_name(), None);

        scheduler.start();

        assert_eq!(scheduler.running_thread_name().as_deref(), Some("scheduler-test"));
    }

    #[test]
    fn stop_before_start_is_noop() {
        let state = clock_state();
        let scheduler = scheduler(&state);

        scheduler.stop();

        assert_eq!(scheduler.state(), SchedulerState::NotStarted);
    }

    #[test]
    fn lifecycle_transitions() {
        let state = clock_state();
        let scheduler = scheduler(&state);

        scheduler.start();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(state.queue().is_open());

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(!state.queue().is_open());

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn running_scheduler_releases_queued_wait() {
        let state = clock_state();
        let scheduler = scheduler(&state);
        scheduler.start();

        let handle = state.registry().get_or_create_handle().unwrap();
        assert!(state.queue().push(state.time().now(), Arc::clone(&handle)));

        let released = testing_aids::execute_or_abandon(move || handle.wait().is_ok());
        assert_eq!(released, Some(true));
    }

    #[test]
    fn stop_abandons_queued_waits() {
        let state = clock_state();
        let scheduler = scheduler(&state);
        scheduler.start();

        let handle = state.registry().get_or_create_handle().unwrap();
        let far_future = state.time().now() + TEST_TIMEOUT.as_secs() * 1_000_000_000;
        assert!(state.queue().push(far_future, handle));

        scheduler.stop();

        assert_eq!(state.queue().len(), 0);
    }

    #[test]
    fn stop_releases_due_waits_queued_during_shutdown() {
        for _ in 0..20 {
            let state = clock_state();
            let scheduler = scheduler(&state);
            scheduler.start();

            let sleepers: Vec<_> = (0..8)
                .map(|_| {
                    let state = Arc::clone(&state);
                    thread::spawn(move || {
                        for _ in 0..200 {
                            state.sleep_until(state.time().now());
                        }
                    })
                })
                .collect();

            thread::sleep(Duration::from_millis(1));
            scheduler.stop();

            let finished = testing_aids::execute_or_abandon(move || sleepers.into_iter().all(|s| s.join().is_ok()));
            assert_eq!(finished, Some(true));
            assert_eq!(state.queue().len(), 0);
        }
    }

    #[test]
    fn spawn_failure_degrades_to_direct_waits() {
        fn failing_spawn(_builder: thread::Builder, _body: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> {
            Err(io::Error::other("thread limit reached"))
        }

        let state = clock_state();
        let scheduler = RealTimeScheduler::with_spawn(Arc::clone(&state), params(), "doomed".to_string(), failing_spawn);
        let capture = LogCapture::new();

        tracing::subscriber::with_default(capture.subscriber(), || scheduler.start());

        assert_eq!(scheduler.state(), SchedulerState::NotStarted);
        assert!(!state.queue().is_open());
        capture.assert_contains("failed to spawn the scheduler thread");
        capture.assert_contains("thread limit reached");

        let deadline = state.time().now() + 1_000_000;
        state.sleep_until(deadline);
        assert!(state.time().now() >= deadline);
    }

    #[test]
    fn drop_stops_thread() {
        let state = clock_state();
        let scheduler = scheduler(&state);
        scheduler.start();

        drop(scheduler);

        assert!(!state.queue().is_open());
        assert_eq!(Arc::strong_count(&state), 1);
    }
}
