// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(
    test,
    allow(
        clippy::arithmetic_side_effects,
        clippy::cast_possible_wrap,
        reason = "allow these lints in tests to improve the readability of the tests"
    )
)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A monotonic nanosecond clock whose sleeps are released by a dedicated
//! real-time scheduler thread.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use precision_clock::PrecisionClock;
//!
//! let clock = PrecisionClock::new()?;
//! clock.start();
//!
//! let stopwatch = clock.stopwatch();
//! clock.sleep(Duration::from_millis(1));
//! assert!(stopwatch.elapsed() >= Duration::from_millis(1));
//!
//! clock.stop();
//! # Ok::<(), precision_clock::Error>(())
//! ```
//!
//! # Why?
//!
//! General-purpose sleeps are released whenever the operating system gets around to it, which
//! can be milliseconds late. Workloads that pace themselves at sub-millisecond granularity need
//! wakeups that are both timely and cheap when many threads sleep at once.
//!
//! A [`PrecisionClock`] owns one scheduler thread running under the kernel's deadline
//! scheduling class. The thread wakes up once per period and releases every sleep whose
//! deadline falls before the next wakeup, so:
//!
//! - A sleep never returns before its deadline.
//! - While the scheduler runs, a sleep returns at most one period plus scheduling slack after
//!   its deadline.
//! - Any number of concurrent sleepers costs one periodic wakeup, not one per sleeper.
//!
//! # Overview
//!
//! - [`PrecisionClock`] - Reads the monotonic counter, sleeps, and owns the scheduler thread.
//! - [`ClockBuilder`] - Configures the real-time budget, thread name and [`WaitMode`].
//! - [`RealTimeParams`] - The validated real-time budget of the scheduler thread.
//! - [`SchedulerState`] - Lifecycle state of the scheduler thread.
//! - [`Stopwatch`] - Measures elapsed time on the clock.
//! - [`Timebase`] - Ratio between ticks of the platform counter and nanoseconds.
//! - [`Error`] - Errors reported while creating a clock.
//!
//! # Platform Support
//!
//! The clock requires a monotonic counter that ticks exactly once per nanosecond. On Linux the
//! counter is `CLOCK_MONOTONIC`, sleeps use absolute-deadline waits, and the scheduler thread
//! requests `SCHED_DEADLINE`. Without the privilege to do so, the thread keeps running at
//! best-effort priority and logs the failure.
//!
//! On other platforms the clock is backed by [`std::time::Instant`] and the scheduler thread
//! always runs at best-effort priority.
//!
//! # Logging
//!
//! Failures that do not prevent the clock from working, such as a denied real-time request or
//! abandoned sleeps, are reported through [`tracing`](https://docs.rs/tracing) events.
//!
//! # Features
//!
//! - **`test-util`** - Enables [`ClockBuilder::with_timebase`] to simulate a platform whose
//!   counter does not tick once per nanosecond. **Only enable this in `dev-dependencies`.**

mod builder;
mod clock;
mod error;
mod expiration_queue;
mod registry;
mod scheduler;
mod state;
mod stopwatch;
mod sys;
mod time_source;
mod timebase;
mod wait_handle;

pub use builder::{ClockBuilder, WaitMode};
pub use clock::PrecisionClock;
pub use error::{Error, Result};
pub use scheduler::{RealTimeParams, SchedulerState};
pub use stopwatch::Stopwatch;
pub use timebase::Timebase;
