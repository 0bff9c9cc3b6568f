// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(missing_docs, reason = "test code")]
#![allow(clippy::arithmetic_side_effects, reason = "test code")]

//! Scheduler lifecycle and time readings as observed through the public API.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use precision_clock::{PrecisionClock, SchedulerState};
use testing_aids::execute_or_abandon;

#[test]
fn state_follows_start_and_stop() {
    let clock = PrecisionClock::new().unwrap();
    assert_eq!(clock.state(), SchedulerState::NotStarted);

    clock.start();
    assert_eq!(clock.state(), SchedulerState::Running);
    assert!(clock.is_running());

    clock.stop();
    assert_eq!(clock.state(), SchedulerState::Stopped);

    clock.start();
    assert_eq!(clock.state(), SchedulerState::Running);
}

#[test]
fn restarted_scheduler_releases_sleeps() {
    let clock = Arc::new(PrecisionClock::new().unwrap());

    for _ in 0..3 {
        clock.start();

        let elapsed = execute_or_abandon({
            let clock = Arc::clone(&clock);
            move || {
                let start = clock.current_time_ns();
                clock.sleep_ns(1_000_000);
                clock.current_time_ns() - start
            }
        })
        .unwrap();
        assert!(elapsed >= 1_000_000);

        clock.stop();
    }
}

#[test]
fn concurrent_start_and_stop_settle() {
    let clock = Arc::new(PrecisionClock::new().unwrap());

    let togglers: Vec<_> = (0..8)
        .map(|i| {
            let clock = Arc::clone(&clock);
            thread::spawn(move || {
                for _ in 0..20 {
                    if i % 2 == 0 {
                        clock.start();
                    } else {
                        clock.stop();
                    }
                }
            })
        })
        .collect();

    let joined = execute_or_abandon(move || togglers.into_iter().all(|t| t.join().is_ok()));
    assert_eq!(joined, Some(true));

    assert!(matches!(clock.state(), SchedulerState::Running | SchedulerState::Stopped));

    clock.stop();
    assert_eq!(clock.state(), SchedulerState::Stopped);
}

#[test]
fn dropping_running_clock_stops_scheduler() {
    let finished = execute_or_abandon(|| {
        let clock = PrecisionClock::new().unwrap();
        clock.start();
        clock.sleep_ns(100_000);
        drop(clock);
    });

    assert!(finished.is_some());
}

#[test]
fn time_is_monotonic_across_threads() {
    let clock = Arc::new(PrecisionClock::new().unwrap());
    let base = clock.system_base_time_ns();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let clock = Arc::clone(&clock);
            thread::spawn(move || {
                let mut previous = clock.current_time_ns();
                for _ in 0..10_000 {
                    let now = clock.current_time_ns();
                    assert!(now >= previous);
                    previous = now;
                }
                previous
            })
        })
        .collect();

    for reader in readers {
        let last = reader.join().unwrap();
        assert!(last >= 0);
        assert!(clock.current_time_ns() >= last);
    }

    assert_eq!(clock.system_base_time_ns(), base);
}

#[test]
fn timelines_agree() {
    let clock = PrecisionClock::new().unwrap();
    thread::sleep(Duration::from_millis(1));

    let current = clock.current_time_ns();
    let derived = clock.system_time_ns() - clock.system_base_time_ns();

    assert!(current >= 1_000_000);
    assert!(derived >= current);
}

#[test]
fn clocks_are_independent() {
    let first = Arc::new(PrecisionClock::new().unwrap());
    let second = PrecisionClock::new().unwrap();
    first.start();
    second.start();

    second.stop();

    let elapsed = execute_or_abandon({
        let first = Arc::clone(&first);
        move || {
            let stopwatch = first.stopwatch();
            first.sleep_ns(1_000_000);
            stopwatch.elapsed()
        }
    })
    .unwrap();

    assert!(first.is_running());
    assert!(elapsed >= Duration::from_millis(1));
}
