// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! This example demonstrates the basic usage of precision_clock APIs.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use precision_clock::{PrecisionClock, Stopwatch};

fn main() -> Result<(), precision_clock::Error> {
    // Print scheduler warnings, such as a denied real-time request, to the terminal.
    tracing_subscriber::fmt().with_thread_names(true).init();

    // Create a clock with a 500us scheduler period and start its scheduler thread.
    let clock = PrecisionClock::builder()
        .with_period(Duration::from_micros(500))
        .with_computation(Duration::from_micros(100))
        .with_constraint(Duration::from_micros(250))
        .build()?;
    clock.start();

    println!("Scheduler state: {:?}", clock.state());
    println!("Base time: {}ns", clock.system_base_time_ns());

    // Sleep for 10ms and measure how long it actually took.
    let stopwatch = Stopwatch::new(&clock);
    clock.sleep_ns(10_000_000);
    println!("Slept for: {}ns", stopwatch.elapsed_ns());

    // Many threads sleeping at once are released together by the scheduler thread.
    let clock = Arc::new(clock);
    let sleepers: Vec<_> = (1..=4_i64)
        .map(|i| {
            let clock = Arc::clone(&clock);
            thread::spawn(move || {
                let target = clock.current_time_ns() + i * 1_000_000;
                clock.sleep_until_ns(target);
                clock.current_time_ns() - target
            })
        })
        .collect();

    for (i, sleeper) in sleepers.into_iter().enumerate() {
        match sleeper.join() {
            Ok(lateness) => println!("Sleeper {i} woke up {lateness}ns after its target"),
            Err(_) => println!("Sleeper {i} panicked"),
        }
    }

    clock.stop();
    println!("Scheduler state: {:?}", clock.state());

    Ok(())
}
