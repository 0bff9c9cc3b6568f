// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![expect(missing_docs, reason = "Benchmark code")]

//! Benchmark to assess the overhead of the sleep paths. The scenario:
//! * Read the monotonic counter
//! * Sleep for zero nanoseconds on a clock without a scheduler (direct wait)
//! * Sleep for zero nanoseconds on a clock with a running scheduler (coalesced wait)
//!
//! A coalesced zero-length sleep is released at the next period boundary, so its cost is
//! dominated by the scheduler period rather than by the queueing itself.

use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use precision_clock::{PrecisionClock, WaitMode};

fn criterion_benchmark(c: &mut Criterion) {
    time(c);
    sleep(c);
}

fn time(c: &mut Criterion) {
    let mut group = c.benchmark_group("time");
    let clock = PrecisionClock::new().expect("platform counter ticks once per nanosecond");

    group.bench_function("current_time_ns", |b| b.iter(|| clock.current_time_ns()));
    group.bench_function("system_time_ns", |b| b.iter(|| clock.system_time_ns()));

    group.finish();
}

fn sleep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sleep_zero");

    let direct = PrecisionClock::builder()
        .with_wait_mode(WaitMode::Direct)
        .build()
        .expect("platform counter ticks once per nanosecond");
    group.bench_function("direct", |b| b.iter(|| direct.sleep_ns(0)));

    let coalesced = PrecisionClock::builder()
        .with_period(Duration::from_micros(100))
        .with_computation(Duration::from_micros(20))
        .with_constraint(Duration::from_micros(50))
        .build()
        .expect("platform counter ticks once per nanosecond");
    coalesced.start();
    group.bench_function("coalesced", |b| b.iter(|| coalesced.sleep_ns(0)));
    coalesced.stop();

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = criterion_benchmark
}

criterion_main!(benches);
