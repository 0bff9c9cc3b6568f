// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Platform primitives behind the clock: the monotonic counter, absolute-deadline waits,
//! binary semaphores and admission to the real-time scheduling class.
//!
//! Every backend exposes the same free functions and a `Semaphore` type. Ticks are always
//! nanoseconds on a monotonic timeline shared by `monotonic_now` and `wait_until`.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub(crate) use linux::*;

#[cfg(not(target_os = "linux"))]
mod fallback;
#[cfg(not(target_os = "linux"))]
pub(crate) use fallback::*;

/// Budgets requested for the scheduler thread, all in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RealTimeBudget {
    pub period: u64,
    pub computation: u64,
    pub constraint: u64,
}
