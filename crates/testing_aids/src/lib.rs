// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An unpublished crate containing testing utilities for use within this repo.

use std::sync::mpsc;
use std::time::{Duration, Instant};
use std::{env, thread};

mod log;

pub use log::*;

/// If something (whatever) does not happen in a test within this time, the test will fail.
///
/// We are conservative here and allow much time. This is only to break out of sleeps that are
/// never released, not for any situations that are actually expected.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[must_use]
pub fn is_mutation_testing() -> bool {
    env::var("MUTATION_TESTING").as_deref() == Ok("1")
}

/// Executes a thread-safe function on a background thread and abandons it if
/// it does not complete before [`TEST_TIMEOUT`].
///
/// Returns `None` if the function panicked or timed out.
#[cfg_attr(test, mutants::skip)] // This is test logic - pointless to mutate.
#[must_use]
pub fn execute_or_abandon<F, R>(f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    execute_with_timeout(TEST_TIMEOUT, f)
}

/// Executes a thread-safe function on a background thread and abandons it if
/// it does not complete within `timeout`.
///
/// Unlike [`execute_or_abandon()`], the timeout is honored under mutation testing, because
/// callers use it to assert that something does *not* complete.
#[cfg_attr(test, mutants::skip)] // This is test logic - pointless to mutate.
#[must_use]
pub fn execute_with_timeout<F, R>(timeout: Duration, f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if timeout == TEST_TIMEOUT && is_mutation_testing() {
        // Test timeouts are disabled under mutation testing - we want them to result in
        // actual "timeout" mutation test results.
        return Some(f());
    }

    let (sender, receiver) = mpsc::channel();

    // If the function panics, the sender is dropped and recv_timeout reports a broken channel.
    // If it never finishes, the thread is leaked.
    thread::spawn(move || {
        // The receiver is gone once we stopped waiting.
        let _ = sender.send(f());
    });

    receiver.recv_timeout(timeout).ok()
}

/// Polls `condition` until it holds or [`TEST_TIMEOUT`] elapses.
///
/// Returns whether the condition was eventually observed.
#[cfg_attr(test, mutants::skip)] // This is test logic - pointless to mutate.
#[must_use]
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let give_up = Instant::now() + TEST_TIMEOUT;

    while Instant::now() < give_up {
        if condition() {
            return true;
        }

        thread::sleep(Duration::from_millis(1));
    }

    condition()
}
