// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cell::UnsafeCell;
use std::{fmt, io, mem, ptr};

use tracing::error;

use super::RealTimeBudget;
use crate::Timebase;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// `CLOCK_MONOTONIC` reports whole nanoseconds.
pub(crate) const fn timebase() -> Timebase {
    Timebase::NANOSECOND
}

pub(crate) fn monotonic_now() -> u64 {
    // SAFETY: An all-zero timespec is a valid value.
    let mut ts: libc::timespec = unsafe { mem::zeroed() };

    // SAFETY: `ts` is a valid, exclusively borrowed timespec. CLOCK_MONOTONIC is always
    // available on Linux, so the call cannot fail.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &raw mut ts);
    }

    let secs = u64::try_from(ts.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(ts.tv_nsec).unwrap_or(0);
    secs.saturating_mul(NANOS_PER_SEC).saturating_add(nanos)
}

/// Blocks the calling thread until the monotonic clock reaches `deadline`.
///
/// Uses an absolute-deadline wait so that repeated waits do not accumulate drift.
pub(crate) fn wait_until(deadline: u64) -> io::Result<()> {
    // SAFETY: An all-zero timespec is a valid value.
    let mut ts: libc::timespec = unsafe { mem::zeroed() };
    ts.tv_sec = libc::time_t::try_from(deadline / NANOS_PER_SEC).unwrap_or(libc::time_t::MAX);
    ts.tv_nsec = libc::c_long::try_from(deadline % NANOS_PER_SEC).unwrap_or(0);

    loop {
        // SAFETY: `ts` outlives the call. The remainder pointer may be null for absolute waits.
        let status =
            unsafe { libc::clock_nanosleep(libc::CLOCK_MONOTONIC, libc::TIMER_ABSTIME, &raw const ts, ptr::null_mut()) };

        match status {
            0 => return Ok(()),
            // An absolute wait can simply be resumed after a signal handler ran.
            libc::EINTR => {}
            errno => return Err(io::Error::from_raw_os_error(errno)),
        }
    }
}

/// Policy number of `SCHED_DEADLINE`, not exported by `libc`.
const SCHED_DEADLINE: u32 = 6;

/// Mirror of the kernel's `struct sched_attr`.
#[repr(C)]
struct SchedAttr {
    size: u32,
    sched_policy: u32,
    sched_flags: u64,
    sched_nice: i32,
    sched_priority: u32,
    sched_runtime: u64,
    sched_deadline: u64,
    sched_period: u64,
}

#[expect(clippy::cast_possible_truncation, reason = "the structure is 48 bytes")]
const SCHED_ATTR_SIZE: u32 = mem::size_of::<SchedAttr>() as u32;

/// Moves the calling thread into the `SCHED_DEADLINE` class with the given budget.
///
/// Usually requires `CAP_SYS_NICE`; without it the kernel answers `EPERM`.
pub(crate) fn set_realtime(budget: RealTimeBudget) -> io::Result<()> {
    let attr = SchedAttr {
        size: SCHED_ATTR_SIZE,
        sched_policy: SCHED_DEADLINE,
        sched_flags: 0,
        sched_nice: 0,
        sched_priority: 0,
        sched_runtime: budget.computation,
        sched_deadline: budget.constraint,
        sched_period: budget.period,
    };

    // SAFETY: pid 0 targets the calling thread, `attr` is a correctly sized sched_attr that
    // outlives the call and the flags argument must be zero.
    let status = unsafe { libc::syscall(libc::SYS_sched_setattr, 0_i32, ptr::from_ref(&attr), 0_u32) };

    if status == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
}

/// An unnamed, process-private POSIX semaphore.
pub(crate) struct Semaphore {
    // Boxed because a sem_t must not move once initialized.
    raw: Box<UnsafeCell<libc::sem_t>>,
}

// SAFETY: POSIX semaphores are designed to be operated on concurrently from any thread.
unsafe impl Send for Semaphore {}
// SAFETY: See above.
unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub fn new() -> io::Result<Self> {
        // SAFETY: sem_t is plain data. The zeroed value is never used before sem_init below.
        let raw = Box::new(UnsafeCell::new(unsafe { mem::zeroed::<libc::sem_t>() }));

        // SAFETY: The pointer is valid and stable for the lifetime of the box. A zero `pshared`
        // keeps the semaphore private to this process and the initial count is zero.
        if unsafe { libc::sem_init(raw.get(), 0, 0) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { raw })
    }

    pub fn post(&self) -> io::Result<()> {
        // SAFETY: The semaphore was initialized in `new` and is destroyed only on drop.
        if unsafe { libc::sem_post(self.raw.get()) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    pub fn wait(&self) -> io::Result<()> {
        loop {
            // SAFETY: The semaphore was initialized in `new` and is destroyed only on drop.
            if unsafe { libc::sem_wait(self.raw.get()) } == 0 {
                return Ok(());
            }

            let error = io::Error::last_os_error();
            if error.kind() != io::ErrorKind::Interrupted {
                return Err(error);
            }
        }
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // SAFETY: We have exclusive access, so no thread can be blocked on the semaphore.
        if unsafe { libc::sem_destroy(self.raw.get()) } != 0 {
            error!(error = %io::Error::last_os_error(), "failed to destroy wait handle semaphore");
        }
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore").finish_non_exhaustive()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sched_attr_matches_kernel_layout() {
        assert_eq!(SCHED_ATTR_SIZE, 48);
    }

    #[test]
    fn set_realtime_rejects_inconsistent_budget() {
        // The kernel refuses runtime > deadline regardless of privileges.
        let budget = RealTimeBudget {
            period: 100_000,
            computation: 200_000,
            constraint: 100_000,
        };

        set_realtime(budget).unwrap_err();
    }
}
