// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use crate::sys;

/// The ratio between one tick of a monotonic counter and one nanosecond.
///
/// One tick lasts `numer / denom` nanoseconds. The clock only runs on platforms where this
/// ratio is exactly 1:1.
///
/// # Examples
///
/// ```
/// use precision_clock::Timebase;
///
/// assert!(Timebase::NANOSECOND.is_nanosecond());
/// assert!(!Timebase::new(1, 2).is_nanosecond());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    numer: u32,
    denom: u32,
}

impl Timebase {
    /// A timebase in which one tick is exactly one nanosecond.
    pub const NANOSECOND: Self = Self::new(1, 1);

    /// Creates a timebase in which one tick lasts `numer / denom` nanoseconds.
    #[must_use]
    pub const fn new(numer: u32, denom: u32) -> Self {
        Self { numer, denom }
    }

    /// Discovers the timebase of the monotonic counter used on this platform.
    #[must_use]
    pub fn platform() -> Self {
        sys::timebase()
    }

    /// Numerator of the ratio.
    #[must_use]
    pub const fn numer(&self) -> u32 {
        self.numer
    }

    /// Denominator of the ratio.
    #[must_use]
    pub const fn denom(&self) -> u32 {
        self.denom
    }

    /// Returns `true` if one tick lasts exactly one nanosecond.
    ///
    /// A zero numerator or denominator never describes a usable counter.
    #[must_use]
    pub const fn is_nanosecond(&self) -> bool {
        self.numer != 0 && self.numer == self.denom
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ns per tick", self.numer, self.denom)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1, 1, true)]
    #[case(125, 125, true)]
    #[case(1, 2, false)]
    #[case(125, 3, false)]
    #[case(0, 0, false)]
    fn is_nanosecond(#[case] numer: u32, #[case] denom: u32, #[case] expected: bool) {
        assert_eq!(Timebase::new(numer, denom).is_nanosecond(), expected);
    }

    #[test]
    fn platform_ticks_in_nanoseconds() {
        assert!(Timebase::platform().is_nanosecond());
    }

    #[test]
    fn display() {
        assert_eq!(Timebase::new(3, 2).to_string(), "3/2 ns per tick");
    }
}
