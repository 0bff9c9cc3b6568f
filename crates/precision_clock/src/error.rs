// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

use crate::Timebase;

/// The result type for fallible operations that use the [`Error`][enum@Error] type of this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that prevents a [`PrecisionClock`][crate::PrecisionClock] from being constructed.
///
/// Errors are only ever reported at construction time. Once a clock exists, failures of the
/// underlying kernel primitives are logged and the affected operation degrades instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The platform's monotonic counter does not tick exactly once per nanosecond.
    ///
    /// Converting between tick rates would put arithmetic on the hot path of every
    /// timing call, so such platforms are refused instead.
    #[error("unsupported platform: one monotonic tick lasts {numer}/{denom} ns, expected exactly 1 ns")]
    UnsupportedPlatform {
        /// Numerator of the platform timebase.
        numer: u32,
        /// Denominator of the platform timebase.
        denom: u32,
    },

    /// The caller supplied real-time parameters that cannot be honored.
    #[error("invalid clock configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    pub(crate) const fn unsupported_platform(timebase: Timebase) -> Self {
        Self::UnsupportedPlatform {
            numer: timebase.numer(),
            denom: timebase.denom(),
        }
    }

    pub(crate) fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}
