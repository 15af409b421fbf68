//! Millisecond timestamps and the time port.
//!
//! All deadline arithmetic goes through [`Timestamp`] so tests can drive
//! the clock via a controllable [`TimeSource`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since the UNIX epoch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Construct from milliseconds since epoch.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Milliseconds since epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Seconds since epoch (truncating).
    pub fn as_secs(&self) -> u64 {
        self.0 / 1_000
    }

    /// Saturating addition of a millisecond offset.
    pub fn plus_millis(&self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// Saturating subtraction of a millisecond offset.
    pub fn minus_millis(&self, ms: u64) -> Self {
        Self(self.0.saturating_sub(ms))
    }

    /// Absolute difference in milliseconds.
    pub fn abs_diff(&self, other: Timestamp) -> u64 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current timestamp in milliseconds since epoch.
    fn now(&self) -> Timestamp;
}

/// Default time source using system time.
#[derive(Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp::from_millis(ms)
    }
}
