use std::ops::{Add, Sub};
use std::time::{Duration, Instant};

/// A duration in milliseconds, relative to an adapter-private epoch.
///
/// Grounded on `script_traits::MsDuration` (a `euclid::Length<u64, Ms>`
/// wrapper in the teacher); reimplemented here as a plain newtype since
/// this bridge has no geometry crate to borrow the unit-typing from.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct MsDuration(u64);

impl MsDuration {
    pub const fn new(ms: u64) -> Self {
        MsDuration(ms)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn saturating_sub(self, other: MsDuration) -> MsDuration {
        MsDuration(self.0.saturating_sub(other.0))
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl Add for MsDuration {
    type Output = MsDuration;
    fn add(self, rhs: MsDuration) -> MsDuration {
        MsDuration(self.0 + rhs.0)
    }
}

impl Sub for MsDuration {
    type Output = MsDuration;
    fn sub(self, rhs: MsDuration) -> MsDuration {
        MsDuration(self.0 - rhs.0)
    }
}

/// Monotonic milliseconds since an arbitrary but fixed epoch, captured once
/// per process so that `MsDuration` arithmetic never observes clock skew.
pub fn precise_time_ms(origin: Instant) -> MsDuration {
    MsDuration(origin.elapsed().as_millis() as u64)
}
