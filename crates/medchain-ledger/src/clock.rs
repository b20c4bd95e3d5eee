//! Wall-clock source for block timestamps.

use std::sync::atomic::{AtomicI64, Ordering};

use medchain_core::Timestamp;

/// Source of append-time timestamps.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Each reading advances the clock by `step` milliseconds after returning,
/// so consecutive appends get distinct, predictable timestamps.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
    step: i64,
}

impl ManualClock {
    /// Start at `start` milliseconds, advancing by `step` per reading.
    pub fn new(start: i64, step: i64) -> Self {
        Self {
            millis: AtomicI64::new(start),
            step,
        }
    }

    /// Jump to an absolute time (the clock may go backwards).
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.fetch_add(self.step, Ordering::SeqCst))
    }
}
