//! Time source used to stamp records for merge tiebreaking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A narrow time source. Only `now` is required, which keeps this a
/// single dynamic-dispatch seam rather than a trait hierarchy.
pub trait Clock: Send + Sync {
    /// Returns a monotonically-increasing-in-practice timestamp.
    fn now(&self) -> u64;
}

/// Wall-clock `Clock` backed by nanoseconds since the Unix epoch.
#[derive(Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a new `SystemClock`.
    pub fn new() -> Self {
        SystemClock
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_nanos() as u64
    }
}

/// A deterministic clock for tests. Starts at 0 and only advances when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    /// Creates a `ManualClock` starting at 0.
    pub fn new() -> Self {
        ManualClock {
            ticks: AtomicU64::new(0),
        }
    }

    /// Sets the clock to an explicit value.
    pub fn set(&self, value: u64) {
        self.ticks.store(value, Ordering::SeqCst);
    }

    /// Advances the clock by `delta` and returns the new value.
    pub fn advance(&self, delta: u64) -> u64 {
        self.ticks.fetch_add(delta, Ordering::SeqCst) + delta
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::SeqCst)
    }
}
