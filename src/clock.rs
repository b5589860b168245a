//! Monotonic time sources.
//!
//! The engine stamps every value mutation with a logical timestamp and orders
//! deferred entries by absolute due time. Both come from a [`Clock`], which is
//! injectable so tests can drive time by hand instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Logical time in nanoseconds since an arbitrary (per-clock) origin.
///
/// Timestamps are only comparable against the clock instance that produced
/// them; they are never wall-clock times.
pub type Timestamp = u64;

/// A monotonic time source.
pub trait Clock: Send + Sync {
    /// Returns the current logical time. Must never decrease.
    fn now(&self) -> Timestamp;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Production clock backed by [`Instant`], anchored at construction.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose origin is the moment of construction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(Timestamp::MAX)
    }
}

/// Hand-driven clock for tests.
///
/// Shared via `Arc` so a test can hold one handle while the engine holds
/// another and advance time between operations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock starting at time 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock starting at the given time.
    #[must_use]
    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Sets the current time. Ignores attempts to move backwards.
    pub fn set(&self, now: Timestamp) {
        self.now.fetch_max(now, Ordering::SeqCst);
    }

    /// Advances the current time by `delta` nanoseconds.
    pub fn advance(&self, delta: u64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
