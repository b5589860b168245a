//! Engine configuration.
//!
//! All probability-domain parameters are in parts per million. Out-of-range
//! values are clamped to the nearest valid bound rather than rejected; the
//! engine never refuses to start over a bad parameter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::trit::{PPM_SCALE, PSI_DEFAULT_PPM};

/// Smallest accepted psi delta (0.01).
pub const PSI_DELTA_MIN_PPM: u32 = 10_000;

/// Largest accepted psi delta (0.25).
pub const PSI_DELTA_MAX_PPM: u32 = 250_000;

/// Default psi delta (0.05).
pub const PSI_DELTA_DEFAULT_PPM: u32 = 50_000;

/// Default priority for deferred entries.
pub const DEFAULT_PRIORITY: u32 = 50;

/// Tunables for a [`crate::TernaryEngine`] instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Uncertainty band around the psi threshold, ppm. Reported to callers;
    /// the resolver itself uses only the per-value probability.
    pub psi_delta: u32,

    /// Resolution threshold theta, ppm.
    pub psi_threshold: u32,

    /// Fixed re-arm interval applied when a re-evaluation still comes back
    /// undecided. Every extension uses this same interval.
    pub backoff: Duration,

    /// Maximum outstanding deferred entries.
    pub queue_capacity: usize,

    /// Interval between automatic `tick`s when a ticker is attached.
    pub tick_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            psi_delta: PSI_DELTA_DEFAULT_PPM,
            psi_threshold: PSI_DEFAULT_PPM,
            backoff: Duration::from_millis(1),
            queue_capacity: 4096,
            tick_interval: Duration::from_millis(10),
        }
    }
}

impl EngineConfig {
    /// Returns a copy with every parameter clamped to its valid range.
    ///
    /// Clamped fields are logged at debug level so misconfiguration is
    /// visible without failing the caller.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        let delta = self.psi_delta.clamp(PSI_DELTA_MIN_PPM, PSI_DELTA_MAX_PPM);
        if delta != self.psi_delta {
            tracing::debug!(
                requested = self.psi_delta,
                clamped = delta,
                "psi_delta out of range, clamping"
            );
            self.psi_delta = delta;
        }

        if self.psi_threshold > PPM_SCALE {
            tracing::debug!(
                requested = self.psi_threshold,
                clamped = PPM_SCALE,
                "psi_threshold out of range, clamping"
            );
            self.psi_threshold = PPM_SCALE;
        }

        if self.queue_capacity == 0 {
            tracing::debug!("queue_capacity of 0 raised to 1");
            self.queue_capacity = 1;
        }

        if self.backoff.is_zero() {
            tracing::debug!("zero backoff raised to 1ms");
            self.backoff = Duration::from_millis(1);
        }

        if self.tick_interval.is_zero() {
            tracing::debug!("zero tick_interval raised to 1ms");
            self.tick_interval = Duration::from_millis(1);
        }

        self
    }
}
