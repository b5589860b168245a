//! Process-wide decision counters.
//!
//! Statistics are lock-free: every mutation is a single atomic increment, so
//! the algebra, resolver, and queue can record events without touching the
//! engine lock. Counters only ever grow; they are never rolled back when an
//! operation fails, so a deferral that could not be enqueued is simply never
//! counted.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic decision counters shared by the engine's components.
#[derive(Debug, Default)]
pub struct DecisionStats {
    decisions_total: AtomicU64,
    deferrals_total: AtomicU64,
    immediate_total: AtomicU64,
    resolutions_total: AtomicU64,
}

impl DecisionStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one evaluated decision.
    pub fn record_decision(&self) {
        self.decisions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one deferral actually queued.
    pub fn record_deferral(&self) {
        self.deferrals_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one decision that completed without deferring.
    pub fn record_immediate(&self) {
        self.immediate_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one probabilistic resolution.
    pub fn record_resolution(&self) {
        self.resolutions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot of all counters.
    ///
    /// The counters are read independently, so a snapshot taken under
    /// concurrent mutation is approximate across fields but each field is a
    /// value the counter actually held.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let decisions_total = self.decisions_total.load(Ordering::Relaxed);
        let deferrals_total = self.deferrals_total.load(Ordering::Relaxed);
        StatsSnapshot {
            decisions_total,
            deferrals_total,
            immediate_total: self.immediate_total.load(Ordering::Relaxed),
            resolutions_total: self.resolutions_total.load(Ordering::Relaxed),
            psi_ratio: psi_ratio(decisions_total, deferrals_total),
            captured_at: Utc::now(),
        }
    }
}

/// `deferrals / (decisions + deferrals)`, 0 when nothing has happened yet.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn psi_ratio(decisions_total: u64, deferrals_total: u64) -> f64 {
    let total = decisions_total + deferrals_total;
    if total == 0 {
        0.0
    } else {
        deferrals_total as f64 / total as f64
    }
}

/// Read-only view of the counters.
///
/// # Examples
///
/// ```
/// use trivalent::DecisionStats;
///
/// let stats = DecisionStats::new();
/// stats.record_decision();
/// stats.record_deferral();
///
/// let snap = stats.snapshot();
/// assert_eq!(snap.decisions_total, 1);
/// assert_eq!(snap.deferrals_total, 1);
/// assert!((snap.psi_ratio - 0.5).abs() < f64::EPSILON);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Decisions evaluated.
    pub decisions_total: u64,
    /// Deferrals actually queued.
    pub deferrals_total: u64,
    /// Decisions completed without deferring.
    pub immediate_total: u64,
    /// Probabilistic resolutions performed.
    pub resolutions_total: u64,
    /// `deferrals / (decisions + deferrals)` at snapshot time.
    pub psi_ratio: f64,
    /// Wall-clock capture time of this snapshot.
    pub captured_at: DateTime<Utc>,
}
