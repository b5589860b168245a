//! Human-readable status reports.
//!
//! These render the same three views the original system exposed as
//! read-only text files: a per-owner status table, the engine configuration,
//! and the runtime state with its psi ratio. Probabilities print in the
//! fixed-point `0.NNNNNN` form regardless of locale or float formatting.

use std::fmt::Write as _;

use crate::config::EngineConfig;
use crate::engine::TernaryEngine;
use crate::trit::{TritState, PPM_SCALE};

/// Formats a ppm value as a fixed-point probability (`0.500000`, `1.000000`).
#[must_use]
pub fn format_ppm(ppm: u32) -> String {
    if ppm >= PPM_SCALE {
        "1.000000".to_string()
    } else {
        format!("0.{ppm:06}")
    }
}

fn state_label(state: TritState) -> &'static str {
    match state {
        TritState::Zero => "ZERO(0)",
        TritState::Psi => "PSI(psi)",
        TritState::One => "ONE(1)",
    }
}

/// Renders the per-owner status table.
#[must_use]
pub fn status_report(engine: &TernaryEngine) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Ternary Engine Status");
    let _ = writeln!(out, "=====================");
    let _ = writeln!(
        out,
        "Psi-Delta: {}\n",
        format_ppm(engine.config().psi_delta)
    );
    let _ = writeln!(
        out,
        "{:<12} {:<10} {:<10} {:<6} {:<8} {:<12}",
        "OWNER", "STATE", "PSI_VALUE", "CONF", "DEFERS", "TRANSITIONS"
    );

    for row in engine.owner_status() {
        let _ = writeln!(
            out,
            "{:<12} {:<10} {:<10} {:<6} {:<8} {:<12}",
            row.owner,
            state_label(row.trit.state()),
            format_ppm(row.trit.probability()),
            row.trit.confidence(),
            row.trit.defer_count(),
            row.transitions
        );
    }
    out
}

/// Renders the configuration as `key=value` lines.
#[must_use]
pub fn config_report(config: &EngineConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Ternary Engine Configuration");
    let _ = writeln!(out, "psi_threshold={}", format_ppm(config.psi_threshold));
    let _ = writeln!(out, "psi_delta={}", format_ppm(config.psi_delta));
    let _ = writeln!(
        out,
        "delta_min={}",
        format_ppm(crate::config::PSI_DELTA_MIN_PPM)
    );
    let _ = writeln!(
        out,
        "delta_max={}",
        format_ppm(crate::config::PSI_DELTA_MAX_PPM)
    );
    let _ = writeln!(out, "backoff_ns={}", config.backoff.as_nanos());
    let _ = writeln!(out, "queue_capacity={}", config.queue_capacity);
    out
}

/// Renders the runtime counters as `key=value` lines, psi ratio first.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn state_report(engine: &TernaryEngine) -> String {
    let snap = engine.stats();
    let ratio_ppm = (snap.psi_ratio * f64::from(PPM_SCALE)).round() as u32;

    let mut out = String::new();
    let _ = writeln!(out, "# Ternary Engine Runtime State");
    let _ = writeln!(out, "psi_ratio={}", format_ppm(ratio_ppm));
    let _ = writeln!(out, "decisions_committed={}", snap.decisions_total);
    let _ = writeln!(out, "psi_deferrals={}", snap.deferrals_total);
    let _ = writeln!(out, "immediate_decisions={}", snap.immediate_total);
    let _ = writeln!(out, "psi_resolutions={}", snap.resolutions_total);
    out
}
