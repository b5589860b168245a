use std::sync::Arc;

use trivalent::{DecisionStats, PsiResolver, Trit, TritState, PPM_SCALE};

/// Resolves one psi value `n` times and returns the fraction deciding One.
fn one_fraction(probability: u32, n: u32) -> f64 {
    let stats = Arc::new(DecisionStats::new());
    let resolver = PsiResolver::new(Arc::clone(&stats));
    let psi = Trit::psi_with(probability, 0);

    let mut ones = 0u32;
    for _ in 0..n {
        if resolver.resolve(psi, 0).state() == TritState::One {
            ones += 1;
        }
    }
    assert_eq!(stats.snapshot().resolutions_total, u64::from(n));
    f64::from(ones) / f64::from(n)
}

#[test]
fn resolution_frequency_tracks_probability() {
    const N: u32 = 100_000;
    // +/- 1% band at N = 100_000 is ~6 sigma for p = 0.5; flakes are
    // effectively impossible.
    for &(ppm, expected) in &[
        (250_000u32, 0.25f64),
        (500_000, 0.50),
        (750_000, 0.75),
    ] {
        let fraction = one_fraction(ppm, N);
        assert!(
            (fraction - expected).abs() < 0.01,
            "p={expected}: observed {fraction}"
        );
    }
}

#[test]
fn degenerate_probabilities_are_deterministic() {
    // p = 0 can never draw a sample below it; p = 1.0 always does, because
    // samples are reduced modulo the scale and stay strictly below it.
    assert!((one_fraction(0, 1_000) - 0.0).abs() < f64::EPSILON);
    assert!((one_fraction(PPM_SCALE, 1_000) - 1.0).abs() < f64::EPSILON);
}
