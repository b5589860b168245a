//! The ternary value type.
//!
//! A [`Trit`] is a three-state value: definitely false (`Zero`), definitely
//! true (`One`), or probabilistically undecided (`Psi`). A `Psi` value carries
//! the probability that it will eventually resolve to `One`, stored in parts
//! per million. Decided values pin their probability to the matching bound, so
//! the probability field is always consistent with the state.
//!
//! Trits are plain `Copy` values: they are passed by value everywhere and
//! never shared by reference, so there are no aliasing hazards to manage.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Probability scale: probabilities are stored as parts per million.
pub const PPM_SCALE: u32 = 1_000_000;

/// Default probability for a fresh undecided value (0.5).
pub const PSI_DEFAULT_PPM: u32 = 500_000;

/// Confidence assigned to a freshly produced value.
pub const CONFIDENCE_MAX: u8 = 100;

/// Confidence lost each time a value is deferred without deciding.
pub const CONFIDENCE_DECAY: u8 = 10;

/// The three ternary states.
///
/// The discriminants follow the original on-wire encoding: `Zero = 0`,
/// `Psi = 1`, `One = 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TritState {
    /// Definitely false.
    Zero = 0,
    /// Undecided; carries a probability of resolving to `One`.
    Psi = 1,
    /// Definitely true.
    One = 2,
}

impl TritState {
    /// Returns true for `Zero` and `One`.
    #[must_use]
    pub const fn is_decided(self) -> bool {
        !matches!(self, Self::Psi)
    }
}

impl fmt::Display for TritState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => write!(f, "0"),
            Self::Psi => write!(f, "psi"),
            Self::One => write!(f, "1"),
        }
    }
}

/// A ternary value with its probability annotation and bookkeeping.
///
/// # Invariants
///
/// - `state == Zero` implies `probability == 0`.
/// - `state == One` implies `probability == PPM_SCALE`.
/// - Only `Psi` carries an interior probability.
/// - `defer_count` never decreases for a given value lineage.
///
/// All constructors and mutators preserve these; the fields are private so
/// they cannot be broken from outside.
///
/// # Examples
///
/// ```
/// use trivalent::{Trit, TritState};
///
/// let t = Trit::psi_with(750_000, 0);
/// assert_eq!(t.state(), TritState::Psi);
/// assert_eq!(t.probability(), 750_000);
///
/// let f = Trit::zero(0);
/// assert!(f.state().is_decided());
/// assert_eq!(f.probability(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trit {
    state: TritState,
    /// P(resolves to One), parts per million.
    probability: u32,
    /// Producer certainty, 0..=100.
    confidence: u8,
    /// Times this value has been deferred without deciding.
    defer_count: u32,
    /// Logical time of last mutation.
    timestamp: Timestamp,
}

/// Pins a probability to the bound its state requires.
const fn pinned_probability(state: TritState, probability: u32) -> u32 {
    match state {
        TritState::Zero => 0,
        TritState::One => PPM_SCALE,
        TritState::Psi => {
            if probability > PPM_SCALE {
                PPM_SCALE
            } else {
                probability
            }
        }
    }
}

impl Trit {
    /// Creates a decided-false value.
    #[must_use]
    pub const fn zero(now: Timestamp) -> Self {
        Self {
            state: TritState::Zero,
            probability: 0,
            confidence: CONFIDENCE_MAX,
            defer_count: 0,
            timestamp: now,
        }
    }

    /// Creates a decided-true value.
    #[must_use]
    pub const fn one(now: Timestamp) -> Self {
        Self {
            state: TritState::One,
            probability: PPM_SCALE,
            confidence: CONFIDENCE_MAX,
            defer_count: 0,
            timestamp: now,
        }
    }

    /// Creates an undecided value with the default 0.5 probability.
    #[must_use]
    pub const fn psi(now: Timestamp) -> Self {
        Self::psi_with(PSI_DEFAULT_PPM, now)
    }

    /// Creates an undecided value with an explicit probability (ppm).
    ///
    /// Values above [`PPM_SCALE`] are clamped, never rejected.
    #[must_use]
    pub const fn psi_with(probability: u32, now: Timestamp) -> Self {
        Self {
            state: TritState::Psi,
            probability: pinned_probability(TritState::Psi, probability),
            confidence: CONFIDENCE_MAX,
            defer_count: 0,
            timestamp: now,
        }
    }

    /// Creates a fresh value in the given state.
    #[must_use]
    pub const fn from_state(state: TritState, now: Timestamp) -> Self {
        match state {
            TritState::Zero => Self::zero(now),
            TritState::One => Self::one(now),
            TritState::Psi => Self::psi(now),
        }
    }

    /// Builds an operator result, carrying bookkeeping from the inputs.
    ///
    /// Operator results get fresh confidence and the larger of the inputs'
    /// defer counts; the probability is pinned per the state invariant.
    #[must_use]
    pub(crate) const fn op_result(
        state: TritState,
        probability: u32,
        defer_count: u32,
        now: Timestamp,
    ) -> Self {
        Self {
            state,
            probability: pinned_probability(state, probability),
            confidence: CONFIDENCE_MAX,
            defer_count,
            timestamp: now,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TritState {
        self.state
    }

    /// P(resolves to One) in parts per million.
    ///
    /// Meaningful while undecided; pinned to `0` / [`PPM_SCALE`] once decided.
    #[must_use]
    pub const fn probability(&self) -> u32 {
        self.probability
    }

    /// Producer certainty, 0..=100. Decays with each deferral.
    #[must_use]
    pub const fn confidence(&self) -> u8 {
        self.confidence
    }

    /// Number of times this value has been deferred without deciding.
    #[must_use]
    pub const fn defer_count(&self) -> u32 {
        self.defer_count
    }

    /// Logical time of the last mutation.
    #[must_use]
    pub const fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Returns true if the value is `Zero` or `One`.
    #[must_use]
    pub const fn is_decided(&self) -> bool {
        self.state.is_decided()
    }

    /// Collapses this value into a decided state.
    ///
    /// The probability is saturated (`One`) or zeroed (`Zero`); confidence and
    /// defer count carry over so the decision's history stays auditable.
    #[must_use]
    pub(crate) const fn decided_as(self, state: TritState, now: Timestamp) -> Self {
        Self {
            state,
            probability: pinned_probability(state, self.probability),
            confidence: self.confidence,
            defer_count: self.defer_count,
            timestamp: now,
        }
    }

    /// Perturbs the probability and re-enters the undecided state.
    ///
    /// This is the only way a resolved value becomes `Psi` again. The delta is
    /// in signed ppm and the result is clamped to `[0, PPM_SCALE]`; confidence
    /// resets to full because this is a fresh assignment.
    pub fn adjust(&mut self, delta: i64, now: Timestamp) {
        let base = i64::from(self.probability);
        let shifted = (base + delta).clamp(0, i64::from(PPM_SCALE));
        // Clamp keeps the value inside u32 range.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let probability = shifted as u32;

        self.state = TritState::Psi;
        self.probability = probability;
        self.confidence = CONFIDENCE_MAX;
        self.timestamp = now;
    }

    /// Records one more deferral: bumps the defer count, decays confidence.
    pub(crate) fn mark_deferred(&mut self, now: Timestamp) {
        self.defer_count = self.defer_count.saturating_add(1);
        self.confidence = self.confidence.saturating_sub(CONFIDENCE_DECAY);
        self.timestamp = now;
    }
}

impl fmt::Display for Trit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            TritState::Psi if self.probability >= PPM_SCALE => write!(f, "psi(1.000000)"),
            TritState::Psi => write!(f, "psi(0.{:06})", self.probability),
            decided => write!(f, "{decided}"),
        }
    }
}
