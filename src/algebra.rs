//! Combination rules for ternary values.
//!
//! Every operator is a pure function: it reads its operands, produces a fresh
//! [`Trit`], and mutates nothing else — statistics are the caller's concern.
//! The caller supplies the logical time used to stamp the result, which keeps
//! the truth tables independently testable without a live clock.
//!
//! The logical family (`and3`, `or3`, `xor3`, `not3`) follows strong-Kleene
//! tables for state selection, with probability composed under an
//! independence assumption while any operand is undecided:
//!
//! ```text
//! AND | 0 | psi | 1        OR | 0 | psi | 1
//! ----+---+-----+---      ----+---+-----+---
//!  0  | 0 |  0  | 0        0  | 0 | psi | 1
//! psi | 0 | psi | psi     psi |psi| psi | 1
//!  1  | 0 | psi | 1        1  | 1 |  1  | 1
//! ```
//!
//! The arithmetic family (`add3`, `sub3`, `mul3`) treats a trit as a single
//! saturating binary digit: add saturates at `One`, sub floors at `Zero`, mul
//! coincides with `and3` on decided operands. Any undecided operand makes the
//! result undecided, with the matching probability composition.

use crate::clock::Timestamp;
use crate::trit::{Trit, TritState, PPM_SCALE};

/// `p * q` in ppm space.
#[allow(clippy::cast_possible_truncation)]
const fn mul_ppm(p: u32, q: u32) -> u32 {
    // Inputs are <= PPM_SCALE, so the product fits back into u32.
    let wide = (p as u64) * (q as u64) / (PPM_SCALE as u64);
    wide as u32
}

/// `1 - (1 - p)(1 - q)` in ppm space.
const fn or_ppm(p: u32, q: u32) -> u32 {
    PPM_SCALE - mul_ppm(PPM_SCALE - p, PPM_SCALE - q)
}

const fn carried_defers(a: Trit, b: Trit) -> u32 {
    if a.defer_count() > b.defer_count() {
        a.defer_count()
    } else {
        b.defer_count()
    }
}

/// Ternary AND. `Zero` dominates; `One AND One = One`; anything else is
/// undecided with probability `p * q`.
#[must_use]
#[inline]
pub fn and3(a: Trit, b: Trit, now: Timestamp) -> Trit {
    let defers = carried_defers(a, b);
    match (a.state(), b.state()) {
        (TritState::Zero, _) | (_, TritState::Zero) => {
            Trit::op_result(TritState::Zero, 0, defers, now)
        }
        (TritState::One, TritState::One) => Trit::op_result(TritState::One, PPM_SCALE, defers, now),
        _ => Trit::op_result(
            TritState::Psi,
            mul_ppm(a.probability(), b.probability()),
            defers,
            now,
        ),
    }
}

/// Ternary OR. `One` dominates; `Zero OR Zero = Zero`; anything else is
/// undecided with probability `1 - (1 - p)(1 - q)`.
#[must_use]
#[inline]
pub fn or3(a: Trit, b: Trit, now: Timestamp) -> Trit {
    let defers = carried_defers(a, b);
    match (a.state(), b.state()) {
        (TritState::One, _) | (_, TritState::One) => {
            Trit::op_result(TritState::One, PPM_SCALE, defers, now)
        }
        (TritState::Zero, TritState::Zero) => Trit::op_result(TritState::Zero, 0, defers, now),
        _ => Trit::op_result(
            TritState::Psi,
            or_ppm(a.probability(), b.probability()),
            defers,
            now,
        ),
    }
}

/// Ternary XOR. Any undecided operand propagates `Psi`, keeping that
/// operand's probability (the left operand wins when both are undecided);
/// decided operands follow standard exclusive-or.
#[must_use]
#[inline]
pub fn xor3(a: Trit, b: Trit, now: Timestamp) -> Trit {
    let defers = carried_defers(a, b);
    match (a.state(), b.state()) {
        (TritState::Psi, _) => Trit::op_result(TritState::Psi, a.probability(), defers, now),
        (_, TritState::Psi) => Trit::op_result(TritState::Psi, b.probability(), defers, now),
        (x, y) if x == y => Trit::op_result(TritState::Zero, 0, defers, now),
        _ => Trit::op_result(TritState::One, PPM_SCALE, defers, now),
    }
}

/// Ternary NOT. Swaps `Zero` and `One`; an undecided value stays undecided
/// with its belief inverted (`1 - p`).
#[must_use]
#[inline]
pub fn not3(a: Trit, now: Timestamp) -> Trit {
    let defers = a.defer_count();
    match a.state() {
        TritState::Zero => Trit::op_result(TritState::One, PPM_SCALE, defers, now),
        TritState::One => Trit::op_result(TritState::Zero, 0, defers, now),
        TritState::Psi => Trit::op_result(TritState::Psi, PPM_SCALE - a.probability(), defers, now),
    }
}

/// Single-trit saturating add: `One` if either operand is `One`, else `Zero`;
/// undecided operands compose like `or3`.
#[must_use]
#[inline]
pub fn add3(a: Trit, b: Trit, now: Timestamp) -> Trit {
    let defers = carried_defers(a, b);
    match (a.state(), b.state()) {
        (TritState::Psi, _) | (_, TritState::Psi) => Trit::op_result(
            TritState::Psi,
            or_ppm(a.probability(), b.probability()),
            defers,
            now,
        ),
        (TritState::One, _) | (_, TritState::One) => {
            Trit::op_result(TritState::One, PPM_SCALE, defers, now)
        }
        _ => Trit::op_result(TritState::Zero, 0, defers, now),
    }
}

/// Single-trit floored subtract: `One` only for `One - Zero`; undecided
/// operands yield the clamped probability difference `max(p - q, 0)`.
#[must_use]
#[inline]
pub fn sub3(a: Trit, b: Trit, now: Timestamp) -> Trit {
    let defers = carried_defers(a, b);
    match (a.state(), b.state()) {
        (TritState::Psi, _) | (_, TritState::Psi) => {
            let p = a.probability();
            let q = b.probability();
            let diff = if p > q { p - q } else { 0 };
            Trit::op_result(TritState::Psi, diff, defers, now)
        }
        (TritState::One, TritState::Zero) => {
            Trit::op_result(TritState::One, PPM_SCALE, defers, now)
        }
        _ => Trit::op_result(TritState::Zero, 0, defers, now),
    }
}

/// Single-trit multiply; coincides with [`and3`] (probability `p * q`).
#[must_use]
#[inline]
pub fn mul3(a: Trit, b: Trit, now: Timestamp) -> Trit {
    and3(a, b, now)
}
