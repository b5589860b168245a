//! Error types for the ternary engine.
//!
//! The taxonomy is deliberately small. Out-of-range probabilities clamp
//! instead of failing, and cancelling an unknown owner is a no-op, so the
//! only conditions surfaced as errors are the ones a caller must react to.
//! No error is fatal to the engine; every operation leaves it usable.

use thiserror::Error;

use crate::deferral::OwnerId;

/// Result alias used across the crate.
pub type TernaryResult<T> = Result<T, EngineError>;

/// Errors surfaced by engine operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The deferral queue is at capacity. The caller must fall back to an
    /// immediate, conservative decision; the request is never silently
    /// dropped and is not counted as a deferral.
    #[error("deferral queue is full (capacity {capacity})")]
    OutOfResources {
        /// Configured queue capacity that was exceeded.
        capacity: usize,
    },

    /// A deferral was requested for an owner with no registered
    /// re-evaluation capability; such an entry could never resolve.
    #[error("owner {owner} has no registered re-evaluation capability")]
    OwnerNotRegistered {
        /// The owner the deferral was requested for.
        owner: OwnerId,
    },
}
