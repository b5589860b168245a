//! # Trivalent — a three-valued decision substrate
//!
//! Trivalent lets a binary decision defer instead of block when information
//! is incomplete. A value is [`Zero`](TritState::Zero) (definitely false),
//! [`One`](TritState::One) (definitely true), or [`Psi`](TritState::Psi) —
//! probabilistically undecided, carrying the likelihood that it eventually
//! resolves true.
//!
//! ## Core Concepts
//!
//! - **Trit**: a ternary value plus probability, confidence, and deferral
//!   bookkeeping
//! - **Algebra**: pure truth-table combinators (`and3`, `or3`, `xor3`,
//!   `not3`, and a saturating arithmetic family)
//! - **Resolver**: collapses an undecided value via a weighted random draw
//! - **Deferral queue**: parks undecided decisions for later re-evaluation,
//!   ordered by due time, priority, and insertion order
//! - **Engine**: one instance owning the owner table, queue, resolver, and
//!   statistics, polymorphic over its clock / entropy / re-evaluation
//!   capabilities
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use trivalent::{
//!     and3, EngineConfig, OwnerId, Reevaluate, TernaryEngine, Trit, TritState,
//! };
//!
//! let engine = TernaryEngine::new(EngineConfig::default());
//!
//! // Combine values; an undecided operand makes the result undecided.
//! let gate = and3(Trit::one(0), Trit::psi_with(700_000, 0), engine.now());
//! assert_eq!(gate.state(), TritState::Psi);
//!
//! // Defer the decision instead of blocking on it.
//! let owner = OwnerId::new(1);
//! let ready: Arc<dyn Reevaluate> = Arc::new(|_o: OwnerId| Some(TritState::One));
//! engine.register(owner, ready);
//! engine.defer(owner, Duration::ZERO, 0).unwrap();
//!
//! // A later tick re-evaluates and finalizes it.
//! assert_eq!(engine.tick_at(engine.now() + 1), 1);
//! assert_eq!(engine.owner_trit(owner).unwrap().state(), TritState::One);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algebra;
pub mod clock;
pub mod config;
pub mod deferral;
pub mod engine;
pub mod error;
pub mod report;
pub mod resolver;
pub mod stats;
pub mod ticker;
pub mod trit;

pub use algebra::{add3, and3, mul3, not3, or3, sub3, xor3};
pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use config::{
    EngineConfig, DEFAULT_PRIORITY, PSI_DELTA_DEFAULT_PPM, PSI_DELTA_MAX_PPM, PSI_DELTA_MIN_PPM,
};
pub use deferral::{DeferralQueue, DeferredEntry, EntryId, OwnerId};
pub use engine::{OwnerStatus, Reevaluate, TernaryEngine};
pub use error::{EngineError, TernaryResult};
pub use report::{config_report, format_ppm, state_report, status_report};
pub use resolver::{Entropy, FixedEntropy, OsEntropy, PsiResolver, SequenceEntropy};
pub use stats::{psi_ratio, DecisionStats, StatsSnapshot};
pub use ticker::Ticker;
pub use trit::{Trit, TritState, CONFIDENCE_DECAY, CONFIDENCE_MAX, PPM_SCALE, PSI_DEFAULT_PPM};
