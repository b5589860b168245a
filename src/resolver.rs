//! Probabilistic collapse of undecided values.
//!
//! Resolution is a weighted coin flip, nothing more: draw a uniform sample
//! over the ppm domain and compare it against the value's stored probability.
//! The entropy source is injectable so tests can force either branch
//! deterministically; production use draws from the OS-seeded generator.

use std::sync::Arc;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::Timestamp;
use crate::stats::DecisionStats;
use crate::trit::{Trit, TritState, PPM_SCALE};

/// A source of uniform random draws, at least 32 bits per call.
pub trait Entropy: Send {
    /// Returns the next uniform 32-bit sample.
    fn next_u32(&mut self) -> u32;
}

/// Production entropy backed by an OS-seeded [`StdRng`].
#[derive(Debug)]
pub struct OsEntropy {
    rng: StdRng,
}

impl OsEntropy {
    /// Seeds a generator from the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for OsEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl Entropy for OsEntropy {
    fn next_u32(&mut self) -> u32 {
        self.rng.gen()
    }
}

/// Test entropy that always yields the same sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy(pub u32);

impl Entropy for FixedEntropy {
    fn next_u32(&mut self) -> u32 {
        self.0
    }
}

/// Test entropy that cycles through a fixed sequence of samples.
#[derive(Debug, Clone)]
pub struct SequenceEntropy {
    samples: Vec<u32>,
    next: usize,
}

impl SequenceEntropy {
    /// Creates a cycling source from a non-empty sample list.
    #[must_use]
    pub fn new(samples: Vec<u32>) -> Self {
        assert!(!samples.is_empty(), "sample list must be non-empty");
        Self { samples, next: 0 }
    }
}

impl Entropy for SequenceEntropy {
    fn next_u32(&mut self) -> u32 {
        let sample = self.samples[self.next % self.samples.len()];
        self.next += 1;
        sample
    }
}

/// Collapses undecided values into decided ones.
///
/// `resolve` is idempotent on decided input and terminal for the value it
/// returns: a resolved trit never re-randomizes unless the owner explicitly
/// pushes it back into `Psi` via [`Trit::adjust`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use trivalent::{DecisionStats, FixedEntropy, PsiResolver, Trit, TritState, PPM_SCALE};
///
/// let stats = Arc::new(DecisionStats::new());
/// // A sample of 0 is below any positive probability: resolves to One.
/// let resolver = PsiResolver::with_entropy(Box::new(FixedEntropy(0)), Arc::clone(&stats));
///
/// let resolved = resolver.resolve(Trit::psi_with(600_000, 0), 1);
/// assert_eq!(resolved.state(), TritState::One);
/// assert_eq!(resolved.probability(), PPM_SCALE);
/// assert_eq!(stats.snapshot().resolutions_total, 1);
/// ```
pub struct PsiResolver {
    entropy: Mutex<Box<dyn Entropy>>,
    stats: Arc<DecisionStats>,
}

impl std::fmt::Debug for PsiResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PsiResolver").finish_non_exhaustive()
    }
}

impl PsiResolver {
    /// Creates a resolver drawing from OS entropy.
    #[must_use]
    pub fn new(stats: Arc<DecisionStats>) -> Self {
        Self::with_entropy(Box::new(OsEntropy::new()), stats)
    }

    /// Creates a resolver with an injected entropy source.
    #[must_use]
    pub fn with_entropy(entropy: Box<dyn Entropy>, stats: Arc<DecisionStats>) -> Self {
        Self {
            entropy: Mutex::new(entropy),
            stats,
        }
    }

    /// Collapses `trit` if it is undecided; decided input is returned
    /// unchanged and does not consume entropy.
    ///
    /// On `Psi`, a uniform sample `r` over `[0, PPM_SCALE)` is drawn:
    /// `r < probability` decides `One` (probability saturated), otherwise
    /// `Zero` (probability zeroed). Each collapse increments the resolution
    /// counter.
    #[must_use]
    pub fn resolve(&self, trit: Trit, now: Timestamp) -> Trit {
        if trit.state() != TritState::Psi {
            return trit;
        }

        let sample = {
            let mut entropy = match self.entropy.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            entropy.next_u32() % PPM_SCALE
        };

        self.stats.record_resolution();

        if sample < trit.probability() {
            trit.decided_as(TritState::One, now)
        } else {
            trit.decided_as(TritState::Zero, now)
        }
    }
}
