//! The ternary decision engine.
//!
//! One engine instance collapses what the surrounding layers would otherwise
//! each reimplement: it owns the owner table, the deferral queue, the
//! resolver, and the statistics, and is polymorphic over its capability set —
//! the clock, the entropy source, and the per-owner re-evaluation function.
//! A user-space library, a kernel scheduling layer, and a hypervisor memory
//! layer differ only in how they bind those three capabilities.
//!
//! All structural state (owner table + queue) lives in a single
//! mutual-exclusion domain; statistics are lock-free atomics. `tick` never
//! holds the lock while invoking re-evaluation callbacks: it snapshots due
//! entries under the lock, releases it, runs the callbacks, then re-acquires
//! the lock to apply transitions, skipping entries cancelled in the window.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, MonotonicClock, Timestamp};
use crate::config::EngineConfig;
use crate::deferral::{DeferralQueue, DeferredEntry, EntryId, OwnerId};
use crate::error::{EngineError, TernaryResult};
use crate::resolver::{Entropy, PsiResolver};
use crate::stats::{DecisionStats, StatsSnapshot};
use crate::trit::{Trit, TritState};

/// Re-computes an owner's decision when its deferral comes due.
///
/// Returning `None` means the owner is no longer resolvable (it was torn
/// down between enqueue and tick); the engine treats that as an implicit
/// cancel rather than an error. Returning `Psi` means "still undecided,
/// retry later" — there is no separate retry signal.
pub trait Reevaluate: Send + Sync {
    /// Freshly computes the owner's decision.
    fn reevaluate(&self, owner: OwnerId) -> Option<TritState>;
}

impl<F> Reevaluate for F
where
    F: Fn(OwnerId) -> Option<TritState> + Send + Sync,
{
    fn reevaluate(&self, owner: OwnerId) -> Option<TritState> {
        (self)(owner)
    }
}

/// Per-owner bookkeeping. The record holds the owner's current value and its
/// re-evaluation capability; the queue refers to it only by id.
struct OwnerRecord {
    trit: Trit,
    capability: Arc<dyn Reevaluate>,
    transitions: u64,
}

/// Read-only row describing one registered owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerStatus {
    /// The owner's identity.
    pub owner: OwnerId,
    /// The owner's current value.
    pub trit: Trit,
    /// State changes recorded for this owner.
    pub transitions: u64,
}

struct EngineState {
    owners: HashMap<OwnerId, OwnerRecord>,
    queue: DeferralQueue,
}

/// The decision engine. Safe to share across threads behind an `Arc`.
pub struct TernaryEngine {
    state: Mutex<EngineState>,
    stats: Arc<DecisionStats>,
    resolver: PsiResolver,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    backoff_ns: u64,
}

impl fmt::Debug for TernaryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TernaryEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl TernaryEngine {
    /// Creates an engine with production capabilities: a monotonic clock and
    /// OS entropy. The configuration is clamped to its valid ranges.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let stats = Arc::new(DecisionStats::new());
        let resolver = PsiResolver::new(Arc::clone(&stats));
        Self::assemble(config, Arc::new(MonotonicClock::new()), resolver, stats)
    }

    /// Creates an engine with injected clock and entropy capabilities.
    #[must_use]
    pub fn with_capabilities(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        entropy: Box<dyn Entropy>,
    ) -> Self {
        let stats = Arc::new(DecisionStats::new());
        let resolver = PsiResolver::with_entropy(entropy, Arc::clone(&stats));
        Self::assemble(config, clock, resolver, stats)
    }

    fn assemble(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        resolver: PsiResolver,
        stats: Arc<DecisionStats>,
    ) -> Self {
        let config = config.clamped();
        let backoff_ns = duration_ns(config.backoff);
        Self {
            state: Mutex::new(EngineState {
                owners: HashMap::new(),
                queue: DeferralQueue::new(config.queue_capacity),
            }),
            stats,
            resolver,
            clock,
            config,
            backoff_ns,
        }
    }

    /// The engine's configuration after clamping.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current logical time from the engine's clock.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// A mutex poisoned by a panicking caller still holds structurally
    /// consistent state (every transition is applied atomically under the
    /// lock), so recover the guard rather than propagating the poison.
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers an owner with its re-evaluation capability, starting in the
    /// default undecided state. Re-registering replaces the previous record
    /// (fresh assignment).
    pub fn register(&self, owner: OwnerId, capability: Arc<dyn Reevaluate>) -> Trit {
        self.register_with(owner, Trit::psi(self.now()), capability)
    }

    /// Registers an owner with an explicit initial value.
    pub fn register_with(
        &self,
        owner: OwnerId,
        initial: Trit,
        capability: Arc<dyn Reevaluate>,
    ) -> Trit {
        let mut state = self.lock_state();
        debug!(%owner, state = %initial, "owner registered");
        state.owners.insert(
            owner,
            OwnerRecord {
                trit: initial,
                capability,
                transitions: 0,
            },
        );
        initial
    }

    /// Removes an owner and cancels all its pending deferrals. Must be
    /// called before the owner's identity becomes invalid. Unknown owners
    /// are a no-op. Returns the number of deferrals cancelled.
    pub fn deregister(&self, owner: OwnerId) -> usize {
        let mut state = self.lock_state();
        state.owners.remove(&owner);
        let cancelled = state.queue.cancel(owner);
        if cancelled > 0 {
            debug!(%owner, cancelled, "owner deregistered with pending deferrals");
        }
        cancelled
    }

    /// Collapses a caller-owned value through the engine's resolver.
    #[must_use]
    pub fn resolve(&self, trit: Trit) -> Trit {
        self.resolver.resolve(trit, self.now())
    }

    /// Evaluates an owner's current value, resolving it if undecided.
    ///
    /// This is the immediate path: an undecided value is collapsed on the
    /// spot via the weighted draw instead of being deferred. Returns `None`
    /// for unknown owners (a teardown race, not an error).
    pub fn evaluate(&self, owner: OwnerId) -> Option<Trit> {
        let now = self.now();
        let mut state = self.lock_state();
        let record = state.owners.get_mut(&owner)?;

        self.stats.record_decision();
        if record.trit.state() == TritState::Psi {
            record.trit = self.resolver.resolve(record.trit, now);
            record.transitions += 1;
        }
        self.stats.record_immediate();
        Some(record.trit)
    }

    /// Looks up an owner's value without evaluating it.
    #[must_use]
    pub fn owner_trit(&self, owner: OwnerId) -> Option<Trit> {
        self.lock_state().owners.get(&owner).map(|r| r.trit)
    }

    /// Perturbs an owner's probability by `delta` (signed ppm, clamped) and
    /// re-enters the undecided state. Returns the new value, or `None` for
    /// unknown owners.
    pub fn adjust(&self, owner: OwnerId, delta: i64) -> Option<Trit> {
        let now = self.now();
        let mut state = self.lock_state();
        let record = state.owners.get_mut(&owner)?;
        record.trit.adjust(delta, now);
        record.transitions += 1;
        debug!(%owner, probability = record.trit.probability(), "psi adjusted");
        Some(record.trit)
    }

    /// Parks a re-evaluation of `owner` to run after `delay`.
    ///
    /// # Errors
    ///
    /// [`EngineError::OwnerNotRegistered`] if the owner has no capability to
    /// re-evaluate with; [`EngineError::OutOfResources`] if the queue is
    /// full. A failed deferral is not counted in the statistics.
    pub fn defer(
        &self,
        owner: OwnerId,
        delay: Duration,
        priority: u32,
    ) -> TernaryResult<EntryId> {
        let now = self.now();
        let due_time = now.saturating_add(duration_ns(delay));

        let mut state = self.lock_state();
        if !state.owners.contains_key(&owner) {
            return Err(EngineError::OwnerNotRegistered { owner });
        }

        let id = state.queue.enqueue(owner, due_time, priority)?;
        if let Some(record) = state.owners.get_mut(&owner) {
            record.trit.mark_deferred(now);
        }
        self.stats.record_deferral();
        debug!(%owner, entry = %id, due_time, priority, "deferral enqueued");
        Ok(id)
    }

    /// Cancels all pending deferrals for `owner` without re-evaluation.
    /// Unknown owners are a no-op. Returns the number removed.
    pub fn cancel(&self, owner: OwnerId) -> usize {
        let mut state = self.lock_state();
        let cancelled = state.queue.cancel(owner);
        if cancelled > 0 {
            debug!(%owner, cancelled, "deferrals cancelled");
        }
        cancelled
    }

    /// Processes every deferred entry due at the engine clock's current
    /// time. Returns the number of entries that resolved.
    pub fn tick(&self) -> usize {
        self.tick_at(self.now())
    }

    /// Processes every deferred entry due at or before `now`.
    ///
    /// Due entries are re-evaluated in due-time order (priority, then
    /// insertion order, break ties). A decided verdict removes the entry and
    /// updates the owner; a `Psi` verdict re-arms the entry one fixed
    /// backoff interval from `now`; a vanished owner is an implicit cancel.
    pub fn tick_at(&self, now: Timestamp) -> usize {
        // Snapshot under the lock; capabilities are cloned out so callbacks
        // run without it and may themselves call defer/cancel.
        let work: Vec<(DeferredEntry, Option<Arc<dyn Reevaluate>>)> = {
            let state = self.lock_state();
            state
                .queue
                .due_snapshot(now)
                .into_iter()
                .map(|entry| {
                    let capability = state
                        .owners
                        .get(&entry.owner)
                        .map(|record| Arc::clone(&record.capability));
                    (entry, capability)
                })
                .collect()
        };

        if work.is_empty() {
            return 0;
        }

        let verdicts: Vec<(DeferredEntry, Option<TritState>)> = work
            .into_iter()
            .map(|(entry, capability)| {
                let verdict = capability.and_then(|c| c.reevaluate(entry.owner));
                (entry, verdict)
            })
            .collect();

        let mut resolved = 0;
        let mut state = self.lock_state();
        for (entry, verdict) in verdicts {
            match verdict {
                None => {
                    // Owner torn down between enqueue and tick.
                    if state.queue.complete(entry.id) {
                        debug!(owner = %entry.owner, entry = %entry.id, "implicit cancel");
                    }
                }
                Some(TritState::Psi) => {
                    self.stats.record_decision();
                    let new_due = now.saturating_add(self.backoff_ns);
                    if state.queue.extend(entry.id, new_due) {
                        self.stats.record_deferral();
                        if let Some(record) = state.owners.get_mut(&entry.owner) {
                            record.trit.mark_deferred(now);
                        }
                        debug!(owner = %entry.owner, entry = %entry.id, new_due, "deferral extended");
                    }
                }
                Some(decided) => {
                    self.stats.record_decision();
                    // Skip owners cancelled while callbacks ran.
                    if state.queue.complete(entry.id) {
                        resolved += 1;
                        if let Some(record) = state.owners.get_mut(&entry.owner) {
                            record.trit = record.trit.decided_as(decided, now);
                            record.transitions += 1;
                        }
                        debug!(owner = %entry.owner, entry = %entry.id, state = %decided, "deferral resolved");
                    }
                }
            }
        }
        resolved
    }

    /// Number of pending deferred entries.
    #[must_use]
    pub fn pending_deferrals(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// Point-in-time view of the decision counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Rows for every registered owner, ordered by owner id.
    #[must_use]
    pub fn owner_status(&self) -> Vec<OwnerStatus> {
        let state = self.lock_state();
        let mut rows: Vec<OwnerStatus> = state
            .owners
            .iter()
            .map(|(owner, record)| OwnerStatus {
                owner: *owner,
                trit: record.trit,
                transitions: record.transitions,
            })
            .collect();
        rows.sort_by_key(|row| row.owner);
        rows
    }
}
