//! The deferral queue.
//!
//! When a decision evaluates to `Psi`, the caller parks a re-evaluation
//! request here instead of blocking. Entries are ordered by absolute due
//! time, with priority (higher first) and insertion order as tie-breaks, so
//! processing a fixed snapshot of due entries is deterministic.
//!
//! The queue owns its entries outright. An entry refers to the decision
//! context it represents only by [`OwnerId`] — never by pointer — so queue
//! lifetime and owner lifetime stay decoupled. Multiple outstanding entries
//! for the same owner are permitted; nothing de-duplicates them.
//!
//! The queue itself is not synchronized; the engine wraps it in its single
//! mutual-exclusion domain. The snapshot/apply split (`due_snapshot`, then
//! `complete` / `extend` per entry) exists so the engine can release that
//! lock while re-evaluation callbacks run and apply transitions afterwards,
//! skipping entries that were cancelled in the window.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::EngineError;

/// Opaque identity of the decision context behind a deferred entry: a thread
/// id, a vCPU index, a memory-cell address — the queue does not care.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Wraps a raw identity.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identity.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for OwnerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for one deferred entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(uuid::Uuid);

impl EntryId {
    /// Creates a new random entry handle.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One pending re-evaluation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredEntry {
    /// Handle for this entry.
    pub id: EntryId,
    /// The decision context to re-evaluate.
    pub owner: OwnerId,
    /// Absolute due time.
    pub due_time: Timestamp,
    /// Tie-break for equal due times; higher runs first.
    pub priority: u32,
    /// Insertion sequence; final FIFO tie-break. Survives extension.
    seq: u64,
}

/// Map key realizing the processing order: due time, then priority
/// (descending), then insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    due_time: Timestamp,
    priority_rank: Reverse<u32>,
    seq: u64,
}

impl QueueKey {
    const fn of(entry: &DeferredEntry) -> Self {
        Self {
            due_time: entry.due_time,
            priority_rank: Reverse(entry.priority),
            seq: entry.seq,
        }
    }

    /// Largest key with `due_time <= now`: all priorities and sequences at
    /// `now` sort at or below it.
    const fn due_bound(now: Timestamp) -> Self {
        Self {
            due_time: now,
            priority_rank: Reverse(0),
            seq: u64::MAX,
        }
    }
}

/// Capacity-bounded, ordered collection of pending re-evaluations.
#[derive(Debug)]
pub struct DeferralQueue {
    entries: BTreeMap<QueueKey, DeferredEntry>,
    index: HashMap<EntryId, QueueKey>,
    by_owner: HashMap<OwnerId, HashSet<EntryId>>,
    capacity: usize,
    next_seq: u64,
}

impl DeferralQueue {
    /// Creates an empty queue holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            index: HashMap::new(),
            by_owner: HashMap::new(),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts a new pending entry with an absolute due time.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfResources`] when the queue is full; the
    /// caller must fall back to an immediate conservative decision.
    pub fn enqueue(
        &mut self,
        owner: OwnerId,
        due_time: Timestamp,
        priority: u32,
    ) -> Result<EntryId, EngineError> {
        if self.entries.len() >= self.capacity {
            return Err(EngineError::OutOfResources {
                capacity: self.capacity,
            });
        }

        let entry = DeferredEntry {
            id: EntryId::new(),
            owner,
            due_time,
            priority,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let key = QueueKey::of(&entry);
        self.entries.insert(key, entry);
        self.index.insert(entry.id, key);
        self.by_owner.entry(owner).or_default().insert(entry.id);

        Ok(entry.id)
    }

    /// Returns all entries due at or before `now`, in processing order.
    /// Entries stay queued; the caller reports outcomes via [`Self::complete`]
    /// or [`Self::extend`].
    #[must_use]
    pub fn due_snapshot(&self, now: Timestamp) -> Vec<DeferredEntry> {
        self.entries
            .range(..=QueueKey::due_bound(now))
            .map(|(_, entry)| *entry)
            .collect()
    }

    /// Removes a finished entry. Returns false if the entry is gone already
    /// (cancelled while callbacks were running), in which case the caller
    /// must not act on its outcome.
    pub fn complete(&mut self, id: EntryId) -> bool {
        let Some(key) = self.index.remove(&id) else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&key) {
            self.detach_owner(entry.owner, id);
        }
        true
    }

    /// Re-arms a still-undecided entry at a new due time, keeping its
    /// priority and insertion order. Returns false if the entry is gone.
    pub fn extend(&mut self, id: EntryId, new_due: Timestamp) -> bool {
        let Some(old_key) = self.index.remove(&id) else {
            return false;
        };
        let Some(mut entry) = self.entries.remove(&old_key) else {
            return false;
        };

        entry.due_time = new_due;
        let key = QueueKey::of(&entry);
        self.entries.insert(key, entry);
        self.index.insert(id, key);
        true
    }

    /// Drops every entry for `owner` without re-evaluation. Unknown owners
    /// are a no-op. Returns the number of entries removed.
    pub fn cancel(&mut self, owner: OwnerId) -> usize {
        let Some(ids) = self.by_owner.remove(&owner) else {
            return 0;
        };

        let mut removed = 0;
        for id in ids {
            if let Some(key) = self.index.remove(&id) {
                if self.entries.remove(&key).is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Number of pending entries for one owner.
    #[must_use]
    pub fn owner_entry_count(&self, owner: OwnerId) -> usize {
        self.by_owner.get(&owner).map_or(0, HashSet::len)
    }

    fn detach_owner(&mut self, owner: OwnerId, id: EntryId) {
        if let Some(ids) = self.by_owner.get_mut(&owner) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_owner.remove(&owner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_order_is_time_priority_fifo() {
        let mut q = DeferralQueue::new(16);
        // t1 < t2 == t3, with the t2 entry at higher priority.
        let e1 = q.enqueue(OwnerId::new(1), 10, 0).unwrap();
        let e3 = q.enqueue(OwnerId::new(3), 20, 1).unwrap();
        let e2 = q.enqueue(OwnerId::new(2), 20, 9).unwrap();

        let due = q.due_snapshot(20);
        let ids: Vec<EntryId> = due.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![e1, e2, e3]);
    }

    #[test]
    fn fifo_breaks_full_ties() {
        let mut q = DeferralQueue::new(16);
        let first = q.enqueue(OwnerId::new(1), 5, 7).unwrap();
        let second = q.enqueue(OwnerId::new(2), 5, 7).unwrap();

        let due = q.due_snapshot(5);
        assert_eq!(due[0].id, first);
        assert_eq!(due[1].id, second);
    }

    #[test]
    fn not_due_entries_are_excluded() {
        let mut q = DeferralQueue::new(16);
        q.enqueue(OwnerId::new(1), 10, 0).unwrap();
        q.enqueue(OwnerId::new(2), 30, 0).unwrap();

        assert_eq!(q.due_snapshot(9).len(), 0);
        assert_eq!(q.due_snapshot(10).len(), 1);
        assert_eq!(q.due_snapshot(30).len(), 2);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut q = DeferralQueue::new(2);
        q.enqueue(OwnerId::new(1), 1, 0).unwrap();
        q.enqueue(OwnerId::new(2), 2, 0).unwrap();

        let err = q.enqueue(OwnerId::new(3), 3, 0).unwrap_err();
        assert_eq!(err, EngineError::OutOfResources { capacity: 2 });

        // Completing one frees a slot.
        let due = q.due_snapshot(1);
        assert!(q.complete(due[0].id));
        assert!(q.enqueue(OwnerId::new(3), 3, 0).is_ok());
    }

    #[test]
    fn multiple_entries_per_owner_are_permitted() {
        let mut q = DeferralQueue::new(16);
        let owner = OwnerId::new(7);
        q.enqueue(owner, 1, 0).unwrap();
        q.enqueue(owner, 2, 0).unwrap();
        q.enqueue(owner, 3, 0).unwrap();
        assert_eq!(q.owner_entry_count(owner), 3);

        assert_eq!(q.cancel(owner), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn cancel_unknown_owner_is_noop() {
        let mut q = DeferralQueue::new(4);
        assert_eq!(q.cancel(OwnerId::new(99)), 0);
    }

    #[test]
    fn extend_rearms_and_preserves_order_rank() {
        let mut q = DeferralQueue::new(16);
        let early = q.enqueue(OwnerId::new(1), 10, 0).unwrap();
        let late = q.enqueue(OwnerId::new(2), 50, 0).unwrap();

        assert!(q.extend(early, 50));
        // Same due time now; the extended entry keeps its earlier insertion
        // sequence, so it still processes first.
        let due = q.due_snapshot(50);
        assert_eq!(due[0].id, early);
        assert_eq!(due[1].id, late);
    }

    #[test]
    fn complete_and_extend_report_missing_entries() {
        let mut q = DeferralQueue::new(4);
        let owner = OwnerId::new(1);
        let id = q.enqueue(owner, 1, 0).unwrap();

        q.cancel(owner);
        assert!(!q.complete(id));
        assert!(!q.extend(id, 99));
    }
}
