//! Bookkeeping for every live resource

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::metrics::PoolStatistics;

/// Where a live resource currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// Sitting in the idle queue
    Idle,
    /// On loan to a caller
    Active,
    /// Handed back, being reset and validated before requeue
    Recycling,
}

#[derive(Debug, Clone)]
pub(crate) struct LedgerEntry {
    pub slot: Slot,
    pub last_return: Instant,
}

impl LedgerEntry {
    fn new(slot: Slot) -> Self {
        Self {
            slot,
            last_return: Instant::now(),
        }
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_return)
    }
}

/// Authoritative record of live resources plus the running counters.
///
/// Only ever touched while the pool lock is held.
pub(crate) struct Ledger<Id> {
    entries: HashMap<Id, LedgerEntry>,
    /// Factory calls in flight that have already claimed capacity
    reserved: usize,
    pub stats: PoolStatistics,
    pub closed: bool,
}

impl<Id: Eq + Hash + Clone> Ledger<Id> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            reserved: 0,
            stats: PoolStatistics::default(),
            closed: false,
        }
    }

    /// Live resources (active, recycling and idle).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &Id) -> Option<&LedgerEntry> {
        self.entries.get(id)
    }

    /// Claim a slot for a resource about to be created, if capacity allows.
    pub fn try_reserve(&mut self, max_size: usize) -> bool {
        if self.entries.len() + self.reserved < max_size {
            self.reserved += 1;
            true
        } else {
            false
        }
    }

    pub fn cancel_reservation(&mut self) {
        self.reserved = self.reserved.saturating_sub(1);
    }

    /// Record a freshly created resource, consuming a reservation if one
    /// was taken for it.
    pub fn insert_created(&mut self, id: Id, slot: Slot, reserved: bool) {
        if reserved {
            self.cancel_reservation();
        }
        self.entries.insert(id, LedgerEntry::new(slot));
        self.stats.created += 1;
    }

    /// Move an idle resource to active. Returns false if it is not idle.
    pub fn checkout(&mut self, id: &Id) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) if entry.slot == Slot::Idle => {
                entry.slot = Slot::Active;
                true
            }
            _ => false,
        }
    }

    /// Accept a resource back from a caller. Unknown identities and
    /// resources that are not on loan are rejected without any change.
    pub fn begin_return(&mut self, id: &Id) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) if entry.slot == Slot::Active => {
                entry.slot = Slot::Recycling;
                entry.last_return = Instant::now();
                self.stats.released += 1;
                true
            }
            _ => false,
        }
    }

    /// Mark a recycled resource as idle again.
    pub fn finish_return(&mut self, id: &Id) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.slot = Slot::Idle;
        }
    }

    pub fn destroy(&mut self, id: &Id) {
        if self.entries.remove(id).is_some() {
            self.stats.destroyed += 1;
        }
    }

    pub fn record_wait(&mut self, waited: Duration) {
        self.stats.wait_time += waited;
        if waited > self.stats.max_wait_time {
            self.stats.max_wait_time = waited;
        }
    }

    pub fn record_acquired(&mut self, waited: Duration) {
        self.stats.acquired += 1;
        self.record_wait(waited);
    }

    pub fn record_timeout(&mut self, waited: Duration) {
        self.stats.timeouts += 1;
        self.record_wait(waited);
    }

    pub fn count(&self, slot: Slot) -> usize {
        self.entries.values().filter(|e| e.slot == slot).count()
    }

    /// Forget every entry. Resources on loan are no longer tracked.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.reserved = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservations_count_against_capacity() {
        let mut ledger = Ledger::<u32>::with_capacity(2);
        assert!(ledger.try_reserve(2));
        assert!(ledger.try_reserve(2));
        assert!(!ledger.try_reserve(2));

        ledger.insert_created(1, Slot::Active, true);
        assert!(!ledger.try_reserve(2));

        ledger.cancel_reservation();
        assert!(ledger.try_reserve(2));
        assert_eq!(ledger.stats.created, 1);
    }

    #[test]
    fn test_return_requires_active() {
        let mut ledger = Ledger::<u32>::with_capacity(4);
        ledger.insert_created(7, Slot::Idle, false);

        assert!(!ledger.begin_return(&7));
        assert!(!ledger.begin_return(&99));
        assert_eq!(ledger.stats.released, 0);

        assert!(ledger.checkout(&7));
        assert!(ledger.begin_return(&7));
        assert!(!ledger.begin_return(&7));
        assert_eq!(ledger.stats.released, 1);
        assert_eq!(ledger.get(&7).map(|e| e.slot), Some(Slot::Recycling));
    }

    #[test]
    fn test_destroy_counts_once() {
        let mut ledger = Ledger::<u32>::with_capacity(1);
        ledger.insert_created(1, Slot::Idle, false);
        ledger.destroy(&1);
        ledger.destroy(&1);
        assert_eq!(ledger.stats.destroyed, 1);
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn test_wait_tracking() {
        let mut ledger = Ledger::<u32>::with_capacity(1);
        ledger.record_acquired(Duration::from_millis(10));
        ledger.record_timeout(Duration::from_millis(30));
        ledger.record_acquired(Duration::from_millis(5));

        assert_eq!(ledger.stats.acquired, 2);
        assert_eq!(ledger.stats.timeouts, 1);
        assert_eq!(ledger.stats.wait_time, Duration::from_millis(45));
        assert_eq!(ledger.stats.max_wait_time, Duration::from_millis(30));
    }
}
