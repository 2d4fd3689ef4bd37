//! Depositor index — enumerable depositor registry per (counterparty, key)
//!
//! Backs the bulk-refund path: O(1) membership test and insertion, O(1)
//! removal via swap-with-last, and full enumeration. Implemented as an
//! arena of members plus a reverse map from identity to arena slot.

use std::collections::HashMap;
use types::ids::Address;

/// Membership set for a single (counterparty, key) bucket.
#[derive(Debug, Clone, Default)]
struct MemberSet {
    members: Vec<Address>,
    positions: HashMap<Address, usize>,
}

impl MemberSet {
    fn add(&mut self, depositor: &Address) -> bool {
        if self.positions.contains_key(depositor) {
            return false;
        }
        self.positions.insert(depositor.clone(), self.members.len());
        self.members.push(depositor.clone());
        true
    }

    fn remove(&mut self, depositor: &Address) -> bool {
        let Some(slot) = self.positions.remove(depositor) else {
            return false;
        };
        let last = self.members.len() - 1;
        self.members.swap(slot, last);
        self.members.truncate(last);
        if slot < last {
            // the swapped-in member now lives at the vacated slot
            let moved = self.members[slot].clone();
            self.positions.insert(moved, slot);
        }
        true
    }
}

/// Enumerable registry of depositors per (counterparty, key).
#[derive(Debug, Clone, Default)]
pub struct DepositorIndex {
    sets: HashMap<(Address, String), MemberSet>,
}

impl DepositorIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a depositor. No-op (returns `false`) if already present.
    pub fn add(&mut self, counterparty: &Address, key: &str, depositor: &Address) -> bool {
        self.sets
            .entry((counterparty.clone(), key.to_string()))
            .or_default()
            .add(depositor)
    }

    /// Unregister a depositor via swap-with-last. No-op (returns `false`)
    /// if absent.
    pub fn remove(&mut self, counterparty: &Address, key: &str, depositor: &Address) -> bool {
        let bucket = (counterparty.clone(), key.to_string());
        let Some(set) = self.sets.get_mut(&bucket) else {
            return false;
        };
        let removed = set.remove(depositor);
        if set.members.is_empty() {
            self.sets.remove(&bucket);
        }
        removed
    }

    /// O(1) membership test.
    pub fn contains(&self, counterparty: &Address, key: &str, depositor: &Address) -> bool {
        self.sets
            .get(&(counterparty.clone(), key.to_string()))
            .map_or(false, |set| set.positions.contains_key(depositor))
    }

    /// O(1) size query.
    pub fn count(&self, counterparty: &Address, key: &str) -> usize {
        self.sets
            .get(&(counterparty.clone(), key.to_string()))
            .map_or(0, |set| set.members.len())
    }

    /// A depositor's current arena slot, if registered.
    pub fn position(&self, counterparty: &Address, key: &str, depositor: &Address) -> Option<usize> {
        self.sets
            .get(&(counterparty.clone(), key.to_string()))?
            .positions
            .get(depositor)
            .copied()
    }

    /// Snapshot of all current members.
    ///
    /// Bulk operations must iterate this snapshot, not the live set:
    /// removal during iteration is unsafe.
    pub fn members(&self, counterparty: &Address, key: &str) -> Vec<Address> {
        self.sets
            .get(&(counterparty.clone(), key.to_string()))
            .map_or_else(Vec::new, |set| set.members.clone())
    }
}
