//! Access list — two-tier owner/lister/whitelist capability registry
//!
//! The owner (fixed at construction, transferable) manages listers; listers
//! manage whitelist membership. The owner is implicitly a lister. Redundant
//! add/remove calls are silent no-ops and emit no event; the zero address is
//! rejected everywhere except queries, which simply return `false` for it.

use std::collections::HashSet;
use types::ids::Address;

use crate::errors::AccessError;
use crate::events::{
    ContractEvent, Whitelisted, WhitelistedAddressRemoved, WhitelisterAdded, WhitelisterRemoved,
};

/// Capability registry gating staked-access escrows.
#[derive(Debug, Clone)]
pub struct AccessList {
    owner: Address,
    listers: HashSet<Address>,
    whitelist: HashSet<Address>,
    events: Vec<ContractEvent>,
}

impl AccessList {
    /// Create an access list with the given owner.
    pub fn new(owner: Address) -> Result<Self, AccessError> {
        if owner.is_zero() {
            return Err(AccessError::InvalidAddress);
        }
        Ok(Self {
            owner,
            listers: HashSet::new(),
            whitelist: HashSet::new(),
            events: Vec::new(),
        })
    }

    /// The current owner.
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Transfer ownership. Owner-only; the target must be non-zero.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> Result<(), AccessError> {
        if caller != &self.owner {
            return Err(AccessError::NotOwner);
        }
        if new_owner.is_zero() {
            return Err(AccessError::InvalidAddress);
        }
        self.owner = new_owner;
        Ok(())
    }

    // ───────────────────────── Listers ─────────────────────────

    /// Whether `who` may manage the whitelist. The owner always may.
    pub fn is_lister(&self, who: &Address) -> bool {
        who == &self.owner || self.listers.contains(who)
    }

    /// Grant the lister capability. Owner-only; silent no-op if already
    /// a lister.
    pub fn add_whitelister(
        &mut self,
        caller: &Address,
        lister: Address,
    ) -> Result<(), AccessError> {
        if caller != &self.owner {
            return Err(AccessError::NotOwner);
        }
        if lister.is_zero() {
            return Err(AccessError::InvalidAddress);
        }
        if self.listers.insert(lister.clone()) {
            self.events
                .push(ContractEvent::WhitelisterAdded(WhitelisterAdded { lister }));
        }
        Ok(())
    }

    /// Revoke the lister capability. Owner-only; silent no-op if absent.
    pub fn remove_whitelister(
        &mut self,
        caller: &Address,
        lister: &Address,
    ) -> Result<(), AccessError> {
        if caller != &self.owner {
            return Err(AccessError::NotOwner);
        }
        if lister.is_zero() {
            return Err(AccessError::InvalidAddress);
        }
        if self.listers.remove(lister) {
            self.events
                .push(ContractEvent::WhitelisterRemoved(WhitelisterRemoved {
                    lister: lister.clone(),
                }));
        }
        Ok(())
    }

    // ───────────────────────── Whitelist ─────────────────────────

    /// Pure membership query. The zero address is never whitelisted.
    pub fn is_whitelisted(&self, who: &Address) -> bool {
        !who.is_zero() && self.whitelist.contains(who)
    }

    /// Admit an address. Lister-only; silent no-op if already present.
    pub fn add_to_whitelist(
        &mut self,
        caller: &Address,
        address: Address,
    ) -> Result<(), AccessError> {
        if !self.is_lister(caller) {
            return Err(AccessError::NotLister);
        }
        if address.is_zero() {
            return Err(AccessError::InvalidAddress);
        }
        if self.whitelist.insert(address.clone()) {
            self.events
                .push(ContractEvent::Whitelisted(Whitelisted { address }));
        }
        Ok(())
    }

    /// Remove an address. Lister-only; silent no-op if absent.
    pub fn remove_from_whitelist(
        &mut self,
        caller: &Address,
        address: &Address,
    ) -> Result<(), AccessError> {
        if !self.is_lister(caller) {
            return Err(AccessError::NotLister);
        }
        if address.is_zero() {
            return Err(AccessError::InvalidAddress);
        }
        if self.whitelist.remove(address) {
            self.events.push(ContractEvent::WhitelistedAddressRemoved(
                WhitelistedAddressRemoved {
                    address: address.clone(),
                },
            ));
        }
        Ok(())
    }

    /// Number of whitelisted addresses.
    pub fn whitelist_count(&self) -> usize {
        self.whitelist.len()
    }

    /// Number of explicit listers (the owner is not counted).
    pub fn lister_count(&self) -> usize {
        self.listers.len()
    }

    // ───────────────────────── Events ─────────────────────────

    /// Get all emitted events.
    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }
}
