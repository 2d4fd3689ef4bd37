//! Staked access — single-token escrow selling access passes
//!
//! A simpler, single-purpose variant of the deposit ledger scoped to one
//! token and one staker dimension. Two configurations exist:
//!
//! - **Fixed expiry** (factory-created): a fixed price per stake, one
//!   absolute expiry for the whole contract, one stake per staker. Once the
//!   expiry passes, new stakes are refused and every staker may retrieve
//!   regardless of their individual lock.
//! - **Rolling period**: variable stake amounts, top-ups accumulate and
//!   refresh the release date, partial retrieval allowed.
//!
//! Optionally gated by an embedded access list: when the whitelist
//! requirement is on, only whitelisted stakers may stake.

use rust_decimal::Decimal;
use std::collections::HashMap;
use types::ids::{Address, EscrowId};
use types::token::Token;

use crate::access::AccessList;
use crate::errors::{AccessError, EscrowError};
use crate::events::{ContractEvent, Retrieved, Staked};
use crate::security::ReentrancyGuard;

/// Lock terms for a staked-access escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeTerms {
    /// One absolute expiry for the whole contract.
    FixedExpiry { expiry: i64 },
    /// A lock duration measured from each stake.
    RollingPeriod { period: i64 },
}

/// Whether a staker may stake more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestakePolicy {
    /// A second stake fails.
    Single,
    /// Top-ups accumulate and refresh the release date.
    Accumulate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StakeEntry {
    amount: Decimal,
    release_date: i64,
}

/// Single-token staking escrow.
#[derive(Debug)]
pub struct StakedAccess {
    id: EscrowId,
    /// Custody identity at the token contract
    address: Address,
    /// Fixed price per stake; `None` allows variable amounts
    price: Option<Decimal>,
    terms: StakeTerms,
    restake: RestakePolicy,
    access: AccessList,
    require_whitelist: bool,
    stakes: HashMap<Address, StakeEntry>,
    reentrancy: ReentrancyGuard,
    events: Vec<ContractEvent>,
}

impl StakedAccess {
    /// Create a fixed-expiry, fixed-price, stake-once escrow.
    ///
    /// Validates `expiry > now` and `price > 0` before any state exists.
    pub fn with_expiry(
        id: EscrowId,
        address: Address,
        owner: Address,
        expiry: i64,
        price: Decimal,
        current_time: i64,
    ) -> Result<Self, EscrowError> {
        if expiry <= current_time {
            return Err(EscrowError::InvalidExpiry);
        }
        if price <= Decimal::ZERO {
            return Err(EscrowError::InvalidPrice);
        }
        Self::build(
            id,
            address,
            owner,
            Some(price),
            StakeTerms::FixedExpiry { expiry },
            RestakePolicy::Single,
        )
    }

    /// Create a rolling-period, variable-amount escrow with top-ups.
    pub fn with_period(
        id: EscrowId,
        address: Address,
        owner: Address,
        period: i64,
    ) -> Result<Self, EscrowError> {
        if period <= 0 {
            return Err(EscrowError::InvalidPeriod);
        }
        Self::build(
            id,
            address,
            owner,
            None,
            StakeTerms::RollingPeriod { period },
            RestakePolicy::Accumulate,
        )
    }

    fn build(
        id: EscrowId,
        address: Address,
        owner: Address,
        price: Option<Decimal>,
        terms: StakeTerms,
        restake: RestakePolicy,
    ) -> Result<Self, EscrowError> {
        if address.is_zero() {
            return Err(AccessError::InvalidAddress.into());
        }
        Ok(Self {
            id,
            address,
            price,
            terms,
            restake,
            access: AccessList::new(owner)?,
            require_whitelist: false,
            stakes: HashMap::new(),
            reentrancy: ReentrancyGuard::new(),
            events: Vec::new(),
        })
    }

    // ───────────────────────── Staking ─────────────────────────

    /// Stake `amount`, pulling it from the staker via the token.
    ///
    /// With a fixed price configured the amount must match it exactly.
    pub fn stake<T: Token>(
        &mut self,
        token: &mut T,
        staker: &Address,
        amount: Decimal,
        current_time: i64,
    ) -> Result<ContractEvent, EscrowError> {
        if !self.reentrancy.acquire() {
            return Err(EscrowError::Reentrancy);
        }
        let result = self.stake_guarded(token, staker, amount, current_time);
        self.reentrancy.release();
        result
    }

    /// Stake exactly the configured fixed price.
    pub fn stake_at_price<T: Token>(
        &mut self,
        token: &mut T,
        staker: &Address,
        current_time: i64,
    ) -> Result<ContractEvent, EscrowError> {
        let price = self.price.ok_or(EscrowError::WrongConfiguration)?;
        self.stake(token, staker, price, current_time)
    }

    fn stake_guarded<T: Token>(
        &mut self,
        token: &mut T,
        staker: &Address,
        amount: Decimal,
        current_time: i64,
    ) -> Result<ContractEvent, EscrowError> {
        if staker.is_zero() {
            return Err(AccessError::InvalidAddress.into());
        }
        if self.require_whitelist && !self.access.is_whitelisted(staker) {
            return Err(EscrowError::NotWhitelisted);
        }
        if let StakeTerms::FixedExpiry { expiry } = self.terms {
            if current_time >= expiry {
                return Err(EscrowError::Expired { expiry });
            }
        }
        if amount <= Decimal::ZERO {
            return Err(EscrowError::InvalidAmount);
        }
        if let Some(price) = self.price {
            if amount != price {
                return Err(EscrowError::PriceMismatch {
                    amount: amount.to_string(),
                    price: price.to_string(),
                });
            }
        }

        let existing = self.stakes.get(staker).copied();
        if existing.is_some() && self.restake == RestakePolicy::Single {
            return Err(EscrowError::AlreadyStaked);
        }
        let held = existing.map_or(Decimal::ZERO, |e| e.amount);
        let cumulative = held.checked_add(amount).ok_or(EscrowError::Overflow)?;

        token.transfer_from(&self.address, staker, &self.address, amount)?;

        let release_date = match self.terms {
            StakeTerms::FixedExpiry { expiry } => expiry,
            StakeTerms::RollingPeriod { period } => {
                let stamped = current_time + period;
                existing.map_or(stamped, |e| e.release_date.max(stamped))
            }
        };
        self.stakes.insert(
            staker.clone(),
            StakeEntry {
                amount: cumulative,
                release_date,
            },
        );

        tracing::debug!(escrow = %self.address, staker = %staker, %amount, "stake accepted");

        let event = ContractEvent::Staked(Staked {
            escrow: self.address.clone(),
            staker: staker.clone(),
            amount,
        });
        self.events.push(event.clone());
        Ok(event)
    }

    // ───────────────────────── Retrieval ─────────────────────────

    /// Retrieve part of the stake. The remainder keeps its release date.
    pub fn retrieve<T: Token>(
        &mut self,
        token: &mut T,
        staker: &Address,
        amount: Decimal,
        current_time: i64,
    ) -> Result<ContractEvent, EscrowError> {
        if !self.reentrancy.acquire() {
            return Err(EscrowError::Reentrancy);
        }
        let result = self.retrieve_guarded(token, staker, Some(amount), current_time);
        self.reentrancy.release();
        result
    }

    /// Retrieve the full stake.
    pub fn retrieve_all<T: Token>(
        &mut self,
        token: &mut T,
        staker: &Address,
        current_time: i64,
    ) -> Result<ContractEvent, EscrowError> {
        if !self.reentrancy.acquire() {
            return Err(EscrowError::Reentrancy);
        }
        let result = self.retrieve_guarded(token, staker, None, current_time);
        self.reentrancy.release();
        result
    }

    fn retrieve_guarded<T: Token>(
        &mut self,
        token: &mut T,
        staker: &Address,
        amount: Option<Decimal>,
        current_time: i64,
    ) -> Result<ContractEvent, EscrowError> {
        let entry = self
            .stakes
            .get(staker)
            .copied()
            .ok_or_else(|| EscrowError::NoStake {
                staker: staker.to_string(),
            })?;

        // The fixed expiry is an escape hatch: once it has passed, every
        // staker may retrieve regardless of their individual lock.
        if !self.has_expired(current_time) && current_time < entry.release_date {
            return Err(EscrowError::NotYetUnlocked {
                release_date: entry.release_date,
            });
        }

        let requested = amount.unwrap_or(entry.amount);
        if requested <= Decimal::ZERO {
            return Err(EscrowError::InvalidAmount);
        }
        if requested > entry.amount {
            return Err(EscrowError::InsufficientFunds {
                required: requested.to_string(),
                staked: entry.amount.to_string(),
            });
        }

        let remaining = entry.amount - requested;
        if remaining.is_zero() {
            self.stakes.remove(staker);
        } else {
            self.stakes.insert(
                staker.clone(),
                StakeEntry {
                    amount: remaining,
                    release_date: entry.release_date,
                },
            );
        }

        if let Err(err) = token.transfer(&self.address, staker, requested) {
            self.stakes.insert(staker.clone(), entry);
            return Err(err.into());
        }

        tracing::debug!(escrow = %self.address, staker = %staker, amount = %requested, "stake retrieved");

        let event = ContractEvent::Retrieved(Retrieved {
            escrow: self.address.clone(),
            staker: staker.clone(),
            amount: requested,
        });
        self.events.push(event.clone());
        Ok(event)
    }

    // ───────────────────────── Administration ─────────────────────────

    /// Change the fixed price. Owner-only; applies to subsequent stakes.
    pub fn set_price(&mut self, caller: &Address, price: Decimal) -> Result<(), EscrowError> {
        self.require_owner(caller)?;
        if self.price.is_none() {
            return Err(EscrowError::WrongConfiguration);
        }
        if price <= Decimal::ZERO {
            return Err(EscrowError::InvalidPrice);
        }
        self.price = Some(price);
        Ok(())
    }

    /// Change the rolling lock period. Owner-only; applies to subsequent
    /// stakes — existing release dates are untouched.
    pub fn set_period(&mut self, caller: &Address, period: i64) -> Result<(), EscrowError> {
        self.require_owner(caller)?;
        let StakeTerms::RollingPeriod { .. } = self.terms else {
            return Err(EscrowError::WrongConfiguration);
        };
        if period <= 0 {
            return Err(EscrowError::InvalidPeriod);
        }
        self.terms = StakeTerms::RollingPeriod { period };
        Ok(())
    }

    /// Toggle the whitelist gate. Owner-only.
    pub fn set_whitelist_required(
        &mut self,
        caller: &Address,
        required: bool,
    ) -> Result<(), EscrowError> {
        self.require_owner(caller)?;
        self.require_whitelist = required;
        Ok(())
    }

    /// Grant the lister capability. Owner-only.
    pub fn add_whitelister(&mut self, caller: &Address, lister: Address) -> Result<(), EscrowError> {
        self.access.add_whitelister(caller, lister)?;
        self.events.extend(self.access.drain_events());
        Ok(())
    }

    /// Revoke the lister capability. Owner-only.
    pub fn remove_whitelister(
        &mut self,
        caller: &Address,
        lister: &Address,
    ) -> Result<(), EscrowError> {
        self.access.remove_whitelister(caller, lister)?;
        self.events.extend(self.access.drain_events());
        Ok(())
    }

    /// Admit a staker to the whitelist. Lister-only.
    pub fn add_to_whitelist(
        &mut self,
        caller: &Address,
        address: Address,
    ) -> Result<(), EscrowError> {
        self.access.add_to_whitelist(caller, address)?;
        self.events.extend(self.access.drain_events());
        Ok(())
    }

    /// Remove a staker from the whitelist. Lister-only.
    pub fn remove_from_whitelist(
        &mut self,
        caller: &Address,
        address: &Address,
    ) -> Result<(), EscrowError> {
        self.access.remove_from_whitelist(caller, address)?;
        self.events.extend(self.access.drain_events());
        Ok(())
    }

    // ───────────────────────── Queries ─────────────────────────

    /// Whether the fixed expiry (if any) has passed.
    pub fn has_expired(&self, current_time: i64) -> bool {
        matches!(self.terms, StakeTerms::FixedExpiry { expiry } if current_time >= expiry)
    }

    /// Whether the staker holds an active stake.
    pub fn has_stake(&self, staker: &Address) -> bool {
        self.stakes.contains_key(staker)
    }

    /// Whether the escrow holds funds for `staker`. The zero address
    /// returns `false` without erroring.
    pub fn has_funds(&self, staker: &Address) -> bool {
        !staker.is_zero() && self.has_stake(staker)
    }

    /// The staker's current stake.
    pub fn stake_of(&self, staker: &Address) -> Decimal {
        self.stakes
            .get(staker)
            .map_or(Decimal::ZERO, |e| e.amount)
    }

    /// The staker's release date (unix seconds); zero if absent.
    pub fn release_date(&self, staker: &Address) -> i64 {
        self.stakes.get(staker).map_or(0, |e| e.release_date)
    }

    /// Whitelist membership query.
    pub fn is_whitelisted(&self, who: &Address) -> bool {
        self.access.is_whitelisted(who)
    }

    /// The configured fixed price, if any.
    pub fn price(&self) -> Option<Decimal> {
        self.price
    }

    /// The lock terms.
    pub fn terms(&self) -> StakeTerms {
        self.terms
    }

    /// The absolute expiry, for fixed-expiry escrows.
    pub fn expiry(&self) -> Option<i64> {
        match self.terms {
            StakeTerms::FixedExpiry { expiry } => Some(expiry),
            StakeTerms::RollingPeriod { .. } => None,
        }
    }

    /// Number of active stakers.
    pub fn staker_count(&self) -> usize {
        self.stakes.len()
    }

    /// Sum of all tracked stakes.
    pub fn total_staked(&self) -> Decimal {
        self.stakes.values().map(|e| e.amount).sum()
    }

    /// This escrow's identifier.
    pub fn id(&self) -> EscrowId {
        self.id
    }

    /// This escrow's custody identity at the token.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The owner.
    pub fn owner(&self) -> &Address {
        self.access.owner()
    }

    /// Get all emitted events.
    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }

    fn require_owner(&self, caller: &Address) -> Result<(), EscrowError> {
        if caller != self.access.owner() {
            return Err(EscrowError::Unauthorized);
        }
        Ok(())
    }
}
