//! Deposit ledger — balance accounting, time-locks, refunds, and lifecycle
//!
//! Implements the custody core:
//! - Balance tracking by (depositor, counterparty, key)
//! - Per-(counterparty, key) configuration: lock period, minimum deposit
//! - Deposit / withdraw / refund / mass-refund / release state machine
//! - Enumerable depositor index for bulk operations
//! - Pause and one-way pause-and-upgrade migration
//!
//! The external token is passed into each operation; bookkeeping is mutated
//! before the outbound transfer and restored if the transfer fails, so an
//! operation either completes entirely or has no effect.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use types::ids::Address;
use types::token::Token;

use crate::errors::LedgerError;
use crate::events::{ContractEvent, Deposited, Refunded, Released, Withdrawn};
use crate::index::DepositorIndex;
use crate::security::{Lifecycle, ReentrancyGuard};

/// A single balance entry. `release_date == 0` means no lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BalanceEntry {
    amount: Decimal,
    release_date: i64,
}

/// Per-(counterparty, key) service parameters.
#[derive(Debug, Clone, Copy, Default)]
struct ServiceConfig {
    /// Lock duration in seconds applied to future deposits.
    lock_period: i64,
    /// Minimum cumulative balance accepted for the key.
    minimum: Decimal,
}

/// Custody ledger for fungible-token collateral.
///
/// Balances are keyed by the triple (depositor, counterparty, key); a zero
/// counterparty denotes an open/public service. In escrow mode
/// ([`DepositLedger::escrow`]) deposited funds are committed to the named
/// counterparty: the depositor's exits are `release`, a counterparty
/// `refund`, or withdrawal during an administrative pause.
///
/// All state-changing operations check:
/// 1. Reentrancy guard
/// 2. Lifecycle (pause/migration) state
/// 3. Capability (where applicable)
/// 4. Argument validity and collaborator outcome
#[derive(Debug)]
pub struct DepositLedger {
    /// Custody identity at the token contract
    address: Address,
    /// Administrator
    owner: Address,
    /// Escrow mode: withdrawal only while paused
    held_for_counterparty: bool,
    /// Balances: (depositor, counterparty, key) -> entry. No zero entries
    /// are ever stored.
    balances: HashMap<(Address, Address, String), BalanceEntry>,
    /// Service parameters: (counterparty, key) -> config
    configs: HashMap<(Address, String), ServiceConfig>,
    /// Enumerable depositor registry
    index: DepositorIndex,
    /// Pause / migration state
    lifecycle: Lifecycle,
    /// Security: reentrancy guard
    reentrancy: ReentrancyGuard,
    /// Emitted events log (append-only)
    events: Vec<ContractEvent>,
}

impl DepositLedger {
    /// Create a vault-mode ledger: withdrawal is lock-bound but otherwise
    /// at the depositor's discretion.
    pub fn new(address: Address, owner: Address) -> Result<Self, LedgerError> {
        Self::with_mode(address, owner, false)
    }

    /// Create an escrow-mode ledger: deposits must name a counterparty and
    /// stay committed until released, refunded, or the contract is paused.
    pub fn escrow(address: Address, owner: Address) -> Result<Self, LedgerError> {
        Self::with_mode(address, owner, true)
    }

    fn with_mode(
        address: Address,
        owner: Address,
        held_for_counterparty: bool,
    ) -> Result<Self, LedgerError> {
        if address.is_zero() || owner.is_zero() {
            return Err(LedgerError::InvalidAddress);
        }
        Ok(Self {
            address,
            owner,
            held_for_counterparty,
            balances: HashMap::new(),
            configs: HashMap::new(),
            index: DepositorIndex::new(),
            lifecycle: Lifecycle::new(),
            reentrancy: ReentrancyGuard::new(),
            events: Vec::new(),
        })
    }

    // ───────────────────────── Deposit ─────────────────────────

    /// Deposit `amount` of collateral for (counterparty, key).
    ///
    /// Pulls the funds from the depositor via the token's `transfer_from`
    /// (the depositor must have approved this ledger), credits the balance,
    /// registers the depositor in the index on their first nonzero balance
    /// for the key, and stamps the release date from the configured lock
    /// period. The last deposit governs the release date, but a stamp never
    /// moves backwards.
    pub fn deposit<T: Token>(
        &mut self,
        token: &mut T,
        depositor: &Address,
        amount: Decimal,
        counterparty: &Address,
        key: &str,
        current_time: i64,
    ) -> Result<ContractEvent, LedgerError> {
        if !self.reentrancy.acquire() {
            return Err(LedgerError::Reentrancy);
        }
        let result =
            self.deposit_guarded(token, depositor, amount, counterparty, key, current_time);
        self.reentrancy.release();
        result
    }

    fn deposit_guarded<T: Token>(
        &mut self,
        token: &mut T,
        depositor: &Address,
        amount: Decimal,
        counterparty: &Address,
        key: &str,
        current_time: i64,
    ) -> Result<ContractEvent, LedgerError> {
        if self.lifecycle.is_paused() {
            return Err(LedgerError::Paused);
        }
        if depositor.is_zero() {
            return Err(LedgerError::InvalidAddress);
        }
        if self.held_for_counterparty && counterparty.is_zero() {
            // a payment must name a payee
            return Err(LedgerError::InvalidAddress);
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let config = self.config(counterparty, key);
        let triple = (depositor.clone(), counterparty.clone(), key.to_string());
        let existing = self.balances.get(&triple).copied();
        let held = existing.map_or(Decimal::ZERO, |e| e.amount);

        let cumulative = held.checked_add(amount).ok_or(LedgerError::Overflow)?;
        if cumulative < config.minimum {
            return Err(LedgerError::BelowMinimum {
                cumulative: cumulative.to_string(),
                minimum: config.minimum.to_string(),
                key: key.to_string(),
            });
        }

        // Pull the collateral; a failure here leaves no state change.
        token.transfer_from(&self.address, depositor, &self.address, amount)?;

        let release_date = if config.lock_period > 0 {
            let stamped = current_time + config.lock_period;
            existing.map_or(stamped, |e| e.release_date.max(stamped))
        } else {
            existing.map_or(0, |e| e.release_date)
        };

        self.balances.insert(
            triple,
            BalanceEntry {
                amount: cumulative,
                release_date,
            },
        );
        if existing.is_none() {
            self.index.add(counterparty, key, depositor);
        }

        tracing::debug!(
            depositor = %depositor,
            counterparty = %counterparty,
            key,
            %amount,
            release_date,
            "deposit accepted"
        );

        let event = ContractEvent::Deposited(Deposited {
            depositor: depositor.clone(),
            counterparty: counterparty.clone(),
            key: key.to_string(),
            amount,
        });
        self.events.push(event.clone());
        Ok(event)
    }

    // ───────────────────────── Withdraw ─────────────────────────

    /// Withdraw the full balance for (counterparty, key).
    ///
    /// Refused while the balance is time-locked — unless the contract is
    /// paused, which waives the lock so an administrative pause never traps
    /// depositors. In escrow mode withdrawal is only available while paused.
    pub fn withdraw<T: Token>(
        &mut self,
        token: &mut T,
        depositor: &Address,
        counterparty: &Address,
        key: &str,
        current_time: i64,
    ) -> Result<ContractEvent, LedgerError> {
        if !self.reentrancy.acquire() {
            return Err(LedgerError::Reentrancy);
        }
        let result =
            self.withdraw_guarded(token, depositor, counterparty, key, None, current_time);
        self.reentrancy.release();
        result
    }

    /// Withdraw part of the balance. The remainder keeps its release date.
    pub fn withdraw_partial<T: Token>(
        &mut self,
        token: &mut T,
        depositor: &Address,
        counterparty: &Address,
        key: &str,
        amount: Decimal,
        current_time: i64,
    ) -> Result<ContractEvent, LedgerError> {
        if !self.reentrancy.acquire() {
            return Err(LedgerError::Reentrancy);
        }
        let result = self.withdraw_guarded(
            token,
            depositor,
            counterparty,
            key,
            Some(amount),
            current_time,
        );
        self.reentrancy.release();
        result
    }

    fn withdraw_guarded<T: Token>(
        &mut self,
        token: &mut T,
        depositor: &Address,
        counterparty: &Address,
        key: &str,
        amount: Option<Decimal>,
        current_time: i64,
    ) -> Result<ContractEvent, LedgerError> {
        let triple = (depositor.clone(), counterparty.clone(), key.to_string());
        let entry = self
            .balances
            .get(&triple)
            .copied()
            .ok_or_else(|| self.no_deposit(depositor, counterparty, key))?;

        if !self.lifecycle.is_paused() {
            if self.held_for_counterparty {
                return Err(LedgerError::EscrowHeld);
            }
            if current_time < entry.release_date {
                return Err(LedgerError::StillLocked {
                    release_date: entry.release_date,
                });
            }
        }

        let requested = amount.unwrap_or(entry.amount);
        if requested <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if requested > entry.amount {
            return Err(LedgerError::InsufficientFunds {
                required: requested.to_string(),
                held: entry.amount.to_string(),
            });
        }

        // Bookkeeping first, then the external transfer; restore on failure.
        let remaining = entry.amount - requested;
        if remaining.is_zero() {
            self.balances.remove(&triple);
            self.index.remove(counterparty, key, depositor);
        } else {
            self.balances.insert(
                triple.clone(),
                BalanceEntry {
                    amount: remaining,
                    release_date: entry.release_date,
                },
            );
        }

        if let Err(err) = token.transfer(&self.address, depositor, requested) {
            self.balances.insert(triple, entry);
            if remaining.is_zero() {
                self.index.add(counterparty, key, depositor);
            }
            return Err(err.into());
        }

        tracing::debug!(
            depositor = %depositor,
            counterparty = %counterparty,
            key,
            amount = %requested,
            "withdrawal completed"
        );

        let event = ContractEvent::Withdrawn(Withdrawn {
            depositor: depositor.clone(),
            counterparty: counterparty.clone(),
            key: key.to_string(),
            amount: requested,
        });
        self.events.push(event.clone());
        Ok(event)
    }

    // ───────────────────────── Refund ─────────────────────────

    /// Return a depositor's full balance for the caller's key.
    ///
    /// Callable only by the counterparty that owns the key; bypasses locks
    /// and pause, since a counterparty-initiated return never traps funds.
    pub fn refund<T: Token>(
        &mut self,
        token: &mut T,
        caller: &Address,
        depositor: &Address,
        key: &str,
    ) -> Result<ContractEvent, LedgerError> {
        if !self.reentrancy.acquire() {
            return Err(LedgerError::Reentrancy);
        }
        let result = self.refund_guarded(token, caller, depositor, key);
        self.reentrancy.release();
        result
    }

    fn refund_guarded<T: Token>(
        &mut self,
        token: &mut T,
        caller: &Address,
        depositor: &Address,
        key: &str,
    ) -> Result<ContractEvent, LedgerError> {
        let triple = (depositor.clone(), caller.clone(), key.to_string());
        let entry = self
            .balances
            .remove(&triple)
            .ok_or_else(|| self.no_deposit(depositor, caller, key))?;
        self.index.remove(caller, key, depositor);

        if let Err(err) = token.transfer(&self.address, depositor, entry.amount) {
            self.balances.insert(triple, entry);
            self.index.add(caller, key, depositor);
            return Err(err.into());
        }

        tracing::debug!(
            depositor = %depositor,
            counterparty = %caller,
            key,
            amount = %entry.amount,
            "refund completed"
        );

        let event = ContractEvent::Refunded(Refunded {
            depositor: depositor.clone(),
            counterparty: caller.clone(),
            key: key.to_string(),
            amount: entry.amount,
        });
        self.events.push(event.clone());
        Ok(event)
    }

    /// Refund every depositor registered for the caller's key, draining the
    /// index to empty. Returns the number of depositors refunded.
    ///
    /// All-or-nothing: the custody balance is checked against the batch
    /// total before any entry is touched, so a conforming token cannot fail
    /// mid-batch and leave a partially-refunded index.
    pub fn refund_all<T: Token>(
        &mut self,
        token: &mut T,
        caller: &Address,
        key: &str,
    ) -> Result<usize, LedgerError> {
        if !self.reentrancy.acquire() {
            return Err(LedgerError::Reentrancy);
        }
        let result = self.refund_all_guarded(token, caller, key);
        self.reentrancy.release();
        result
    }

    fn refund_all_guarded<T: Token>(
        &mut self,
        token: &mut T,
        caller: &Address,
        key: &str,
    ) -> Result<usize, LedgerError> {
        let snapshot = self.index.members(caller, key);

        let mut total = Decimal::ZERO;
        for depositor in &snapshot {
            let triple = (depositor.clone(), caller.clone(), key.to_string());
            if let Some(entry) = self.balances.get(&triple) {
                total = total.checked_add(entry.amount).ok_or(LedgerError::Overflow)?;
            }
        }
        let held = token.balance_of(&self.address);
        if total > held {
            return Err(LedgerError::InsufficientFunds {
                required: total.to_string(),
                held: held.to_string(),
            });
        }

        let mut refunded = 0;
        for depositor in &snapshot {
            let triple = (depositor.clone(), caller.clone(), key.to_string());
            let Some(entry) = self.balances.remove(&triple) else {
                continue;
            };
            self.index.remove(caller, key, depositor);
            token.transfer(&self.address, depositor, entry.amount)?;
            self.events.push(ContractEvent::Refunded(Refunded {
                depositor: depositor.clone(),
                counterparty: caller.clone(),
                key: key.to_string(),
                amount: entry.amount,
            }));
            refunded += 1;
        }

        tracing::info!(counterparty = %caller, key, refunded, "mass refund completed");
        Ok(refunded)
    }

    // ───────────────────────── Release ─────────────────────────

    /// Pay the full balance out to the counterparty on the depositor's
    /// authority.
    pub fn release<T: Token>(
        &mut self,
        token: &mut T,
        depositor: &Address,
        counterparty: &Address,
        key: &str,
    ) -> Result<ContractEvent, LedgerError> {
        if !self.reentrancy.acquire() {
            return Err(LedgerError::Reentrancy);
        }
        let result = self.release_guarded(token, depositor, counterparty, key);
        self.reentrancy.release();
        result
    }

    fn release_guarded<T: Token>(
        &mut self,
        token: &mut T,
        depositor: &Address,
        counterparty: &Address,
        key: &str,
    ) -> Result<ContractEvent, LedgerError> {
        if counterparty.is_zero() {
            return Err(LedgerError::InvalidAddress);
        }
        let triple = (depositor.clone(), counterparty.clone(), key.to_string());
        let entry = self
            .balances
            .remove(&triple)
            .ok_or_else(|| self.no_deposit(depositor, counterparty, key))?;
        self.index.remove(counterparty, key, depositor);

        if let Err(err) = token.transfer(&self.address, counterparty, entry.amount) {
            self.balances.insert(triple, entry);
            self.index.add(counterparty, key, depositor);
            return Err(err.into());
        }

        tracing::debug!(
            depositor = %depositor,
            counterparty = %counterparty,
            key,
            amount = %entry.amount,
            "release completed"
        );

        let event = ContractEvent::Released(Released {
            depositor: depositor.clone(),
            counterparty: counterparty.clone(),
            key: key.to_string(),
            amount: entry.amount,
        });
        self.events.push(event.clone());
        Ok(event)
    }

    // ───────────────────────── Service configuration ─────────────────────────

    /// Set the lock period (seconds) for the caller's key. Applies only to
    /// future deposits; already-stamped release dates are untouched.
    pub fn set_lock_period(
        &mut self,
        caller: &Address,
        key: &str,
        seconds: i64,
    ) -> Result<(), LedgerError> {
        if caller.is_zero() {
            return Err(LedgerError::InvalidAddress);
        }
        if seconds < 0 {
            return Err(LedgerError::InvalidPeriod);
        }
        self.configs
            .entry((caller.clone(), key.to_string()))
            .or_default()
            .lock_period = seconds;
        Ok(())
    }

    /// Set the minimum cumulative balance for the caller's key. Applies
    /// only to future deposits.
    pub fn set_minimum_deposit(
        &mut self,
        caller: &Address,
        key: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if caller.is_zero() {
            return Err(LedgerError::InvalidAddress);
        }
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        self.configs
            .entry((caller.clone(), key.to_string()))
            .or_default()
            .minimum = amount;
        Ok(())
    }

    // ───────────────────────── Lifecycle (admin) ─────────────────────────

    /// Pause the ledger. Owner-only. Blocks deposits; existing balances
    /// stay withdrawable.
    pub fn pause(&mut self, caller: &Address) -> Result<(), LedgerError> {
        self.require_owner(caller)?;
        self.lifecycle.pause()?;
        tracing::info!(ledger = %self.address, "ledger paused");
        Ok(())
    }

    /// Lift a pause. Owner-only; fails permanently once migrated.
    pub fn unpause(&mut self, caller: &Address) -> Result<(), LedgerError> {
        self.require_owner(caller)?;
        self.lifecycle.unpause()?;
        tracing::info!(ledger = %self.address, "ledger unpaused");
        Ok(())
    }

    /// Pause permanently and record the successor contract. Owner-only,
    /// one-way.
    pub fn pause_and_upgrade(
        &mut self,
        caller: &Address,
        target: Address,
    ) -> Result<(), LedgerError> {
        self.require_owner(caller)?;
        self.lifecycle.pause_and_upgrade(target.clone())?;
        tracing::info!(ledger = %self.address, target = %target, "ledger migrated");
        Ok(())
    }

    /// Re-point the successor contract after migration. Owner-only.
    pub fn set_new_contract(
        &mut self,
        caller: &Address,
        target: Address,
    ) -> Result<(), LedgerError> {
        self.require_owner(caller)?;
        self.lifecycle.set_new_contract(target)?;
        Ok(())
    }

    /// Transfer administration to a new owner.
    pub fn set_owner(&mut self, caller: &Address, new_owner: Address) -> Result<(), LedgerError> {
        self.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(LedgerError::InvalidAddress);
        }
        self.owner = new_owner;
        Ok(())
    }

    // ───────────────────────── Queries ─────────────────────────

    /// Balance for (depositor, counterparty, key).
    pub fn balance(&self, depositor: &Address, counterparty: &Address, key: &str) -> Decimal {
        self.entry(depositor, counterparty, key)
            .map_or(Decimal::ZERO, |e| e.amount)
    }

    /// Release date (unix seconds) for a balance; zero means no lock.
    pub fn release_date(&self, depositor: &Address, counterparty: &Address, key: &str) -> i64 {
        self.entry(depositor, counterparty, key)
            .map_or(0, |e| e.release_date)
    }

    /// Release date rendered as UTC, if a lock is stamped.
    pub fn release_date_utc(
        &self,
        depositor: &Address,
        counterparty: &Address,
        key: &str,
    ) -> Option<DateTime<Utc>> {
        let stamp = self.release_date(depositor, counterparty, key);
        if stamp == 0 {
            return None;
        }
        DateTime::from_timestamp(stamp, 0)
    }

    /// Whether the depositor holds any balance for (counterparty, key).
    pub fn has_deposit(&self, depositor: &Address, counterparty: &Address, key: &str) -> bool {
        self.entry(depositor, counterparty, key).is_some()
    }

    /// Whether the depositor's balance meets the key's configured minimum.
    pub fn has_deposit_above_minimum(
        &self,
        depositor: &Address,
        counterparty: &Address,
        key: &str,
    ) -> bool {
        match self.entry(depositor, counterparty, key) {
            Some(e) => e.amount >= self.config(counterparty, key).minimum,
            None => false,
        }
    }

    /// Configured lock period (seconds) for (counterparty, key).
    pub fn lock_period(&self, counterparty: &Address, key: &str) -> i64 {
        self.config(counterparty, key).lock_period
    }

    /// Configured minimum cumulative balance for (counterparty, key).
    pub fn minimum_deposit(&self, counterparty: &Address, key: &str) -> Decimal {
        self.config(counterparty, key).minimum
    }

    /// Number of depositors currently registered for (counterparty, key).
    pub fn depositor_count(&self, counterparty: &Address, key: &str) -> usize {
        self.index.count(counterparty, key)
    }

    /// Snapshot of the depositors registered for (counterparty, key).
    pub fn depositors(&self, counterparty: &Address, key: &str) -> Vec<Address> {
        self.index.members(counterparty, key)
    }

    /// A depositor's slot in the enumeration arena, if registered.
    pub fn depositor_position(
        &self,
        counterparty: &Address,
        key: &str,
        depositor: &Address,
    ) -> Option<usize> {
        self.index.position(counterparty, key, depositor)
    }

    /// Sum of every tracked balance. Never exceeds the custody balance at
    /// the token.
    pub fn total_tracked(&self) -> Decimal {
        self.balances.values().map(|e| e.amount).sum()
    }

    /// Whether deposits are currently refused.
    pub fn is_paused(&self) -> bool {
        self.lifecycle.is_paused()
    }

    /// The successor contract, once migrated.
    pub fn migration_target(&self) -> Option<&Address> {
        self.lifecycle.migration_target()
    }

    /// The administrator.
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// This ledger's custody identity at the token.
    pub fn address(&self) -> &Address {
        &self.address
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

    // ───────────────────────── Internal helpers ─────────────────────────

    fn entry(&self, depositor: &Address, counterparty: &Address, key: &str) -> Option<&BalanceEntry> {
        self.balances
            .get(&(depositor.clone(), counterparty.clone(), key.to_string()))
    }

    fn config(&self, counterparty: &Address, key: &str) -> ServiceConfig {
        self.configs
            .get(&(counterparty.clone(), key.to_string()))
            .copied()
            .unwrap_or_default()
    }

    fn require_owner(&self, caller: &Address) -> Result<(), LedgerError> {
        if caller != &self.owner {
            return Err(LedgerError::Unauthorized);
        }
        Ok(())
    }

    fn no_deposit(&self, depositor: &Address, counterparty: &Address, key: &str) -> LedgerError {
        LedgerError::NoDeposit {
            depositor: depositor.to_string(),
            counterparty: counterparty.to_string(),
            key: key.to_string(),
        }
    }
}
