//! External fungible-token collaborator interface
//!
//! The custody contracts never hold funds themselves; they instruct a token
//! contract to move them. This module defines that collaborator as a trait
//! with standard all-or-nothing transfer semantics: a call either moves the
//! full amount or fails with no effect.
//!
//! `MockToken` is the reference in-memory implementation used by the
//! contract test suites and simulations; its `free_money` faucet mints
//! balances directly so fixtures stay short.

use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

use crate::ids::Address;

/// Token-level failures, surfaced unchanged through contract operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    #[error("Insufficient token balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    #[error("Insufficient allowance: required {required}, approved {available}")]
    InsufficientAllowance { required: String, available: String },

    #[error("Transfer amount must be positive")]
    InvalidAmount,

    #[error("Arithmetic overflow in token balance")]
    Overflow,
}

/// Standard fungible-token interface.
///
/// Callers are explicit: there is no ambient transaction sender, so every
/// operation names the identity it acts for. `transfer_from` consumes the
/// allowance that `from` granted to `spender`.
pub trait Token {
    /// Current balance of `who`.
    fn balance_of(&self, who: &Address) -> Decimal;

    /// Remaining amount `spender` may move out of `owner`'s balance.
    fn allowance(&self, owner: &Address, spender: &Address) -> Decimal;

    /// Set `spender`'s allowance over `owner`'s balance to `amount`.
    fn approve(
        &mut self,
        owner: &Address,
        spender: &Address,
        amount: Decimal,
    ) -> Result<(), TokenError>;

    /// Move `amount` from `from` to `to`. All-or-nothing.
    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Decimal,
    ) -> Result<(), TokenError>;

    /// Move `amount` from `from` to `to` on behalf of `spender`,
    /// consuming allowance. All-or-nothing.
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Decimal,
    ) -> Result<(), TokenError>;
}

/// In-memory token with standard semantics, for tests and simulations.
#[derive(Debug, Clone, Default)]
pub struct MockToken {
    balances: HashMap<Address, Decimal>,
    allowances: HashMap<(Address, Address), Decimal>,
}

impl MockToken {
    /// Create an empty token ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Faucet: mint `amount` into `who`'s balance.
    pub fn free_money(&mut self, who: &Address, amount: Decimal) {
        let balance = self.balances.entry(who.clone()).or_insert(Decimal::ZERO);
        *balance += amount;
    }

    /// Total supply currently tracked across all holders.
    pub fn total_supply(&self) -> Decimal {
        self.balances.values().copied().sum()
    }

    /// Validate and apply a balance move atomically: both sides are checked
    /// before either is written, so a failure has no effect.
    fn move_funds(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                required: amount.to_string(),
                available: from_balance.to_string(),
            });
        }
        if from == to {
            return Ok(());
        }
        let new_to = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.balances.insert(from.clone(), from_balance - amount);
        self.balances.insert(to.clone(), new_to);
        Ok(())
    }
}

impl Token for MockToken {
    fn balance_of(&self, who: &Address) -> Decimal {
        self.balances.get(who).copied().unwrap_or(Decimal::ZERO)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Decimal {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn approve(
        &mut self,
        owner: &Address,
        spender: &Address,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        if amount < Decimal::ZERO {
            return Err(TokenError::InvalidAmount);
        }
        self.allowances
            .insert((owner.clone(), spender.clone()), amount);
        Ok(())
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        if amount <= Decimal::ZERO {
            return Err(TokenError::InvalidAmount);
        }
        self.move_funds(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Decimal,
    ) -> Result<(), TokenError> {
        if amount <= Decimal::ZERO {
            return Err(TokenError::InvalidAmount);
        }
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                required: amount.to_string(),
                available: allowed.to_string(),
            });
        }
        self.move_funds(from, to, amount)?;
        self.allowances
            .insert((from.clone(), spender.clone()), allowed - amount);
        Ok(())
    }
}
