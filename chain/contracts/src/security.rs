//! Shared security primitives for contract modules
//!
//! Provides the reentrancy guard and the pause/migration lifecycle used by
//! the deposit ledger and the staked-access escrow.

use serde::{Deserialize, Serialize};
use types::ids::Address;

use crate::errors::LifecycleError;

/// Reentrancy guard preventing nested calls into protected functions.
///
/// A contract function acquires the guard before executing state-changing
/// logic and releases it on completion. Any nested call attempt fails.
#[derive(Debug, Clone)]
pub struct ReentrancyGuard {
    locked: bool,
}

impl ReentrancyGuard {
    /// Create a new unlocked guard.
    pub fn new() -> Self {
        Self { locked: false }
    }

    /// Acquire the guard. Returns `true` if successfully acquired.
    /// Returns `false` if already locked (reentrancy attempt).
    pub fn acquire(&mut self) -> bool {
        if self.locked {
            return false;
        }
        self.locked = true;
        true
    }

    /// Release the guard.
    pub fn release(&mut self) {
        self.locked = false;
    }

    /// Check if currently locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of a custody contract.
///
/// `Active → Paused` and back are reversible administrative moves. Once a
/// migration target is recorded the contract is `Migrated`: the pause is
/// permanent and only the successor address may still be re-pointed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Active,
    Paused,
    Migrated { target: Address },
}

/// Pause/migration state machine.
///
/// While paused (with or without a migration target) deposit-class
/// operations must be rejected; returning already-custodied funds stays
/// permitted so an administrative pause never traps depositors.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    /// Create a new active lifecycle.
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Active,
        }
    }

    /// Current state.
    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// True in `Paused` and `Migrated`.
    pub fn is_paused(&self) -> bool {
        !matches!(self.state, LifecycleState::Active)
    }

    /// The successor address, once migrated.
    pub fn migration_target(&self) -> Option<&Address> {
        match &self.state {
            LifecycleState::Migrated { target } => Some(target),
            _ => None,
        }
    }

    /// `Active → Paused`.
    pub fn pause(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            LifecycleState::Active => {
                self.state = LifecycleState::Paused;
                Ok(())
            }
            LifecycleState::Paused => Err(LifecycleError::AlreadyPaused),
            LifecycleState::Migrated { .. } => Err(LifecycleError::Migrated),
        }
    }

    /// `Paused → Active`. Fails permanently once migrated.
    pub fn unpause(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            LifecycleState::Paused => {
                self.state = LifecycleState::Active;
                Ok(())
            }
            LifecycleState::Active => Err(LifecycleError::NotPaused),
            LifecycleState::Migrated { .. } => Err(LifecycleError::Migrated),
        }
    }

    /// One-way move into `Migrated`, pausing if still active.
    pub fn pause_and_upgrade(&mut self, target: Address) -> Result<(), LifecycleError> {
        if target.is_zero() {
            return Err(LifecycleError::InvalidTarget);
        }
        match self.state {
            LifecycleState::Migrated { .. } => Err(LifecycleError::Migrated),
            _ => {
                self.state = LifecycleState::Migrated { target };
                Ok(())
            }
        }
    }

    /// Re-point the successor address. Only valid once migrated.
    pub fn set_new_contract(&mut self, target: Address) -> Result<(), LifecycleError> {
        if target.is_zero() {
            return Err(LifecycleError::InvalidTarget);
        }
        match self.state {
            LifecycleState::Migrated { .. } => {
                self.state = LifecycleState::Migrated { target };
                Ok(())
            }
            _ => Err(LifecycleError::NotMigrated),
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
