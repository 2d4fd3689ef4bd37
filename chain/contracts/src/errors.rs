//! Contract-specific error types
//!
//! Error taxonomy for the deposit ledger, access list, staked-access escrow,
//! and factory. Every error aborts the whole operation with no partial state
//! change; callers receive the violated precondition.

use thiserror::Error;
use types::token::TokenError;

/// Lifecycle transition errors shared by all pausable contracts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("Contract is already paused")]
    AlreadyPaused,

    #[error("Contract is not paused")]
    NotPaused,

    #[error("Contract has been migrated; the pause is permanent")]
    Migrated,

    #[error("Migration target must be a non-zero address")]
    InvalidTarget,

    #[error("No migration is in progress")]
    NotMigrated,
}

/// Deposit-ledger errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Ledger is paused")]
    Paused,

    #[error("Reentrancy detected")]
    Reentrancy,

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Address must be non-zero")]
    InvalidAddress,

    #[error("Lock period must be non-negative")]
    InvalidPeriod,

    #[error("Unauthorized: caller lacks the required capability")]
    Unauthorized,

    #[error("No deposit found for ({depositor}, {counterparty}, {key})")]
    NoDeposit {
        depositor: String,
        counterparty: String,
        key: String,
    },

    #[error("Deposit is locked until {release_date}")]
    StillLocked { release_date: i64 },

    #[error("Escrowed funds may only be withdrawn while the contract is paused")]
    EscrowHeld,

    #[error(
        "Cumulative balance {cumulative} is below the minimum {minimum} for key {key}"
    )]
    BelowMinimum {
        cumulative: String,
        minimum: String,
        key: String,
    },

    #[error("Insufficient custody funds: required {required}, held {held}")]
    InsufficientFunds { required: String, held: String },

    #[error("Arithmetic overflow in balance calculation")]
    Overflow,

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

/// Access-list errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    #[error("Unauthorized: caller is not the owner")]
    NotOwner,

    #[error("Unauthorized: caller is not a lister")]
    NotLister,

    #[error("Address must be non-zero")]
    InvalidAddress,
}

/// Staked-access escrow errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EscrowError {
    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Stake amount {amount} does not match the fixed price {price}")]
    PriceMismatch { amount: String, price: String },

    #[error("Price must be positive")]
    InvalidPrice,

    #[error("Period must be positive")]
    InvalidPeriod,

    #[error("Expiry must lie in the future")]
    InvalidExpiry,

    #[error("Unauthorized: caller is not the owner")]
    Unauthorized,

    #[error("Caller is not whitelisted")]
    NotWhitelisted,

    #[error("Escrow expired at {expiry}; no further stakes are accepted")]
    Expired { expiry: i64 },

    #[error("Staker already has an active stake")]
    AlreadyStaked,

    #[error("No stake found for {staker}")]
    NoStake { staker: String },

    #[error("Stake is locked until {release_date}")]
    NotYetUnlocked { release_date: i64 },

    #[error("Insufficient staked funds: required {required}, staked {staked}")]
    InsufficientFunds { required: String, staked: String },

    #[error("Operation not valid for this escrow configuration")]
    WrongConfiguration,

    #[error("Arithmetic overflow in stake calculation")]
    Overflow,

    #[error("Reentrancy detected")]
    Reentrancy,

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

/// Factory errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FactoryError {
    #[error("Price must be positive")]
    InvalidPrice,

    #[error("Expiry must lie in the future")]
    InvalidExpiry,

    #[error("Address must be non-zero")]
    InvalidAddress,

    #[error("Escrow error: {0}")]
    Escrow(#[from] EscrowError),
}
