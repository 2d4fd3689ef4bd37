//! Contract events
//!
//! Events are immutable records emitted by contract operations; off-chain
//! observers use them to confirm state transitions without polling. Each
//! carries the identities and amount involved. Redundant access-list calls
//! emit nothing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::{Address, EscrowId};

/// Collateral pulled into custody for (depositor, counterparty, key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub depositor: Address,
    pub counterparty: Address,
    pub key: String,
    pub amount: Decimal,
}

/// Collateral returned to the depositor on their own initiative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub depositor: Address,
    pub counterparty: Address,
    pub key: String,
    pub amount: Decimal,
}

/// Collateral returned to the depositor by the counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refunded {
    pub depositor: Address,
    pub counterparty: Address,
    pub key: String,
    pub amount: Decimal,
}

/// Collateral paid out to the counterparty on the depositor's authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Released {
    pub depositor: Address,
    pub counterparty: Address,
    pub key: String,
    pub amount: Decimal,
}

/// Stake placed into a staked-access escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staked {
    pub escrow: Address,
    pub staker: Address,
    pub amount: Decimal,
}

/// Stake (fully or partially) retrieved from a staked-access escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retrieved {
    pub escrow: Address,
    pub staker: Address,
    pub amount: Decimal,
}

/// A lister was granted the whitelist-management capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelisterAdded {
    pub lister: Address,
}

/// A lister's capability was revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelisterRemoved {
    pub lister: Address,
}

/// An address was admitted to the whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whitelisted {
    pub address: Address,
}

/// An address was removed from the whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistedAddressRemoved {
    pub address: Address,
}

/// A new staked-access escrow was created by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakedAccessCreated {
    pub id: EscrowId,
    pub escrow: Address,
    pub owner: Address,
    pub price: Decimal,
    pub expiry: i64,
}

/// Enum wrapper for all contract events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    Deposited(Deposited),
    Withdrawn(Withdrawn),
    Refunded(Refunded),
    Released(Released),
    Staked(Staked),
    Retrieved(Retrieved),
    WhitelisterAdded(WhitelisterAdded),
    WhitelisterRemoved(WhitelisterRemoved),
    Whitelisted(Whitelisted),
    WhitelistedAddressRemoved(WhitelistedAddressRemoved),
    StakedAccessCreated(StakedAccessCreated),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposited_serialization() {
        let event = Deposited {
            depositor: Address::new("alice"),
            counterparty: Address::zero(),
            key: "ExchangeFoo".to_string(),
            amount: Decimal::from(1000),
        };
        let json = serde_json::to_string(&event).unwrap();
        let deser: Deposited = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deser);
    }

    #[test]
    fn test_contract_event_enum_variant() {
        let event = ContractEvent::Refunded(Refunded {
            depositor: Address::new("alice"),
            counterparty: Address::new("provider"),
            key: "MarketBorl".to_string(),
            amount: Decimal::from(1000),
        });
        assert!(matches!(event, ContractEvent::Refunded(_)));
    }

    #[test]
    fn test_staked_access_created_serialization() {
        let event = StakedAccessCreated {
            id: EscrowId::new(),
            escrow: Address::new("escrow-1"),
            owner: Address::new("superuser"),
            price: Decimal::from(10),
            expiry: 1_700_000_000,
        };
        let json = serde_json::to_string(&event).unwrap();
        let deser: StakedAccessCreated = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deser);
    }

    #[test]
    fn test_whitelist_event_round_trip() {
        let event = ContractEvent::Whitelisted(Whitelisted {
            address: Address::new("punter"),
        });
        let json = serde_json::to_string(&event).unwrap();
        let deser: ContractEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deser);
    }
}
