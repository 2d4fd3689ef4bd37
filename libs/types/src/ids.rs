//! Identifier types for custody entities
//!
//! Participants are identified by opaque address strings; escrow instances
//! created by the factory use UUID v7 for time-sortable ordering, enabling
//! efficient chronological queries.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The canonical zero address, used for open/public services.
const ZERO_ADDRESS: &str = "0x0";

/// Opaque participant identity.
///
/// Depositors, counterparties, administrators and contract custody accounts
/// are all addressed through this type. The zero address is a valid
/// counterparty (an "open" service that any depositor may target) but is
/// never a valid owner, lister, or transfer destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Create an address from a raw identity string.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// The zero address, denoting the open/public counterparty.
    pub fn zero() -> Self {
        Self(ZERO_ADDRESS.to_string())
    }

    /// Whether this is the zero address.
    ///
    /// An empty identity string is treated as zero as well, so malformed
    /// input never passes a non-zero check.
    pub fn is_zero(&self) -> bool {
        self.0.is_empty() || self.0 == ZERO_ADDRESS
    }

    /// Get the raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Unique identifier for a factory-created escrow instance
///
/// Uses UUID v7 for time-based sorting, so instances enumerate in
/// creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscrowId(Uuid);

impl EscrowId {
    /// Create a new EscrowId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EscrowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EscrowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_zero() {
        assert!(Address::zero().is_zero());
        assert!(Address::new("").is_zero());
        assert!(!Address::new("alice").is_zero());
    }

    #[test]
    fn test_address_display() {
        let addr = Address::new("0xc59a2051");
        assert_eq!(addr.to_string(), "0xc59a2051");
        assert_eq!(addr.as_str(), "0xc59a2051");
    }

    #[test]
    fn test_address_from_str() {
        let addr: Address = "bob".into();
        assert_eq!(addr, Address::new("bob"));
    }

    #[test]
    fn test_address_serialization() {
        let addr = Address::new("carol");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"carol\"");

        let deserialized: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, deserialized);
    }

    #[test]
    fn test_escrow_id_creation() {
        let id1 = EscrowId::new();
        let id2 = EscrowId::new();
        assert_ne!(id1, id2, "EscrowIds should be unique");
    }

    #[test]
    fn test_escrow_id_serialization() {
        let id = EscrowId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: EscrowId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
