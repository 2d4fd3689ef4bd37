//! Staked-access factory — validated creation and discovery of escrows
//!
//! Creates fixed-expiry [`StakedAccess`] instances on demand. Parameters are
//! validated before anything is constructed, so an invalid request deploys
//! nothing. Each instance receives a deterministic custody address derived
//! from the factory's own address and the new instance's id.

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use types::ids::{Address, EscrowId};

use crate::errors::FactoryError;
use crate::events::{ContractEvent, StakedAccessCreated};
use crate::stake::StakedAccess;

/// Factory deploying staked-access escrows.
#[derive(Debug)]
pub struct StakedAccessFactory {
    address: Address,
    owner: Address,
    instances: HashMap<EscrowId, StakedAccess>,
    /// Ids in creation order (EscrowId is time-sortable, but the explicit
    /// list keeps enumeration O(n) without sorting)
    created: Vec<EscrowId>,
    events: Vec<ContractEvent>,
}

/// Derive the custody address for an instance: `sha256(factory ‖ id)`.
pub fn derive_escrow_address(factory: &Address, id: &EscrowId) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(factory.as_str().as_bytes());
    hasher.update(id.as_uuid().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    Address::new(format!("0x{hex}"))
}

impl StakedAccessFactory {
    /// Create a factory with its own custody address and an owner.
    pub fn new(address: Address, owner: Address) -> Result<Self, FactoryError> {
        if address.is_zero() || owner.is_zero() {
            return Err(FactoryError::InvalidAddress);
        }
        Ok(Self {
            address,
            owner,
            instances: HashMap::new(),
            created: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Create a new fixed-expiry staked-access escrow owned by the caller.
    ///
    /// Fails without deploying anything when `price` is not positive or
    /// `expiry` is not in the future. Emits `StakedAccessCreated` carrying
    /// the new instance's address.
    pub fn create_staked_access(
        &mut self,
        caller: &Address,
        expiry: i64,
        price: Decimal,
        current_time: i64,
    ) -> Result<EscrowId, FactoryError> {
        if caller.is_zero() {
            return Err(FactoryError::InvalidAddress);
        }
        if price <= Decimal::ZERO {
            return Err(FactoryError::InvalidPrice);
        }
        if expiry <= current_time {
            return Err(FactoryError::InvalidExpiry);
        }

        let id = EscrowId::new();
        let escrow_address = derive_escrow_address(&self.address, &id);
        let escrow = StakedAccess::with_expiry(
            id,
            escrow_address.clone(),
            caller.clone(),
            expiry,
            price,
            current_time,
        )?;

        self.instances.insert(id, escrow);
        self.created.push(id);

        tracing::info!(
            factory = %self.address,
            escrow = %escrow_address,
            owner = %caller,
            %price,
            expiry,
            "staked access created"
        );

        let event = ContractEvent::StakedAccessCreated(StakedAccessCreated {
            id,
            escrow: escrow_address,
            owner: caller.clone(),
            price,
            expiry,
        });
        self.events.push(event);
        Ok(id)
    }

    // ───────────────────────── Discovery ─────────────────────────

    /// Look up an instance by id.
    pub fn get(&self, id: &EscrowId) -> Option<&StakedAccess> {
        self.instances.get(id)
    }

    /// Look up an instance by id, mutably (to stake/retrieve against it).
    pub fn get_mut(&mut self, id: &EscrowId) -> Option<&mut StakedAccess> {
        self.instances.get_mut(id)
    }

    /// The custody address of an instance, if it exists.
    pub fn address_of(&self, id: &EscrowId) -> Option<&Address> {
        self.instances.get(id).map(|e| e.address())
    }

    /// Ids of all created instances, in creation order.
    pub fn created(&self) -> &[EscrowId] {
        &self.created
    }

    /// Number of instances created.
    pub fn count(&self) -> usize {
        self.created.len()
    }

    /// The factory's own custody address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The factory owner.
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Get all emitted events.
    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }
}
