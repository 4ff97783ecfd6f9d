//! Role-based access control for ledger operations
//!
//! Roles: **Admin** may pause/unpause and rotate relayers; **Relayer** may
//! release or refund; **Depositor** may lock funds for their own booking.
//! The relayer set is live so operational key rotation needs no redeploy.

use crate::{Error, Result};
use booking_core::Address;
use std::collections::HashSet;

/// Capability checker for ledger operations
#[derive(Debug, Clone)]
pub struct AccessControl {
    admin: Address,
    relayers: HashSet<Address>,
}

impl AccessControl {
    /// Create with an admin and an initial relayer set
    pub fn new(admin: Address, relayers: impl IntoIterator<Item = Address>) -> Self {
        Self {
            admin,
            relayers: relayers.into_iter().collect(),
        }
    }

    /// Require the admin role
    pub fn require_admin(&self, caller: &Address) -> Result<()> {
        if caller == &self.admin {
            Ok(())
        } else {
            Err(Error::UnauthorizedCaller(format!(
                "{caller} is not the admin"
            )))
        }
    }

    /// Require the relayer role
    pub fn require_relayer(&self, caller: &Address) -> Result<()> {
        if self.relayers.contains(caller) {
            Ok(())
        } else {
            Err(Error::UnauthorizedCaller(format!(
                "{caller} is not a relayer"
            )))
        }
    }

    /// Add a relayer identity; returns true if it was not already present
    pub fn add_relayer(&mut self, relayer: Address) -> bool {
        self.relayers.insert(relayer)
    }

    /// Remove a relayer identity; returns true if it was present
    pub fn remove_relayer(&mut self, relayer: &Address) -> bool {
        self.relayers.remove(relayer)
    }

    /// Current relayer count
    pub fn relayer_count(&self) -> usize {
        self.relayers.len()
    }
}
