//! Internal balance book backing the escrow ledger
//!
//! Tracks free balances per identity plus the custody total held against
//! locked records. Lock moves a depositor balance into custody;
//! release/refund move custody back out. Only the actor task touches this,
//! so plain maps suffice.

use crate::{Error, Result};
use booking_core::Address;
use std::collections::HashMap;

/// Balance book (all amounts in cents)
#[derive(Debug, Default)]
pub struct Vault {
    balances: HashMap<Address, u64>,
    custody_cents: u64,
}

impl Vault {
    /// Create an empty vault
    pub fn new() -> Self {
        Self::default()
    }

    /// Free balance of an identity
    pub fn balance_of(&self, address: &Address) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Total held in custody across all locked records
    pub fn custody_cents(&self) -> u64 {
        self.custody_cents
    }

    /// Credit a free balance (on-ramp hook; provider integration is external)
    pub fn fund(&mut self, address: Address, amount_cents: u64) {
        *self.balances.entry(address).or_insert(0) += amount_cents;
    }

    /// Move `amount_cents` from a depositor's free balance into custody
    pub fn move_into_custody(&mut self, depositor: &Address, amount_cents: u64) -> Result<()> {
        let available = self.balance_of(depositor);
        if available < amount_cents {
            return Err(Error::InsufficientFunds {
                available,
                required: amount_cents,
            });
        }
        self.balances.insert(depositor.clone(), available - amount_cents);
        self.custody_cents += amount_cents;
        Ok(())
    }

    /// Move `amount_cents` out of custody to a recipient's free balance
    ///
    /// Callers must have already verified the amount against the record;
    /// custody underflow here would mean a broken invariant upstream.
    pub fn move_out_of_custody(&mut self, recipient: &Address, amount_cents: u64) -> Result<()> {
        let custody = self
            .custody_cents
            .checked_sub(amount_cents)
            .ok_or(Error::AmountMismatch {
                expected: self.custody_cents,
                actual: amount_cents,
            })?;
        self.custody_cents = custody;
        *self.balances.entry(recipient.clone()).or_insert(0) += amount_cents;
        Ok(())
    }
}
