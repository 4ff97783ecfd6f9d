//! Configuration for the escrow ledger

use booking_core::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Escrow ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Admin identity (may pause and rotate relayers)
    pub admin: Address,

    /// Initial relayer identities
    pub relayers: Vec<Address>,

    /// Actor mailbox capacity (bounded for backpressure)
    pub mailbox_capacity: usize,

    /// Event broadcast channel capacity
    pub event_capacity: usize,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            admin: Address::new("escrow-admin"),
            relayers: vec![],
            mailbox_capacity: 1024,
            event_capacity: 256,
        }
    }
}

impl EscrowConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("read failed: {e}")))?;
        toml::from_str(&contents).map_err(|e| crate::Error::Config(format!("parse failed: {e}")))
    }
}
