//! Core types for the escrow ledger

use booking_core::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Escrow record status
///
/// `Locked` is the only state funds can move out of; `Released` and
/// `Refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EscrowStatus {
    /// No record exists for this booking
    None = 0,
    /// Funds held in custody
    Locked = 1,
    /// Payout and fee transferred out (terminal)
    Released = 2,
    /// Full amount returned to the recipient (terminal)
    Refunded = 3,
}

impl EscrowStatus {
    /// True for `Released` and `Refunded`
    pub fn is_terminal(&self) -> bool {
        matches!(self, EscrowStatus::Released | EscrowStatus::Refunded)
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EscrowStatus::None => "none",
            EscrowStatus::Locked => "locked",
            EscrowStatus::Released => "released",
            EscrowStatus::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

/// Custodial ledger entry for one booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// Booking the funds belong to
    pub booking_id: Uuid,

    /// Identity that locked the funds
    pub depositor: Address,

    /// Locked amount (cents); immutable once set
    pub amount_cents: u64,

    /// Current status
    pub status: EscrowStatus,

    /// When the funds were locked
    pub locked_at: Option<DateTime<Utc>>,

    /// When the record reached a terminal status
    pub settled_at: Option<DateTime<Utc>>,
}

impl EscrowRecord {
    /// Zeroed record returned for unknown booking ids
    pub fn empty(booking_id: Uuid) -> Self {
        Self {
            booking_id,
            depositor: Address::new(""),
            amount_cents: 0,
            status: EscrowStatus::None,
            locked_at: None,
            settled_at: None,
        }
    }
}

/// Observable ledger event, published on every state change
///
/// Consumed by audit/logging collaborators outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EscrowEvent {
    /// Funds moved into custody
    FundsLocked {
        /// Booking id
        booking_id: Uuid,
        /// Depositor identity
        depositor: Address,
        /// Locked amount (cents)
        amount_cents: u64,
    },
    /// Funds split out to payout and fee recipients
    FundsReleased {
        /// Booking id
        booking_id: Uuid,
        /// Payout recipient
        payout_recipient: Address,
        /// Payout amount (cents)
        payout_cents: u64,
        /// Fee recipient
        fee_recipient: Address,
        /// Fee amount (cents)
        fee_cents: u64,
    },
    /// Full amount returned
    FundsRefunded {
        /// Booking id
        booking_id: Uuid,
        /// Refund recipient
        recipient: Address,
        /// Refunded amount (cents)
        amount_cents: u64,
    },
    /// Relayer identity added to the live set
    RelayerAdded {
        /// New relayer
        relayer: Address,
    },
    /// Relayer identity removed from the live set
    RelayerRemoved {
        /// Removed relayer
        relayer: Address,
    },
    /// Mutating operations suspended
    Paused,
    /// Mutating operations resumed
    Unpaused,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!EscrowStatus::None.is_terminal());
        assert!(!EscrowStatus::Locked.is_terminal());
        assert!(EscrowStatus::Released.is_terminal());
        assert!(EscrowStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_event_json_shape() {
        let event = EscrowEvent::FundsLocked {
            booking_id: Uuid::nil(),
            depositor: Address::new("customer"),
            amount_cents: 10_000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["FundsLocked"]["amount_cents"], 10_000);
        assert_eq!(json["FundsLocked"]["depositor"], "customer");
    }

    #[test]
    fn test_empty_record() {
        let id = Uuid::now_v7();
        let record = EscrowRecord::empty(id);
        assert_eq!(record.booking_id, id);
        assert_eq!(record.amount_cents, 0);
        assert_eq!(record.status, EscrowStatus::None);
        assert!(record.locked_at.is_none());
    }
}
