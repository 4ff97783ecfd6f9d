//! Error types for the settlement orchestrator
//!
//! The taxonomy drives retry decisions: validation and authorization
//! failures are fatal and surfaced to the caller; availability failures
//! (breaker open, timeout, rate limited, ledger paused) are retryable after
//! backoff.

use booking_core::BookingStatus;
use escrow_ledger::EscrowStatus;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Booking state machine error
    #[error("Booking error: {0}")]
    Booking(#[from] booking_core::Error),

    /// Escrow ledger error
    #[error("Escrow error: {0}")]
    Escrow(#[from] escrow_ledger::Error),

    /// Booking not found in the store
    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    /// Cancellation is not allowed in the booking's current status
    #[error("Booking {booking_id} cannot be cancelled in status {status}")]
    NotCancellable {
        /// Booking id
        booking_id: Uuid,
        /// Current status
        status: BookingStatus,
    },

    /// Escrow record is terminal in a way that contradicts this operation
    #[error("Settlement conflict for booking {booking_id}: escrow already {actual}")]
    SettlementConflict {
        /// Booking id
        booking_id: Uuid,
        /// Terminal escrow status found
        actual: EscrowStatus,
    },

    /// Requested edge moves funds and must go through its dedicated operation
    #[error("Transition to {0} requires a settlement operation")]
    SettlementRequired(BookingStatus),

    /// Dependency unavailable; retry after backoff
    #[error("Dependency unavailable ({reason}), retry in {retry_after:?}")]
    Unavailable {
        /// What was unavailable
        reason: String,
        /// Suggested backoff
        retry_after: Duration,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for availability-class failures that callers should retry after
    /// backoff ("try again shortly"); false for definitive failures.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Unavailable { .. } | Error::Escrow(escrow_ledger::Error::Suspended)
        )
    }
}
