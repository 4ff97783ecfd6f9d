//! Error types for the escrow ledger

use crate::types::EscrowStatus;
use thiserror::Error;

/// Result type for escrow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Escrow ledger errors
///
/// Distinct variants per failure condition so callers can pattern-match on
/// kind for retry-vs-fatal decisions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Amount is zero
    #[error("Invalid amount: must be positive")]
    InvalidAmount,

    /// A record already exists for this booking
    #[error("Escrow record already exists for booking {0}")]
    BookingAlreadyExists(uuid::Uuid),

    /// Depositor balance cannot cover the lock
    #[error("Insufficient funds: have {available}, need {required}")]
    InsufficientFunds {
        /// Depositor balance (cents)
        available: u64,
        /// Requested lock amount (cents)
        required: u64,
    },

    /// Caller lacks the required role
    #[error("Unauthorized caller: {0}")]
    UnauthorizedCaller(String),

    /// Record is not in the status the operation requires
    #[error("Invalid escrow status: expected {expected}, found {actual}")]
    InvalidEscrowStatus {
        /// Status the operation requires
        expected: EscrowStatus,
        /// Status actually found
        actual: EscrowStatus,
    },

    /// Recipient identity is empty
    #[error("Invalid address: empty recipient")]
    InvalidAddress,

    /// Amounts do not reconcile against the locked amount
    #[error("Amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch {
        /// Locked amount (cents)
        expected: u64,
        /// Amount the caller supplied (cents)
        actual: u64,
    },

    /// Ledger is paused; mutating operations are suspended
    #[error("Operation suspended: ledger is paused")]
    Suspended,

    /// Actor mailbox closed or response dropped
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
