//! Error types for the booking core

use crate::types::BookingStatus;
use thiserror::Error;

/// Result type for booking operations
pub type Result<T> = std::result::Result<T, Error>;

/// Booking errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Requested status change is not an edge of the transition table
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: BookingStatus,
        /// Requested status
        to: BookingStatus,
    },

    /// Payout and fee do not sum to the quote
    #[error("Invalid fee split: payout {payout} + fee {fee} != quote {quote}")]
    InvalidFeeSplit {
        /// Quote amount (cents)
        quote: u64,
        /// Counterparty payout (cents)
        payout: u64,
        /// Platform fee (cents)
        fee: u64,
    },

    /// Identity string is empty
    #[error("Invalid address: empty identity")]
    InvalidAddress,
}
