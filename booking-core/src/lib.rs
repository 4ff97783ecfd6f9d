//! Bookpay Booking Core
//!
//! Booking data model and lifecycle state machine.
//!
//! # Invariants
//!
//! - A booking's status only ever changes along an edge of the transition
//!   table in [`transitions`]; there is no other write path.
//! - Terminal states (`Settled`, `Cancelled`, `Declined`) have no outgoing
//!   edges.
//! - `payout_cents + platform_fee_cents == quote_cents` for every booking.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod transitions;
pub mod types;

// Re-exports
pub use error::{Error, Result};
pub use transitions::{allowed_transitions, can_transition, is_terminal, validate_transition};
pub use types::{Address, Booking, BookingStatus};
