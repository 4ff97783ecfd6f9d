//! Bookpay Escrow Ledger
//!
//! Custodial fund store for bookings. Funds are locked per booking, then
//! released (payout + platform fee) or refunded in full, each exactly once.
//!
//! # Architecture
//!
//! - **Single writer**: one actor task owns all records and balances, so two
//!   operations on the same booking can never interleave and no external
//!   call can re-enter a record mid-operation.
//! - **Status as lock**: the escrow record's status is the serialization
//!   point; once `Released` or `Refunded` it never changes again.
//! - **Role gating**: an explicit [`access::AccessControl`] component checks
//!   admin/relayer capability, not inline identity comparisons.
//!
//! # Invariants
//!
//! - A locked amount is immutable for the life of the record.
//! - `Locked -> Released` and `Locked -> Refunded` are the only status
//!   transitions, each terminal.
//! - For every release, payout + fee == locked amount, exactly.
//! - Partial refunds are rejected outright.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod access;
pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod types;
pub mod vault;

// Re-exports
pub use actor::{spawn_escrow_actor, EscrowHandle};
pub use booking_core::Address;
pub use config::EscrowConfig;
pub use error::{Error, Result};
pub use ledger::EscrowLedger;
pub use metrics::Metrics;
pub use types::{EscrowEvent, EscrowRecord, EscrowStatus};
