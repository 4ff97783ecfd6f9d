//! Bookpay Settlement Orchestrator
//!
//! The only component allowed to call both the cancellation policy engine
//! and the escrow ledger, and the only component allowed to write a
//! booking's status after a settlement. Every ledger call goes through a
//! circuit breaker and the relayer rate limiter; the booking status is
//! committed only on confirmed ledger state.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod store;

// Re-exports
pub use config::SettlementConfig;
pub use error::{Error, Result};
pub use orchestrator::{DisputeResolution, SettlementOrchestrator, ESCROW_DEPENDENCY};
pub use store::BookingStore;
