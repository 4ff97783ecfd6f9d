//! Bookpay Cancellation Policy Engine
//!
//! Pure refund/compensation arithmetic for booking cancellations. All
//! functions are side-effect free; the settlement orchestrator feeds them a
//! booking's known fields and acts on the returned split.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod policy;

pub use policy::{
    can_cancel, customer_refund, hours_until_start, refund_percentage, CancellationInitiator,
    RefundBreakdown,
};
