//! Time-banded cancellation refund policy
//!
//! Refund bands, closed on the lower edge:
//!
//! - `hours >= 24` -> 100%
//! - `4 <= hours < 24` -> 50%
//! - `hours < 4` -> 0%
//!
//! A counterparty-initiated cancellation always refunds 100% regardless of
//! timing: the party that did not cause the inconvenience is never penalized.
//!
//! Refunds are computed in integer cents with floor division. The
//! compensation is the exact complement (`quote - refund`), so the two always
//! sum to the original quote; the truncation shows up on the refund side only
//! and is at most one cent. This is an accepted rounding edge case.

use booking_core::BookingStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who triggered the cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationInitiator {
    /// Paying customer cancelled
    Customer,
    /// Service provider cancelled
    Counterparty,
}

/// Result of applying the cancellation policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefundBreakdown {
    /// Amount refunded to the customer (cents)
    pub refund_cents: u64,
    /// Amount paid to the counterparty (cents), complement of the refund
    pub compensation_cents: u64,
    /// Refund percentage applied (0, 50 or 100)
    pub percentage: u32,
    /// Hours between cancellation time and scheduled start (may be negative)
    pub hours_until_start: f64,
}

/// Hours between `now` and the scheduled start
///
/// Negative when the start time is already in the past.
pub fn hours_until_start(scheduled_start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = scheduled_start.signed_duration_since(now).num_seconds();
    seconds as f64 / 3600.0
}

/// Refund percentage for a customer-initiated cancellation
pub fn refund_percentage(hours: f64) -> u32 {
    if hours >= 24.0 {
        100
    } else if hours >= 4.0 {
        50
    } else {
        0
    }
}

/// Compute the customer refund and counterparty compensation split
///
/// `refund = floor(quote * pct / 100)`, `compensation = quote - refund`.
pub fn customer_refund(
    quote_cents: u64,
    scheduled_start: DateTime<Utc>,
    now: DateTime<Utc>,
    initiator: CancellationInitiator,
) -> RefundBreakdown {
    let hours = hours_until_start(scheduled_start, now);
    let percentage = match initiator {
        CancellationInitiator::Customer => refund_percentage(hours),
        CancellationInitiator::Counterparty => 100,
    };

    // u64 * 100 cannot overflow u128
    let refund_cents = (quote_cents as u128 * percentage as u128 / 100) as u64;
    let compensation_cents = quote_cents - refund_cents;

    RefundBreakdown {
        refund_cents,
        compensation_cents,
        percentage,
        hours_until_start: hours,
    }
}

/// Whether a booking in `status` may be cancelled at all
///
/// Cancellation is only meaningful before the service is delivered; terminal
/// and dispute states are handled by their own flows.
pub fn can_cancel(status: BookingStatus) -> bool {
    matches!(
        status,
        BookingStatus::PendingApproval
            | BookingStatus::PendingPayment
            | BookingStatus::Confirmed
            | BookingStatus::InProgress
    )
}
