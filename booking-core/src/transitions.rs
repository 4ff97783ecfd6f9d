//! Booking lifecycle transition table
//!
//! The table is total: every status has an explicit, finite outgoing set, and
//! the match below is exhaustive, so adding a new status without wiring its
//! edges is a compile error rather than a silent runtime gap.

use crate::types::BookingStatus;
use crate::{Error, Result};

/// Outgoing edges for a status
///
/// Terminal states return an empty slice.
pub fn allowed_transitions(from: BookingStatus) -> &'static [BookingStatus] {
    use BookingStatus::*;
    match from {
        PendingApproval => &[PendingPayment, Declined, Cancelled],
        PendingPayment => &[Confirmed, Cancelled],
        Confirmed => &[InProgress, Cancelled],
        InProgress => &[Completed, Cancelled],
        Completed => &[AwaitingConfirmation, Disputed],
        AwaitingConfirmation => &[Settled, Disputed],
        Disputed => &[Settled, Cancelled],
        Settled | Cancelled | Declined => &[],
    }
}

/// Check whether `from -> to` is an edge of the table
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Validate a requested transition
pub fn validate_transition(from: BookingStatus, to: BookingStatus) -> Result<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition { from, to })
    }
}

/// Check if a status is terminal (no outgoing edges)
pub fn is_terminal(status: BookingStatus) -> bool {
    matches!(
        status,
        BookingStatus::Settled | BookingStatus::Cancelled | BookingStatus::Declined
    )
}
