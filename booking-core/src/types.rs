//! Core types for bookings
//!
//! All money amounts are integer minor-currency units (cents). No floating
//! point touches a balance anywhere in the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account identity (customer, stylist, relayer, platform)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Create new address
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identity string is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BookingStatus {
    /// Awaiting counterparty approval
    PendingApproval = 1,
    /// Approved, awaiting customer payment
    PendingPayment = 2,
    /// Paid and escrowed
    Confirmed = 3,
    /// Service underway
    InProgress = 4,
    /// Service delivered, awaiting customer confirmation window
    Completed = 5,
    /// Customer confirmation received, awaiting settlement
    AwaitingConfirmation = 6,
    /// Funds released (terminal)
    Settled = 7,
    /// Cancelled by either party (terminal)
    Cancelled = 8,
    /// Declined by counterparty (terminal)
    Declined = 9,
    /// Under dispute
    Disputed = 10,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::PendingApproval => "pending_approval",
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::AwaitingConfirmation => "awaiting_confirmation",
            BookingStatus::Settled => "settled",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Declined => "declined",
            BookingStatus::Disputed => "disputed",
        };
        write!(f, "{}", s)
    }
}

/// One service order between a customer and a counterparty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Unique booking ID
    pub booking_id: Uuid,

    /// Current lifecycle status
    pub status: BookingStatus,

    /// Paying customer
    pub customer: Address,

    /// Service provider (stylist)
    pub counterparty: Address,

    /// Scheduled service start
    pub scheduled_start: DateTime<Utc>,

    /// Quoted total (cents)
    pub quote_cents: u64,

    /// Platform fee portion of the quote (cents)
    pub platform_fee_cents: u64,

    /// Counterparty payout portion of the quote (cents)
    pub payout_cents: u64,

    /// Escrow record reference (set once funds are locked)
    pub escrow_id: Option<Uuid>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Create a new booking in `PendingApproval`
    ///
    /// Validates identities and that payout + fee sums exactly to the quote.
    pub fn new(
        customer: Address,
        counterparty: Address,
        scheduled_start: DateTime<Utc>,
        quote_cents: u64,
        platform_fee_cents: u64,
    ) -> crate::Result<Self> {
        if customer.is_empty() || counterparty.is_empty() {
            return Err(crate::Error::InvalidAddress);
        }
        let payout_cents = quote_cents.checked_sub(platform_fee_cents).ok_or(
            crate::Error::InvalidFeeSplit {
                quote: quote_cents,
                payout: 0,
                fee: platform_fee_cents,
            },
        )?;

        let now = Utc::now();
        Ok(Self {
            booking_id: Uuid::now_v7(),
            status: BookingStatus::PendingApproval,
            customer,
            counterparty,
            scheduled_start,
            quote_cents,
            platform_fee_cents,
            payout_cents,
            escrow_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check the payout/fee split invariant
    pub fn fee_split_valid(&self) -> bool {
        self.payout_cents + self.platform_fee_cents == self.quote_cents
    }

    /// Check if booking is in a terminal state
    pub fn is_terminal(&self) -> bool {
        crate::transitions::is_terminal(self.status)
    }
}
