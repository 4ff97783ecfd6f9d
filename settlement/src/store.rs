//! In-memory booking store
//!
//! Holds the authoritative booking state for this service. Status writes go
//! through [`BookingStore::commit`], which re-validates the transition under
//! the entry lock, so a racing commit on the same booking cannot skip an
//! edge of the state machine. Bookings are never deleted; terminal bookings
//! remain as history.

use booking_core::{validate_transition, Booking, BookingStatus};
use chrono::Utc;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

/// Booking repository
#[derive(Debug, Default)]
pub struct BookingStore {
    bookings: DashMap<Uuid, Booking>,
}

impl BookingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new booking
    pub fn insert(&self, booking: Booking) {
        self.bookings.insert(booking.booking_id, booking);
    }

    /// Get a booking by id
    pub fn get(&self, booking_id: Uuid) -> Option<Booking> {
        self.bookings.get(&booking_id).map(|b| b.clone())
    }

    /// Number of bookings held
    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    /// True when no bookings are held
    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    /// Commit a validated status transition
    ///
    /// Re-checks the edge against the booking's current status under the
    /// entry lock and stamps `updated_at`. Optionally records the escrow
    /// reference (set once, on fund lock).
    pub(crate) fn commit(
        &self,
        booking_id: Uuid,
        to: BookingStatus,
        escrow_id: Option<Uuid>,
    ) -> crate::Result<Booking> {
        let mut entry = self
            .bookings
            .get_mut(&booking_id)
            .ok_or(crate::Error::BookingNotFound(booking_id))?;

        validate_transition(entry.status, to)?;
        entry.status = to;
        entry.updated_at = Utc::now();
        if escrow_id.is_some() {
            entry.escrow_id = escrow_id;
        }

        info!(%booking_id, status = %to, "Booking status committed");
        Ok(entry.clone())
    }
}
