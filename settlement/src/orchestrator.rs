//! Settlement orchestration
//!
//! Drives qualifying state transitions end to end: validate the edge,
//! compute amounts with the policy engine, move funds on the escrow ledger
//! through the resilience primitives, and only then commit the booking's new
//! status. The ledger's record status is the source of truth; local status
//! is never written optimistically ahead of ledger confirmation.
//!
//! Retried settlement requests are idempotent: a retry that lands on an
//! already-terminal escrow record is treated as confirmed success, not
//! surfaced as an error.

use crate::store::BookingStore;
use crate::{Error, Result, SettlementConfig};
use booking_core::{validate_transition, Address, Booking, BookingStatus};
use chrono::{DateTime, Utc};
use escrow_ledger::actor::EscrowHandle;
use escrow_ledger::EscrowStatus;
use policy_engine::{can_cancel, customer_refund, CancellationInitiator, RefundBreakdown};
use resilience::{CallError, CircuitBreakerRegistry, Decision, RateLimiter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Breaker registry name for the escrow ledger dependency
pub const ESCROW_DEPENDENCY: &str = "escrow-ledger";

/// How a dispute is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeResolution {
    /// Counterparty delivered; release payout + fee as on a normal settle
    ReleaseToCounterparty,
    /// Customer prevails; refund the full locked amount
    RefundCustomer,
}

/// Settlement orchestrator
pub struct SettlementOrchestrator {
    /// Booking repository (sole writer of booking status)
    store: Arc<BookingStore>,

    /// Escrow ledger handle
    escrow: EscrowHandle,

    /// Per-dependency circuit breakers
    breakers: Arc<CircuitBreakerRegistry>,

    /// Settlement-class operation rate limiter
    limiter: Arc<RateLimiter>,

    /// Relayer identity used for ledger release/refund calls
    relayer: Address,

    /// Platform fee account
    platform_account: Address,
}

impl SettlementOrchestrator {
    /// Create a new orchestrator, registering the escrow breaker
    pub async fn new(
        store: Arc<BookingStore>,
        escrow: EscrowHandle,
        breakers: Arc<CircuitBreakerRegistry>,
        limiter: Arc<RateLimiter>,
        config: SettlementConfig,
    ) -> Self {
        breakers
            .register(ESCROW_DEPENDENCY, config.escrow_breaker.clone())
            .await;
        Self {
            store,
            escrow,
            breakers,
            limiter,
            relayer: config.relayer,
            platform_account: config.platform_account,
        }
    }

    /// Booking store
    pub fn store(&self) -> &BookingStore {
        &self.store
    }

    /// Intake hook: register a new order with the store
    ///
    /// Order creation flows (search, quoting) live outside this crate; this
    /// is where they hand the resulting order over.
    pub fn create_booking(
        &self,
        customer: Address,
        counterparty: Address,
        scheduled_start: DateTime<Utc>,
        quote_cents: u64,
        platform_fee_cents: u64,
    ) -> Result<Booking> {
        let booking = Booking::new(
            customer,
            counterparty,
            scheduled_start,
            quote_cents,
            platform_fee_cents,
        )?;
        self.store.insert(booking.clone());
        info!(booking_id = %booking.booking_id, quote_cents, "Booking created");
        Ok(booking)
    }

    /// Request a non-settlement status transition
    ///
    /// Edges that move funds (`Confirmed`, `Settled`, `Cancelled`) must go
    /// through their dedicated operations.
    pub fn request_transition(&self, booking_id: Uuid, to: BookingStatus) -> Result<Booking> {
        match to {
            BookingStatus::Confirmed | BookingStatus::Settled | BookingStatus::Cancelled => {
                Err(Error::SettlementRequired(to))
            }
            _ => self.store.commit(booking_id, to, None),
        }
    }

    /// Counterparty declines a pending booking (no funds involved yet)
    pub fn decline_booking(&self, booking_id: Uuid) -> Result<Booking> {
        self.store.commit(booking_id, BookingStatus::Declined, None)
    }

    /// Customer payment received: lock the quote in escrow, then confirm
    ///
    /// The booking moves to `Confirmed` only once the ledger holds the
    /// funds. A retry racing an earlier lock verifies the existing record
    /// instead of failing.
    pub async fn confirm_payment(&self, booking_id: Uuid) -> Result<Booking> {
        let booking = self.booking(booking_id)?;
        if booking.status == BookingStatus::Confirmed {
            // Already committed, which only happens after ledger confirmation
            return Ok(booking);
        }
        validate_transition(booking.status, BookingStatus::Confirmed)?;

        let lock = self
            .escrow_call(self.escrow.lock_funds(
                booking.customer.clone(),
                booking_id,
                booking.quote_cents,
            ))
            .await;

        match lock {
            Ok(_) => {}
            Err(Error::Escrow(escrow_ledger::Error::BookingAlreadyExists(_))) => {
                let record = self.escrow_call(self.escrow.get_record(booking_id)).await?;
                let matches_lock = record.status == EscrowStatus::Locked
                    && record.amount_cents == booking.quote_cents
                    && record.depositor == booking.customer;
                if !matches_lock {
                    return Err(Error::SettlementConflict {
                        booking_id,
                        actual: record.status,
                    });
                }
            }
            Err(e) => return Err(e),
        }

        self.commit_or_noop(booking_id, BookingStatus::Confirmed, Some(booking_id))
    }

    /// Cancel a booking, settling escrowed funds per the refund policy
    ///
    /// Protocol: validate the edge, compute the split, move funds through
    /// the resilience-wrapped ledger path, and commit `Cancelled` only on a
    /// confirmed terminal ledger status.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        initiator: CancellationInitiator,
        now: DateTime<Utc>,
    ) -> Result<(Booking, RefundBreakdown)> {
        let booking = self.booking(booking_id)?;
        if booking.status == BookingStatus::Cancelled {
            // A prior attempt already settled the escrow and committed; this
            // retry gets the same confirmed outcome
            let breakdown = customer_refund(
                booking.quote_cents,
                booking.scheduled_start,
                now,
                initiator,
            );
            return Ok((booking, breakdown));
        }
        if !can_cancel(booking.status) {
            return Err(Error::NotCancellable {
                booking_id,
                status: booking.status,
            });
        }
        validate_transition(booking.status, BookingStatus::Cancelled)?;

        let breakdown = customer_refund(
            booking.quote_cents,
            booking.scheduled_start,
            now,
            initiator,
        );

        let record = self.escrow_call(self.escrow.get_record(booking_id)).await?;
        match record.status {
            EscrowStatus::None => {
                // Nothing locked yet; the cancellation is purely a status change
            }
            EscrowStatus::Locked => {
                self.check_rate().await?;
                let outcome = if breakdown.refund_cents == booking.quote_cents {
                    self.escrow_call(self.escrow.refund(
                        self.relayer.clone(),
                        booking_id,
                        booking.quote_cents,
                        booking.customer.clone(),
                    ))
                    .await
                    .map(|_| ())
                } else {
                    // Split settlement: compensation to the counterparty,
                    // refund remainder back to the customer
                    self.escrow_call(self.escrow.release_funds(
                        self.relayer.clone(),
                        booking_id,
                        booking.counterparty.clone(),
                        breakdown.compensation_cents,
                        booking.customer.clone(),
                        breakdown.refund_cents,
                    ))
                    .await
                    .map(|_| ())
                };
                self.confirm_terminal(
                    booking_id,
                    outcome,
                    &[EscrowStatus::Refunded, EscrowStatus::Released],
                )
                .await?;
            }
            terminal => {
                // An earlier cancellation attempt already settled the record;
                // this retry only needs to finish the status commit
                info!(%booking_id, escrow_status = %terminal, "Cancellation retry: escrow already settled");
            }
        }

        let booking = self.commit_or_noop(booking_id, BookingStatus::Cancelled, None)?;
        info!(
            %booking_id,
            refund_cents = breakdown.refund_cents,
            compensation_cents = breakdown.compensation_cents,
            percentage = breakdown.percentage,
            "Booking cancelled"
        );
        Ok((booking, breakdown))
    }

    /// Settle a confirmed-complete booking: release payout + platform fee
    pub async fn settle_booking(&self, booking_id: Uuid) -> Result<Booking> {
        let booking = self.booking(booking_id)?;
        if booking.status == BookingStatus::Settled {
            return Ok(booking);
        }
        validate_transition(booking.status, BookingStatus::Settled)?;

        self.check_rate().await?;
        let outcome = self
            .escrow_call(self.escrow.release_funds(
                self.relayer.clone(),
                booking_id,
                booking.counterparty.clone(),
                booking.payout_cents,
                self.platform_account.clone(),
                booking.platform_fee_cents,
            ))
            .await
            .map(|_| ());
        self.confirm_terminal(booking_id, outcome, &[EscrowStatus::Released])
            .await?;

        let booking = self.commit_or_noop(booking_id, BookingStatus::Settled, None)?;
        info!(%booking_id, payout_cents = booking.payout_cents, "Booking settled");
        Ok(booking)
    }

    /// Resolve a disputed booking either way
    pub async fn resolve_dispute(
        &self,
        booking_id: Uuid,
        resolution: DisputeResolution,
    ) -> Result<Booking> {
        let booking = self.booking(booking_id)?;

        match resolution {
            DisputeResolution::ReleaseToCounterparty => {
                // Disputed -> Settled shares the release path with settle
                self.settle_booking(booking_id).await
            }
            DisputeResolution::RefundCustomer => {
                if booking.status == BookingStatus::Cancelled {
                    return Ok(booking);
                }
                validate_transition(booking.status, BookingStatus::Cancelled)?;
                self.check_rate().await?;
                let outcome = self
                    .escrow_call(self.escrow.refund(
                        self.relayer.clone(),
                        booking_id,
                        booking.quote_cents,
                        booking.customer.clone(),
                    ))
                    .await
                    .map(|_| ());
                self.confirm_terminal(booking_id, outcome, &[EscrowStatus::Refunded])
                    .await?;
                self.commit_or_noop(booking_id, BookingStatus::Cancelled, None)
            }
        }
    }

    fn booking(&self, booking_id: Uuid) -> Result<Booking> {
        self.store
            .get(booking_id)
            .ok_or(Error::BookingNotFound(booking_id))
    }

    /// Run a ledger call through the escrow circuit breaker, mapping the
    /// breaker's availability failures into the retryable error class
    async fn escrow_call<T>(
        &self,
        fut: impl Future<Output = escrow_ledger::Result<T>>,
    ) -> Result<T> {
        let breaker = self.breakers.breaker(ESCROW_DEPENDENCY).await;
        breaker.execute(fut).await.map_err(|err| match err {
            CallError::Open {
                dependency,
                retry_in_ms,
            } => Error::Unavailable {
                reason: format!("circuit breaker '{dependency}' open"),
                retry_after: Duration::from_millis(retry_in_ms),
            },
            CallError::Timeout(timeout) => Error::Unavailable {
                reason: "escrow ledger call timed out".to_string(),
                retry_after: timeout,
            },
            CallError::Inner(e) => Error::Escrow(e),
        })
    }

    /// Count one settlement-class operation against the relayer
    async fn check_rate(&self) -> Result<()> {
        match self.limiter.check(self.relayer.as_str()).await {
            Decision::Allowed { .. } => Ok(()),
            Decision::Limited { retry_after } => {
                warn!(relayer = %self.relayer, ?retry_after, "Settlement rate limit exceeded");
                Err(Error::Unavailable {
                    reason: "settlement rate limit exceeded".to_string(),
                    retry_after,
                })
            }
        }
    }

    /// Treat a retry that found the record already in an accepted terminal
    /// state as confirmed success; any other terminal state is a conflict
    async fn confirm_terminal(
        &self,
        booking_id: Uuid,
        outcome: Result<()>,
        accepted: &[EscrowStatus],
    ) -> Result<()> {
        match outcome {
            Ok(()) => Ok(()),
            Err(Error::Escrow(escrow_ledger::Error::InvalidEscrowStatus { actual, .. })) => {
                if accepted.contains(&actual) {
                    info!(%booking_id, escrow_status = %actual, "Settlement already confirmed on ledger");
                    Ok(())
                } else {
                    Err(Error::SettlementConflict { booking_id, actual })
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Commit a status, treating "already there" as success so whole-call
    /// retries are idempotent
    fn commit_or_noop(
        &self,
        booking_id: Uuid,
        to: BookingStatus,
        escrow_id: Option<Uuid>,
    ) -> Result<Booking> {
        match self.store.commit(booking_id, to, escrow_id) {
            Ok(booking) => Ok(booking),
            Err(err) => match self.store.get(booking_id) {
                Some(booking) if booking.status == to => Ok(booking),
                _ => Err(err),
            },
        }
    }
}

impl std::fmt::Debug for SettlementOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementOrchestrator")
            .field("relayer", &self.relayer)
            .field("platform_account", &self.platform_account)
            .finish_non_exhaustive()
    }
}
