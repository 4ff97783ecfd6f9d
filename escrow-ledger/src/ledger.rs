//! High-level escrow ledger API
//!
//! Ties together access control, the balance book and the actor into the
//! custodial operation surface the settlement orchestrator calls.
//!
//! # Example
//!
//! ```no_run
//! use escrow_ledger::{Address, EscrowConfig, EscrowLedger};
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> escrow_ledger::Result<()> {
//!     let ledger = EscrowLedger::open(EscrowConfig::default())?;
//!
//!     let depositor = Address::new("customer-1");
//!     ledger.fund(depositor.clone(), 10_000).await?;
//!     ledger.lock_funds(depositor, Uuid::now_v7(), 10_000).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::access::AccessControl;
use crate::actor::{spawn_escrow_actor, EscrowHandle};
use crate::metrics::Metrics;
use crate::types::{EscrowEvent, EscrowRecord};
use crate::{EscrowConfig, Result};
use booking_core::Address;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Custodial escrow ledger
pub struct EscrowLedger {
    /// Actor handle for all operations
    handle: EscrowHandle,

    /// Event publication channel (kept for subscriptions)
    events: broadcast::Sender<EscrowEvent>,

    /// Metrics collector
    metrics: Metrics,
}

impl EscrowLedger {
    /// Open a ledger with configuration, spawning the actor task
    pub fn open(config: EscrowConfig) -> Result<Self> {
        let access = AccessControl::new(config.admin.clone(), config.relayers.clone());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let metrics = Metrics::new()
            .map_err(|e| crate::Error::Config(format!("metrics registration failed: {e}")))?;

        let handle = spawn_escrow_actor(
            access,
            config.mailbox_capacity.max(1),
            events.clone(),
            metrics.clone(),
        );

        Ok(Self {
            handle,
            events,
            metrics,
        })
    }

    /// Subscribe to observable ledger events
    pub fn subscribe(&self) -> broadcast::Receiver<EscrowEvent> {
        self.events.subscribe()
    }

    /// Metrics collector for this ledger instance
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Cloneable actor handle (for wiring into other components)
    pub fn handle(&self) -> EscrowHandle {
        self.handle.clone()
    }

    /// Lock `amount_cents` of the caller's funds against a booking
    pub async fn lock_funds(
        &self,
        caller: Address,
        booking_id: Uuid,
        amount_cents: u64,
    ) -> Result<EscrowRecord> {
        self.handle.lock_funds(caller, booking_id, amount_cents).await
    }

    /// Release locked funds as payout + fee (relayer-only)
    pub async fn release_funds(
        &self,
        caller: Address,
        booking_id: Uuid,
        payout_recipient: Address,
        payout_cents: u64,
        fee_recipient: Address,
        fee_cents: u64,
    ) -> Result<EscrowRecord> {
        self.handle
            .release_funds(
                caller,
                booking_id,
                payout_recipient,
                payout_cents,
                fee_recipient,
                fee_cents,
            )
            .await
    }

    /// Refund the full locked amount (relayer-only)
    pub async fn refund(
        &self,
        caller: Address,
        booking_id: Uuid,
        amount_cents: u64,
        recipient: Address,
    ) -> Result<EscrowRecord> {
        self.handle
            .refund(caller, booking_id, amount_cents, recipient)
            .await
    }

    /// Get the record for a booking; unknown ids yield a zeroed record
    pub async fn get_record(&self, booking_id: Uuid) -> Result<EscrowRecord> {
        self.handle.get_record(booking_id).await
    }

    /// Locked balance for a booking (0 unless `Locked`)
    pub async fn get_balance(&self, booking_id: Uuid) -> Result<u64> {
        self.handle.get_balance(booking_id).await
    }

    /// Free balance of an identity
    pub async fn balance_of(&self, address: Address) -> Result<u64> {
        self.handle.balance_of(address).await
    }

    /// Credit an identity's free balance (on-ramp hook)
    pub async fn fund(&self, address: Address, amount_cents: u64) -> Result<()> {
        self.handle.fund(address, amount_cents).await
    }

    /// Pause mutating operations (admin-only); reads stay available
    pub async fn pause(&self, caller: Address) -> Result<()> {
        self.handle.pause(caller).await
    }

    /// Resume mutating operations (admin-only)
    pub async fn unpause(&self, caller: Address) -> Result<()> {
        self.handle.unpause(caller).await
    }

    /// Add a relayer identity (admin-only)
    pub async fn add_relayer(&self, caller: Address, relayer: Address) -> Result<bool> {
        self.handle.add_relayer(caller, relayer).await
    }

    /// Remove a relayer identity (admin-only)
    pub async fn remove_relayer(&self, caller: Address, relayer: Address) -> Result<bool> {
        self.handle.remove_relayer(caller, relayer).await
    }

    /// Shutdown the ledger actor
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EscrowStatus;
    use crate::Error;

    fn test_config() -> EscrowConfig {
        EscrowConfig {
            admin: Address::new("admin"),
            relayers: vec![Address::new("relayer")],
            ..Default::default()
        }
    }

    fn admin() -> Address {
        Address::new("admin")
    }

    fn relayer() -> Address {
        Address::new("relayer")
    }

    async fn funded_ledger(depositor: &Address, amount: u64) -> EscrowLedger {
        let ledger = EscrowLedger::open(test_config()).unwrap();
        ledger.fund(depositor.clone(), amount).await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_lock_creates_record() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 10_000).await;
        let booking_id = Uuid::now_v7();

        let record = ledger
            .lock_funds(customer.clone(), booking_id, 10_000)
            .await
            .unwrap();
        assert_eq!(record.status, EscrowStatus::Locked);
        assert_eq!(record.amount_cents, 10_000);
        assert_eq!(record.depositor, customer);

        assert_eq!(ledger.get_balance(booking_id).await.unwrap(), 10_000);
        assert_eq!(ledger.balance_of(customer).await.unwrap(), 0);
        assert_eq!(ledger.metrics().locks_total.get(), 1);
        assert_eq!(ledger.metrics().locked_value_cents.get(), 10_000);
    }

    #[tokio::test]
    async fn test_double_lock_rejected_and_original_unchanged() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 30_000).await;
        let booking_id = Uuid::now_v7();

        ledger
            .lock_funds(customer.clone(), booking_id, 10_000)
            .await
            .unwrap();
        let err = ledger
            .lock_funds(customer.clone(), booking_id, 5_000)
            .await
            .unwrap_err();
        assert_eq!(err, Error::BookingAlreadyExists(booking_id));

        let record = ledger.get_record(booking_id).await.unwrap();
        assert_eq!(record.amount_cents, 10_000);
        assert_eq!(record.status, EscrowStatus::Locked);
        // Second lock must not have touched the balance
        assert_eq!(ledger.balance_of(customer).await.unwrap(), 20_000);
    }

    #[tokio::test]
    async fn test_lock_zero_amount_rejected() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 1_000).await;

        let err = ledger
            .lock_funds(customer, Uuid::now_v7(), 0)
            .await
            .unwrap_err();
        assert_eq!(err, Error::InvalidAmount);
    }

    #[tokio::test]
    async fn test_lock_insufficient_funds() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 100).await;

        let err = ledger
            .lock_funds(customer, Uuid::now_v7(), 10_000)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientFunds {
                available: 100,
                required: 10_000
            }
        );
    }

    #[tokio::test]
    async fn test_release_pays_both_recipients() {
        let customer = Address::new("customer-1");
        let stylist = Address::new("stylist-1");
        let platform = Address::new("platform");
        let ledger = funded_ledger(&customer, 10_000).await;
        let booking_id = Uuid::now_v7();
        ledger
            .lock_funds(customer.clone(), booking_id, 10_000)
            .await
            .unwrap();

        let record = ledger
            .release_funds(
                relayer(),
                booking_id,
                stylist.clone(),
                8_500,
                platform.clone(),
                1_500,
            )
            .await
            .unwrap();
        assert_eq!(record.status, EscrowStatus::Released);

        assert_eq!(ledger.balance_of(stylist).await.unwrap(), 8_500);
        assert_eq!(ledger.balance_of(platform).await.unwrap(), 1_500);
        assert_eq!(ledger.get_balance(booking_id).await.unwrap(), 0);
        assert_eq!(ledger.metrics().releases_total.get(), 1);
        assert_eq!(ledger.metrics().locked_value_cents.get(), 0);
    }

    #[tokio::test]
    async fn test_release_amount_mismatch_leaves_locked() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 10_000).await;
        let booking_id = Uuid::now_v7();
        ledger
            .lock_funds(customer, booking_id, 10_000)
            .await
            .unwrap();

        let err = ledger
            .release_funds(
                relayer(),
                booking_id,
                Address::new("stylist-1"),
                8_000,
                Address::new("platform"),
                1_500,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::AmountMismatch {
                expected: 10_000,
                actual: 9_500
            }
        );

        let record = ledger.get_record(booking_id).await.unwrap();
        assert_eq!(record.status, EscrowStatus::Locked);
    }

    #[tokio::test]
    async fn test_release_requires_relayer() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 10_000).await;
        let booking_id = Uuid::now_v7();
        ledger
            .lock_funds(customer.clone(), booking_id, 10_000)
            .await
            .unwrap();

        let err = ledger
            .release_funds(
                customer,
                booking_id,
                Address::new("stylist-1"),
                8_500,
                Address::new("platform"),
                1_500,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnauthorizedCaller(_)));
    }

    #[tokio::test]
    async fn test_release_empty_recipient_rejected() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 10_000).await;
        let booking_id = Uuid::now_v7();
        ledger
            .lock_funds(customer, booking_id, 10_000)
            .await
            .unwrap();

        let err = ledger
            .release_funds(
                relayer(),
                booking_id,
                Address::new(""),
                8_500,
                Address::new("platform"),
                1_500,
            )
            .await
            .unwrap_err();
        assert_eq!(err, Error::InvalidAddress);
    }

    #[tokio::test]
    async fn test_refund_full_amount_only() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 10_000).await;
        let booking_id = Uuid::now_v7();
        ledger
            .lock_funds(customer.clone(), booking_id, 10_000)
            .await
            .unwrap();

        // Partial refund rejected, record stays Locked
        let err = ledger
            .refund(relayer(), booking_id, 5_000, customer.clone())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::AmountMismatch {
                expected: 10_000,
                actual: 5_000
            }
        );
        let record = ledger.get_record(booking_id).await.unwrap();
        assert_eq!(record.status, EscrowStatus::Locked);

        // Full refund succeeds
        let record = ledger
            .refund(relayer(), booking_id, 10_000, customer.clone())
            .await
            .unwrap();
        assert_eq!(record.status, EscrowStatus::Refunded);
        assert_eq!(ledger.balance_of(customer).await.unwrap(), 10_000);
        assert_eq!(ledger.metrics().refunds_total.get(), 1);
    }

    #[tokio::test]
    async fn test_terminal_record_cannot_move_again() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 10_000).await;
        let booking_id = Uuid::now_v7();
        ledger
            .lock_funds(customer.clone(), booking_id, 10_000)
            .await
            .unwrap();
        ledger
            .refund(relayer(), booking_id, 10_000, customer.clone())
            .await
            .unwrap();

        // Second refund observes the terminal status
        let err = ledger
            .refund(relayer(), booking_id, 10_000, customer.clone())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidEscrowStatus {
                expected: EscrowStatus::Locked,
                actual: EscrowStatus::Refunded,
            }
        );
        // Money moved exactly once
        assert_eq!(ledger.balance_of(customer).await.unwrap(), 10_000);

        // A release after refund is equally rejected
        let err = ledger
            .release_funds(
                relayer(),
                booking_id,
                Address::new("stylist-1"),
                8_500,
                Address::new("platform"),
                1_500,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEscrowStatus { .. }));
    }

    #[tokio::test]
    async fn test_unknown_id_reads_are_zeroed() {
        let ledger = EscrowLedger::open(test_config()).unwrap();
        let booking_id = Uuid::now_v7();

        let record = ledger.get_record(booking_id).await.unwrap();
        assert_eq!(record.status, EscrowStatus::None);
        assert_eq!(record.amount_cents, 0);
        assert_eq!(ledger.get_balance(booking_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pause_suspends_mutations_but_not_reads() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 20_000).await;
        let locked_id = Uuid::now_v7();
        ledger
            .lock_funds(customer.clone(), locked_id, 10_000)
            .await
            .unwrap();

        ledger.pause(admin()).await.unwrap();

        let err = ledger
            .lock_funds(customer.clone(), Uuid::now_v7(), 1_000)
            .await
            .unwrap_err();
        assert_eq!(err, Error::Suspended);
        let err = ledger
            .release_funds(
                relayer(),
                locked_id,
                Address::new("stylist-1"),
                8_500,
                Address::new("platform"),
                1_500,
            )
            .await
            .unwrap_err();
        assert_eq!(err, Error::Suspended);
        let err = ledger
            .refund(relayer(), locked_id, 10_000, customer.clone())
            .await
            .unwrap_err();
        assert_eq!(err, Error::Suspended);

        // Reads still work
        let record = ledger.get_record(locked_id).await.unwrap();
        assert_eq!(record.status, EscrowStatus::Locked);

        // All three succeed after unpause
        ledger.unpause(admin()).await.unwrap();
        ledger
            .lock_funds(customer.clone(), Uuid::now_v7(), 1_000)
            .await
            .unwrap();
        ledger
            .refund(relayer(), locked_id, 10_000, customer)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pause_is_admin_only() {
        let ledger = EscrowLedger::open(test_config()).unwrap();
        let err = ledger.pause(relayer()).await.unwrap_err();
        assert!(matches!(err, Error::UnauthorizedCaller(_)));
    }

    #[tokio::test]
    async fn test_relayer_rotation_via_admin() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 10_000).await;
        let booking_id = Uuid::now_v7();
        ledger
            .lock_funds(customer.clone(), booking_id, 10_000)
            .await
            .unwrap();

        let rotated = Address::new("relayer-2");
        assert!(ledger
            .add_relayer(admin(), rotated.clone())
            .await
            .unwrap());
        assert!(ledger.remove_relayer(admin(), relayer()).await.unwrap());

        // Old key no longer works, new one does
        let err = ledger
            .refund(relayer(), booking_id, 10_000, customer.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnauthorizedCaller(_)));
        ledger
            .refund(rotated, booking_id, 10_000, customer)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_events_published_on_state_changes() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 10_000).await;
        let mut events = ledger.subscribe();
        let booking_id = Uuid::now_v7();

        ledger
            .lock_funds(customer.clone(), booking_id, 10_000)
            .await
            .unwrap();
        ledger
            .refund(relayer(), booking_id, 10_000, customer)
            .await
            .unwrap();

        match events.recv().await.unwrap() {
            EscrowEvent::FundsLocked {
                booking_id: id,
                amount_cents,
                ..
            } => {
                assert_eq!(id, booking_id);
                assert_eq!(amount_cents, 10_000);
            }
            other => panic!("expected FundsLocked, got {other:?}"),
        }
        match events.recv().await.unwrap() {
            EscrowEvent::FundsRefunded {
                booking_id: id,
                amount_cents,
                ..
            } => {
                assert_eq!(id, booking_id);
                assert_eq!(amount_cents, 10_000);
            }
            other => panic!("expected FundsRefunded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_settlements_only_one_wins() {
        let customer = Address::new("customer-1");
        let ledger = funded_ledger(&customer, 10_000).await;
        let booking_id = Uuid::now_v7();
        ledger
            .lock_funds(customer.clone(), booking_id, 10_000)
            .await
            .unwrap();

        let handle = ledger.handle();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handle = handle.clone();
            let customer = customer.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .refund(Address::new("relayer"), booking_id, 10_000, customer)
                    .await
            }));
        }

        let mut wins = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1, "exactly one refund may move funds");
        assert_eq!(ledger.balance_of(customer).await.unwrap(), 10_000);
    }
}
