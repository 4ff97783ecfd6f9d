//! Actor-based concurrency for the escrow ledger
//!
//! Single-writer pattern using a Tokio actor: one task owns every record and
//! the balance book, so operations on the same booking are serialized by
//! construction and nothing can re-enter a record mid-transfer. Handles are
//! cheap clones sending messages over a bounded mailbox with backpressure.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        EscrowHandle (Clone, many)            │
//! │     async API over mpsc::channel (bounded)   │
//! └─────────────────────┬────────────────────────┘
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │          EscrowActor (single task)           │
//! │   AccessControl · Vault · records · paused   │
//! └──────────────────────────────────────────────┘
//! ```

use crate::access::AccessControl;
use crate::metrics::Metrics;
use crate::types::{EscrowEvent, EscrowRecord, EscrowStatus};
use crate::vault::Vault;
use crate::{Error, Result};
use booking_core::Address;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

/// Message sent to the escrow actor
pub enum EscrowMessage {
    /// Lock funds for a booking (depositor-initiated)
    LockFunds {
        /// Depositor identity
        caller: Address,
        /// Booking id
        booking_id: Uuid,
        /// Amount to lock (cents)
        amount_cents: u64,
        /// Response channel
        response: oneshot::Sender<Result<EscrowRecord>>,
    },

    /// Release locked funds as payout + fee (relayer-only)
    ReleaseFunds {
        /// Relayer identity
        caller: Address,
        /// Booking id
        booking_id: Uuid,
        /// Payout recipient
        payout_recipient: Address,
        /// Payout amount (cents)
        payout_cents: u64,
        /// Fee recipient
        fee_recipient: Address,
        /// Fee amount (cents)
        fee_cents: u64,
        /// Response channel
        response: oneshot::Sender<Result<EscrowRecord>>,
    },

    /// Refund the full locked amount (relayer-only)
    Refund {
        /// Relayer identity
        caller: Address,
        /// Booking id
        booking_id: Uuid,
        /// Amount; must equal the locked amount exactly
        amount_cents: u64,
        /// Refund recipient
        recipient: Address,
        /// Response channel
        response: oneshot::Sender<Result<EscrowRecord>>,
    },

    /// Read a record (zeroed record for unknown ids)
    GetRecord {
        /// Booking id
        booking_id: Uuid,
        /// Response channel
        response: oneshot::Sender<EscrowRecord>,
    },

    /// Read the locked balance for a booking (0 unless `Locked`)
    GetBalance {
        /// Booking id
        booking_id: Uuid,
        /// Response channel
        response: oneshot::Sender<u64>,
    },

    /// Read an identity's free balance
    BalanceOf {
        /// Identity
        address: Address,
        /// Response channel
        response: oneshot::Sender<u64>,
    },

    /// Credit an identity's free balance (on-ramp hook)
    Fund {
        /// Identity
        address: Address,
        /// Amount (cents)
        amount_cents: u64,
        /// Response channel
        response: oneshot::Sender<()>,
    },

    /// Suspend mutating operations (admin-only)
    Pause {
        /// Admin identity
        caller: Address,
        /// Response channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Resume mutating operations (admin-only)
    Unpause {
        /// Admin identity
        caller: Address,
        /// Response channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Add a relayer identity (admin-only)
    AddRelayer {
        /// Admin identity
        caller: Address,
        /// Relayer to add
        relayer: Address,
        /// Response channel
        response: oneshot::Sender<Result<bool>>,
    },

    /// Remove a relayer identity (admin-only)
    RemoveRelayer {
        /// Admin identity
        caller: Address,
        /// Relayer to remove
        relayer: Address,
        /// Response channel
        response: oneshot::Sender<Result<bool>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns all escrow state
pub struct EscrowActor {
    /// Role checks
    access: AccessControl,

    /// Balance book
    vault: Vault,

    /// Records by booking id
    records: HashMap<Uuid, EscrowRecord>,

    /// While paused, mutating operations fail with `Suspended`
    paused: bool,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<EscrowMessage>,

    /// Event publication channel
    events: broadcast::Sender<EscrowEvent>,

    /// Metrics collector
    metrics: Metrics,
}

impl EscrowActor {
    /// Create new actor
    pub fn new(
        access: AccessControl,
        mailbox: mpsc::Receiver<EscrowMessage>,
        events: broadcast::Sender<EscrowEvent>,
        metrics: Metrics,
    ) -> Self {
        Self {
            access,
            vault: Vault::new(),
            records: HashMap::new(),
            paused: false,
            mailbox,
            events,
            metrics,
        }
    }

    /// Run the actor until shutdown
    pub async fn run(mut self) {
        while let Some(message) = self.mailbox.recv().await {
            match message {
                EscrowMessage::LockFunds {
                    caller,
                    booking_id,
                    amount_cents,
                    response,
                } => {
                    let result = self.handle_lock(caller, booking_id, amount_cents);
                    self.track(&result);
                    let _ = response.send(result);
                }
                EscrowMessage::ReleaseFunds {
                    caller,
                    booking_id,
                    payout_recipient,
                    payout_cents,
                    fee_recipient,
                    fee_cents,
                    response,
                } => {
                    let result = self.handle_release(
                        caller,
                        booking_id,
                        payout_recipient,
                        payout_cents,
                        fee_recipient,
                        fee_cents,
                    );
                    self.track(&result);
                    let _ = response.send(result);
                }
                EscrowMessage::Refund {
                    caller,
                    booking_id,
                    amount_cents,
                    recipient,
                    response,
                } => {
                    let result = self.handle_refund(caller, booking_id, amount_cents, recipient);
                    self.track(&result);
                    let _ = response.send(result);
                }
                EscrowMessage::GetRecord {
                    booking_id,
                    response,
                } => {
                    let record = self
                        .records
                        .get(&booking_id)
                        .cloned()
                        .unwrap_or_else(|| EscrowRecord::empty(booking_id));
                    let _ = response.send(record);
                }
                EscrowMessage::GetBalance {
                    booking_id,
                    response,
                } => {
                    let balance = self
                        .records
                        .get(&booking_id)
                        .filter(|r| r.status == EscrowStatus::Locked)
                        .map(|r| r.amount_cents)
                        .unwrap_or(0);
                    let _ = response.send(balance);
                }
                EscrowMessage::BalanceOf { address, response } => {
                    let _ = response.send(self.vault.balance_of(&address));
                }
                EscrowMessage::Fund {
                    address,
                    amount_cents,
                    response,
                } => {
                    self.vault.fund(address, amount_cents);
                    let _ = response.send(());
                }
                EscrowMessage::Pause { caller, response } => {
                    let _ = response.send(self.handle_pause(caller));
                }
                EscrowMessage::Unpause { caller, response } => {
                    let _ = response.send(self.handle_unpause(caller));
                }
                EscrowMessage::AddRelayer {
                    caller,
                    relayer,
                    response,
                } => {
                    let _ = response.send(self.handle_add_relayer(caller, relayer));
                }
                EscrowMessage::RemoveRelayer {
                    caller,
                    relayer,
                    response,
                } => {
                    let _ = response.send(self.handle_remove_relayer(caller, relayer));
                }
                EscrowMessage::Shutdown => {
                    info!("Escrow actor shutting down");
                    break;
                }
            }
        }
    }

    fn track<T>(&self, result: &Result<T>) {
        if result.is_err() {
            self.metrics.rejected_ops_total.inc();
        }
    }

    fn publish(&self, event: EscrowEvent) {
        // No subscribers is fine; events are best-effort observability
        let _ = self.events.send(event);
    }

    fn locked_record_mut(&mut self, booking_id: Uuid) -> Result<&mut EscrowRecord> {
        let actual = self
            .records
            .get(&booking_id)
            .map(|r| r.status)
            .unwrap_or(EscrowStatus::None);
        if actual != EscrowStatus::Locked {
            return Err(Error::InvalidEscrowStatus {
                expected: EscrowStatus::Locked,
                actual,
            });
        }
        // Presence just checked
        self.records
            .get_mut(&booking_id)
            .ok_or(Error::InvalidEscrowStatus {
                expected: EscrowStatus::Locked,
                actual: EscrowStatus::None,
            })
    }

    fn handle_lock(
        &mut self,
        caller: Address,
        booking_id: Uuid,
        amount_cents: u64,
    ) -> Result<EscrowRecord> {
        if self.paused {
            return Err(Error::Suspended);
        }
        if amount_cents == 0 {
            return Err(Error::InvalidAmount);
        }
        if self.records.contains_key(&booking_id) {
            return Err(Error::BookingAlreadyExists(booking_id));
        }

        self.vault.move_into_custody(&caller, amount_cents)?;

        let record = EscrowRecord {
            booking_id,
            depositor: caller.clone(),
            amount_cents,
            status: EscrowStatus::Locked,
            locked_at: Some(Utc::now()),
            settled_at: None,
        };
        self.records.insert(booking_id, record.clone());

        self.metrics.locks_total.inc();
        self.metrics.locked_value_cents.add(amount_cents as i64);
        info!(%booking_id, %caller, amount_cents, "Funds locked");
        self.publish(EscrowEvent::FundsLocked {
            booking_id,
            depositor: caller,
            amount_cents,
        });

        Ok(record)
    }

    fn handle_release(
        &mut self,
        caller: Address,
        booking_id: Uuid,
        payout_recipient: Address,
        payout_cents: u64,
        fee_recipient: Address,
        fee_cents: u64,
    ) -> Result<EscrowRecord> {
        if self.paused {
            return Err(Error::Suspended);
        }
        self.access.require_relayer(&caller)?;

        let locked = self.locked_record_mut(booking_id)?.amount_cents;

        if payout_recipient.is_empty() || fee_recipient.is_empty() {
            return Err(Error::InvalidAddress);
        }
        let total = payout_cents
            .checked_add(fee_cents)
            .ok_or(Error::AmountMismatch {
                expected: locked,
                actual: u64::MAX,
            })?;
        if total != locked {
            return Err(Error::AmountMismatch {
                expected: locked,
                actual: total,
            });
        }

        self.vault.move_out_of_custody(&payout_recipient, payout_cents)?;
        self.vault.move_out_of_custody(&fee_recipient, fee_cents)?;

        let record = self.locked_record_mut(booking_id)?;
        record.status = EscrowStatus::Released;
        record.settled_at = Some(Utc::now());
        let record = record.clone();

        self.metrics.releases_total.inc();
        self.metrics.locked_value_cents.sub(locked as i64);
        info!(
            %booking_id, %payout_recipient, payout_cents, %fee_recipient, fee_cents,
            "Funds released"
        );
        self.publish(EscrowEvent::FundsReleased {
            booking_id,
            payout_recipient,
            payout_cents,
            fee_recipient,
            fee_cents,
        });

        Ok(record)
    }

    fn handle_refund(
        &mut self,
        caller: Address,
        booking_id: Uuid,
        amount_cents: u64,
        recipient: Address,
    ) -> Result<EscrowRecord> {
        if self.paused {
            return Err(Error::Suspended);
        }
        self.access.require_relayer(&caller)?;

        let locked = self.locked_record_mut(booking_id)?.amount_cents;

        if recipient.is_empty() {
            return Err(Error::InvalidAddress);
        }
        // Partial refunds are rejected outright; a half-drained record would
        // strand the remainder with no legal transition left.
        if amount_cents != locked {
            return Err(Error::AmountMismatch {
                expected: locked,
                actual: amount_cents,
            });
        }

        self.vault.move_out_of_custody(&recipient, amount_cents)?;

        let record = self.locked_record_mut(booking_id)?;
        record.status = EscrowStatus::Refunded;
        record.settled_at = Some(Utc::now());
        let record = record.clone();

        self.metrics.refunds_total.inc();
        self.metrics.locked_value_cents.sub(locked as i64);
        info!(%booking_id, %recipient, amount_cents, "Funds refunded");
        self.publish(EscrowEvent::FundsRefunded {
            booking_id,
            recipient,
            amount_cents,
        });

        Ok(record)
    }

    fn handle_pause(&mut self, caller: Address) -> Result<()> {
        self.access.require_admin(&caller)?;
        if !self.paused {
            self.paused = true;
            warn!("Escrow ledger paused; mutating operations suspended");
            self.publish(EscrowEvent::Paused);
        }
        Ok(())
    }

    fn handle_unpause(&mut self, caller: Address) -> Result<()> {
        self.access.require_admin(&caller)?;
        if self.paused {
            self.paused = false;
            info!("Escrow ledger unpaused");
            self.publish(EscrowEvent::Unpaused);
        }
        Ok(())
    }

    fn handle_add_relayer(&mut self, caller: Address, relayer: Address) -> Result<bool> {
        self.access.require_admin(&caller)?;
        if relayer.is_empty() {
            return Err(Error::InvalidAddress);
        }
        let added = self.access.add_relayer(relayer.clone());
        if added {
            info!(%relayer, "Relayer added");
            self.publish(EscrowEvent::RelayerAdded { relayer });
        }
        Ok(added)
    }

    fn handle_remove_relayer(&mut self, caller: Address, relayer: Address) -> Result<bool> {
        self.access.require_admin(&caller)?;
        let removed = self.access.remove_relayer(&relayer);
        if removed {
            info!(%relayer, "Relayer removed");
            self.publish(EscrowEvent::RelayerRemoved { relayer });
        }
        Ok(removed)
    }
}

/// Handle for sending messages to the escrow actor
#[derive(Clone)]
pub struct EscrowHandle {
    sender: mpsc::Sender<EscrowMessage>,
}

impl EscrowHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EscrowMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("escrow actor mailbox closed".to_string()))?;
        rx.await
            .map_err(|_| Error::Concurrency("escrow actor dropped response".to_string()))
    }

    /// Lock funds for a booking
    pub async fn lock_funds(
        &self,
        caller: Address,
        booking_id: Uuid,
        amount_cents: u64,
    ) -> Result<EscrowRecord> {
        self.request(|response| EscrowMessage::LockFunds {
            caller,
            booking_id,
            amount_cents,
            response,
        })
        .await?
    }

    /// Release locked funds as payout + fee
    pub async fn release_funds(
        &self,
        caller: Address,
        booking_id: Uuid,
        payout_recipient: Address,
        payout_cents: u64,
        fee_recipient: Address,
        fee_cents: u64,
    ) -> Result<EscrowRecord> {
        self.request(|response| EscrowMessage::ReleaseFunds {
            caller,
            booking_id,
            payout_recipient,
            payout_cents,
            fee_recipient,
            fee_cents,
            response,
        })
        .await?
    }

    /// Refund the full locked amount
    pub async fn refund(
        &self,
        caller: Address,
        booking_id: Uuid,
        amount_cents: u64,
        recipient: Address,
    ) -> Result<EscrowRecord> {
        self.request(|response| EscrowMessage::Refund {
            caller,
            booking_id,
            amount_cents,
            recipient,
            response,
        })
        .await?
    }

    /// Get record (zeroed record for unknown ids)
    pub async fn get_record(&self, booking_id: Uuid) -> Result<EscrowRecord> {
        self.request(|response| EscrowMessage::GetRecord {
            booking_id,
            response,
        })
        .await
    }

    /// Get locked balance for a booking
    pub async fn get_balance(&self, booking_id: Uuid) -> Result<u64> {
        self.request(|response| EscrowMessage::GetBalance {
            booking_id,
            response,
        })
        .await
    }

    /// Get an identity's free balance
    pub async fn balance_of(&self, address: Address) -> Result<u64> {
        self.request(|response| EscrowMessage::BalanceOf { address, response })
            .await
    }

    /// Credit an identity's free balance
    pub async fn fund(&self, address: Address, amount_cents: u64) -> Result<()> {
        self.request(|response| EscrowMessage::Fund {
            address,
            amount_cents,
            response,
        })
        .await
    }

    /// Pause mutating operations
    pub async fn pause(&self, caller: Address) -> Result<()> {
        self.request(|response| EscrowMessage::Pause { caller, response })
            .await?
    }

    /// Resume mutating operations
    pub async fn unpause(&self, caller: Address) -> Result<()> {
        self.request(|response| EscrowMessage::Unpause { caller, response })
            .await?
    }

    /// Add a relayer identity
    pub async fn add_relayer(&self, caller: Address, relayer: Address) -> Result<bool> {
        self.request(|response| EscrowMessage::AddRelayer {
            caller,
            relayer,
            response,
        })
        .await?
    }

    /// Remove a relayer identity
    pub async fn remove_relayer(&self, caller: Address, relayer: Address) -> Result<bool> {
        self.request(|response| EscrowMessage::RemoveRelayer {
            caller,
            relayer,
            response,
        })
        .await?
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(EscrowMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("escrow actor mailbox closed".to_string()))
    }
}

/// Spawn the escrow actor and return a handle to it
pub fn spawn_escrow_actor(
    access: AccessControl,
    mailbox_capacity: usize,
    events: broadcast::Sender<EscrowEvent>,
    metrics: Metrics,
) -> EscrowHandle {
    let (sender, receiver) = mpsc::channel(mailbox_capacity);
    let actor = EscrowActor::new(access, receiver, events, metrics);
    tokio::spawn(actor.run());
    EscrowHandle { sender }
}
