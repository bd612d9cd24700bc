//! Collaborator ports for the three independently-failing external systems
//! plus notification and approval storage.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{ApprovalDecision, ApprovalTicket, ReservationRecord, ReservationState};
use crate::error::{ChainError, Result};

/// Mutable spending-policy storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Read a named limit. `None` means no value is stored and the caller's
    /// configured default applies.
    async fn get_limit(&self, name: &str) -> Result<Option<Decimal>>;

    async fn set_limit(&self, name: &str, value: Decimal) -> Result<()>;
}

/// Durable transaction ledger holding reservation records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create-if-absent on `request_id`; returns the stored record, which is
    /// the pre-existing one when the request was already reserved.
    async fn write_reservation(&self, record: ReservationRecord) -> Result<ReservationRecord>;

    async fn update_reservation(
        &self,
        reservation_id: Uuid,
        state: ReservationState,
        settlement_reference: Option<String>,
        release_reason: Option<String>,
    ) -> Result<()>;

    async fn get_reservation(&self, request_id: Uuid) -> Result<Option<ReservationRecord>>;
}

/// Blockchain node access for balance, sequence, and broadcast.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlockchainClient: Send + Sync {
    async fn balance_of(&self, address: &str) -> std::result::Result<Decimal, ChainError>;

    async fn next_sequence(&self, address: &str) -> std::result::Result<u64, ChainError>;

    /// Sign and broadcast a transfer; returns the settlement reference.
    async fn sign_and_broadcast(
        &self,
        to: &str,
        amount: Decimal,
        sequence: u64,
    ) -> std::result::Result<String, ChainError>;

    /// Address whose key signs outgoing transfers.
    fn signer_address(&self) -> String;
}

/// Best-effort human alert channel. A `false` return means the alert was not
/// delivered; it never fails the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn alert(&self, category: &str, details: &str) -> bool;
}

/// Durable storage for approval tickets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn enqueue(&self, ticket: ApprovalTicket) -> Result<Uuid>;

    async fn list_pending(&self) -> Result<Vec<ApprovalTicket>>;

    async fn get(&self, ticket_id: Uuid) -> Result<Option<ApprovalTicket>>;

    async fn resolve(&self, ticket_id: Uuid, decision: ApprovalDecision) -> Result<ApprovalTicket>;
}
