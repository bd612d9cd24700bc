//! In-memory implementations of every collaborator port.
//!
//! Used by the test suite and by the CLI's dry-run mode. Each fake supports
//! failure injection so integration scenarios can script outages without a
//! live backend.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    ApprovalDecision, ApprovalStatus, ApprovalTicket, ReservationRecord, ReservationState,
};
use crate::error::{ChainError, Result, TreasurerError};
use crate::fingerprint;
use crate::ports::{ApprovalStore, BlockchainClient, Ledger, NotificationSink, PolicyStore};

/// Policy limits held in a shared map.
#[derive(Default)]
pub struct MemoryPolicyStore {
    limits: RwLock<HashMap<String, Decimal>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn with_limit(name: &str, value: Decimal) -> Arc<Self> {
        let store = Self::new();
        store.limits.write().await.insert(name.to_string(), value);
        store
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn get_limit(&self, name: &str) -> Result<Option<Decimal>> {
        Ok(self.limits.read().await.get(name).copied())
    }

    async fn set_limit(&self, name: &str, value: Decimal) -> Result<()> {
        self.limits.write().await.insert(name.to_string(), value);
        Ok(())
    }
}

/// Reservation ledger keyed by request id.
#[derive(Default)]
pub struct MemoryLedger {
    records: RwLock<HashMap<Uuid, ReservationRecord>>,
    fail_writes: RwLock<bool>,
}

impl MemoryLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent write fail, simulating a ledger outage.
    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().await = fail;
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn write_reservation(&self, record: ReservationRecord) -> Result<ReservationRecord> {
        if *self.fail_writes.read().await {
            return Err(TreasurerError::ReservationWrite(
                "ledger unavailable".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        let stored = records
            .entry(record.request_id)
            .or_insert_with(|| record.clone());
        Ok(stored.clone())
    }

    async fn update_reservation(
        &self,
        reservation_id: Uuid,
        state: ReservationState,
        settlement_reference: Option<String>,
        release_reason: Option<String>,
    ) -> Result<()> {
        if *self.fail_writes.read().await {
            return Err(TreasurerError::ReservationWrite(
                "ledger unavailable".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        let record = records
            .values_mut()
            .find(|r| r.reservation_id == reservation_id)
            .ok_or_else(|| TreasurerError::ReservationNotFound(reservation_id.to_string()))?;

        record.state = state;
        record.settlement_reference = settlement_reference;
        record.release_reason = release_reason;
        record.resolved_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn get_reservation(&self, request_id: Uuid) -> Result<Option<ReservationRecord>> {
        Ok(self.records.read().await.get(&request_id).cloned())
    }
}

/// Record of one simulated broadcast.
#[derive(Debug, Clone)]
pub struct BroadcastRecord {
    pub to: String,
    pub amount: Decimal,
    pub sequence: u64,
    pub reference: String,
}

/// Simulated token network.
///
/// Sequence numbers follow the real node contract: `next_sequence` reports
/// the current transaction count and a broadcast with a stale or reused
/// sequence is rejected, so racing callers are caught instead of silently
/// double-spending.
pub struct MemoryChain {
    signer: String,
    balances: RwLock<HashMap<String, Decimal>>,
    sequences: Mutex<HashMap<String, u64>>,
    broadcasts: Mutex<Vec<BroadcastRecord>>,
    scripted_failures: Mutex<VecDeque<ChainError>>,
}

impl MemoryChain {
    pub fn new(signer: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            signer: signer.into(),
            balances: RwLock::new(HashMap::new()),
            sequences: Mutex::new(HashMap::new()),
            broadcasts: Mutex::new(Vec::new()),
            scripted_failures: Mutex::new(VecDeque::new()),
        })
    }

    pub async fn fund(&self, address: &str, amount: Decimal) {
        self.balances
            .write()
            .await
            .insert(address.to_string(), amount);
    }

    /// Queue a failure to be returned by the next broadcast attempts, in
    /// order, before broadcasts start succeeding again.
    pub async fn script_failure(&self, error: ChainError) {
        self.scripted_failures.lock().await.push_back(error);
    }

    pub async fn broadcasts(&self) -> Vec<BroadcastRecord> {
        self.broadcasts.lock().await.clone()
    }
}

#[async_trait]
impl BlockchainClient for MemoryChain {
    async fn balance_of(&self, address: &str) -> std::result::Result<Decimal, ChainError> {
        Ok(self
            .balances
            .read()
            .await
            .get(address)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn next_sequence(&self, address: &str) -> std::result::Result<u64, ChainError> {
        Ok(*self.sequences.lock().await.entry(address.to_string()).or_insert(0))
    }

    async fn sign_and_broadcast(
        &self,
        to: &str,
        amount: Decimal,
        sequence: u64,
    ) -> std::result::Result<String, ChainError> {
        if let Some(err) = self.scripted_failures.lock().await.pop_front() {
            return Err(err);
        }

        let mut sequences = self.sequences.lock().await;
        let current = sequences.entry(self.signer.clone()).or_insert(0);
        if sequence != *current {
            return Err(ChainError::Rejected(format!(
                "sequence {sequence} does not match account sequence {current}"
            )));
        }
        *current += 1;
        drop(sequences);

        let mut balances = self.balances.write().await;
        if let Some(balance) = balances.get_mut(&self.signer) {
            *balance -= amount;
        }
        let credited = balances.entry(to.to_string()).or_insert(Decimal::ZERO);
        *credited += amount;
        drop(balances);

        let reference = fingerprint::pseudo_reference(to, amount, sequence);
        debug!(%to, %amount, sequence, %reference, "simulated broadcast");

        self.broadcasts.lock().await.push(BroadcastRecord {
            to: to.to_string(),
            amount,
            sequence,
            reference: reference.clone(),
        });

        Ok(reference)
    }

    fn signer_address(&self) -> String {
        self.signer.clone()
    }
}

/// Captures alerts instead of delivering them.
pub struct MemoryNotifier {
    delivered: bool,
    alerts: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            delivered: true,
            alerts: Mutex::new(Vec::new()),
        })
    }

    /// A sink whose deliveries always report failure.
    pub fn undeliverable() -> Arc<Self> {
        Arc::new(Self {
            delivered: false,
            alerts: Mutex::new(Vec::new()),
        })
    }

    pub async fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotifier {
    async fn alert(&self, category: &str, details: &str) -> bool {
        self.alerts
            .lock()
            .await
            .push((category.to_string(), details.to_string()));
        self.delivered
    }
}

/// Approval tickets held in insertion order.
#[derive(Default)]
pub struct MemoryApprovalStore {
    tickets: RwLock<Vec<ApprovalTicket>>,
}

impl MemoryApprovalStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ApprovalStore for MemoryApprovalStore {
    async fn enqueue(&self, ticket: ApprovalTicket) -> Result<Uuid> {
        let ticket_id = ticket.ticket_id;
        self.tickets.write().await.push(ticket);
        Ok(ticket_id)
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalTicket>> {
        Ok(self
            .tickets
            .read()
            .await
            .iter()
            .filter(|t| t.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn get(&self, ticket_id: Uuid) -> Result<Option<ApprovalTicket>> {
        Ok(self
            .tickets
            .read()
            .await
            .iter()
            .find(|t| t.ticket_id == ticket_id)
            .cloned())
    }

    async fn resolve(&self, ticket_id: Uuid, decision: ApprovalDecision) -> Result<ApprovalTicket> {
        let mut tickets = self.tickets.write().await;
        let ticket = tickets
            .iter_mut()
            .find(|t| t.ticket_id == ticket_id)
            .ok_or_else(|| TreasurerError::TicketNotFound(ticket_id.to_string()))?;
        ticket.resolve(decision)?;
        Ok(ticket.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaymentRequest;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn ledger_write_is_create_if_absent() {
        let ledger = MemoryLedger::new();
        let request_id = Uuid::new_v4();

        let first = ledger
            .write_reservation(ReservationRecord::new(request_id))
            .await
            .unwrap();
        let second = ledger
            .write_reservation(ReservationRecord::new(request_id))
            .await
            .unwrap();

        assert_eq!(first.reservation_id, second.reservation_id);
        assert_eq!(ledger.record_count().await, 1);
    }

    #[tokio::test]
    async fn chain_rejects_reused_sequence() {
        let chain = MemoryChain::new("0xtreasury");
        chain.fund("0xtreasury", dec!(100)).await;

        let seq = chain.next_sequence("0xtreasury").await.unwrap();
        chain
            .sign_and_broadcast("0xvendor", dec!(10), seq)
            .await
            .unwrap();

        let err = chain
            .sign_and_broadcast("0xvendor", dec!(10), seq)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)));
    }

    #[tokio::test]
    async fn scripted_failures_drain_in_order() {
        let chain = MemoryChain::new("0xtreasury");
        chain.fund("0xtreasury", dec!(100)).await;
        chain
            .script_failure(ChainError::Timeout { elapsed_ms: 1000 })
            .await;

        let seq = chain.next_sequence("0xtreasury").await.unwrap();
        assert!(chain
            .sign_and_broadcast("0xvendor", dec!(1), seq)
            .await
            .is_err());
        assert!(chain
            .sign_and_broadcast("0xvendor", dec!(1), seq)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn approval_store_filters_pending() {
        let store = MemoryApprovalStore::new();
        let ticket = ApprovalTicket::new(
            PaymentRequest::new("cfo", "acme", dec!(75), "MNEE"),
            "Exceeds Policy Limit",
        );
        let ticket_id = store.enqueue(ticket).await.unwrap();

        assert_eq!(store.list_pending().await.unwrap().len(), 1);

        store
            .resolve(ticket_id, ApprovalDecision::Reject)
            .await
            .unwrap();
        assert!(store.list_pending().await.unwrap().is_empty());

        let resolved = store.get(ticket_id).await.unwrap().unwrap();
        assert_eq!(resolved.status, ApprovalStatus::Rejected);
    }
}
