//! Human approval queue over the durable approval store.

use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{ApprovalDecision, ApprovalTicket, PaymentRequest};
use crate::error::Result;
use crate::ports::ApprovalStore;

/// Append-only queue of paused requests awaiting review.
#[derive(Clone)]
pub struct ApprovalQueue {
    store: Arc<dyn ApprovalStore>,
}

impl ApprovalQueue {
    pub fn new(store: Arc<dyn ApprovalStore>) -> Self {
        Self { store }
    }

    /// Record a paused request for review. The full request is embedded so
    /// an approval can later resubmit it unchanged.
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub async fn enqueue(&self, request: PaymentRequest, reason: &str) -> Result<ApprovalTicket> {
        let ticket = ApprovalTicket::new(request, reason);
        let ticket_id = self.store.enqueue(ticket.clone()).await?;
        info!(%ticket_id, reason, "approval ticket enqueued");
        Ok(ticket)
    }

    /// Fresh, finite snapshot of pending tickets.
    pub async fn list_pending(&self) -> Result<Vec<ApprovalTicket>> {
        self.store.list_pending().await
    }

    pub async fn get(&self, ticket_id: Uuid) -> Result<Option<ApprovalTicket>> {
        self.store.get(ticket_id).await
    }

    /// Apply a reviewer decision. Updates ticket status only; re-entry of an
    /// approved request is a separate, explicit step.
    pub async fn resolve(
        &self,
        ticket_id: Uuid,
        decision: ApprovalDecision,
    ) -> Result<ApprovalTicket> {
        let ticket = self.store.resolve(ticket_id, decision).await?;
        info!(%ticket_id, status = %ticket.status, "approval ticket resolved");
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryApprovalStore;
    use crate::domain::ApprovalStatus;
    use rust_decimal_macros::dec;

    fn request() -> PaymentRequest {
        PaymentRequest::new("cfo", "acme-corp", dec!(75), "MNEE")
    }

    #[tokio::test]
    async fn enqueue_then_list_then_resolve() {
        let queue = ApprovalQueue::new(MemoryApprovalStore::new());

        let ticket = queue
            .enqueue(request(), "Exceeds Policy Limit")
            .await
            .unwrap();
        assert_eq!(ticket.status, ApprovalStatus::Pending);

        let pending = queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].ticket_id, ticket.ticket_id);

        let resolved = queue
            .resolve(ticket.ticket_id, ApprovalDecision::Approve)
            .await
            .unwrap();
        assert_eq!(resolved.status, ApprovalStatus::Approved);
        assert!(queue.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_is_single_shot() {
        let queue = ApprovalQueue::new(MemoryApprovalStore::new());
        let ticket = queue
            .enqueue(request(), "Exceeds Policy Limit")
            .await
            .unwrap();

        queue
            .resolve(ticket.ticket_id, ApprovalDecision::Reject)
            .await
            .unwrap();
        assert!(queue
            .resolve(ticket.ticket_id, ApprovalDecision::Approve)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unknown_ticket_is_an_error() {
        let queue = ApprovalQueue::new(MemoryApprovalStore::new());
        assert!(queue
            .resolve(Uuid::new_v4(), ApprovalDecision::Approve)
            .await
            .is_err());
    }
}
