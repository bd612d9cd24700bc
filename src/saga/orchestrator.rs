//! Payment saga state machine.
//!
//! One instance per request, strictly sequential steps, one terminal state.
//! VALIDATING -> RESERVING -> EXECUTING -> {SUCCESS, FAILED, PAUSED}.

use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::domain::{
    ApprovalStatus, FailureKind, PaymentRequest, ReservationState, SagaOutcome, TransferOutcome,
};
use crate::error::{Result, TreasurerError};
use crate::fingerprint::request_fingerprint;
use crate::ports::NotificationSink;
use crate::saga::approvals::ApprovalQueue;
use crate::saga::executor::TransferExecutor;
use crate::saga::policy::{Decision, PolicyGate};
use crate::saga::reservation::FundsReservation;

/// Drives one payment request through the saga.
pub struct SagaOrchestrator {
    gate: PolicyGate,
    funds: FundsReservation,
    executor: TransferExecutor,
    approvals: ApprovalQueue,
    notifier: Arc<dyn NotificationSink>,
}

impl SagaOrchestrator {
    pub fn new(
        gate: PolicyGate,
        funds: FundsReservation,
        executor: TransferExecutor,
        approvals: ApprovalQueue,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            gate,
            funds,
            executor,
            approvals,
            notifier,
        }
    }

    /// Run a fresh saga from VALIDATING.
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub async fn execute(&self, request: PaymentRequest) -> Result<SagaOutcome> {
        let fingerprint = request_fingerprint(&request);
        info!(%fingerprint, amount = %request.amount, "saga started: VALIDATING");

        match self.gate.evaluate(request.amount).await? {
            Decision::Approve => {}
            Decision::RequireApproval { reason } => {
                let request_id = request.request_id;
                let ticket = self.approvals.enqueue(request, &reason).await?;
                self.notifier
                    .alert(
                        "POLICY_APPROVAL_NEEDED",
                        &format!(
                            "Request {} paused: {} (ticket {}, fingerprint {})",
                            request_id, reason, ticket.ticket_id, fingerprint
                        ),
                    )
                    .await;
                info!(ticket_id = %ticket.ticket_id, %reason, "saga paused");
                return Ok(SagaOutcome::paused(request_id, reason, ticket.ticket_id));
            }
        }

        self.run_from_reserving(request).await
    }

    /// Re-enter the saga for an approved ticket. The recorded human decision
    /// replaces the policy gate, so execution starts at RESERVING.
    #[instrument(skip(self))]
    pub async fn resume_approved(&self, ticket_id: Uuid) -> Result<SagaOutcome> {
        let ticket = self
            .approvals
            .get(ticket_id)
            .await?
            .ok_or_else(|| TreasurerError::TicketNotFound(ticket_id.to_string()))?;

        if ticket.status != ApprovalStatus::Approved {
            return Err(TreasurerError::TicketNotApproved(format!(
                "ticket {} is {}",
                ticket_id, ticket.status
            )));
        }

        info!(
            request_id = %ticket.request.request_id,
            "resuming approved request at RESERVING"
        );
        self.run_from_reserving(ticket.request).await
    }

    async fn run_from_reserving(&self, request: PaymentRequest) -> Result<SagaOutcome> {
        info!("saga transition: RESERVING");
        let mut record = match self.funds.reserve(&request).await {
            Ok(record) => record,
            Err(TreasurerError::ReservationWrite(detail)) => {
                error!(%detail, "reservation write failed, saga aborted");
                return Ok(SagaOutcome::failed(
                    request.request_id,
                    FailureKind::ReservationFailure,
                    detail,
                ));
            }
            Err(e) => return Err(e),
        };

        // A replayed request whose reservation already settled returns the
        // recorded settlement instead of paying twice.
        match record.state {
            ReservationState::Committed => {
                let reference = record.settlement_reference.clone().unwrap_or_default();
                info!(%reference, "reservation already committed, replaying success");
                return Ok(SagaOutcome::success(request.request_id, reference));
            }
            ReservationState::Released => {
                return Ok(SagaOutcome::failed(
                    request.request_id,
                    FailureKind::ReservationFailure,
                    format!(
                        "reservation {} already released",
                        record.reservation_id
                    ),
                ));
            }
            ReservationState::Reserved => {}
        }

        info!("saga transition: EXECUTING");
        match self.executor.execute(&request).await? {
            TransferOutcome::Settled {
                settlement_reference,
            } => {
                self.funds.commit(&mut record, &settlement_reference).await?;
                info!(%settlement_reference, "saga finished: SUCCESS");
                Ok(SagaOutcome::success(
                    request.request_id,
                    settlement_reference,
                ))
            }
            TransferOutcome::Failed { kind, detail } => {
                self.funds.release(&mut record, &detail).await?;
                info!(%kind, %detail, "saga finished: FAILED");
                Ok(SagaOutcome::failed(request.request_id, kind, detail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        MemoryApprovalStore, MemoryChain, MemoryLedger, MemoryNotifier, MemoryPolicyStore,
    };
    use crate::config::PolicyConfig;
    use crate::domain::{ApprovalDecision, SagaStatus};
    use crate::ports::ApprovalStore;
    use crate::retry::RetryPolicy;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::time::Duration;

    const TREASURY: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const VENDOR: &str = "0x00000000000000000000000000000000000000aa";

    struct Harness {
        orchestrator: SagaOrchestrator,
        chain: Arc<MemoryChain>,
        ledger: Arc<MemoryLedger>,
        notifier: Arc<MemoryNotifier>,
        approvals: Arc<MemoryApprovalStore>,
        policy: Arc<MemoryPolicyStore>,
    }

    async fn harness(balance: rust_decimal::Decimal) -> Harness {
        let policy = MemoryPolicyStore::with_limit("approval_limit", dec!(50)).await;
        let ledger = MemoryLedger::new();
        let chain = MemoryChain::new(TREASURY);
        chain.fund(TREASURY, balance).await;
        let notifier = MemoryNotifier::new();
        let approvals = MemoryApprovalStore::new();

        let retry = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            exponential_base: 2.0,
            jitter_enabled: false,
        };

        let orchestrator = SagaOrchestrator::new(
            PolicyGate::new(policy.clone(), PolicyConfig::default()),
            FundsReservation::new(ledger.clone()),
            TransferExecutor::new(
                chain.clone(),
                notifier.clone(),
                HashMap::new(),
                TREASURY.to_string(),
                retry,
            ),
            ApprovalQueue::new(approvals.clone()),
            notifier.clone(),
        );

        Harness {
            orchestrator,
            chain,
            ledger,
            notifier,
            approvals,
            policy,
        }
    }

    #[tokio::test]
    async fn paused_saga_creates_ticket_and_alert() {
        let h = harness(dec!(100)).await;
        let request = PaymentRequest::new("cfo", VENDOR, dec!(75), "MNEE");
        let request_id = request.request_id;

        let outcome = h.orchestrator.execute(request).await.unwrap();

        assert_eq!(outcome.status, SagaStatus::Paused);
        assert_eq!(outcome.reason.as_deref(), Some("Exceeds Policy Limit"));
        let ticket_id = outcome.ticket_id.expect("paused outcome carries ticket");

        let pending = h.approvals.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].ticket_id, ticket_id);
        assert_eq!(pending[0].request.request_id, request_id);

        let alerts = h.notifier.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, "POLICY_APPROVAL_NEEDED");

        // nothing reserved, nothing broadcast
        assert_eq!(h.ledger.record_count().await, 0);
        assert!(h.chain.broadcasts().await.is_empty());
    }

    #[tokio::test]
    async fn rejected_ticket_cannot_resume() {
        let h = harness(dec!(100)).await;
        let outcome = h
            .orchestrator
            .execute(PaymentRequest::new("cfo", VENDOR, dec!(75), "MNEE"))
            .await
            .unwrap();
        let ticket_id = outcome.ticket_id.unwrap();

        h.approvals
            .resolve(ticket_id, ApprovalDecision::Reject)
            .await
            .unwrap();

        let err = h.orchestrator.resume_approved(ticket_id).await.unwrap_err();
        assert!(matches!(err, TreasurerError::TicketNotApproved(_)));
        assert!(h.chain.broadcasts().await.is_empty());
    }

    #[tokio::test]
    async fn mid_saga_limit_change_does_not_apply() {
        let h = harness(dec!(100)).await;

        // decision snapshot happens at evaluation; tightening the limit
        // afterwards cannot un-approve the in-flight request
        let outcome = h
            .orchestrator
            .execute(PaymentRequest::new("cfo", VENDOR, dec!(45), "MNEE"))
            .await
            .unwrap();
        assert_eq!(outcome.status, SagaStatus::Success);

        use crate::ports::PolicyStore;
        h.policy.set_limit("approval_limit", dec!(10)).await.unwrap();

        // new requests see the new limit
        let paused = h
            .orchestrator
            .execute(PaymentRequest::new("cfo", VENDOR, dec!(45), "MNEE"))
            .await
            .unwrap();
        assert_eq!(paused.status, SagaStatus::Paused);
    }

    #[tokio::test]
    async fn resumed_ticket_replays_committed_settlement() {
        let h = harness(dec!(100)).await;
        let outcome = h
            .orchestrator
            .execute(PaymentRequest::new("cfo", VENDOR, dec!(75), "MNEE"))
            .await
            .unwrap();
        let ticket_id = outcome.ticket_id.unwrap();

        h.approvals
            .resolve(ticket_id, ApprovalDecision::Approve)
            .await
            .unwrap();

        let first = h.orchestrator.resume_approved(ticket_id).await.unwrap();
        assert_eq!(first.status, SagaStatus::Success);

        let second = h.orchestrator.resume_approved(ticket_id).await.unwrap();
        assert_eq!(second.status, SagaStatus::Success);
        assert_eq!(second.settlement_reference, first.settlement_reference);

        // one broadcast despite two resume calls
        assert_eq!(h.chain.broadcasts().await.len(), 1);
    }
}
