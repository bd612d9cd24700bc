//! Two-phase funds reservation against the durable ledger.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::{PaymentRequest, ReservationRecord, ReservationState};
use crate::error::{Result, TreasurerError};
use crate::ports::Ledger;

/// Earmarks funds before any chain interaction and settles the record after.
///
/// Reservation writes are never retried; a write failure is fatal to the
/// saga so no transfer can run without its durable record.
pub struct FundsReservation {
    ledger: Arc<dyn Ledger>,
}

impl FundsReservation {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Create the RESERVED record, idempotent on `request_id`: a second call
    /// returns the already-stored record instead of creating another.
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub async fn reserve(&self, request: &PaymentRequest) -> Result<ReservationRecord> {
        let stored = self
            .ledger
            .write_reservation(ReservationRecord::new(request.request_id))
            .await
            .map_err(|e| TreasurerError::ReservationWrite(e.to_string()))?;

        info!(
            reservation_id = %stored.reservation_id,
            state = %stored.state,
            "funds reserved"
        );
        Ok(stored)
    }

    /// RESERVED -> COMMITTED with the settlement reference.
    ///
    /// The durable update runs first; the in-memory record only advances on
    /// success, so a failed commit attempt leaves the record releasable.
    pub async fn commit(
        &self,
        record: &mut ReservationRecord,
        settlement_reference: &str,
    ) -> Result<()> {
        if record.state != ReservationState::Reserved {
            return Err(TreasurerError::InvalidReservationTransition {
                from: record.state.to_string(),
                to: ReservationState::Committed.to_string(),
            });
        }

        self.ledger
            .update_reservation(
                record.reservation_id,
                ReservationState::Committed,
                Some(settlement_reference.to_string()),
                None,
            )
            .await?;

        record.commit(settlement_reference.to_string())?;
        info!(reservation_id = %record.reservation_id, "reservation committed");
        Ok(())
    }

    /// RESERVED -> RELEASED, legal even after a commit attempt that failed.
    pub async fn release(&self, record: &mut ReservationRecord, reason: &str) -> Result<()> {
        if record.state != ReservationState::Reserved {
            return Err(TreasurerError::InvalidReservationTransition {
                from: record.state.to_string(),
                to: ReservationState::Released.to_string(),
            });
        }

        self.ledger
            .update_reservation(
                record.reservation_id,
                ReservationState::Released,
                None,
                Some(reason.to_string()),
            )
            .await?;

        record.release(reason.to_string())?;
        warn!(
            reservation_id = %record.reservation_id,
            reason,
            "reservation released"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryLedger;
    use crate::ports::MockLedger;
    use rust_decimal_macros::dec;

    fn request() -> PaymentRequest {
        PaymentRequest::new("cfo", "0x00000000000000000000000000000000000000aa", dec!(45), "MNEE")
    }

    #[tokio::test]
    async fn reserve_twice_returns_one_record() {
        let ledger = MemoryLedger::new();
        let funds = FundsReservation::new(ledger.clone());
        let req = request();

        let first = funds.reserve(&req).await.unwrap();
        let second = funds.reserve(&req).await.unwrap();

        assert_eq!(first.reservation_id, second.reservation_id);
        assert_eq!(ledger.record_count().await, 1);
    }

    #[tokio::test]
    async fn ledger_outage_is_fatal() {
        let ledger = MemoryLedger::new();
        ledger.set_fail_writes(true).await;
        let funds = FundsReservation::new(ledger);

        let err = funds.reserve(&request()).await.unwrap_err();
        assert!(matches!(err, TreasurerError::ReservationWrite(_)));
    }

    #[tokio::test]
    async fn commit_then_release_rejected() {
        let ledger = MemoryLedger::new();
        let funds = FundsReservation::new(ledger);
        let mut record = funds.reserve(&request()).await.unwrap();

        funds.commit(&mut record, "0xref").await.unwrap();
        assert_eq!(record.state, ReservationState::Committed);

        assert!(funds.release(&mut record, "late").await.is_err());
    }

    #[tokio::test]
    async fn release_still_legal_after_failed_commit_attempt() {
        let mut ledger = MockLedger::new();
        let mut failed_once = false;
        ledger
            .expect_update_reservation()
            .times(2)
            .returning(move |_, state, _, _| {
                if !failed_once {
                    failed_once = true;
                    assert_eq!(state, ReservationState::Committed);
                    Err(TreasurerError::ReservationWrite("ledger blip".into()))
                } else {
                    assert_eq!(state, ReservationState::Released);
                    Ok(())
                }
            });

        let funds = FundsReservation::new(Arc::new(ledger));
        let mut record = ReservationRecord::new(uuid::Uuid::new_v4());

        assert!(funds.commit(&mut record, "0xref").await.is_err());
        assert_eq!(record.state, ReservationState::Reserved);

        funds.release(&mut record, "commit failed").await.unwrap();
        assert_eq!(record.state, ReservationState::Released);
    }
}
