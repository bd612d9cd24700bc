//! Payment request and saga outcome types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request to pay a vendor from the treasury.
///
/// Immutable once a saga starts; every downstream record references it by
/// `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub request_id: Uuid,
    pub requester_id: String,
    /// Chain address or registered vendor name
    pub vendor_identifier: String,
    pub amount: Decimal,
    pub currency: String,
}

impl PaymentRequest {
    pub fn new(
        requester_id: impl Into<String>,
        vendor_identifier: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            requester_id: requester_id.into(),
            vendor_identifier: vendor_identifier.into(),
            amount,
            currency: currency.into(),
        }
    }
}

/// Terminal status of a saga instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SagaStatus {
    Success,
    Paused,
    Failed,
}

impl SagaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Paused => "PAUSED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-checkable classification of a FAILED outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    ReservationFailure,
    IdentifierResolution,
    InsufficientLiquidity,
    ChainSubmission,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReservationFailure => "RESERVATION_FAILURE",
            Self::IdentifierResolution => "IDENTIFIER_RESOLUTION",
            Self::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            Self::ChainSubmission => "CHAIN_SUBMISSION",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a single transfer attempt chain, exactly one of settlement or
/// failure.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Settled {
        settlement_reference: String,
    },
    Failed {
        kind: FailureKind,
        detail: String,
    },
}

/// Sole synchronous return value of a saga run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaOutcome {
    pub request_id: Uuid,
    pub status: SagaStatus,
    /// Present iff status is SUCCESS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_reference: Option<String>,
    /// Present iff status is FAILED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    /// Human-readable explanation, always set for PAUSED and FAILED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Present iff status is PAUSED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<Uuid>,
    pub completed_at: DateTime<Utc>,
}

impl SagaOutcome {
    pub fn success(request_id: Uuid, settlement_reference: String) -> Self {
        Self {
            request_id,
            status: SagaStatus::Success,
            settlement_reference: Some(settlement_reference),
            failure_kind: None,
            reason: None,
            ticket_id: None,
            completed_at: Utc::now(),
        }
    }

    pub fn paused(request_id: Uuid, reason: String, ticket_id: Uuid) -> Self {
        Self {
            request_id,
            status: SagaStatus::Paused,
            settlement_reference: None,
            failure_kind: None,
            reason: Some(reason),
            ticket_id: Some(ticket_id),
            completed_at: Utc::now(),
        }
    }

    pub fn failed(request_id: Uuid, kind: FailureKind, reason: String) -> Self {
        Self {
            request_id,
            status: SagaStatus::Failed,
            settlement_reference: None,
            failure_kind: Some(kind),
            reason: Some(reason),
            ticket_id: None,
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn outcome_constructors_carry_required_fields() {
        let id = Uuid::new_v4();

        let ok = SagaOutcome::success(id, "0xabc".into());
        assert_eq!(ok.status, SagaStatus::Success);
        assert!(ok.settlement_reference.is_some());
        assert!(ok.failure_kind.is_none());

        let paused = SagaOutcome::paused(id, "Exceeds Policy Limit".into(), Uuid::new_v4());
        assert_eq!(paused.status, SagaStatus::Paused);
        assert!(paused.ticket_id.is_some());
        assert_eq!(paused.reason.as_deref(), Some("Exceeds Policy Limit"));

        let failed = SagaOutcome::failed(id, FailureKind::InsufficientLiquidity, "low".into());
        assert_eq!(failed.status, SagaStatus::Failed);
        assert_eq!(
            failed.failure_kind,
            Some(FailureKind::InsufficientLiquidity)
        );
    }

    #[test]
    fn failure_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&FailureKind::InsufficientLiquidity).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_LIQUIDITY\"");
    }

    #[test]
    fn request_ids_are_unique() {
        let a = PaymentRequest::new("cfo", "acme", dec!(10), "MNEE");
        let b = PaymentRequest::new("cfo", "acme", dec!(10), "MNEE");
        assert_ne!(a.request_id, b.request_id);
    }
}
