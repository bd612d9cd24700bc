//! Human approval tickets for paused payment requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::payment::PaymentRequest;
use crate::error::{Result, TreasurerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = TreasurerError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(TreasurerError::Validation(format!(
                "unknown approval status: {other}"
            ))),
        }
    }
}

/// A reviewer's verdict on a pending ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

impl ApprovalDecision {
    pub fn status(&self) -> ApprovalStatus {
        match self {
            Self::Approve => ApprovalStatus::Approved,
            Self::Reject => ApprovalStatus::Rejected,
        }
    }
}

/// A paused request awaiting a human decision.
///
/// The full request is embedded so an approved ticket can be resubmitted
/// without re-deriving any field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalTicket {
    pub ticket_id: Uuid,
    pub request: PaymentRequest,
    pub reason: String,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalTicket {
    pub fn new(request: PaymentRequest, reason: impl Into<String>) -> Self {
        Self {
            ticket_id: Uuid::new_v4(),
            request,
            reason: reason.into(),
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Apply a reviewer decision. Only pending tickets can be resolved.
    pub fn resolve(&mut self, decision: ApprovalDecision) -> Result<()> {
        if self.status != ApprovalStatus::Pending {
            return Err(TreasurerError::Validation(format!(
                "ticket {} already {}",
                self.ticket_id, self.status
            )));
        }
        self.status = decision.status();
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}
