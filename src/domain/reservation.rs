//! Two-phase funds reservation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TreasurerError};

/// Lifecycle of a reservation.
///
/// RESERVED is the only non-terminal state. COMMITTED requires a settlement
/// reference; RELEASED records a reason and is legal even after a commit
/// attempt that failed before settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReservationState {
    Reserved,
    Committed,
    Released,
}

impl ReservationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reserved => "RESERVED",
            Self::Committed => "COMMITTED",
            Self::Released => "RELEASED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Reserved)
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReservationState {
    type Err = TreasurerError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "RESERVED" => Ok(Self::Reserved),
            "COMMITTED" => Ok(Self::Committed),
            "RELEASED" => Ok(Self::Released),
            other => Err(TreasurerError::Validation(format!(
                "unknown reservation state: {other}"
            ))),
        }
    }
}

/// Durable record of funds earmarked for one payment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub reservation_id: Uuid,
    pub request_id: Uuid,
    pub state: ReservationState,
    /// Set when the reservation is committed
    pub settlement_reference: Option<String>,
    /// Set when the reservation is released
    pub release_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReservationRecord {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            reservation_id: Uuid::new_v4(),
            request_id,
            state: ReservationState::Reserved,
            settlement_reference: None,
            release_reason: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// RESERVED -> COMMITTED with the settlement reference that proves it.
    pub fn commit(&mut self, settlement_reference: String) -> Result<()> {
        if self.state != ReservationState::Reserved {
            return Err(TreasurerError::InvalidReservationTransition {
                from: self.state.to_string(),
                to: ReservationState::Committed.to_string(),
            });
        }
        self.state = ReservationState::Committed;
        self.settlement_reference = Some(settlement_reference);
        self.resolved_at = Some(Utc::now());
        Ok(())
    }

    /// RESERVED -> RELEASED. A reservation that never settled can always be
    /// released, including after a failed commit attempt.
    pub fn release(&mut self, reason: String) -> Result<()> {
        if self.state != ReservationState::Reserved {
            return Err(TreasurerError::InvalidReservationTransition {
                from: self.state.to_string(),
                to: ReservationState::Released.to_string(),
            });
        }
        self.state = ReservationState::Released;
        self.release_reason = Some(reason);
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}
