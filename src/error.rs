use thiserror::Error;

/// Main error type for the treasurer
#[derive(Error, Debug)]
pub enum TreasurerError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Ledger errors
    #[error("Reservation write failed: {0}")]
    ReservationWrite(String),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("Invalid reservation transition: from {from} to {to}")]
    InvalidReservationTransition { from: String, to: String },

    // Approval errors
    #[error("Approval ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Ticket not approved: {0}")]
    TicketNotApproved(String),

    // Chain errors
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Crypto/signing errors
    #[error("Wallet error: {0}")]
    Wallet(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TreasurerError
pub type Result<T> = std::result::Result<T, TreasurerError>;

/// Failures raised by the blockchain client.
///
/// Transient variants may be re-submitted; fatal variants must never be
/// retried as-is.
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    #[error("RPC timeout after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Malformed node response: {0}")]
    MalformedResponse(String),
}

impl ChainError {
    /// Whether re-submitting the same call can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection(_))
    }
}

/// Specific error types for transfer execution
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    #[error("Unresolvable vendor identifier: {identifier}")]
    IdentifierResolution { identifier: String },

    #[error("Insufficient liquidity: balance {balance}, requested {requested}")]
    InsufficientLiquidity {
        balance: rust_decimal::Decimal,
        requested: rust_decimal::Decimal,
    },

    #[error("Chain submission failed after {attempts} attempts: {last}")]
    SubmissionExhausted { attempts: u32, last: ChainError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ChainError::Timeout { elapsed_ms: 5000 }.is_transient());
        assert!(ChainError::Connection("refused".into()).is_transient());
        assert!(!ChainError::Rejected("nonce too low".into()).is_transient());
        assert!(!ChainError::MalformedResponse("bad json".into()).is_transient());
    }

    #[test]
    fn transfer_error_converts_into_crate_error() {
        let err: TreasurerError = TransferError::IdentifierResolution {
            identifier: "acme-corp".into(),
        }
        .into();
        assert!(matches!(err, TreasurerError::Transfer(_)));
    }
}
