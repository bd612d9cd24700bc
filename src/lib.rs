pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod ports;
pub mod retry;
pub mod saga;
pub mod signing;

pub use config::AppConfig;
pub use domain::{
    ApprovalDecision, ApprovalStatus, ApprovalTicket, FailureKind, PaymentRequest,
    ReservationRecord, ReservationState, SagaOutcome, SagaStatus, TransferOutcome,
};
pub use error::{ChainError, Result, TransferError, TreasurerError};
pub use ports::{ApprovalStore, BlockchainClient, Ledger, NotificationSink, PolicyStore};
pub use retry::{run_with_retry, RetryPolicy};
pub use saga::{
    ApprovalQueue, Decision, FundsReservation, PolicyGate, SagaOrchestrator, TransferExecutor,
};
pub use signing::Wallet;
