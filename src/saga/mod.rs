pub mod approvals;
pub mod executor;
pub mod orchestrator;
pub mod policy;
pub mod reservation;

pub use approvals::ApprovalQueue;
pub use executor::{is_chain_address, TransferExecutor};
pub use orchestrator::SagaOrchestrator;
pub use policy::{Decision, PolicyGate};
pub use reservation::FundsReservation;
