pub mod evm;
pub mod memory;
pub mod postgres;
pub mod webhook;

pub use evm::EvmClient;
pub use memory::{
    BroadcastRecord, MemoryApprovalStore, MemoryChain, MemoryLedger, MemoryNotifier,
    MemoryPolicyStore,
};
pub use postgres::PostgresStore;
pub use webhook::{LogNotifier, WebhookNotifier};
