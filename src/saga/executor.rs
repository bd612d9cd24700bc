//! Transfer execution: identifier resolution, liquidity check, and the
//! serialized sequence-allocation critical section.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::domain::{FailureKind, PaymentRequest, TransferOutcome};
use crate::error::{ChainError, Result, TransferError};
use crate::ports::{BlockchainClient, NotificationSink};
use crate::retry::{run_with_retry, RetryPolicy};

/// Whether a string is a well-formed chain address (0x + 40 hex digits).
pub fn is_chain_address(raw: &str) -> bool {
    raw.len() == 42
        && raw.starts_with("0x")
        && raw[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Executes approved transfers against the token network.
///
/// Sequence allocation and broadcast for one signing key form a critical
/// section guarded by a per-key mutex, so concurrent sagas on the same key
/// never race a sequence number while distinct keys proceed in parallel.
pub struct TransferExecutor {
    chain: Arc<dyn BlockchainClient>,
    notifier: Arc<dyn NotificationSink>,
    /// Registered vendor names mapped to chain addresses
    vendors: HashMap<String, String>,
    treasury_address: String,
    retry_policy: RetryPolicy,
    sequence_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TransferExecutor {
    pub fn new(
        chain: Arc<dyn BlockchainClient>,
        notifier: Arc<dyn NotificationSink>,
        vendors: HashMap<String, String>,
        treasury_address: String,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            chain,
            notifier,
            vendors,
            treasury_address,
            retry_policy,
            sequence_locks: DashMap::new(),
        }
    }

    /// Well-formed addresses pass through; anything else must be a
    /// registered vendor name. A miss is a terminal failure, never a
    /// substituted placeholder.
    fn resolve_identifier(&self, identifier: &str) -> Option<String> {
        if is_chain_address(identifier) {
            return Some(identifier.to_string());
        }
        self.vendors.get(identifier).cloned()
    }

    fn sequence_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.sequence_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn business_failure(err: TransferError) -> TransferOutcome {
        let kind = match &err {
            TransferError::IdentifierResolution { .. } => FailureKind::IdentifierResolution,
            TransferError::InsufficientLiquidity { .. } => FailureKind::InsufficientLiquidity,
            TransferError::SubmissionExhausted { .. } => FailureKind::ChainSubmission,
        };
        TransferOutcome::Failed {
            kind,
            detail: err.to_string(),
        }
    }

    /// Run the chain leg of one saga. Business failures come back as
    /// `TransferOutcome::Failed`; only unclassified errors propagate.
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub async fn execute(&self, request: &PaymentRequest) -> Result<TransferOutcome> {
        let recipient = match self.resolve_identifier(&request.vendor_identifier) {
            Some(address) => address,
            None => {
                warn!(
                    identifier = %request.vendor_identifier,
                    "vendor identifier did not resolve to a chain address"
                );
                return Ok(Self::business_failure(TransferError::IdentifierResolution {
                    identifier: request.vendor_identifier.clone(),
                }));
            }
        };

        let balance = match self.balance_with_retry().await {
            Ok(balance) => balance,
            Err(e) => {
                return Ok(TransferOutcome::Failed {
                    kind: FailureKind::ChainSubmission,
                    detail: format!("balance query failed: {e}"),
                })
            }
        };

        if balance < request.amount {
            warn!(%balance, amount = %request.amount, "insufficient treasury liquidity");
            self.notifier
                .alert(
                    "INSUFFICIENT_LIQUIDITY",
                    &format!(
                        "Treasury balance {} is below requested amount {} ({})",
                        balance, request.amount, request.currency
                    ),
                )
                .await;
            return Ok(Self::business_failure(TransferError::InsufficientLiquidity {
                balance,
                requested: request.amount,
            }));
        }

        let signer = self.chain.signer_address();
        let lock = self.sequence_lock(&signer);
        let _guard = lock.lock().await;

        let chain = self.chain.clone();
        let amount = request.amount;
        let result = run_with_retry(
            &self.retry_policy,
            "sign_and_broadcast",
            ChainError::is_transient,
            || {
                let chain = chain.clone();
                let signer = signer.clone();
                let recipient = recipient.clone();
                async move {
                    let sequence = chain.next_sequence(&signer).await?;
                    chain.sign_and_broadcast(&recipient, amount, sequence).await
                }
            },
        )
        .await;

        match result {
            Ok(settlement_reference) => {
                info!(%settlement_reference, "transfer settled");
                Ok(TransferOutcome::Settled {
                    settlement_reference,
                })
            }
            Err(e) => {
                let attempts = if e.is_transient() {
                    self.retry_policy.max_attempts
                } else {
                    1
                };
                Ok(Self::business_failure(TransferError::SubmissionExhausted {
                    attempts,
                    last: e,
                }))
            }
        }
    }

    async fn balance_with_retry(&self) -> std::result::Result<Decimal, ChainError> {
        let chain = self.chain.clone();
        let treasury = self.treasury_address.clone();
        run_with_retry(
            &self.retry_policy,
            "balance_of",
            ChainError::is_transient,
            || {
                let chain = chain.clone();
                let treasury = treasury.clone();
                async move { chain.balance_of(&treasury).await }
            },
        )
        .await
    }
}
