//! Spending-policy evaluation.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::PolicyConfig;
use crate::error::Result;
use crate::ports::PolicyStore;

/// Gate decision for one payment request
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Approve,
    RequireApproval { reason: String },
}

/// Evaluates a request amount against the stored spending limit.
///
/// The limit is read exactly once per evaluation; later limit changes never
/// retroactively apply to an in-flight saga.
pub struct PolicyGate {
    store: Arc<dyn PolicyStore>,
    config: PolicyConfig,
}

impl PolicyGate {
    pub fn new(store: Arc<dyn PolicyStore>, config: PolicyConfig) -> Self {
        Self { store, config }
    }

    /// Never retried; a store read failure propagates as an error.
    pub async fn evaluate(&self, amount: Decimal) -> Result<Decision> {
        if amount <= Decimal::ZERO {
            info!(%amount, "non-positive amount requires approval");
            return Ok(Decision::RequireApproval {
                reason: "Invalid or missing amount".to_string(),
            });
        }

        let limit = self
            .store
            .get_limit(&self.config.limit_name)
            .await?
            .unwrap_or(self.config.default_limit);

        if amount > limit {
            info!(%amount, %limit, "amount exceeds policy limit");
            return Ok(Decision::RequireApproval {
                reason: "Exceeds Policy Limit".to_string(),
            });
        }

        debug!(%amount, %limit, "within policy limit");
        Ok(Decision::Approve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryPolicyStore;
    use crate::ports::MockPolicyStore;
    use rust_decimal_macros::dec;

    fn gate(store: Arc<dyn PolicyStore>) -> PolicyGate {
        PolicyGate::new(store, PolicyConfig::default())
    }

    #[tokio::test]
    async fn within_limit_approves() {
        let store = MemoryPolicyStore::with_limit("approval_limit", dec!(50)).await;
        let decision = gate(store).evaluate(dec!(45)).await.unwrap();
        assert_eq!(decision, Decision::Approve);
    }

    #[tokio::test]
    async fn amount_equal_to_limit_approves() {
        let store = MemoryPolicyStore::with_limit("approval_limit", dec!(50)).await;
        let decision = gate(store).evaluate(dec!(50)).await.unwrap();
        assert_eq!(decision, Decision::Approve);
    }

    #[tokio::test]
    async fn over_limit_requires_approval() {
        let store = MemoryPolicyStore::with_limit("approval_limit", dec!(50)).await;
        let decision = gate(store).evaluate(dec!(75)).await.unwrap();
        assert_eq!(
            decision,
            Decision::RequireApproval {
                reason: "Exceeds Policy Limit".to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_limit_falls_back_to_default() {
        let store = MemoryPolicyStore::new();
        // default limit is 50
        assert_eq!(
            gate(store.clone()).evaluate(dec!(49)).await.unwrap(),
            Decision::Approve
        );
        assert!(matches!(
            gate(store).evaluate(dec!(51)).await.unwrap(),
            Decision::RequireApproval { .. }
        ));
    }

    #[tokio::test]
    async fn non_positive_amount_requires_approval_without_store_read() {
        let mut store = MockPolicyStore::new();
        store.expect_get_limit().never();

        let decision = gate(Arc::new(store)).evaluate(dec!(0)).await.unwrap();
        assert!(matches!(decision, Decision::RequireApproval { .. }));
    }

    #[tokio::test]
    async fn store_is_read_once_per_evaluation() {
        let mut store = MockPolicyStore::new();
        store
            .expect_get_limit()
            .times(1)
            .returning(|_| Ok(Some(dec!(50))));

        gate(Arc::new(store)).evaluate(dec!(10)).await.unwrap();
    }
}
