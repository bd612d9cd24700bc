//! ERC-20 blockchain adapter built on ethers.
//!
//! Broadcast is terminal success: the settlement reference is the transaction
//! hash returned by the node, with no confirmation tracking.

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::LocalWallet;
use ethers::types::{Address, BlockNumber, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ChainConfig;
use crate::error::{ChainError, Result, TreasurerError};
use crate::ports::BlockchainClient;
use crate::signing::Wallet;

abigen!(
    Erc20Token,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function transfer(address to, uint256 amount) external returns (bool)
    ]"#
);

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Live blockchain client over a single ERC-20 token contract.
pub struct EvmClient {
    client: Arc<SignerClient>,
    token: Erc20Token<SignerClient>,
    token_decimals: u32,
    signer: Address,
}

impl EvmClient {
    pub fn new(config: &ChainConfig, wallet: Wallet) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| TreasurerError::Validation(format!("invalid rpc url: {e}")))?;

        let signer = wallet.address();
        let client = Arc::new(SignerMiddleware::new(provider, wallet.inner().clone()));

        let token_address: Address = config
            .token_address
            .parse()
            .map_err(|e| TreasurerError::Validation(format!("invalid token address: {e}")))?;
        let token = Erc20Token::new(token_address, client.clone());

        info!(
            token = %config.token_address,
            signer = ?signer,
            "EVM client initialized"
        );

        Ok(Self {
            client,
            token,
            token_decimals: config.token_decimals,
            signer,
        })
    }

    fn parse_address(raw: &str) -> std::result::Result<Address, ChainError> {
        raw.parse()
            .map_err(|_| ChainError::Rejected(format!("invalid chain address: {raw}")))
    }

    /// Scale a decimal amount to token base units.
    fn to_base_units(&self, amount: Decimal) -> std::result::Result<U256, ChainError> {
        let factor = Decimal::from(10u128.pow(self.token_decimals));
        let scaled = amount
            .checked_mul(factor)
            .ok_or_else(|| ChainError::Rejected(format!("amount overflow: {amount}")))?;

        if scaled.fract() != Decimal::ZERO {
            return Err(ChainError::Rejected(format!(
                "amount {amount} has more than {} decimal places",
                self.token_decimals
            )));
        }

        scaled
            .to_u128()
            .map(U256::from)
            .ok_or_else(|| ChainError::Rejected(format!("amount not representable: {amount}")))
    }

    fn from_base_units(&self, units: U256) -> std::result::Result<Decimal, ChainError> {
        if units > U256::from(i128::MAX as u128) {
            return Err(ChainError::MalformedResponse(format!(
                "balance too large: {units}"
            )));
        }
        Ok(Decimal::from_i128_with_scale(
            units.as_u128() as i128,
            self.token_decimals,
        ))
    }

    /// Map a node error onto the transient/fatal taxonomy.
    fn classify(err: impl std::fmt::Display) -> ChainError {
        let text = err.to_string();
        let lower = text.to_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            ChainError::Timeout { elapsed_ms: 0 }
        } else if lower.contains("connect")
            || lower.contains("connection")
            || lower.contains("dns")
        {
            ChainError::Connection(text)
        } else if lower.contains("deserialization") || lower.contains("invalid response") {
            ChainError::MalformedResponse(text)
        } else {
            ChainError::Rejected(text)
        }
    }
}

#[async_trait]
impl BlockchainClient for EvmClient {
    async fn balance_of(&self, address: &str) -> std::result::Result<Decimal, ChainError> {
        let account = Self::parse_address(address)?;
        let units = self
            .token
            .balance_of(account)
            .call()
            .await
            .map_err(Self::classify)?;

        self.from_base_units(units)
    }

    async fn next_sequence(&self, address: &str) -> std::result::Result<u64, ChainError> {
        let account = Self::parse_address(address)?;
        let count = self
            .client
            .get_transaction_count(account, Some(BlockNumber::Pending.into()))
            .await
            .map_err(Self::classify)?;

        Ok(count.as_u64())
    }

    async fn sign_and_broadcast(
        &self,
        to: &str,
        amount: Decimal,
        sequence: u64,
    ) -> std::result::Result<String, ChainError> {
        let recipient = Self::parse_address(to)?;
        let units = self.to_base_units(amount)?;

        let call = self.token.transfer(recipient, units).nonce(sequence);
        let pending = call.send().await.map_err(Self::classify)?;

        let tx_hash = format!("{:#x}", pending.tx_hash());
        debug!(%to, %amount, sequence, %tx_hash, "transfer broadcast");
        Ok(tx_hash)
    }

    fn signer_address(&self) -> String {
        format!("{:#x}", self.signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;
    use rust_decimal_macros::dec;

    fn client() -> EvmClient {
        let config = ChainConfig {
            rpc_url: "http://localhost:8545".to_string(),
            token_address: "0x6b175474e89094c44da98b954eedeac495271d0f".to_string(),
            treasury_address: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string(),
            token_decimals: 6,
            chain_id: 1,
        };
        let wallet = Wallet::from_private_key(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            1,
        )
        .unwrap();
        EvmClient::new(&config, wallet).unwrap()
    }

    #[test]
    fn base_unit_scaling_round_trips() {
        let c = client();
        let units = c.to_base_units(dec!(45.5)).unwrap();
        assert_eq!(units, U256::from(45_500_000u64));
        assert_eq!(c.from_base_units(units).unwrap(), dec!(45.500000));
    }

    #[test]
    fn sub_unit_precision_rejected() {
        let c = client();
        // 7 decimal places on a 6-decimal token
        let err = c.to_base_units(dec!(0.0000001)).unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn classification_buckets_node_errors() {
        assert!(EvmClient::classify("request timed out").is_transient());
        assert!(EvmClient::classify("error trying to connect: refused").is_transient());
        assert!(!EvmClient::classify("nonce too low").is_transient());
    }

    #[test]
    fn signer_address_is_checksummed_hex() {
        let c = client();
        assert_eq!(
            c.signer_address(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }
}
