use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub policy: PolicyConfig,
    pub chain: ChainConfig,
    pub retry: RetryConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Vendor name to chain address map used for identifier resolution
    #[serde(default)]
    pub vendors: HashMap<String, String>,
    #[serde(default)]
    pub dry_run: DryRunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Limit applied when the policy store has no stored value
    #[serde(default = "default_policy_limit")]
    pub default_limit: Decimal,
    /// Name of the spending limit entry in the policy store
    #[serde(default = "default_limit_name")]
    pub limit_name: String,
}

fn default_policy_limit() -> Decimal {
    Decimal::new(50, 0)
}

fn default_limit_name() -> String {
    "approval_limit".to_string()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_limit: default_policy_limit(),
            limit_name: default_limit_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint for the token network
    pub rpc_url: String,
    /// ERC-20 token contract address
    pub token_address: String,
    /// Treasury account whose balance funds transfers
    pub treasury_address: String,
    /// Decimal places of the token (e.g., 6 for USDC-style tokens)
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,
    /// Chain ID for transaction signing
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

fn default_token_decimals() -> u32 {
    6
}

fn default_chain_id() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts for transient chain failures
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Backoff ceiling in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Exponential growth factor per attempt
    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,
    /// Randomize each delay by a uniform factor in [0.5, 1.5)
    #[serde(default = "default_jitter")]
    pub jitter_enabled: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            exponential_base: 2.0,
            jitter_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotificationsConfig {
    /// Webhook endpoint for treasury alerts (optional)
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DryRunConfig {
    /// Run sagas against in-memory collaborators (no chain, no database)
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("policy.default_limit", "50")?
            .set_default("policy.limit_name", "approval_limit")?
            .set_default("database.max_connections", 5)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TREASURER_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TREASURER_CHAIN__RPC_URL, etc.)
            .add_source(
                Environment::with_prefix("TREASURER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration for dry-run CLI usage
    pub fn default_config(dry_run: bool) -> Self {
        use rust_decimal_macros::dec;

        Self {
            policy: PolicyConfig {
                default_limit: dec!(50),
                limit_name: "approval_limit".to_string(),
            },
            chain: ChainConfig {
                rpc_url: "http://localhost:8545".to_string(),
                token_address: "0x0000000000000000000000000000000000000000".to_string(),
                treasury_address: "0x0000000000000000000000000000000000000000".to_string(),
                token_decimals: 6,
                chain_id: 1,
            },
            retry: RetryConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/treasurer".to_string(),
                max_connections: 5,
            },
            notifications: NotificationsConfig::default(),
            vendors: HashMap::new(),
            dry_run: DryRunConfig { enabled: dry_run },
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.policy.default_limit <= Decimal::ZERO {
            errors.push("policy.default_limit must be positive".to_string());
        }

        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }

        if self.retry.exponential_base < 1.0 {
            errors.push("retry.exponential_base must be >= 1".to_string());
        }

        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            errors.push("retry.max_delay_ms must be >= retry.initial_delay_ms".to_string());
        }

        for (name, address) in &self.vendors {
            if !crate::saga::executor::is_chain_address(address) {
                errors.push(format!(
                    "vendors.{name} is not a valid chain address: {address}"
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
