//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the portal.
//! All types derive Serde traits for deserialization from config files.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::blockchain::abi::L2_NATIVE_TOKEN_VAULT_ADDRESS;

/// Root configuration for the bridge portal.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PortalConfig {
    /// Rollup networks the portal can operate on.
    pub networks: Vec<NetworkConfig>,

    /// Key of the network selected at startup (first network when unset).
    pub selected_network: Option<String>,

    /// RPC client settings.
    pub rpc: RpcConfig,

    /// Confirmation polling settings.
    pub tracking: TrackingConfig,

    /// Spend-allowance approval settings.
    pub allowance: AllowanceConfig,

    /// Destination screening before submission.
    pub screening: ScreeningConfig,

    /// Transaction ledger persistence.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl PortalConfig {
    /// Look up a network by key.
    pub fn network(&self, key: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.key == key)
    }

    /// The network selected at startup.
    pub fn selected(&self) -> Option<&NetworkConfig> {
        match &self.selected_network {
            Some(key) => self.network(key),
            None => self.networks.first(),
        }
    }
}

/// A rollup (L2) network and the base chain it settles on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Partition key for the transaction ledger (e.g., "mainnet").
    pub key: String,

    /// Human readable name.
    pub name: String,

    /// L2 chain ID.
    pub chain_id: u64,

    /// L2 JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover L2 JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Settlement chain, absent for standalone L2 nodes.
    #[serde(default)]
    pub l1: Option<L1NetworkConfig>,

    /// Whether RPC access requires an authenticated session.
    #[serde(default)]
    pub requires_auth: bool,

    /// Environment variable holding the session token for authenticated networks.
    #[serde(default)]
    pub auth_token_env: Option<String>,

    /// Delegated signing mode: transactions are prepared and broadcast through
    /// a dedicated public endpoint instead of the wallet's own connection.
    #[serde(default)]
    pub delegated: Option<DelegatedSigningConfig>,

    /// Block explorer base URL.
    #[serde(default)]
    pub block_explorer_url: Option<String>,
}

/// Base chain (L1) connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct L1NetworkConfig {
    /// L1 chain ID.
    pub chain_id: u64,

    /// L1 JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover L1 JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,
}

/// Delegated signing endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DelegatedSigningConfig {
    /// Public endpoint that accepts raw signed transactions.
    pub public_rpc_url: String,
}

/// RPC client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Interval between receipt polls while waiting for inclusion.
    pub receipt_poll_interval_ms: u64,

    /// Upper bound for a single receipt wait in seconds.
    pub receipt_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            receipt_poll_interval_ms: 4_000,
            receipt_timeout_secs: 300,
        }
    }
}

/// Confirmation polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Sleep between deposit status steps.
    pub deposit_interval_ms: u64,

    /// Sleep between withdrawal status steps.
    pub withdrawal_interval_ms: u64,

    /// Sleep between transfer status steps.
    pub transfer_interval_ms: u64,

    /// Optional ceiling on status steps per resolve call (unbounded when unset).
    pub max_attempts: Option<u32>,

    /// Attempts for the L1 receipt wait of a deposit.
    pub l1_receipt_retries: u32,

    /// Delay between L1 receipt wait attempts.
    pub l1_receipt_retry_delay_ms: u64,

    /// Base delay for retrying infrastructure errors in the tracking driver.
    pub transient_base_delay_ms: u64,

    /// Maximum delay for retrying infrastructure errors in the tracking driver.
    pub transient_max_delay_ms: u64,

    /// Maximum consecutive infrastructure errors tolerated by the tracking driver.
    pub transient_max_retries: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            deposit_interval_ms: 15_000,
            withdrawal_interval_ms: 30_000,
            transfer_interval_ms: 2_000,
            max_attempts: None,
            l1_receipt_retries: 3,
            l1_receipt_retry_delay_ms: 1_000,
            transient_base_delay_ms: 1_000,
            transient_max_delay_ms: 60_000,
            transient_max_retries: 10,
        }
    }
}

/// Spend-allowance approval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AllowanceConfig {
    /// Spender that must hold the allowance (the L2 native token vault).
    pub spender: Address,

    /// Attempts for the approval receipt wait.
    pub receipt_retries: u32,

    /// Delay between approval receipt wait attempts.
    pub receipt_retry_delay_ms: u64,
}

impl Default for AllowanceConfig {
    fn default() -> Self {
        Self {
            spender: L2_NATIVE_TOKEN_VAULT_ADDRESS,
            receipt_retries: 3,
            receipt_retry_delay_ms: 5_000,
        }
    }
}

/// Destination screening configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Destinations the committer refuses to send to.
    pub denied_addresses: Vec<Address>,
}

/// Ledger storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file that survives restarts.
    File,
    /// Process-scoped, lost on exit.
    Memory,
}

/// Transaction ledger persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend kind.
    pub backend: StorageBackend,

    /// Path of the JSON file for the file backend.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: "bridge-transactions.json".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
