//! Wallet management and transaction signing.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::sync::Arc;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "PORTAL_WALLET_PRIVATE_KEY";

/// The account that signs portal transactions.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Active account.
    fn address(&self) -> Address;

    /// Account-level checks that must pass before any signature is requested.
    async fn validate(&self) -> BlockchainResult<()>;

    /// Sign and broadcast through the wallet's own connection.
    async fn send_transaction(&self, request: TransactionRequest) -> BlockchainResult<TxHash>;

    /// Sign a fully populated request without broadcasting it.
    async fn sign_transaction(&self, request: TransactionRequest) -> BlockchainResult<Bytes>;
}

/// Local private-key wallet.
#[derive(Clone)]
pub struct Wallet {
    /// The underlying signer (private key).
    signer: PrivateKeySigner,
    /// Network wallet used to sign full transactions.
    network_wallet: EthereumWallet,
    /// Connection used by [`WalletSigner::send_transaction`].
    provider: Option<Arc<dyn Provider + Send + Sync>>,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for transaction signing
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Wallet initialized"
        );

        Ok(Self {
            network_wallet: EthereumWallet::from(signer.clone()),
            signer,
            provider: None,
            chain_id,
        })
    }

    /// Load wallet from environment variable.
    ///
    /// Reads `PORTAL_WALLET_PRIVATE_KEY` from environment.
    pub fn from_env(chain_id: u64) -> BlockchainResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            BlockchainError::Wallet(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    /// Attach the wallet's own RPC connection for direct submission.
    pub fn connect(mut self, rpc_url: &str) -> BlockchainResult<Self> {
        let url: url::Url = rpc_url.parse().map_err(|e| {
            BlockchainError::NotAvailable(format!("Invalid RPC URL '{}': {}", rpc_url, e))
        })?;
        let provider = ProviderBuilder::new()
            .wallet(self.network_wallet.clone())
            .connect_http(url);
        self.provider = Some(Arc::new(provider));
        Ok(self)
    }

    /// Get the chain ID this wallet is configured for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl WalletSigner for Wallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn validate(&self) -> BlockchainResult<()> {
        if self.signer.address().is_zero() {
            return Err(BlockchainError::Wallet("Wallet address is not usable".to_string()));
        }
        Ok(())
    }

    async fn send_transaction(&self, request: TransactionRequest) -> BlockchainResult<TxHash> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            BlockchainError::NotAvailable("wallet has no RPC connection".to_string())
        })?;
        let request = request.with_chain_id(self.chain_id);
        let pending = provider.send_transaction(request).await?;
        let hash = *pending.tx_hash();
        tracing::info!(tx_hash = %hash, from = %self.signer.address(), "Transaction submitted");
        Ok(hash)
    }

    async fn sign_transaction(&self, request: TransactionRequest) -> BlockchainResult<Bytes> {
        let request = request.with_from(self.signer.address());
        let envelope = TransactionBuilder::<Ethereum>::build(request, &self.network_wallet)
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {}", e)))?;
        Ok(envelope.encoded_2718().into())
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.signer.address())
            .field("chain_id", &self.chain_id)
            .field("connected", &self.provider.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_from_private_key() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_wallet_with_0x_prefix() {
        let wallet = Wallet::from_private_key(&format!("0x{}", TEST_PRIVATE_KEY), 1).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_private_key() {
        let result = Wallet::from_private_key("invalid_key", 1);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }

    #[tokio::test]
    async fn test_sign_transaction() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let request = TransactionRequest::default()
            .with_to(Address::repeat_byte(0x11))
            .with_value(U256::from(1_000u64))
            .with_nonce(0)
            .with_chain_id(31337)
            .with_gas_limit(21_000)
            .with_gas_price(1_000_000_000);

        let raw = wallet.sign_transaction(request).await.unwrap();
        assert!(!raw.is_empty());
    }

    #[tokio::test]
    async fn test_send_without_connection() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        let result = wallet.send_transaction(TransactionRequest::default()).await;
        assert!(matches!(result, Err(BlockchainError::NotAvailable(_))));
    }
}
