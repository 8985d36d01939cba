//! Session-gated rollup client.
//!
//! On networks that require authentication the underlying client is built
//! lazily, only after the auth gate resolves, and carries the session headers.
//! A client whose session was rejected is discarded and rebuilt on the next
//! request, which again waits for authentication.

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::AuthGate;
use crate::blockchain::client::{ClientSettings, EvmClient};
use crate::blockchain::rollup::RollupClient;
use crate::blockchain::rpc::{ChainRpc, ReplacementHandler, RollupRpc};
use crate::blockchain::types::{
    BlockchainResult, BridgeAddresses, FinalizationParams, ReceiptSummary, TransactionDetails,
};

pub struct SessionProvider {
    settings: ClientSettings,
    gate: Arc<AuthGate>,
    client: Mutex<Option<Arc<RollupClient>>>,
}

impl SessionProvider {
    pub fn new(settings: ClientSettings, gate: Arc<AuthGate>) -> Self {
        Self {
            settings,
            gate,
            client: Mutex::new(None),
        }
    }

    pub fn gate(&self) -> &Arc<AuthGate> {
        &self.gate
    }

    /// Current client, building one (after authentication) when needed.
    pub async fn request_client(&self) -> BlockchainResult<Arc<RollupClient>> {
        let mut slot = self.client.lock().await;

        if let Some(client) = slot.as_ref() {
            let session_valid = !self.gate.requires_auth() || self.gate.is_authenticated();
            if session_valid && !client.evm().is_expired() {
                return Ok(client.clone());
            }
            tracing::debug!(client = %self.settings.label, "Discarding client of a lost session");
            *slot = None;
        }

        let evm = if self.gate.requires_auth() {
            self.gate.wait_for_authentication().await;
            let mut settings = self.settings.clone();
            settings.headers.extend(self.gate.auth_headers());
            EvmClient::build(settings)?.with_session(self.gate.clone())
        } else {
            EvmClient::build(self.settings.clone())?
        };

        let client = Arc::new(RollupClient::new(evm));
        *slot = Some(client.clone());
        Ok(client)
    }
}

impl std::fmt::Debug for SessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionProvider")
            .field("label", &self.settings.label)
            .field("rpc_url", &self.settings.rpc_url)
            .field("requires_auth", &self.gate.requires_auth())
            .finish()
    }
}

#[async_trait]
impl ChainRpc for SessionProvider {
    fn chain_id(&self) -> u64 {
        self.settings.chain_id
    }

    async fn call(&self, to: Address, data: Bytes) -> BlockchainResult<Bytes> {
        self.request_client().await?.call(to, data).await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        self.request_client().await?.send_raw_transaction(raw).await
    }

    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64> {
        self.request_client().await?.transaction_count(address).await
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.request_client().await?.gas_price().await
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> BlockchainResult<u64> {
        self.request_client().await?.estimate_gas(request).await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        self.request_client().await?.transaction_receipt(hash).await
    }

    async fn wait_for_receipt(
        &self,
        hash: TxHash,
        on_replaced: ReplacementHandler<'_>,
    ) -> BlockchainResult<ReceiptSummary> {
        self.request_client()
            .await?
            .wait_for_receipt(hash, on_replaced)
            .await
    }
}

#[async_trait]
impl RollupRpc for SessionProvider {
    async fn transaction_details(&self, hash: TxHash) -> BlockchainResult<TransactionDetails> {
        self.request_client().await?.transaction_details(hash).await
    }

    async fn default_bridges(&self) -> BlockchainResult<BridgeAddresses> {
        self.request_client().await?.default_bridges().await
    }

    async fn main_contract(&self) -> BlockchainResult<Address> {
        self.request_client().await?.main_contract().await
    }

    async fn withdrawal_finalization_params(
        &self,
        hash: TxHash,
    ) -> BlockchainResult<FinalizationParams> {
        self.request_client()
            .await?
            .withdrawal_finalization_params(hash)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAuthTransport;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::time::timeout;

    fn settings() -> ClientSettings {
        ClientSettings {
            label: "l2".to_string(),
            chain_id: 300,
            rpc_url: "http://localhost:3050".to_string(),
            failover_urls: Vec::new(),
            timeout: Duration::from_secs(1),
            receipt_poll_interval: Duration::from_millis(100),
            receipt_timeout: Duration::from_secs(1),
            headers: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_open_network_builds_immediately() {
        let provider = SessionProvider::new(settings(), Arc::new(AuthGate::open()));
        let first = provider.request_client().await.unwrap();
        let second = provider.request_client().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_gated_network_waits_for_authentication() {
        let transport = Arc::new(MockAuthTransport::new());
        let gate = Arc::new(AuthGate::new(Some(transport.clone()), true));
        let provider = Arc::new(SessionProvider::new(settings(), gate.clone()));

        let pending = timeout(Duration::from_millis(50), provider.request_client()).await;
        assert!(pending.is_err());

        gate.authenticate().await.unwrap();
        let client = timeout(Duration::from_secs(1), provider.request_client())
            .await
            .unwrap()
            .unwrap();
        assert!(!client.evm().is_expired());
        assert_eq!(
            client.evm().settings().headers.get("Authorization").map(String::as_str),
            Some("Bearer mock-session")
        );
    }

    #[tokio::test]
    async fn test_lost_session_discards_client() {
        let transport = Arc::new(MockAuthTransport::new());
        transport.authorize_now();
        let gate = Arc::new(AuthGate::new(Some(transport.clone()), true));
        let provider = SessionProvider::new(settings(), gate.clone());

        let first = provider.request_client().await.unwrap();
        gate.on_expiry();
        assert!(timeout(Duration::from_millis(50), provider.request_client())
            .await
            .is_err());

        gate.authenticate().await.unwrap();
        let second = provider.request_client().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
