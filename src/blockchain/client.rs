//! Blockchain RPC client with timeout, failover and session handling.
//!
//! # Responsibilities
//! - Connect to a primary JSON-RPC endpoint plus failovers
//! - Query chain state (receipts, nonces, gas price, calls)
//! - Broadcast signed transactions
//! - Wait for receipts while detecting replaced transactions
//! - Report session expiry (HTTP 403) to the authentication gate exactly once

use alloy::consensus::Transaction as _;
use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{Transaction, TransactionRequest};
use alloy::transports::http::Http;
use alloy::transports::{TransportError, TransportResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, Instant};

use crate::auth::AuthGate;
use crate::blockchain::rpc::{ChainRpc, ReplacementHandler};
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, ChainId, ReceiptSummary, Replacement, ReplacementReason,
};
use crate::observability::metrics;

pub(crate) type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Connection settings for one chain.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Short name used in logs and metrics ("l1", "l2", "public").
    pub label: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub failover_urls: Vec<String>,
    pub timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
    /// Extra HTTP headers sent with every request (session credentials).
    pub headers: HashMap<String, String>,
}

/// Expiry bookkeeping for a client bound to an authenticated session.
struct SessionBinding {
    gate: Arc<AuthGate>,
    expired: AtomicBool,
}

/// EVM JSON-RPC client wrapper with failover support.
#[derive(Clone)]
pub struct EvmClient {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    settings: ClientSettings,
    session: Option<Arc<SessionBinding>>,
}

impl EvmClient {
    /// Build a client without touching the network.
    pub fn build(settings: ClientSettings) -> BlockchainResult<Self> {
        let mut providers = Vec::new();

        // 1. Add primary provider
        let primary_url: url::Url = settings.rpc_url.parse().map_err(|e| {
            BlockchainError::NotAvailable(format!("Invalid RPC URL '{}': {}", settings.rpc_url, e))
        })?;
        providers.push(connect(primary_url, &settings.headers)?);

        // 2. Add failover providers
        for url_str in &settings.failover_urls {
            match url_str.parse() {
                Ok(url) => providers.push(connect(url, &settings.headers)?),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        Ok(Self {
            providers,
            settings,
            session: None,
        })
    }

    /// Build a client and verify the endpoint serves the configured chain.
    ///
    /// Verification failures are logged, not returned.
    pub async fn connect(settings: ClientSettings) -> BlockchainResult<Self> {
        let client = Self::build(settings)?;

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    client = %client.settings.label,
                    rpc_url = %client.settings.rpc_url,
                    chain_id = client.settings.chain_id,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    client = %client.settings.label,
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Bind the client to an authenticated session.
    ///
    /// The first 403 response notifies the gate; afterwards every request
    /// fails fast with [`BlockchainError::AuthExpired`].
    pub fn with_session(mut self, gate: Arc<AuthGate>) -> Self {
        self.session = Some(Arc::new(SessionBinding {
            gate,
            expired: AtomicBool::new(false),
        }));
        self
    }

    /// Whether the bound session was reported expired.
    pub fn is_expired(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.expired.load(Ordering::SeqCst))
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.settings.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.settings.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        self.with_failover("get chain id", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> BlockchainResult<u64> {
        self.with_failover("get block number", |p| async move { p.get_block_number().await })
            .await
    }

    /// Get a pending or mined transaction by hash.
    pub async fn get_transaction(&self, hash: TxHash) -> BlockchainResult<Option<Transaction>> {
        self.with_failover("get transaction", |p| async move {
            p.get_transaction_by_hash(hash).await
        })
        .await
    }

    /// Check if the endpoint is reachable.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        metrics::record_rpc_health(&self.settings.label, healthy);
        healthy
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Run `op` against each provider in order until one answers.
    ///
    /// Node-level errors (JSON-RPC error responses, 403) are returned as-is;
    /// only endpoint failures move on to the next provider.
    pub(crate) async fn with_failover<T, F, Fut>(
        &self,
        operation: &'static str,
        op: F,
    ) -> BlockchainResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        self.ensure_session()?;

        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.settings.timeout, op(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    let err = self.observe(BlockchainError::from(e));
                    if !err.is_endpoint_failure() {
                        metrics::record_rpc_error(err.kind().as_str());
                        return Err(err);
                    }
                    tracing::warn!(
                        client = %self.settings.label,
                        provider_idx = i,
                        error = %err,
                        "RPC error, trying next provider"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        client = %self.settings.label,
                        provider_idx = i,
                        "RPC timeout, trying next provider"
                    );
                }
            }
        }

        metrics::record_rpc_error("unavailable");
        Err(BlockchainError::Unavailable(operation.to_string()))
    }

    fn ensure_session(&self) -> BlockchainResult<()> {
        if self.is_expired() {
            return Err(BlockchainError::AuthExpired);
        }
        Ok(())
    }

    fn observe(&self, err: BlockchainError) -> BlockchainError {
        if matches!(err, BlockchainError::Forbidden) {
            if let Some(session) = &self.session {
                if !session.expired.swap(true, Ordering::SeqCst) {
                    tracing::warn!(client = %self.settings.label, "RPC session rejected, marking expired");
                    session.gate.on_expiry();
                }
            }
        }
        err
    }

    async fn find_replacement(
        &self,
        original: &TxShape,
        from_block: u64,
    ) -> BlockchainResult<(Option<TxShape>, u64)> {
        let latest = self.get_block_number().await?;
        for number in from_block..=latest {
            let block = self
                .with_failover("get block", |p| async move {
                    p.get_block_by_number(BlockNumberOrTag::Number(number))
                        .full()
                        .await
                })
                .await?;
            let Some(block) = block else { continue };
            let found = block
                .transactions
                .txns()
                .map(TxShape::from)
                .find(|tx| tx.from == original.from && tx.nonce == original.nonce);
            if found.is_some() {
                return Ok((found, latest + 1));
            }
        }
        Ok((None, latest + 1))
    }
}

fn connect(url: url::Url, headers: &HashMap<String, String>) -> BlockchainResult<DynProvider> {
    if headers.is_empty() {
        return Ok(Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider);
    }

    let mut header_map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| BlockchainError::NotAvailable(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| BlockchainError::NotAvailable(format!("Invalid header value: {}", e)))?;
        header_map.insert(name, value);
    }
    let http = reqwest::Client::builder()
        .default_headers(header_map)
        .build()
        .map_err(|e| BlockchainError::NotAvailable(format!("HTTP client: {}", e)))?;

    let client = RpcClient::new(Http::with_client(http, url), false);
    Ok(Arc::new(ProviderBuilder::new().connect_client(client)) as DynProvider)
}

#[async_trait]
impl ChainRpc for EvmClient {
    fn chain_id(&self) -> u64 {
        self.settings.chain_id
    }

    async fn call(&self, to: Address, data: Bytes) -> BlockchainResult<Bytes> {
        let request = TransactionRequest::default().to(to).input(data.into());
        self.with_failover("call contract", |p| {
            let request = request.clone();
            async move { p.call(request).await }
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        self.with_failover("send transaction", |p| {
            let raw = raw.clone();
            async move {
                let pending = p.send_raw_transaction(&raw).await?;
                Ok::<_, TransportError>(*pending.tx_hash())
            }
        })
        .await
    }

    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64> {
        self.with_failover("get transaction count", |p| async move {
            p.get_transaction_count(address).await
        })
        .await
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.with_failover("get gas price", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> BlockchainResult<u64> {
        self.with_failover("estimate gas", |p| {
            let request = request.clone();
            async move { p.estimate_gas(request).await }
        })
        .await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        let receipt = self
            .with_failover("get receipt", |p| async move {
                p.get_transaction_receipt(hash).await
            })
            .await?;
        Ok(receipt.as_ref().map(ReceiptSummary::from))
    }

    async fn wait_for_receipt(
        &self,
        hash: TxHash,
        on_replaced: ReplacementHandler<'_>,
    ) -> BlockchainResult<ReceiptSummary> {
        let started = Instant::now();
        let mut ticker = interval(self.settings.receipt_poll_interval);
        let mut watched = hash;
        let mut pending: Option<(TxShape, u64)> = None;

        loop {
            ticker.tick().await;

            if let Some(receipt) = self.transaction_receipt(watched).await? {
                return Ok(receipt);
            }
            if started.elapsed() >= self.settings.receipt_timeout {
                return Err(BlockchainError::ReceiptTimeout(
                    watched,
                    self.settings.receipt_timeout.as_secs(),
                ));
            }

            match self.get_transaction(watched).await? {
                Some(tx) => {
                    if pending.is_none() {
                        let from_block = self.get_block_number().await?;
                        pending = Some((TxShape::from(&tx), from_block));
                    }
                }
                None => {
                    // Dropped from the pool; only a consumed nonce means replacement
                    let Some((original, from_block)) = pending.as_mut() else {
                        continue;
                    };
                    let nonce = self.transaction_count(original.from).await?;
                    if nonce <= original.nonce {
                        continue;
                    }

                    let (found, next_block) = self.find_replacement(original, *from_block).await?;
                    *from_block = next_block;
                    let Some(replacement) = found else { continue };

                    let reason = classify_replacement(original, &replacement);
                    tracing::info!(
                        client = %self.settings.label,
                        replaced = %watched,
                        transaction = %replacement.hash,
                        reason = ?reason,
                        "Transaction replaced"
                    );
                    on_replaced(Replacement {
                        reason,
                        replaced: watched,
                        transaction: replacement.hash,
                    });
                    watched = replacement.hash;
                    pending = None;
                }
            }
        }
    }
}

impl std::fmt::Debug for EvmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmClient")
            .field("label", &self.settings.label)
            .field("rpc_url", &self.settings.rpc_url)
            .field("chain_id", &self.settings.chain_id)
            .field("providers", &self.providers.len())
            .finish()
    }
}

/// The fields that identify what a transaction does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TxShape {
    pub hash: TxHash,
    pub from: Address,
    pub nonce: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
}

impl From<&Transaction> for TxShape {
    fn from(tx: &Transaction) -> Self {
        Self {
            hash: *tx.inner.tx_hash(),
            from: tx.inner.signer(),
            nonce: tx.nonce(),
            to: tx.to(),
            value: tx.value(),
            input: tx.input().clone(),
        }
    }
}

/// Decide how `replacement` superseded `original` (same sender and nonce).
pub(crate) fn classify_replacement(original: &TxShape, replacement: &TxShape) -> ReplacementReason {
    if replacement.to == Some(original.from)
        && replacement.value.is_zero()
        && replacement.input.is_empty()
    {
        ReplacementReason::Cancelled
    } else if replacement.to == original.to
        && replacement.value == original.value
        && replacement.input == original.input
    {
        ReplacementReason::Repriced
    } else {
        ReplacementReason::Replaced
    }
}
