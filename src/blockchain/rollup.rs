//! Rollup node client: the `zks_*` namespace on top of [`EvmClient`].

use alloy::primitives::{Address, Bytes, TxHash, U64};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::blockchain::abi::L1_MESSENGER_ADDRESS;
use crate::blockchain::client::EvmClient;
use crate::blockchain::rpc::{ChainRpc, ReplacementHandler, RollupRpc};
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, BridgeAddresses, FinalizationParams, ReceiptSummary,
    TransactionDetails,
};

/// Rollup-specific receipt fields absent from the Ethereum receipt type.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RollupReceiptExtras {
    #[serde(default)]
    l1_batch_number: Option<U64>,
    #[serde(default)]
    l2_to_l1_logs: Vec<L2ToL1Log>,
}

#[derive(Debug, Deserialize)]
struct L2ToL1Log {
    sender: Address,
}

#[derive(Debug, Deserialize)]
struct L2ToL1LogProof {
    id: u64,
}

/// Index of the first L2 → L1 log emitted by the messenger contract.
fn messenger_log_index(logs: &[L2ToL1Log]) -> Option<usize> {
    logs.iter().position(|log| log.sender == L1_MESSENGER_ADDRESS)
}

/// Client for a rollup node.
#[derive(Debug, Clone)]
pub struct RollupClient {
    inner: EvmClient,
}

impl RollupClient {
    pub fn new(inner: EvmClient) -> Self {
        Self { inner }
    }

    pub fn evm(&self) -> &EvmClient {
        &self.inner
    }
}

#[async_trait]
impl ChainRpc for RollupClient {
    fn chain_id(&self) -> u64 {
        self.inner.chain_id()
    }

    async fn call(&self, to: Address, data: Bytes) -> BlockchainResult<Bytes> {
        self.inner.call(to, data).await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        self.inner.send_raw_transaction(raw).await
    }

    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64> {
        self.inner.transaction_count(address).await
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.inner.gas_price().await
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> BlockchainResult<u64> {
        self.inner.estimate_gas(request).await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        self.inner.transaction_receipt(hash).await
    }

    async fn wait_for_receipt(
        &self,
        hash: TxHash,
        on_replaced: ReplacementHandler<'_>,
    ) -> BlockchainResult<ReceiptSummary> {
        self.inner.wait_for_receipt(hash, on_replaced).await
    }
}

#[async_trait]
impl RollupRpc for RollupClient {
    async fn transaction_details(&self, hash: TxHash) -> BlockchainResult<TransactionDetails> {
        let details: Option<TransactionDetails> = self
            .inner
            .with_failover("get transaction details", |p| async move {
                p.client()
                    .request("zks_getTransactionDetails", (hash,))
                    .await
            })
            .await?;
        details.ok_or_else(|| BlockchainError::Rpc {
            code: None,
            message: format!("transaction {} is unknown to the node", hash),
        })
    }

    async fn default_bridges(&self) -> BlockchainResult<BridgeAddresses> {
        self.inner
            .with_failover("get bridge contracts", |p| async move {
                p.client().request_noparams("zks_getBridgeContracts").await
            })
            .await
    }

    async fn main_contract(&self) -> BlockchainResult<Address> {
        self.inner
            .with_failover("get main contract", |p| async move {
                p.client().request_noparams("zks_getMainContract").await
            })
            .await
    }

    async fn withdrawal_finalization_params(
        &self,
        hash: TxHash,
    ) -> BlockchainResult<FinalizationParams> {
        let receipt: Option<RollupReceiptExtras> = self
            .inner
            .with_failover("get receipt", |p| async move {
                p.client().request("eth_getTransactionReceipt", (hash,)).await
            })
            .await?;
        let receipt = receipt.ok_or_else(|| BlockchainError::Rpc {
            code: None,
            message: format!("withdrawal {} has no receipt yet", hash),
        })?;

        let batch = receipt.l1_batch_number.ok_or_else(|| BlockchainError::Rpc {
            code: None,
            message: format!("withdrawal {} is not included in a batch yet", hash),
        })?;
        let log_index = messenger_log_index(&receipt.l2_to_l1_logs).ok_or_else(|| {
            BlockchainError::Decode(format!("withdrawal {} emitted no L2 to L1 message", hash))
        })?;

        let proof: Option<L2ToL1LogProof> = self
            .inner
            .with_failover("get log proof", |p| async move {
                p.client()
                    .request("zks_getL2ToL1LogProof", (hash, log_index))
                    .await
            })
            .await?;
        let proof = proof.ok_or_else(|| BlockchainError::Rpc {
            code: None,
            message: format!("log proof for {} is not available yet", hash),
        })?;

        Ok(FinalizationParams {
            chain_id: self.chain_id(),
            l1_batch_number: batch.to(),
            l2_message_index: proof.id,
        })
    }
}

/// Session-scoped memo of the rollup's default bridge contracts.
pub struct BridgeRegistry {
    l2: Arc<dyn RollupRpc>,
    cached: OnceCell<BridgeAddresses>,
}

impl BridgeRegistry {
    pub fn new(l2: Arc<dyn RollupRpc>) -> Self {
        Self {
            l2,
            cached: OnceCell::new(),
        }
    }

    /// Fetch once, then serve from memory. Failed lookups are not cached.
    pub async fn get(&self) -> BlockchainResult<&BridgeAddresses> {
        self.cached
            .get_or_try_init(|| async {
                let bridges = self.l2.default_bridges().await?;
                tracing::debug!(bridges = ?bridges, "Loaded default bridge contracts");
                Ok(bridges)
            })
            .await
    }
}
