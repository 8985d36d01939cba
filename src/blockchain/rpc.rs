//! RPC seams between the portal components and the chains.
//!
//! Components depend on these traits rather than on a concrete client so the
//! same logic runs against live endpoints, the gated session client and the
//! in-memory mocks used in tests.

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use crate::blockchain::types::{
    BlockchainError, BlockchainResult, BridgeAddresses, FinalizationParams, ReceiptSummary,
    Replacement, TransactionDetails,
};

/// Callback invoked when a watched transaction is superseded.
pub type ReplacementHandler<'a> = &'a (dyn Fn(Replacement) + Send + Sync);

/// Handler for callers that do not care about replacements.
pub fn ignore_replacement(_: Replacement) {}

/// Generic EVM JSON-RPC access.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Configured chain ID.
    fn chain_id(&self) -> u64;

    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> BlockchainResult<Bytes>;

    /// Broadcast a signed transaction.
    async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash>;

    /// Next nonce for an account.
    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64>;

    /// Current gas price in wei.
    async fn gas_price(&self) -> BlockchainResult<u128>;

    /// Gas the request would consume if sent now.
    async fn estimate_gas(&self, request: TransactionRequest) -> BlockchainResult<u64>;

    /// Receipt lookup, `None` while the transaction is pending.
    async fn transaction_receipt(&self, hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>>;

    /// Block until the transaction (or whatever superseded it) is mined.
    ///
    /// `on_replaced` fires before the wait switches to the replacement hash.
    async fn wait_for_receipt(
        &self,
        hash: TxHash,
        on_replaced: ReplacementHandler<'_>,
    ) -> BlockchainResult<ReceiptSummary>;
}

/// Rollup-specific (`zks_*`) extensions on top of [`ChainRpc`].
#[async_trait]
pub trait RollupRpc: ChainRpc {
    /// L2 processing status of a transaction.
    async fn transaction_details(&self, hash: TxHash) -> BlockchainResult<TransactionDetails>;

    /// Default bridge contracts of the rollup.
    async fn default_bridges(&self) -> BlockchainResult<BridgeAddresses>;

    /// L1 diamond proxy that accepts priority requests.
    async fn main_contract(&self) -> BlockchainResult<Address>;

    /// Batch and message index needed to ask L1 whether a withdrawal is finalized.
    async fn withdrawal_finalization_params(
        &self,
        hash: TxHash,
    ) -> BlockchainResult<FinalizationParams>;
}

/// Typed `eth_call` through any [`ChainRpc`].
pub async fn read_contract<R, C>(rpc: &R, to: Address, call: &C) -> BlockchainResult<C::Return>
where
    R: ChainRpc + ?Sized,
    C: SolCall + Sync,
{
    let output = rpc.call(to, call.abi_encode().into()).await?;
    C::abi_decode_returns(&output)
        .map_err(|e| BlockchainError::Decode(format!("{} returned malformed data: {}", C::SIGNATURE, e)))
}
