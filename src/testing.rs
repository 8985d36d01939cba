//! In-memory doubles for the RPC, wallet and auth seams.

use alloy::primitives::{address, keccak256, Address, Bytes, Log, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::auth::{AuthError, AuthTransport};
use crate::blockchain::abi::{L2CanonicalTransaction, NewPriorityRequest};
use crate::blockchain::rpc::{ChainRpc, ReplacementHandler, RollupRpc};
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, BridgeAddresses, FinalizationParams, L2TxStatus,
    ReceiptSummary, Replacement, TransactionDetails, EXECUTION_REVERTED_CODE,
};
use crate::blockchain::WalletSigner;

/// Gas every [`MockChain`] estimate returns.
pub const MOCK_GAS_ESTIMATE: u64 = 150_000;

/// Diamond proxy reported by [`MockChain`].
pub const MOCK_MAIN_CONTRACT: Address = address!("d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1");

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receipt with the given outcome.
pub fn receipt(hash: TxHash, success: bool, logs: Vec<Log>) -> ReceiptSummary {
    ReceiptSummary {
        transaction_hash: hash,
        block_number: Some(1),
        status: success,
        from: Address::repeat_byte(0xaa),
        logs,
    }
}

/// Diamond proxy log announcing the L2 side of a deposit.
pub fn priority_request_log(l2_hash: TxHash) -> Log {
    let event = NewPriorityRequest {
        txId: U256::from(1u64),
        txHash: l2_hash,
        expirationTimestamp: 1_700_000_000,
        transaction: L2CanonicalTransaction::default(),
        factoryDeps: Vec::new(),
    };
    Log {
        address: MOCK_MAIN_CONTRACT,
        data: event.encode_log_data(),
    }
}

#[derive(Default)]
struct ChainState {
    receipts: HashMap<TxHash, ReceiptSummary>,
    receipt_errors: VecDeque<BlockchainError>,
    wait_errors: VecDeque<BlockchainError>,
    replacements: HashMap<TxHash, Replacement>,
    calls: HashMap<(Address, Bytes), Bytes>,
    call_log: Vec<(Address, Bytes)>,
    details: HashMap<TxHash, VecDeque<L2TxStatus>>,
    bridges: BridgeAddresses,
    finalization: HashMap<TxHash, FinalizationParams>,
    raw_sent: Vec<Bytes>,
    nonce: u64,
    gas_price: u128,
    receipt_queries: usize,
    wait_calls: usize,
    detail_queries: usize,
    bridge_lookups: usize,
}

/// Scripted chain; serves both the generic and the rollup RPC surface.
pub struct MockChain {
    chain_id: u64,
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(ChainState {
                gas_price: 250_000_000,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        guard(&self.state)
    }

    pub fn set_receipt(&self, receipt: ReceiptSummary) {
        self.state().receipts.insert(receipt.transaction_hash, receipt);
    }

    /// Next `transaction_receipt` call fails with `err`.
    pub fn push_receipt_error(&self, err: BlockchainError) {
        self.state().receipt_errors.push_back(err);
    }

    /// Next `wait_for_receipt` call fails with `err`.
    pub fn push_wait_error(&self, err: BlockchainError) {
        self.state().wait_errors.push_back(err);
    }

    /// `wait_for_receipt(replacement.replaced)` reports the replacement first.
    pub fn set_replacement(&self, replacement: Replacement) {
        self.state()
            .replacements
            .insert(replacement.replaced, replacement);
    }

    pub fn set_call(&self, to: Address, data: impl Into<Bytes>, output: impl Into<Bytes>) {
        self.state().calls.insert((to, data.into()), output.into());
    }

    pub fn calls(&self) -> Vec<(Address, Bytes)> {
        self.state().call_log.clone()
    }

    /// Statuses served in order; the last one repeats.
    pub fn set_details(&self, hash: TxHash, statuses: &[L2TxStatus]) {
        self.state()
            .details
            .insert(hash, statuses.iter().copied().collect());
    }

    pub fn set_bridges(&self, bridges: BridgeAddresses) {
        self.state().bridges = bridges;
    }

    pub fn set_finalization(&self, hash: TxHash, params: FinalizationParams) {
        self.state().finalization.insert(hash, params);
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.state().nonce = nonce;
    }

    pub fn raw_transactions(&self) -> Vec<Bytes> {
        self.state().raw_sent.clone()
    }

    pub fn receipt_queries(&self) -> usize {
        self.state().receipt_queries
    }

    pub fn wait_calls(&self) -> usize {
        self.state().wait_calls
    }

    pub fn detail_queries(&self) -> usize {
        self.state().detail_queries
    }

    pub fn bridge_lookups(&self) -> usize {
        self.state().bridge_lookups
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call(&self, to: Address, data: Bytes) -> BlockchainResult<Bytes> {
        let mut state = self.state();
        state.call_log.push((to, data.clone()));
        state
            .calls
            .get(&(to, data))
            .cloned()
            .ok_or_else(|| BlockchainError::Rpc {
                code: Some(EXECUTION_REVERTED_CODE),
                message: "execution reverted".to_string(),
            })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        let hash = keccak256(&raw);
        self.state().raw_sent.push(raw);
        Ok(hash)
    }

    async fn transaction_count(&self, _address: Address) -> BlockchainResult<u64> {
        Ok(self.state().nonce)
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        Ok(self.state().gas_price)
    }

    async fn estimate_gas(&self, _request: TransactionRequest) -> BlockchainResult<u64> {
        Ok(MOCK_GAS_ESTIMATE)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        let mut state = self.state();
        state.receipt_queries += 1;
        if let Some(err) = state.receipt_errors.pop_front() {
            return Err(err);
        }
        Ok(state.receipts.get(&hash).cloned())
    }

    async fn wait_for_receipt(
        &self,
        hash: TxHash,
        on_replaced: ReplacementHandler<'_>,
    ) -> BlockchainResult<ReceiptSummary> {
        let replacement = {
            let mut state = self.state();
            state.wait_calls += 1;
            if let Some(err) = state.wait_errors.pop_front() {
                return Err(err);
            }
            state.replacements.get(&hash).cloned()
        };

        let watched = match replacement {
            Some(replacement) => {
                let next = replacement.transaction;
                on_replaced(replacement);
                next
            }
            None => hash,
        };
        self.state()
            .receipts
            .get(&watched)
            .cloned()
            .ok_or(BlockchainError::ReceiptTimeout(watched, 0))
    }
}

#[async_trait]
impl RollupRpc for MockChain {
    async fn transaction_details(&self, hash: TxHash) -> BlockchainResult<TransactionDetails> {
        let mut state = self.state();
        state.detail_queries += 1;
        let queue = state.details.get_mut(&hash).ok_or_else(|| BlockchainError::Rpc {
            code: None,
            message: format!("transaction {} is unknown to the node", hash),
        })?;
        let status = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        };
        Ok(TransactionDetails::with_status(
            status.unwrap_or(L2TxStatus::Unknown),
        ))
    }

    async fn default_bridges(&self) -> BlockchainResult<BridgeAddresses> {
        let mut state = self.state();
        state.bridge_lookups += 1;
        Ok(state.bridges.clone())
    }

    async fn main_contract(&self) -> BlockchainResult<Address> {
        Ok(MOCK_MAIN_CONTRACT)
    }

    async fn withdrawal_finalization_params(
        &self,
        hash: TxHash,
    ) -> BlockchainResult<FinalizationParams> {
        self.state()
            .finalization
            .get(&hash)
            .cloned()
            .ok_or_else(|| BlockchainError::Rpc {
                code: None,
                message: format!("withdrawal {} is not included in a batch yet", hash),
            })
    }
}

#[derive(Default)]
struct WalletState {
    sent: Vec<TransactionRequest>,
    signed: Vec<TransactionRequest>,
    send_errors: VecDeque<BlockchainError>,
    validation_error: Option<String>,
    issued: u8,
}

/// Wallet that hands out predictable hashes.
pub struct MockWallet {
    address: Address,
    state: Mutex<WalletState>,
}

impl MockWallet {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: Mutex::new(WalletState::default()),
        }
    }

    /// Hash the n-th (1-based) submitted transaction receives.
    pub fn hash_of(n: u8) -> TxHash {
        TxHash::with_last_byte(n)
    }

    pub fn push_send_error(&self, err: BlockchainError) {
        guard(&self.state).send_errors.push_back(err);
    }

    pub fn fail_validation(&self, reason: &str) {
        guard(&self.state).validation_error = Some(reason.to_string());
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        guard(&self.state).sent.clone()
    }

    pub fn signed(&self) -> Vec<TransactionRequest> {
        guard(&self.state).signed.clone()
    }
}

#[async_trait]
impl WalletSigner for MockWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn validate(&self) -> BlockchainResult<()> {
        match &guard(&self.state).validation_error {
            Some(reason) => Err(BlockchainError::Wallet(reason.clone())),
            None => Ok(()),
        }
    }

    async fn send_transaction(&self, request: TransactionRequest) -> BlockchainResult<TxHash> {
        let mut state = guard(&self.state);
        if let Some(err) = state.send_errors.pop_front() {
            return Err(err);
        }
        state.sent.push(request);
        state.issued += 1;
        Ok(Self::hash_of(state.issued))
    }

    async fn sign_transaction(&self, request: TransactionRequest) -> BlockchainResult<Bytes> {
        let raw = format!("signed:{}:{:?}", self.address, request.nonce);
        guard(&self.state).signed.push(request);
        Ok(Bytes::from(raw.into_bytes()))
    }
}

/// Handshake double; authorizes with the bearer token `mock-session`.
#[derive(Default)]
pub struct MockAuthTransport {
    authorized: AtomicBool,
    next_failure: Mutex<Option<AuthError>>,
}

impl MockAuthTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next handshake fails with `err`.
    pub fn fail_next(&self, err: AuthError) {
        *guard(&self.next_failure) = Some(err);
    }

    /// Hold credentials without a handshake, as a restored session would.
    pub fn authorize_now(&self) {
        self.authorized.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthTransport for MockAuthTransport {
    async fn authorize(&self) -> Result<(), AuthError> {
        if let Some(err) = guard(&self.next_failure).take() {
            return Err(err);
        }
        self.authorized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unauthorize(&self) {
        self.authorized.store(false, Ordering::SeqCst);
    }

    fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    fn auth_headers(&self) -> HashMap<String, String> {
        if self.is_authorized() {
            HashMap::from([(
                "Authorization".to_string(),
                "Bearer mock-session".to_string(),
            )])
        } else {
            HashMap::new()
        }
    }
}
