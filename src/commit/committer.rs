//! Transaction committer.
//!
//! Builds the deposit, withdrawal or transfer request, validates the
//! destination, obtains a signature through the configured submission path
//! and enters the resulting record into the ledger.
//!
//! # Submission paths
//! - Direct: the wallet signs and broadcasts through its own connection.
//! - Delegated: the session client prepares the request (nonce, gas, chain),
//!   the wallet only signs, and the raw payload goes out through the
//!   network's public endpoint.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::blockchain::abi::{
    IL1ERC20Bridge, IL2BaseToken, IL2Bridge, IMailbox, IERC20, L2_BASE_TOKEN_ADDRESS,
    REQUIRED_L1_TO_L2_GAS_PER_PUBDATA_LIMIT,
};
use crate::blockchain::rollup::BridgeRegistry;
use crate::blockchain::rpc::{ChainRpc, RollupRpc};
use crate::blockchain::WalletSigner;
use crate::commit::screening::{validate_destination, AddressScreener, AllowAll};
use crate::error::{PortalError, PortalResult};
use crate::ledger::{Destination, Party, TokenAmount, TransactionLedger, TransactionRecord, TransactionType};
use crate::observability::metrics;

/// Progress of [`TransactionCommitter::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitStatus {
    #[default]
    NotStarted,
    Processing,
    WaitingForSignature,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPath {
    Direct,
    Delegated,
}

impl SubmissionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionPath::Direct => "direct",
            SubmissionPath::Delegated => "delegated",
        }
    }
}

/// What to move, where.
#[derive(Debug, Clone)]
pub struct TransactionParams {
    pub kind: TransactionType,
    pub to: Address,
    pub token: TokenAmount,
    /// Custom withdrawal bridge. Unset means the network's default shared
    /// bridge, or none for the base token.
    pub bridge_address: Option<Address>,
}

impl TransactionParams {
    fn moves_base_token(&self) -> bool {
        self.token.address == L2_BASE_TOKEN_ADDRESS
    }
}

/// Caller-chosen fee. Unset fields are filled by the submission path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeParams {
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    /// Deposits: gas the L2 side may burn.
    pub l2_gas_limit: Option<u64>,
    /// Deposits: L2 execution cost paid on L1 on top of the amount.
    pub base_cost: U256,
}

#[derive(Debug, Clone)]
pub struct TransactionResult {
    pub hash: TxHash,
    pub path: SubmissionPath,
    pub record: TransactionRecord,
}

#[derive(Debug, Default)]
struct CommitState {
    status: CommitStatus,
    hash: Option<TxHash>,
    error: Option<String>,
}

pub struct TransactionCommitter {
    network: String,
    l2: Arc<dyn RollupRpc>,
    bridges: Arc<BridgeRegistry>,
    signer: Arc<dyn WalletSigner>,
    l1_signer: Option<Arc<dyn WalletSigner>>,
    public: Option<Arc<dyn ChainRpc>>,
    screener: Arc<dyn AddressScreener>,
    ledger: Arc<TransactionLedger>,
    state: Mutex<CommitState>,
}

impl TransactionCommitter {
    pub fn new(
        network: impl Into<String>,
        l2: Arc<dyn RollupRpc>,
        signer: Arc<dyn WalletSigner>,
        ledger: Arc<TransactionLedger>,
    ) -> Self {
        Self {
            network: network.into(),
            bridges: Arc::new(BridgeRegistry::new(l2.clone())),
            l2,
            signer,
            l1_signer: None,
            public: None,
            screener: Arc::new(AllowAll),
            ledger,
            state: Mutex::new(CommitState::default()),
        }
    }

    pub fn with_bridges(mut self, bridges: Arc<BridgeRegistry>) -> Self {
        self.bridges = bridges;
        self
    }

    /// Wallet connected to the settlement chain; required for deposits.
    pub fn with_l1_signer(mut self, signer: Arc<dyn WalletSigner>) -> Self {
        self.l1_signer = Some(signer);
        self
    }

    /// Switch L2 submissions to the delegated path through `public`.
    pub fn with_delegated(mut self, public: Arc<dyn ChainRpc>) -> Self {
        self.public = Some(public);
        self
    }

    pub fn with_screener(mut self, screener: Arc<dyn AddressScreener>) -> Self {
        self.screener = screener;
        self
    }

    pub fn status(&self) -> CommitStatus {
        self.lock().status
    }

    pub fn transaction_hash(&self) -> Option<TxHash> {
        self.lock().hash
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Path a transaction of `kind` is submitted through.
    pub fn path_for(&self, kind: TransactionType) -> SubmissionPath {
        match (kind, &self.public) {
            (TransactionType::Deposit, _) | (_, None) => SubmissionPath::Direct,
            (_, Some(_)) => SubmissionPath::Delegated,
        }
    }

    /// Validate, sign, submit and record one transaction.
    pub async fn commit(
        &self,
        params: &TransactionParams,
        fee: &FeeParams,
    ) -> PortalResult<TransactionResult> {
        let path = self.path_for(params.kind);
        match self.run_commit(params, fee, path).await {
            Ok(result) => {
                metrics::record_commit(params.kind.as_str(), path.as_str(), "done");
                Ok(result)
            }
            Err(e) => {
                {
                    let mut state = self.lock();
                    state.status = CommitStatus::NotStarted;
                    state.error = Some(e.to_string());
                }
                metrics::record_commit(params.kind.as_str(), path.as_str(), e.kind().as_str());
                tracing::warn!(
                    network = %self.network,
                    tx_type = %params.kind,
                    path = path.as_str(),
                    error = %e,
                    "Commit failed"
                );
                Err(e)
            }
        }
    }

    async fn run_commit(
        &self,
        params: &TransactionParams,
        fee: &FeeParams,
        path: SubmissionPath,
    ) -> PortalResult<TransactionResult> {
        {
            let mut state = self.lock();
            state.status = CommitStatus::Processing;
            state.hash = None;
            state.error = None;
        }

        let account = self.account_for(params.kind)?;
        let from = account.address();

        let bridge = match params.kind {
            TransactionType::Withdrawal => self.resolve_bridge(params).await?,
            _ => None,
        };

        // Nothing reaches the wallet before the destination is cleared
        account.validate().await?;
        validate_destination(params.to)?;
        self.screener.screen(params.to).await?;

        let request = self
            .build_request(params, fee, from, bridge)
            .await?
            .with_from(from);

        self.set_status(CommitStatus::WaitingForSignature);
        let hash = match path {
            SubmissionPath::Direct => account.send_transaction(request).await?,
            SubmissionPath::Delegated => self.submit_delegated(request, fee).await?,
        };

        let (from_side, to_side) = match params.kind {
            TransactionType::Deposit => (Destination::L1, Destination::L2),
            TransactionType::Withdrawal => (Destination::L2, Destination::L1),
            TransactionType::Transfer => (Destination::L2, Destination::L2),
        };
        let record = TransactionRecord::new(
            params.kind,
            params.token.clone(),
            Party::new(from, from_side),
            Party::new(params.to, to_side),
            hash.to_string(),
        );
        self.ledger.save(&self.network, record.clone())?;

        {
            let mut state = self.lock();
            state.hash = Some(hash);
            state.status = CommitStatus::Done;
        }
        tracing::info!(
            network = %self.network,
            tx_hash = %hash,
            tx_type = %params.kind,
            path = path.as_str(),
            "Transaction committed"
        );

        Ok(TransactionResult { hash, path, record })
    }

    fn account_for(&self, kind: TransactionType) -> PortalResult<&Arc<dyn WalletSigner>> {
        match kind {
            TransactionType::Deposit => self.l1_signer.as_ref().ok_or_else(|| {
                PortalError::Config(format!(
                    "network {} has no settlement chain wallet for deposits",
                    self.network
                ))
            }),
            _ => Ok(&self.signer),
        }
    }

    /// Explicit bridge, none for the base token, else the default shared bridge.
    async fn resolve_bridge(&self, params: &TransactionParams) -> PortalResult<Option<Address>> {
        if let Some(bridge) = params.bridge_address {
            return Ok(Some(bridge));
        }
        if params.moves_base_token() {
            return Ok(None);
        }
        let bridges = self.bridges.get().await?;
        bridges
            .l2_shared_default_bridge
            .map(Some)
            .ok_or_else(|| {
                PortalError::InvariantViolation(format!(
                    "network {} reports no default shared bridge",
                    self.network
                ))
            })
    }

    async fn build_request(
        &self,
        params: &TransactionParams,
        fee: &FeeParams,
        from: Address,
        bridge: Option<Address>,
    ) -> PortalResult<TransactionRequest> {
        let amount = params.token.amount;
        let request = match params.kind {
            TransactionType::Transfer if params.moves_base_token() => TransactionRequest::default()
                .with_to(params.to)
                .with_value(amount),
            TransactionType::Transfer => TransactionRequest::default()
                .with_to(params.token.address)
                .with_input(IERC20::transferCall { to: params.to, amount }.abi_encode()),
            TransactionType::Withdrawal => match (params.bridge_address, bridge) {
                (Some(custom), _) => populate_custom_withdrawal(params, custom),
                (None, None) => TransactionRequest::default()
                    .with_to(L2_BASE_TOKEN_ADDRESS)
                    .with_value(amount)
                    .with_input(
                        IL2BaseToken::withdrawCall {
                            _l1Receiver: params.to,
                        }
                        .abi_encode(),
                    ),
                (None, Some(shared)) => TransactionRequest::default()
                    .with_to(shared)
                    .with_input(withdraw_call(params)),
            },
            TransactionType::Deposit => self.deposit_request(params, fee, from).await?,
        };
        Ok(apply_fee(request, fee))
    }

    async fn deposit_request(
        &self,
        params: &TransactionParams,
        fee: &FeeParams,
        from: Address,
    ) -> PortalResult<TransactionRequest> {
        let l2_gas_limit = fee.l2_gas_limit.ok_or_else(|| {
            PortalError::ValidationFailure("deposit requires an L2 gas limit".to_string())
        })?;
        let amount = params.token.amount;
        let gas_per_pubdata = U256::from(REQUIRED_L1_TO_L2_GAS_PER_PUBDATA_LIMIT);

        let request = if params.moves_base_token() {
            let main_contract = self.l2.main_contract().await?;
            let call = IMailbox::requestL2TransactionCall {
                _contractL2: params.to,
                _l2Value: amount,
                _calldata: Bytes::new(),
                _l2GasLimit: U256::from(l2_gas_limit),
                _l2GasPerPubdataByteLimit: gas_per_pubdata,
                _factoryDeps: Vec::new(),
                _refundRecipient: from,
            };
            TransactionRequest::default()
                .with_to(main_contract)
                .with_value(amount + fee.base_cost)
                .with_input(call.abi_encode())
        } else {
            let l1_token = params.token.l1_address.ok_or_else(|| {
                PortalError::ValidationFailure(format!(
                    "token {} has no settlement chain address",
                    params.token.symbol
                ))
            })?;
            let bridge = self.bridges.get().await?.l1_erc20_default_bridge.ok_or_else(|| {
                PortalError::InvariantViolation(format!(
                    "network {} reports no L1 ERC-20 bridge",
                    self.network
                ))
            })?;
            let call = IL1ERC20Bridge::depositCall {
                _l2Receiver: params.to,
                _l1Token: l1_token,
                _amount: amount,
                _l2TxGasLimit: U256::from(l2_gas_limit),
                _l2TxGasPerPubdataByte: gas_per_pubdata,
                _refundRecipient: from,
            };
            TransactionRequest::default()
                .with_to(bridge)
                .with_value(fee.base_cost)
                .with_input(call.abi_encode())
        };
        Ok(request)
    }

    async fn submit_delegated(
        &self,
        request: TransactionRequest,
        fee: &FeeParams,
    ) -> PortalResult<TxHash> {
        let public = self.public.as_ref().ok_or_else(|| {
            PortalError::Config(format!("network {} has no public endpoint", self.network))
        })?;

        let nonce = self.l2.transaction_count(self.signer.address()).await?;
        let gas_limit = match fee.gas_limit {
            Some(limit) => limit,
            None => self.l2.estimate_gas(request.clone()).await?,
        };
        let request = request
            .with_nonce(nonce)
            .with_chain_id(self.l2.chain_id())
            .with_gas_limit(gas_limit);
        let request = match fee.max_fee_per_gas {
            Some(max_fee) => request
                .with_max_fee_per_gas(max_fee)
                .with_max_priority_fee_per_gas(fee.max_priority_fee_per_gas.unwrap_or(0)),
            None => {
                let price = match fee.gas_price {
                    Some(price) => price,
                    None => self.l2.gas_price().await?,
                };
                request.with_gas_price(price)
            }
        };

        let raw = self.signer.sign_transaction(request).await?;
        tracing::debug!(network = %self.network, nonce = nonce, "Broadcasting delegated transaction");
        Ok(public.send_raw_transaction(raw).await?)
    }

    fn set_status(&self, status: CommitStatus) {
        self.lock().status = status;
    }

    fn lock(&self) -> MutexGuard<'_, CommitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn withdraw_call(params: &TransactionParams) -> Vec<u8> {
    IL2Bridge::withdrawCall {
        _l1Receiver: params.to,
        _l2Token: params.token.address,
        _amount: params.token.amount,
    }
    .abi_encode()
}

/// Hand-built withdrawal through a custom bridge, fee taken as gas overrides.
fn populate_custom_withdrawal(params: &TransactionParams, bridge: Address) -> TransactionRequest {
    TransactionRequest::default()
        .with_to(bridge)
        .with_value(U256::ZERO)
        .with_input(withdraw_call(params))
}

fn apply_fee(mut request: TransactionRequest, fee: &FeeParams) -> TransactionRequest {
    if let Some(limit) = fee.gas_limit {
        request.set_gas_limit(limit);
    }
    if let Some(price) = fee.gas_price {
        request.set_gas_price(price);
    }
    if let Some(max_fee) = fee.max_fee_per_gas {
        request.set_max_fee_per_gas(max_fee);
    }
    if let Some(priority) = fee.max_priority_fee_per_gas {
        request.set_max_priority_fee_per_gas(priority);
    }
    request
}

impl std::fmt::Debug for TransactionCommitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCommitter")
            .field("network", &self.network)
            .field("account", &self.signer.address())
            .field("delegated", &self.public.is_some())
            .field("status", &self.status())
            .finish()
    }
}
