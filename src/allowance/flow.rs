//! Spend-allowance approval flow.
//!
//! For a watched (token, amount) pair, derives whether the token is native to
//! the rollup, reads the allowance the owner granted the vault, and drives an
//! approval transaction to confirmation when the allowance is short.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash, B256, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::blockchain::abi::{
    IL2NativeTokenVault, IERC20, L2_BASE_TOKEN_ADDRESS, L2_NATIVE_TOKEN_VAULT_ADDRESS,
};
use crate::blockchain::rpc::{read_contract, ChainRpc};
use crate::blockchain::types::{BlockchainResult, Replacement};
use crate::blockchain::WalletSigner;
use crate::config::AllowanceConfig;
use crate::error::{PortalError, PortalResult};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

/// Progress of [`AllowanceApprovalFlow::approve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalStatus {
    #[default]
    NotStarted,
    Processing,
    WaitingForSignature,
    Sending,
    Done,
}

/// What is known about the watched token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowanceState {
    /// `None` until derived for the current token.
    pub is_native_token: Option<bool>,
    pub check_in_progress: bool,
    pub approved_allowance: Option<U256>,
    pub asset_id: Option<B256>,
}

#[derive(Debug, Default)]
struct FlowState {
    token: Option<Address>,
    amount: U256,
    allowance: AllowanceState,
    status: ApprovalStatus,
    hashes: Vec<TxHash>,
    last_error: Option<String>,
    // Bumped on every token change so stale derivations are dropped
    generation: u64,
}

pub struct AllowanceApprovalFlow {
    l2: Arc<dyn ChainRpc>,
    signer: Option<Arc<dyn WalletSigner>>,
    owner: Address,
    config: AllowanceConfig,
    state: Mutex<FlowState>,
}

impl AllowanceApprovalFlow {
    /// Read-only flow for `owner`; [`Self::with_signer`] enables approvals.
    pub fn new(l2: Arc<dyn ChainRpc>, owner: Address, config: AllowanceConfig) -> Self {
        Self {
            l2,
            signer: None,
            owner,
            config,
            state: Mutex::new(FlowState::default()),
        }
    }

    /// Approvals are signed by `signer`, whose account becomes the owner.
    pub fn with_signer(mut self, signer: Arc<dyn WalletSigner>) -> Self {
        self.owner = signer.address();
        self.signer = Some(signer);
        self
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Watch a different token and re-derive its state.
    pub async fn set_token(&self, token: Option<Address>) -> PortalResult<()> {
        self.lock().token = token;
        self.refresh().await
    }

    pub fn set_amount(&self, amount: U256) {
        self.lock().amount = amount;
    }

    /// Re-derive nativeness and allowance for the watched token.
    ///
    /// A refresh superseded by a later token change leaves no trace.
    pub async fn refresh(&self) -> PortalResult<()> {
        let (token, generation) = {
            let mut state = self.lock();
            state.generation += 1;
            state.allowance = AllowanceState {
                check_in_progress: state.token.is_some(),
                ..Default::default()
            };
            (state.token, state.generation)
        };
        let Some(token) = token else {
            return Ok(());
        };

        let derived = self.derive(token).await;

        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(token = %token, "Discarding allowance check for replaced token");
            return Ok(());
        }
        match derived {
            Ok(allowance) => {
                tracing::debug!(
                    token = %token,
                    owner = %self.owner,
                    is_native = ?allowance.is_native_token,
                    allowance = ?allowance.approved_allowance,
                    "Allowance state derived"
                );
                state.allowance = allowance;
                Ok(())
            }
            Err(e) => {
                state.allowance.check_in_progress = false;
                state.last_error = Some(e.to_string());
                tracing::warn!(token = %token, error = %e, "Allowance check failed");
                Err(e.into())
            }
        }
    }

    async fn derive(&self, token: Address) -> BlockchainResult<AllowanceState> {
        if token == L2_BASE_TOKEN_ADDRESS {
            return Ok(AllowanceState {
                is_native_token: Some(true),
                ..Default::default()
            });
        }

        let asset_id = read_contract(
            self.l2.as_ref(),
            L2_NATIVE_TOKEN_VAULT_ADDRESS,
            &IL2NativeTokenVault::assetIdCall { token },
        )
        .await?;
        let origin_chain_id = read_contract(
            self.l2.as_ref(),
            L2_NATIVE_TOKEN_VAULT_ADDRESS,
            &IL2NativeTokenVault::originChainIdCall { assetId: asset_id },
        )
        .await?;
        let allowance = self.read_allowance(token).await?;

        Ok(AllowanceState {
            is_native_token: Some(origin_chain_id == U256::from(self.l2.chain_id())),
            check_in_progress: false,
            approved_allowance: Some(allowance),
            asset_id: Some(asset_id),
        })
    }

    async fn read_allowance(&self, token: Address) -> BlockchainResult<U256> {
        read_contract(
            self.l2.as_ref(),
            token,
            &IERC20::allowanceCall {
                owner: self.owner,
                spender: self.config.spender,
            },
        )
        .await
    }

    // ----- derived predicates -----

    pub fn state(&self) -> AllowanceState {
        self.lock().allowance.clone()
    }

    pub fn status(&self) -> ApprovalStatus {
        self.lock().status
    }

    /// Hashes of the latest approval attempt; entry 0 follows wallet replacements.
    pub fn transaction_hashes(&self) -> Vec<TxHash> {
        self.lock().hashes.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Known allowance covers the requested amount.
    pub fn amount_to_transfer_is_approved(&self) -> bool {
        let state = self.lock();
        state
            .allowance
            .approved_allowance
            .is_some_and(|allowance| allowance >= state.amount)
    }

    /// Approval UI stays hidden while unknown, in flight, or not needed.
    pub fn hide_based_on_allowance(&self) -> bool {
        let state = self.lock();
        match state.allowance.is_native_token {
            None => true,
            Some(_) if state.allowance.check_in_progress => true,
            Some(native) => native,
        }
    }

    /// The token needs approval and the known allowance is short.
    pub fn show_allowance_process(&self) -> bool {
        let state = self.lock();
        let allowance = &state.allowance;
        allowance.is_native_token == Some(false)
            && !state.amount.is_zero()
            && allowance
                .approved_allowance
                .is_some_and(|approved| state.amount > approved)
    }

    // ----- approval -----

    /// Approve the vault for the full watched amount and wait for confirmation.
    pub async fn approve(&self) -> PortalResult<U256> {
        match self.run_approval().await {
            Ok(allowance) => {
                metrics::record_approval("done");
                Ok(allowance)
            }
            Err(e) => {
                {
                    let mut state = self.lock();
                    state.status = ApprovalStatus::NotStarted;
                    state.last_error = Some(e.to_string());
                }
                metrics::record_approval(e.kind().as_str());
                tracing::warn!(owner = %self.owner, error = %e, "Allowance approval failed");
                Err(e)
            }
        }
    }

    async fn run_approval(&self) -> PortalResult<U256> {
        let (token, amount) = {
            let mut state = self.lock();
            state.status = ApprovalStatus::Processing;
            state.last_error = None;
            // Hashes from an earlier attempt must not be watched again
            state.hashes.clear();
            (state.token, state.amount)
        };
        let token = token.ok_or_else(|| {
            PortalError::ValidationFailure("no token selected for approval".to_string())
        })?;
        let signer = self.signer.as_ref().ok_or_else(|| {
            PortalError::ValidationFailure("approval requires a signing wallet".to_string())
        })?;

        self.set_status(ApprovalStatus::WaitingForSignature);
        let call = IERC20::approveCall {
            spender: self.config.spender,
            amount,
        };
        let request = TransactionRequest::default()
            .with_from(signer.address())
            .with_to(token)
            .with_input(call.abi_encode());
        let hash = signer.send_transaction(request).await?;

        {
            let mut state = self.lock();
            state.hashes.push(hash);
            state.status = ApprovalStatus::Sending;
        }
        tracing::info!(
            tx_hash = %hash,
            token = %token,
            spender = %self.config.spender,
            amount = %amount,
            "Approval submitted"
        );

        let on_replaced = |replacement: Replacement| {
            tracing::info!(
                replaced = %replacement.replaced,
                tx_hash = %replacement.transaction,
                reason = ?replacement.reason,
                "Approval transaction replaced"
            );
            if let Some(first) = self.lock().hashes.first_mut() {
                *first = replacement.transaction;
            }
        };

        let policy = RetryPolicy::new(
            self.config.receipt_retries,
            Duration::from_millis(self.config.receipt_retry_delay_ms),
        );
        let receipt = policy
            .run("approval receipt", || {
                // Always watch the live hash, not the one first submitted
                let watched = self.lock().hashes.first().copied().unwrap_or(hash);
                let on_replaced = &on_replaced;
                async move { self.l2.wait_for_receipt(watched, on_replaced).await }
            })
            .await?;
        if receipt.reverted() {
            return Err(PortalError::ChainRevert(format!(
                "approval {} reverted",
                receipt.transaction_hash
            )));
        }

        let allowance = self.read_allowance(token).await?;
        {
            let mut state = self.lock();
            state.allowance.approved_allowance = Some(allowance);
            state.status = ApprovalStatus::Done;
        }
        tracing::info!(
            tx_hash = %receipt.transaction_hash,
            allowance = %allowance,
            "Approval confirmed"
        );
        Ok(allowance)
    }

    fn set_status(&self, status: ApprovalStatus) {
        self.lock().status = status;
    }

    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AllowanceApprovalFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllowanceApprovalFlow")
            .field("owner", &self.owner)
            .field("spender", &self.config.spender)
            .field("can_sign", &self.signer.is_some())
            .finish()
    }
}
