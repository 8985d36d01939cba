//! Transaction status tracker.
//!
//! Drives a [`TransactionRecord`] to a terminal state by running one
//! type-specific status step at a time and sleeping between steps.
//!
//! ```text
//! deposit:    submitted → l1-confirmed | l1-reverted(terminal)
//!                       → l2-hash-known → l2-confirmed(terminal)
//! withdrawal: submitted → pending | verified | failed-on-l2(terminal)
//!                       → finalization-available → finalized(terminal)
//! transfer:   submitted → receipt-known → details-known(terminal)
//! ```

use alloy::primitives::{Address, TxHash, U256};
use alloy::sol_types::SolEvent;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::blockchain::abi::{IL1SharedBridge, NewPriorityRequest};
use crate::blockchain::rollup::BridgeRegistry;
use crate::blockchain::rpc::{ignore_replacement, read_contract, ChainRpc, RollupRpc};
use crate::blockchain::types::{BlockchainError, BlockchainResult, L2TxStatus, ReceiptSummary};
use crate::config::TrackingConfig;
use crate::error::{PortalError, PortalResult};
use crate::ledger::{TransactionLedger, TransactionRecord, TransactionType};
use crate::observability::metrics;
use crate::resilience::{calculate_backoff, RetryPolicy};
use crate::tracker::classify::is_transaction_failure;

/// Confirmation state machine over one network's ledger partition.
pub struct TransactionStatusTracker {
    network: String,
    l1: Option<Arc<dyn ChainRpc>>,
    l2: Arc<dyn RollupRpc>,
    bridges: Arc<BridgeRegistry>,
    ledger: Arc<TransactionLedger>,
    config: TrackingConfig,
    cancel: CancellationToken,
}

impl TransactionStatusTracker {
    pub fn new(
        network: impl Into<String>,
        l2: Arc<dyn RollupRpc>,
        ledger: Arc<TransactionLedger>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            network: network.into(),
            l1: None,
            bridges: Arc::new(BridgeRegistry::new(l2.clone())),
            l2,
            ledger,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Settlement chain client, required for deposits and withdrawal finalization.
    pub fn with_l1(mut self, l1: Arc<dyn ChainRpc>) -> Self {
        self.l1 = Some(l1);
        self
    }

    /// Share the bridge address memo with other components of the session.
    pub fn with_bridges(mut self, bridges: Arc<BridgeRegistry>) -> Self {
        self.bridges = bridges;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    // ----- ledger access -----

    /// Upsert a record into the current network's partition.
    pub fn save_transaction(&self, record: TransactionRecord) -> PortalResult<()> {
        Ok(self.ledger.save(&self.network, record)?)
    }

    /// Replace an existing record wholesale.
    pub fn update_transaction(
        &self,
        hash: &str,
        record: TransactionRecord,
    ) -> PortalResult<TransactionRecord> {
        Ok(self.ledger.update(&self.network, hash, record)?)
    }

    pub fn get_transaction(&self, hash: &str) -> Option<TransactionRecord> {
        self.ledger.get(&self.network, hash)
    }

    pub fn saved_transactions(&self) -> Vec<TransactionRecord> {
        self.ledger.records(&self.network)
    }

    pub fn user_transactions(&self, account: Address) -> Vec<TransactionRecord> {
        self.ledger.user_records(&self.network, account)
    }

    // ----- resolution -----

    /// Poll until the record is terminal.
    ///
    /// Each step's result is saved to the ledger. Returns
    /// [`PortalError::Interrupted`] when cancelled or when the configured
    /// attempt ceiling is reached; any other error comes from the step itself.
    pub async fn resolve(&self, record: TransactionRecord) -> PortalResult<TransactionRecord> {
        let mut record = record;
        let mut attempts: u32 = 0;

        loop {
            if record.is_terminal() {
                return Ok(record);
            }
            // Another poll chain may have finished this record already
            if let Some(stored) = self.get_transaction(&record.transaction_hash) {
                if stored.is_terminal() {
                    return Ok(stored);
                }
            }
            if self.cancel.is_cancelled() {
                return Err(PortalError::Interrupted(format!(
                    "tracking of {} cancelled",
                    record.transaction_hash
                )));
            }

            let kind = record.kind;
            record = self.step(record).await?;
            metrics::record_poll_step(kind.as_str());
            self.save_transaction(record.clone())?;

            if record.is_terminal() {
                tracing::info!(
                    network = %self.network,
                    tx_hash = %record.transaction_hash,
                    tx_type = %kind,
                    outcome = record.outcome(),
                    "Transaction resolved"
                );
                metrics::record_resolved(kind.as_str(), record.outcome());
                return Ok(record);
            }

            attempts += 1;
            if let Some(max) = self.config.max_attempts {
                if attempts >= max {
                    return Err(PortalError::Interrupted(format!(
                        "{} not final after {} status checks",
                        record.transaction_hash, attempts
                    )));
                }
            }

            tracing::debug!(
                network = %self.network,
                tx_hash = %record.transaction_hash,
                tx_type = %kind,
                attempt = attempts,
                "Transaction not final yet"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(PortalError::Interrupted(format!(
                        "tracking of {} cancelled",
                        record.transaction_hash
                    )));
                }
                _ = tokio::time::sleep(self.interval(kind)) => {}
            }
        }
    }

    /// Resolve a stored record, retrying infrastructure errors with backoff.
    pub async fn track(&self, hash: &str) -> PortalResult<TransactionRecord> {
        let mut record = self.get_transaction(hash).ok_or_else(|| {
            PortalError::InvariantViolation(format!("Transaction not found: {}", hash))
        })?;
        let mut failures: u32 = 0;

        loop {
            match self.resolve(record.clone()).await {
                Ok(resolved) => return Ok(resolved),
                Err(e)
                    if e.is_retryable()
                        && !matches!(e, PortalError::Interrupted(_))
                        && failures < self.config.transient_max_retries =>
                {
                    failures += 1;
                    let delay = calculate_backoff(
                        failures,
                        self.config.transient_base_delay_ms,
                        self.config.transient_max_delay_ms,
                    );
                    tracing::warn!(
                        network = %self.network,
                        tx_hash = %hash,
                        error = %e,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "Status check failed, retrying"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(PortalError::Interrupted(format!(
                                "tracking of {} cancelled",
                                hash
                            )));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    // Pick up whatever the failed run managed to persist
                    if let Some(stored) = self.get_transaction(hash) {
                        record = stored;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Track every pending record of the network concurrently.
    pub async fn resume(&self) -> Vec<(String, PortalResult<TransactionRecord>)> {
        let pending = self.ledger.pending(&self.network);
        tracing::info!(
            network = %self.network,
            pending = pending.len(),
            "Resuming pending transactions"
        );

        let runs = pending.iter().map(|record| async move {
            let hash = record.transaction_hash.clone();
            let result = self.track(&hash).await;
            (hash, result)
        });
        join_all(runs).await
    }

    fn interval(&self, kind: TransactionType) -> Duration {
        let ms = match kind {
            TransactionType::Deposit => self.config.deposit_interval_ms,
            TransactionType::Withdrawal => self.config.withdrawal_interval_ms,
            TransactionType::Transfer => self.config.transfer_interval_ms,
        };
        Duration::from_millis(ms)
    }

    async fn step(&self, record: TransactionRecord) -> PortalResult<TransactionRecord> {
        match record.kind {
            TransactionType::Deposit => self.deposit_step(record).await,
            TransactionType::Withdrawal => self.withdrawal_step(record).await,
            TransactionType::Transfer => self.transfer_step(record).await,
        }
    }

    // ----- deposit -----

    async fn deposit_step(&self, mut record: TransactionRecord) -> PortalResult<TransactionRecord> {
        let hash = record.tx_hash()?;
        let l1 = self.l1.as_ref().ok_or_else(|| {
            PortalError::Config(format!(
                "network {} has no settlement chain client for deposits",
                self.network
            ))
        })?;

        let policy = RetryPolicy::new(
            self.config.l1_receipt_retries,
            Duration::from_millis(self.config.l1_receipt_retry_delay_ms),
        );
        let l1_receipt = match policy
            .run("deposit L1 receipt", || {
                l1.wait_for_receipt(hash, &ignore_replacement)
            })
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => return self.settle_deposit_error(record, e),
        };

        if l1_receipt.reverted() {
            tracing::info!(network = %self.network, tx_hash = %hash, "Deposit reverted on L1");
            record.mark_failed();
            return Ok(record);
        }

        let l2_hash = extract_l2_hash(&l1_receipt)?;
        if record.info.to_transaction_hash.is_none() {
            tracing::info!(
                network = %self.network,
                tx_hash = %hash,
                l2_hash = %l2_hash,
                "Deposit confirmed on L1"
            );
        }
        record.info.to_transaction_hash = Some(l2_hash.to_string());

        match self.l2.transaction_receipt(l2_hash).await {
            Ok(Some(_)) => record.info.completed = true,
            Ok(None) => {}
            Err(e) => return self.settle_deposit_error(record, e),
        }
        Ok(record)
    }

    fn settle_deposit_error(
        &self,
        mut record: TransactionRecord,
        err: BlockchainError,
    ) -> PortalResult<TransactionRecord> {
        if is_transaction_failure(&err) {
            tracing::warn!(
                network = %self.network,
                tx_hash = %record.transaction_hash,
                error = %err,
                "Deposit failed"
            );
            record.mark_failed();
            return Ok(record);
        }
        Err(err.into())
    }

    // ----- withdrawal -----

    async fn withdrawal_step(
        &self,
        mut record: TransactionRecord,
    ) -> PortalResult<TransactionRecord> {
        let hash = record.tx_hash()?;

        if !record.info.withdrawal_finalization_available {
            let details = self.l2.transaction_details(hash).await?;
            match details.status {
                L2TxStatus::Failed => {
                    tracing::info!(network = %self.network, tx_hash = %hash, "Withdrawal failed on L2");
                    record.info.withdrawal_finalization_available = false;
                    record.mark_failed();
                    return Ok(record);
                }
                L2TxStatus::Verified => {
                    tracing::info!(
                        network = %self.network,
                        tx_hash = %hash,
                        "Withdrawal verified, finalization available"
                    );
                }
                _ => return Ok(record),
            }
        }

        record.info.withdrawal_finalization_available = true;
        record.info.completed = self.is_withdrawal_finalized(hash).await;
        Ok(record)
    }

    /// Finalization predicate; a failed check counts as "not yet".
    async fn is_withdrawal_finalized(&self, hash: TxHash) -> bool {
        match self.check_finalized(hash).await {
            Ok(finalized) => finalized,
            Err(e) => {
                tracing::debug!(
                    network = %self.network,
                    tx_hash = %hash,
                    error = %e,
                    "Finalization check failed"
                );
                false
            }
        }
    }

    async fn check_finalized(&self, hash: TxHash) -> BlockchainResult<bool> {
        let l1 = self
            .l1
            .as_ref()
            .ok_or_else(|| BlockchainError::NotAvailable("no settlement chain client".to_string()))?;
        let params = self.l2.withdrawal_finalization_params(hash).await?;
        let bridge = self
            .bridges
            .get()
            .await?
            .l1_shared_default_bridge
            .ok_or_else(|| BlockchainError::NotAvailable("no L1 shared bridge".to_string()))?;

        let call = IL1SharedBridge::isWithdrawalFinalizedCall {
            _chainId: U256::from(params.chain_id),
            _l2BatchNumber: U256::from(params.l1_batch_number),
            _l2MessageIndex: U256::from(params.l2_message_index),
        };
        read_contract(l1.as_ref(), bridge, &call).await
    }

    // ----- transfer -----

    async fn transfer_step(&self, mut record: TransactionRecord) -> PortalResult<TransactionRecord> {
        let hash = record.tx_hash()?;
        if self.l2.transaction_receipt(hash).await?.is_none() {
            return Ok(record);
        }

        let details = self.l2.transaction_details(hash).await?;
        if details.status == L2TxStatus::Failed {
            record.info.failed = true;
        }
        record.info.completed = true;
        Ok(record)
    }
}

/// L2 hash of the priority request a deposit's L1 receipt enqueued.
pub fn extract_l2_hash(receipt: &ReceiptSummary) -> PortalResult<TxHash> {
    receipt
        .logs
        .iter()
        .find_map(|log| NewPriorityRequest::decode_log_data(&log.data).ok())
        .map(|event| event.txHash)
        .ok_or_else(|| {
            PortalError::InvariantViolation(format!(
                "failed to extract L2 hash from receipt of {}",
                receipt.transaction_hash
            ))
        })
}

impl std::fmt::Debug for TransactionStatusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStatusTracker")
            .field("network", &self.network)
            .field("has_l1", &self.l1.is_some())
            .field("config", &self.config)
            .finish()
    }
}
