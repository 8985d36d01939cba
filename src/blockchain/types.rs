//! Chain-specific types and error definitions.

use alloy::primitives::{Address, Log, TxHash};
use alloy::rpc::types::TransactionReceipt;
use alloy::transports::{RpcError, TransportError, TransportErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// JSON-RPC code wallets use when the user declines a request (EIP-1193).
pub const USER_REJECTED_CODE: i64 = 4001;

/// JSON-RPC code nodes use for `execution reverted`.
pub const EXECUTION_REVERTED_CODE: i64 = 3;

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// The node answered with a JSON-RPC error, or the client failed without a
    /// transport-level cause.
    #[error("RPC error: {message}")]
    Rpc { code: Option<i64>, message: String },

    /// The endpoint answered with a non-success HTTP status.
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// The endpoint rejected the request for lack of a valid session.
    #[error("RPC request forbidden: session is not authorized")]
    Forbidden,

    /// The request was not sent because the session already expired.
    #[error("Request aborted due to authentication expiry")]
    AuthExpired,

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Every configured endpoint failed.
    #[error("All RPC providers failed to {0}")]
    Unavailable(String),

    /// No receipt appeared within the wait window.
    #[error("Receipt for {0} not available after {1} seconds")]
    ReceiptTimeout(TxHash, u64),

    /// Transaction was reverted on-chain.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Signer failure unrelated to the user.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// The user declined to sign.
    #[error("User rejected the request: {0}")]
    UserRejected(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// A response or log could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Blockchain client not initialized or disabled.
    #[error("Blockchain not available: {0}")]
    NotAvailable(String),
}

impl BlockchainError {
    /// Structured classification into the portal error taxonomy.
    ///
    /// Uncoded `Rpc` errors are reported as transient here; callers that need
    /// the textual fallback use [`crate::tracker::classify`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockchainError::Rpc { code: Some(code), message } => {
                if *code == USER_REJECTED_CODE {
                    ErrorKind::UserCancelled
                } else if *code == EXECUTION_REVERTED_CODE || message.contains("execution reverted") {
                    ErrorKind::ChainRevert
                } else {
                    ErrorKind::InfraTransient
                }
            }
            BlockchainError::Rpc { code: None, .. } => ErrorKind::InfraTransient,
            BlockchainError::Http { .. } => ErrorKind::InfraTransient,
            BlockchainError::Forbidden | BlockchainError::AuthExpired => ErrorKind::AuthExpired,
            BlockchainError::Timeout(_)
            | BlockchainError::Unavailable(_)
            | BlockchainError::ReceiptTimeout(..)
            | BlockchainError::NotAvailable(_) => ErrorKind::InfraTransient,
            BlockchainError::Reverted(_) => ErrorKind::ChainRevert,
            BlockchainError::UserRejected(_) => ErrorKind::UserCancelled,
            BlockchainError::Wallet(_) => ErrorKind::ValidationFailure,
            BlockchainError::ChainMismatch { .. } | BlockchainError::Decode(_) => {
                ErrorKind::InvariantViolation
            }
        }
    }

    /// Whether a failover endpoint could serve the same request.
    pub(crate) fn is_endpoint_failure(&self) -> bool {
        matches!(
            self,
            BlockchainError::Rpc { code: None, .. }
                | BlockchainError::Http { .. }
                | BlockchainError::Timeout(_)
        )
    }
}

impl From<TransportError> for BlockchainError {
    fn from(err: TransportError) -> Self {
        match &err {
            RpcError::ErrorResp(payload) if payload.code == USER_REJECTED_CODE => {
                BlockchainError::UserRejected(payload.message.to_string())
            }
            RpcError::ErrorResp(payload) => BlockchainError::Rpc {
                code: Some(payload.code),
                message: payload.message.to_string(),
            },
            RpcError::Transport(TransportErrorKind::HttpError(http)) if http.status == 403 => {
                BlockchainError::Forbidden
            }
            RpcError::Transport(TransportErrorKind::HttpError(http)) => BlockchainError::Http {
                status: http.status,
                body: http.body.clone(),
            },
            RpcError::DeserError { .. } | RpcError::SerError(_) => {
                BlockchainError::Decode(err.to_string())
            }
            _ => BlockchainError::Rpc {
                code: None,
                message: err.to_string(),
            },
        }
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// The parts of a transaction receipt the portal relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptSummary {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    /// `true` when execution succeeded, `false` when it reverted.
    pub status: bool,
    pub from: Address,
    pub logs: Vec<Log>,
}

impl ReceiptSummary {
    /// Whether the transaction was included but reverted.
    pub fn reverted(&self) -> bool {
        !self.status
    }
}

impl From<&TransactionReceipt> for ReceiptSummary {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            status: receipt.status(),
            from: receipt.from,
            logs: receipt.inner.logs().iter().map(|log| log.inner.clone()).collect(),
        }
    }
}

/// L2 processing status reported by `zks_getTransactionDetails`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum L2TxStatus {
    Pending,
    Included,
    Verified,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Subset of `zks_getTransactionDetails`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    pub status: L2TxStatus,
    #[serde(default)]
    pub eth_commit_tx_hash: Option<TxHash>,
    #[serde(default)]
    pub eth_execute_tx_hash: Option<TxHash>,
}

impl TransactionDetails {
    pub fn with_status(status: L2TxStatus) -> Self {
        Self {
            status,
            eth_commit_tx_hash: None,
            eth_execute_tx_hash: None,
        }
    }
}

/// Default bridge contracts reported by `zks_getBridgeContracts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeAddresses {
    #[serde(default)]
    pub l1_shared_default_bridge: Option<Address>,
    #[serde(default)]
    pub l2_shared_default_bridge: Option<Address>,
    #[serde(default)]
    pub l1_erc20_default_bridge: Option<Address>,
    #[serde(default)]
    pub l2_erc20_default_bridge: Option<Address>,
}

/// Arguments of the L1 shared bridge finalization predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizationParams {
    pub chain_id: u64,
    pub l1_batch_number: u64,
    pub l2_message_index: u64,
}

/// How a pending transaction was superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementReason {
    /// Same call resubmitted with a higher fee.
    Repriced,
    /// Zero-value self-send that voids the original nonce.
    Cancelled,
    /// A different transaction took the nonce.
    Replaced,
}

/// Notification that the watched transaction was superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replacement {
    pub reason: ReplacementReason,
    pub replaced: TxHash,
    pub transaction: TxHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_conversion() {
        let chain_id = ChainId::from(1u64);
        assert_eq!(chain_id.0, 1);
        assert_eq!(u64::from(chain_id), 1);
    }

    #[test]
    fn test_error_display() {
        let err = BlockchainError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");

        let err = BlockchainError::Unavailable("get receipt".to_string());
        assert_eq!(err.to_string(), "All RPC providers failed to get receipt");
    }

    #[test]
    fn test_structured_kind() {
        let rejected = BlockchainError::Rpc {
            code: Some(USER_REJECTED_CODE),
            message: "denied".into(),
        };
        assert_eq!(rejected.kind(), ErrorKind::UserCancelled);

        let reverted = BlockchainError::Rpc {
            code: Some(EXECUTION_REVERTED_CODE),
            message: "execution reverted".into(),
        };
        assert_eq!(reverted.kind(), ErrorKind::ChainRevert);

        let limited = BlockchainError::Rpc {
            code: Some(-32005),
            message: "limit exceeded".into(),
        };
        assert_eq!(limited.kind(), ErrorKind::InfraTransient);

        assert_eq!(BlockchainError::Forbidden.kind(), ErrorKind::AuthExpired);
        assert_eq!(
            BlockchainError::Decode("bad log".into()).kind(),
            ErrorKind::InvariantViolation
        );
    }

    #[test]
    fn test_details_deserialize_unknown_status() {
        let details: TransactionDetails =
            serde_json::from_str(r#"{"status":"verified","isL1Originated":false}"#).unwrap();
        assert_eq!(details.status, L2TxStatus::Verified);

        let details: TransactionDetails = serde_json::from_str(r#"{"status":"mystery"}"#).unwrap();
        assert_eq!(details.status, L2TxStatus::Unknown);
    }
}
