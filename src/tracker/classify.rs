//! Deposit-path error classification.
//!
//! Structured classification wins; the textual markers only apply to RPC
//! errors that carry no JSON-RPC code.

use crate::blockchain::types::BlockchainError;
use crate::error::ErrorKind;

/// Markers of a transaction-level failure in an uncoded error message.
const SEMANTIC_MARKERS: [&str; 3] = ["transaction", "reverted", "failed"];

/// Whether the error describes the transaction itself rather than the
/// infrastructure used to observe it.
pub fn is_transaction_failure(err: &BlockchainError) -> bool {
    match err {
        BlockchainError::Rpc { code: None, message } => {
            let message = message.to_lowercase();
            SEMANTIC_MARKERS.iter().any(|marker| message.contains(marker))
        }
        other => other.kind() == ErrorKind::ChainRevert,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::EXECUTION_REVERTED_CODE;
    use alloy::primitives::TxHash;

    #[test]
    fn test_structured_revert() {
        let err = BlockchainError::Rpc {
            code: Some(EXECUTION_REVERTED_CODE),
            message: "execution reverted".to_string(),
        };
        assert!(is_transaction_failure(&err));
        assert!(is_transaction_failure(&BlockchainError::Reverted("out of gas".into())));
    }

    #[test]
    fn test_coded_errors_ignore_text() {
        // A rate limit mentioning "transaction" is still infrastructure
        let err = BlockchainError::Rpc {
            code: Some(-32005),
            message: "too many transaction requests".to_string(),
        };
        assert!(!is_transaction_failure(&err));
    }

    #[test]
    fn test_text_fallback_for_uncoded() {
        let err = BlockchainError::Rpc {
            code: None,
            message: "Transaction Failed on node".to_string(),
        };
        assert!(is_transaction_failure(&err));

        let err = BlockchainError::Rpc {
            code: None,
            message: "connection reset by peer".to_string(),
        };
        assert!(!is_transaction_failure(&err));
    }

    #[test]
    fn test_infrastructure_errors() {
        assert!(!is_transaction_failure(&BlockchainError::Timeout(10)));
        assert!(!is_transaction_failure(&BlockchainError::Unavailable(
            "get receipt".into()
        )));
        assert!(!is_transaction_failure(&BlockchainError::ReceiptTimeout(
            TxHash::ZERO,
            300
        )));
        assert!(!is_transaction_failure(&BlockchainError::Forbidden));
    }
}
