//! Transaction record model.
//!
//! Serialized in camelCase so persisted ledgers stay readable by other
//! portal front ends.

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PortalError, PortalResult};

/// Estimated time until a deposit lands on L2.
pub const ESTIMATED_DEPOSIT_DELAY_SECS: i64 = 15 * 60;

/// Estimated time until a withdrawal can be finalized on L1.
pub const WITHDRAWAL_DELAY_SECS: i64 = 5 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Transfer,
    Withdrawal,
    Deposit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "transfer",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Deposit => "deposit",
        }
    }

    /// Estimated time to completion, where one is published.
    pub fn expected_delay(&self) -> Option<Duration> {
        match self {
            TransactionType::Deposit => Some(Duration::seconds(ESTIMATED_DEPOSIT_DELAY_SECS)),
            TransactionType::Withdrawal => Some(Duration::seconds(WITHDRAWAL_DELAY_SECS)),
            TransactionType::Transfer => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of the bridge an address lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    L1,
    L2,
}

/// Token identity plus the amount being moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    /// Token address on the chain the transaction was sent to.
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l1_address: Option<Address>,
    pub symbol: String,
    pub decimals: u8,
    /// Amount in base units.
    pub amount: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub address: Address,
    pub destination: Destination,
}

impl Party {
    pub fn new(address: Address, destination: Destination) -> Self {
        Self {
            address,
            destination,
        }
    }
}

/// Mutable status payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    /// Counterpart hash on the destination chain (deposits).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_complete_timestamp: Option<DateTime<Utc>>,
    /// Withdrawal reached a verified batch; never reset once set.
    #[serde(default)]
    pub withdrawal_finalization_available: bool,
    #[serde(default)]
    pub failed: bool,
    pub completed: bool,
}

/// The unit of tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub token: TokenAmount,
    pub from: Party,
    pub to: Party,
    pub transaction_hash: String,
    pub timestamp: DateTime<Utc>,
    pub info: StatusInfo,
}

impl TransactionRecord {
    /// New, non-terminal record stamped with the current time.
    pub fn new(
        kind: TransactionType,
        token: TokenAmount,
        from: Party,
        to: Party,
        transaction_hash: impl Into<String>,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            kind,
            token,
            from,
            to,
            transaction_hash: transaction_hash.into(),
            timestamp,
            info: StatusInfo {
                expected_complete_timestamp: kind.expected_delay().map(|d| timestamp + d),
                ..Default::default()
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.info.completed
    }

    /// Terminal failure; failure always implies completion.
    pub fn mark_failed(&mut self) {
        self.info.failed = true;
        self.info.completed = true;
    }

    /// Case-insensitive hash comparison.
    pub fn hash_matches(&self, hash: &str) -> bool {
        self.transaction_hash.eq_ignore_ascii_case(hash)
    }

    /// Parsed transaction hash.
    pub fn tx_hash(&self) -> PortalResult<TxHash> {
        self.transaction_hash.parse().map_err(|_| {
            PortalError::InvariantViolation(format!(
                "record carries a malformed transaction hash: {}",
                self.transaction_hash
            ))
        })
    }

    /// Whether `account` sent the record, or receives it as a withdrawal.
    pub fn involves(&self, account: Address) -> bool {
        self.from.address == account
            || (self.kind == TransactionType::Withdrawal && self.to.address == account)
    }

    /// Outcome label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match (self.info.completed, self.info.failed) {
            (false, _) => "pending",
            (true, true) => "failed",
            (true, false) => "completed",
        }
    }
}
