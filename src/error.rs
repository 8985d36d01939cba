//! Portal-level error taxonomy.
//!
//! Component boundaries convert transport errors into [`PortalError`] so that
//! callers above the core only ever observe these kinds.

use thiserror::Error;

use crate::blockchain::types::BlockchainError;

/// Classification of every failure the portal surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Included on-chain but reverted. Terminal, recorded, never retried.
    ChainRevert,
    /// Timeout, dropped connection, unavailable node. Retry at a higher layer.
    InfraTransient,
    /// Destination or signer failed validation before any signature request.
    ValidationFailure,
    /// The session expired; requests are gated until re-authentication.
    AuthExpired,
    /// The wallet declined to sign.
    UserCancelled,
    /// The operation can never succeed, retrying cannot change the outcome.
    InvariantViolation,
}

impl ErrorKind {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ChainRevert => "chain_revert",
            ErrorKind::InfraTransient => "infra_transient",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::AuthExpired => "auth_expired",
            ErrorKind::UserCancelled => "user_cancelled",
            ErrorKind::InvariantViolation => "invariant_violation",
        }
    }
}

/// Errors returned by the portal components.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Transaction reverted: {0}")]
    ChainRevert(String),

    #[error("Network error: {0}")]
    InfraTransient(String),

    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    #[error("Authentication expired: {0}")]
    AuthExpired(String),

    #[error("Cancelled by user: {0}")]
    UserCancelled(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Tracking stopped before the record became terminal (cancellation or
    /// attempt ceiling).
    #[error("Tracking interrupted: {0}")]
    Interrupted(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PortalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortalError::ChainRevert(_) => ErrorKind::ChainRevert,
            PortalError::InfraTransient(_)
            | PortalError::Interrupted(_)
            | PortalError::Storage(_) => ErrorKind::InfraTransient,
            PortalError::ValidationFailure(_) => ErrorKind::ValidationFailure,
            PortalError::AuthExpired(_) => ErrorKind::AuthExpired,
            PortalError::UserCancelled(_) => ErrorKind::UserCancelled,
            PortalError::InvariantViolation(_) | PortalError::Config(_) => {
                ErrorKind::InvariantViolation
            }
        }
    }

    /// Whether re-invoking the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InfraTransient | ErrorKind::AuthExpired
        )
    }
}

impl From<BlockchainError> for PortalError {
    fn from(err: BlockchainError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::ChainRevert => PortalError::ChainRevert(message),
            ErrorKind::InfraTransient => PortalError::InfraTransient(message),
            ErrorKind::ValidationFailure => PortalError::ValidationFailure(message),
            ErrorKind::AuthExpired => PortalError::AuthExpired(message),
            ErrorKind::UserCancelled => PortalError::UserCancelled(message),
            ErrorKind::InvariantViolation => PortalError::InvariantViolation(message),
        }
    }
}

/// Result type for portal operations.
pub type PortalResult<T> = Result<T, PortalError>;
