//! Destination screening.
//!
//! Every destination passes the account-independent validity rules and the
//! configured screener before the wallet is asked for a signature.

use alloy::primitives::Address;
use async_trait::async_trait;
use std::collections::HashSet;

use crate::config::ScreeningConfig;
use crate::error::{PortalError, PortalResult};

/// Address screening collaborator.
#[async_trait]
pub trait AddressScreener: Send + Sync {
    /// `Ok(())` when funds may be sent to `address`.
    async fn screen(&self, address: Address) -> PortalResult<()>;
}

/// Screener that accepts every address.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl AddressScreener for AllowAll {
    async fn screen(&self, _address: Address) -> PortalResult<()> {
        Ok(())
    }
}

/// Screener backed by a static deny list.
#[derive(Debug, Default, Clone)]
pub struct DenyList {
    denied: HashSet<Address>,
}

impl DenyList {
    pub fn new(denied: impl IntoIterator<Item = Address>) -> Self {
        Self {
            denied: denied.into_iter().collect(),
        }
    }

    pub fn from_config(config: &ScreeningConfig) -> Self {
        Self::new(config.denied_addresses.iter().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.denied.is_empty()
    }
}

#[async_trait]
impl AddressScreener for DenyList {
    async fn screen(&self, address: Address) -> PortalResult<()> {
        if self.denied.contains(&address) {
            tracing::warn!(address = %address, "Destination rejected by screening");
            return Err(PortalError::ValidationFailure(format!(
                "destination {} is not allowed",
                address
            )));
        }
        Ok(())
    }
}

/// Structural checks that hold for every destination.
pub fn validate_destination(address: Address) -> PortalResult<()> {
    if address.is_zero() {
        return Err(PortalError::ValidationFailure(
            "destination is the zero address".to_string(),
        ));
    }
    Ok(())
}
