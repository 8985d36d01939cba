//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (selected network exists)
//! - Validate value ranges (intervals > 0, URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PortalConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::{NetworkConfig, PortalConfig, StorageBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &PortalConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.networks.is_empty() {
        errors.push(ValidationError::new("networks", "at least one network is required"));
    }

    let mut keys = HashSet::new();
    for (i, network) in config.networks.iter().enumerate() {
        if !keys.insert(network.key.as_str()) {
            errors.push(ValidationError::new(
                format!("networks[{}].key", i),
                format!("duplicate network key '{}'", network.key),
            ));
        }
        validate_network(i, network, &mut errors);
    }

    if let Some(selected) = &config.selected_network {
        if config.network(selected).is_none() {
            errors.push(ValidationError::new(
                "selected_network",
                format!("unknown network '{}'", selected),
            ));
        }
    }

    if config.rpc.timeout_secs == 0 {
        errors.push(ValidationError::new("rpc.timeout_secs", "must be greater than 0"));
    }
    if config.rpc.receipt_poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "rpc.receipt_poll_interval_ms",
            "must be greater than 0",
        ));
    }

    let tracking = &config.tracking;
    for (field, value) in [
        ("tracking.deposit_interval_ms", tracking.deposit_interval_ms),
        ("tracking.withdrawal_interval_ms", tracking.withdrawal_interval_ms),
        ("tracking.transfer_interval_ms", tracking.transfer_interval_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }
    if tracking.max_attempts == Some(0) {
        errors.push(ValidationError::new("tracking.max_attempts", "must be greater than 0 when set"));
    }
    if tracking.l1_receipt_retries == 0 {
        errors.push(ValidationError::new("tracking.l1_receipt_retries", "must be at least 1"));
    }
    if tracking.transient_base_delay_ms > tracking.transient_max_delay_ms {
        errors.push(ValidationError::new(
            "tracking.transient_base_delay_ms",
            "must not exceed transient_max_delay_ms",
        ));
    }

    if config.allowance.receipt_retries == 0 {
        errors.push(ValidationError::new("allowance.receipt_retries", "must be at least 1"));
    }

    if config.storage.backend == StorageBackend::File && config.storage.path.trim().is_empty() {
        errors.push(ValidationError::new("storage.path", "required for the file backend"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_network(index: usize, network: &NetworkConfig, errors: &mut Vec<ValidationError>) {
    let prefix = format!("networks[{}]", index);

    if network.key.trim().is_empty() {
        errors.push(ValidationError::new(format!("{}.key", prefix), "must not be empty"));
    }
    check_url(&format!("{}.rpc_url", prefix), &network.rpc_url, errors);
    for (j, url) in network.failover_urls.iter().enumerate() {
        check_url(&format!("{}.failover_urls[{}]", prefix, j), url, errors);
    }

    if let Some(l1) = &network.l1 {
        check_url(&format!("{}.l1.rpc_url", prefix), &l1.rpc_url, errors);
        if l1.chain_id == network.chain_id {
            errors.push(ValidationError::new(
                format!("{}.l1.chain_id", prefix),
                "must differ from the L2 chain id",
            ));
        }
    }

    if let Some(delegated) = &network.delegated {
        check_url(
            &format!("{}.delegated.public_rpc_url", prefix),
            &delegated.public_rpc_url,
            errors,
        );
    }

    if network.requires_auth && network.auth_token_env.is_none() {
        errors.push(ValidationError::new(
            format!("{}.auth_token_env", prefix),
            "required when requires_auth is set",
        ));
    }
}

fn check_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    if let Err(e) = value.parse::<url::Url>() {
        errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e)));
    }
}
