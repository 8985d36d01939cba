//! Session credential transports.
//!
//! A transport performs the external authorization handshake and supplies
//! the headers that authenticated RPC requests carry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Handshake failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication transport not initialized")]
    NotInitialized,

    #[error("Authorization cancelled: {0}")]
    Cancelled(String),

    #[error("Authorization failed: {0}")]
    Handshake(String),
}

/// External authorization handshake.
#[async_trait]
pub trait AuthTransport: Send + Sync {
    /// Run the handshake; resolves once credentials are available.
    async fn authorize(&self) -> Result<(), AuthError>;

    /// Drop the current credentials.
    fn unauthorize(&self);

    /// Whether credentials are currently held.
    fn is_authorized(&self) -> bool;

    /// Headers for authenticated requests, empty when unauthorized.
    fn auth_headers(&self) -> HashMap<String, String>;
}

/// Bearer token read from an environment variable at handshake time.
#[derive(Debug)]
pub struct EnvTokenTransport {
    env_var: String,
    token: RwLock<Option<String>>,
}

impl EnvTokenTransport {
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            token: RwLock::new(None),
        }
    }
}

#[async_trait]
impl AuthTransport for EnvTokenTransport {
    async fn authorize(&self) -> Result<(), AuthError> {
        let token = std::env::var(&self.env_var).map_err(|_| {
            AuthError::Handshake(format!("Environment variable {} not set", self.env_var))
        })?;
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Cancelled(format!(
                "{} is empty, no session token provided",
                self.env_var
            )));
        }

        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn unauthorize(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn is_authorized(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn auth_headers(&self) -> HashMap<String, String> {
        let token = self.token.read().unwrap_or_else(PoisonError::into_inner);
        token
            .iter()
            .map(|t| ("Authorization".to_string(), format!("Bearer {}", t)))
            .collect()
    }
}
