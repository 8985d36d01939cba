//! Authentication gate.
//!
//! Holds the session state and the single outstanding "authenticated"
//! signal. Callers suspend on [`AuthGate::wait_for_authentication`] until the
//! handshake succeeds; expiry and logout swap in a fresh unresolved signal so
//! later callers block again.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

use crate::auth::transport::{AuthError, AuthTransport};
use crate::observability::metrics;

/// Message shown when the user aborts the handshake.
pub const CANCELLED_BY_USER: &str = "Authentication cancelled by user";

/// Which part of the two-step login is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStep {
    /// Provider-level handshake pending.
    #[default]
    Provider,
    /// Provider auth done, wallet interaction unblocked.
    Wallet,
}

/// Observable session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSession {
    pub is_authenticated: bool,
    pub is_authenticating: bool,
    pub auth_error: Option<String>,
    pub step: AuthStep,
    pub prompt_open: bool,
}

/// Gate in front of RPC access for networks that require a session.
pub struct AuthGate {
    transport: Option<Arc<dyn AuthTransport>>,
    requires_auth: AtomicBool,
    session: Mutex<AuthSession>,
    signal: ArcSwap<watch::Sender<bool>>,
}

fn unresolved_signal() -> Arc<watch::Sender<bool>> {
    Arc::new(watch::channel(false).0)
}

impl AuthGate {
    /// Create the gate and pick up any session the transport already holds.
    pub fn new(transport: Option<Arc<dyn AuthTransport>>, requires_auth: bool) -> Self {
        let gate = Self {
            transport,
            requires_auth: AtomicBool::new(requires_auth),
            session: Mutex::new(AuthSession::default()),
            signal: ArcSwap::new(unresolved_signal()),
        };
        if !gate.check_status() && requires_auth {
            gate.open_prompt();
        }
        gate
    }

    /// Gate for networks without access control: already resolved.
    pub fn open() -> Self {
        let gate = Self::new(None, false);
        gate.resolve();
        gate
    }

    /// Run the external handshake.
    ///
    /// Returns `Ok(false)` when the handshake failed; the reason is kept in
    /// [`AuthSession::auth_error`].
    pub async fn authenticate(&self) -> Result<bool, AuthError> {
        let transport = self.transport.as_ref().ok_or(AuthError::NotInitialized)?;

        {
            let mut session = self.lock();
            session.is_authenticating = true;
            session.auth_error = None;
        }

        let outcome = transport.authorize().await;

        let mut session = self.lock();
        session.is_authenticating = false;
        match outcome {
            Ok(()) => {
                session.is_authenticated = true;
                session.step = AuthStep::Wallet;
                drop(session);
                self.resolve();
                tracing::info!("Authentication succeeded");
                Ok(true)
            }
            Err(e) => {
                let message = e.to_string();
                session.auth_error = Some(if message.contains("cancelled") {
                    CANCELLED_BY_USER.to_string()
                } else {
                    message
                });
                session.is_authenticated = false;
                tracing::warn!(error = %e, "Authentication failed");
                Ok(false)
            }
        }
    }

    /// Drop the session and re-arm the signal.
    pub fn logout(&self) {
        if let Some(transport) = &self.transport {
            transport.unauthorize();
        }
        {
            let mut session = self.lock();
            session.is_authenticated = false;
            session.step = AuthStep::Provider;
            session.auth_error = None;
        }
        self.rearm();
        tracing::info!("Logged out");
    }

    /// Re-validate an existing session; resolves the signal when valid.
    pub fn check_status(&self) -> bool {
        let authorized = self
            .transport
            .as_ref()
            .is_some_and(|t| t.is_authorized());

        {
            let mut session = self.lock();
            session.is_authenticated = authorized;
            if authorized {
                session.step = AuthStep::Wallet;
            }
        }
        if authorized {
            self.resolve();
        }
        authorized
    }

    /// Called by the RPC layer when a request was rejected as unauthorized.
    pub fn on_expiry(&self) {
        {
            let mut session = self.lock();
            session.is_authenticated = false;
            session.step = AuthStep::Provider;
        }
        self.rearm();
        metrics::record_auth_expiry();
        tracing::warn!("Session expired, requests are gated until re-authentication");

        if self.requires_auth() {
            self.open_prompt();
        }
    }

    /// Suspend until the current signal resolves.
    ///
    /// A waiter whose signal was replaced moves on to the new one.
    pub async fn wait_for_authentication(&self) {
        loop {
            let mut receiver = self.signal.load().subscribe();
            if receiver.wait_for(|resolved| *resolved).await.is_ok() {
                return;
            }
        }
    }

    /// Whether the current signal is resolved.
    pub fn is_resolved(&self) -> bool {
        *self.signal.load().borrow()
    }

    pub fn session(&self) -> AuthSession {
        self.lock().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth.load(Ordering::SeqCst)
    }

    /// Update the requirement when the selected network changes.
    pub fn set_requires_auth(&self, requires_auth: bool) {
        self.requires_auth.store(requires_auth, Ordering::SeqCst);
        if requires_auth && !self.is_authenticated() {
            self.open_prompt();
        }
    }

    /// Session headers for authenticated requests.
    pub fn auth_headers(&self) -> HashMap<String, String> {
        self.transport
            .as_ref()
            .map(|t| t.auth_headers())
            .unwrap_or_default()
    }

    pub fn open_prompt(&self) {
        let mut session = self.lock();
        session.prompt_open = true;
        session.step = AuthStep::Provider;
    }

    pub fn close_prompt(&self) {
        let mut session = self.lock();
        session.prompt_open = false;
        session.auth_error = None;
    }

    pub fn reset_step(&self) {
        self.lock().step = AuthStep::Provider;
    }

    fn resolve(&self) {
        // Resolving twice is a no-op
        self.signal.load().send_replace(true);
    }

    fn rearm(&self) {
        self.signal.store(unresolved_signal());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AuthSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("requires_auth", &self.requires_auth())
            .field("session", &self.session())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
