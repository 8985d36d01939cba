//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! transport.rs (external handshake, session headers)
//!     → gate.rs (session state + one outstanding "authenticated" signal)
//!         → blockchain::provider (awaits the signal before building a client)
//!
//! RPC rejection (HTTP 403)
//!     → blockchain::client (reports once per client)
//!         → gate.rs on_expiry (fresh unresolved signal, prompt re-opened)
//! ```
//!
//! # Design Decisions
//! - Exactly one unresolved signal exists at a time; it is swapped, never reset
//! - Resolving an already-resolved signal is a no-op
//! - Handshake failures never resolve the signal

pub mod gate;
pub mod transport;

pub use gate::{AuthGate, AuthSession, AuthStep};
pub use transport::{AuthError, AuthTransport, EnvTokenTransport};
