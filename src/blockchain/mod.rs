//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Configuration (RPC URLs, chain IDs) + session headers from auth
//!     → client.rs (failover, timeouts, 403 detection, replacement-aware receipt waits)
//!     → rollup.rs (zks_* namespace, bridge address memo)
//!     → provider.rs (lazy client behind the auth gate)
//!
//! Environment Variables (private key)
//!     → wallet.rs (signing, direct submission)
//!
//! abi.rs (contract bindings, system addresses) is shared by all of the above.
//! ```
//!
//! # Design Decisions
//! - Components depend on the traits in rpc.rs, never on a concrete client
//! - Private keys ONLY from environment variables, never logged
//! - All RPC calls have configurable timeouts
//! - Node-level errors are returned immediately, endpoint failures fail over

pub mod abi;
pub mod client;
pub mod provider;
pub mod rollup;
pub mod rpc;
pub mod types;
pub mod wallet;

pub use client::{ClientSettings, EvmClient};
pub use provider::SessionProvider;
pub use rollup::{BridgeRegistry, RollupClient};
pub use rpc::{ChainRpc, RollupRpc};
pub use types::{BlockchainError, BlockchainResult, ChainId, ReceiptSummary};
pub use wallet::{Wallet, WalletSigner};
