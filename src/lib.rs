//! Bridge portal library
//!
//! Tracks deposits, withdrawals and transfers between a settlement chain and
//! a rollup, drives spend-allowance approvals, and submits transactions
//! behind an authentication gate.

pub mod config;
pub mod context;
pub mod error;
pub mod observability;
pub mod resilience;

pub mod auth;
pub mod blockchain;
pub mod ledger;

pub mod allowance;
pub mod commit;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use config::PortalConfig;
pub use context::PortalContext;
pub use error::{ErrorKind, PortalError, PortalResult};
