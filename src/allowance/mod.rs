//! Spend-allowance subsystem.
//!
//! # Data Flow
//! ```text
//! token change
//!     → flow.rs refresh (vault assetId → originChainId → ERC-20 allowance)
//!         → predicates: approved / hide / show approval process
//!
//! approve()
//!     → wallet submits IERC20.approve(vault, amount)
//!     → receipt wait (fixed retries, follows replacement hashes)
//!     → allowance re-read, status done
//! ```

pub mod flow;

pub use flow::{AllowanceApprovalFlow, AllowanceState, ApprovalStatus};
