//! Transaction status tracking.
//!
//! # Data Flow
//! ```text
//! TransactionRecord (from the committer or the ledger on resume)
//!     → status.rs resolve (one type-specific step per interval)
//!         → deposit:    L1 receipt → NewPriorityRequest log → L2 receipt
//!         → withdrawal: zks details → finalization predicate on L1
//!         → transfer:   L2 receipt → zks details
//!     → every step result saved to the ledger
//! ```
//!
//! # Design Decisions
//! - Each resolve call is one cancellable poll chain; several chains on the
//!   same record converge through the ledger's early-exit check
//! - Deposit errors are split by classify.rs into transaction failures
//!   (recorded) and infrastructure errors (propagated to the driver)
//! - A failed finalization check never marks a withdrawal failed

pub mod classify;
pub mod status;

pub use classify::is_transaction_failure;
pub use status::{extract_l2_hash, TransactionStatusTracker};
