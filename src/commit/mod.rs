//! Transaction submission.
//!
//! # Data Flow
//! ```text
//! TransactionParams + FeeParams
//!     → committer.rs (wallet validation, screening.rs destination checks)
//!     → request builder (transfer / withdrawal / deposit)
//!     → direct: wallet signs and broadcasts
//!       delegated: session client prepares, wallet signs, public endpoint broadcasts
//!     → ledger save (new non-terminal record)
//! ```

pub mod committer;
pub mod screening;

pub use committer::{
    CommitStatus, FeeParams, SubmissionPath, TransactionCommitter, TransactionParams,
    TransactionResult,
};
pub use screening::{validate_destination, AddressScreener, AllowAll, DenyList};
