//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Confirmation wait (approval receipt, deposit L1 receipt):
//!     → retries.rs (fixed attempts, fixed delay)
//!
//! Status tracking driver hitting an infrastructure error:
//!     → backoff.rs (exponential delay with jitter before resolving again)
//! ```
//!
//! # Design Decisions
//! - Every RPC call has a deadline (enforced in the blockchain client)
//! - Only observations are retried, never submissions
//! - Jittered backoff keeps many resumed records from polling in lockstep

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::RetryPolicy;
