//! Transaction ledger.
//!
//! # Data Flow
//! ```text
//! TransactionCommitter (new record at submission)
//!     → store.rs save (upsert into the network partition)
//!         → storage.rs (whole snapshot rewritten: JSON file or memory)
//!
//! TransactionStatusTracker (each status step)
//!     → store.rs save/update (wholesale record replacement)
//! ```
//!
//! # Design Decisions
//! - Partitioned by network key; records never migrate between partitions
//! - Hash lookup is case-insensitive, stored case is preserved
//! - Records are never deleted here

pub mod record;
pub mod storage;
pub mod store;

pub use record::{Destination, Party, StatusInfo, TokenAmount, TransactionRecord, TransactionType};
pub use storage::{JsonFileStorage, LedgerError, LedgerSnapshot, LedgerStorage, MemoryStorage};
pub use store::TransactionLedger;
