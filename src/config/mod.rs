//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PortalConfig (validated, immutable)
//!     → handed to PortalContext, which owns the per-session services
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets (private keys, session tokens) never live in the file; the file
//!   only names the environment variables that hold them

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::AllowanceConfig;
pub use schema::NetworkConfig;
pub use schema::PortalConfig;
pub use schema::ScreeningConfig;
pub use schema::TrackingConfig;
