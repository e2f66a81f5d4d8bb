//! enactor-upkeep: observed-state sanitation for the enactor.
//!
//! Runs once at the start of every reconciliation pass so the engine never
//! counts a dead instance as existing.
//!
//! # Architecture
//!
//! ```text
//! StateUpkeep
//!   ├── StateStore::get_raw_state() → DynamicState
//!   ├── sanitize() → clean / failed / removed
//!   ├── StateStore::store_failed_nodes(failed)
//!   └── StateStore::remove_nodes(removed)
//! ```
//!
//! The `noop` strategy hands the raw snapshot through untouched; `basic`
//! performs the full sanitation above.

pub mod error;
pub mod sanitizer;
pub mod upkeep;

pub use error::{UpkeepError, UpkeepResult};
pub use sanitizer::{SanitizeOutcome, is_failed, is_shutdown, sanitize};
pub use upkeep::StateUpkeep;
