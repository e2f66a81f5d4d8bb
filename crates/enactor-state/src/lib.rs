//! enactor-state: embedded state store for the enactor.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for infrastructure records, observed node instances, the
//! failed-node archive, and per-node-type scaling request queues.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{infra_id}:{node_type}:{node_id}`, `{infra_id}:{node_type}`)
//! enable prefix scans for everything belonging to one infrastructure.
//!
//! Scaling queues are only ever modified through
//! [`StateStore::update_scaling_queue`], which runs the whole
//! read-modify-write inside one write transaction. redb admits a single
//! writer at a time, so concurrent producers and the reconciliation pass
//! never interleave on the same queue.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{StateStore, epoch_secs};
pub use types::*;
