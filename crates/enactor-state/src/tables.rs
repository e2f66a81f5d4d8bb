//! redb table definitions for the enactor state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).

use redb::TableDefinition;

/// Infrastructure records (topology + started flag) keyed by `{infra_id}`.
pub const INFRASTRUCTURES: TableDefinition<&str, &[u8]> = TableDefinition::new("infrastructures");

/// Observed instances keyed by `{infra_id}:{node_type}:{node_id}`.
pub const INSTANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");

/// Archived failed instances keyed by `{infra_id}:{node_id}`.
pub const FAILED_NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("failed_nodes");

/// Scaling request queues keyed by `{infra_id}:{node_type}`.
pub const SCALING: TableDefinition<&str, &[u8]> = TableDefinition::new("scaling");
