//! Persisted record types for the enactor state store.
//!
//! Observed instances reuse [`enactor_core::Instance`] directly; the types
//! here cover what only the store knows about: infrastructure bookkeeping,
//! the failure archive, and scaling request queues.

use serde::{Deserialize, Serialize};

use enactor_core::{InfraId, Instance, NodeId, Topology};

/// Unique identifier of a queued scaling request.
pub type RequestId = String;

// ── Infrastructure ────────────────────────────────────────────────

/// Registered infrastructure: its desired topology and whether the
/// infrastructure container has been created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfraRecord {
    pub topology: Topology,
    pub started: bool,
    /// Unix timestamp (seconds) when the record was first stored.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last change.
    pub updated_at: u64,
}

impl InfraRecord {
    pub fn infra_id(&self) -> &InfraId {
        &self.topology.infra_id
    }
}

// ── Failure archive ───────────────────────────────────────────────

/// An instance that reached the failed state, kept for post-mortem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedNode {
    pub instance: Instance,
    /// Unix timestamp (seconds) when the instance was archived.
    pub archived_at: u64,
}

impl FailedNode {
    /// Build the composite key for the failed nodes table.
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.instance.infra_id, self.instance.node_id)
    }
}

// ── Scaling queue ─────────────────────────────────────────────────

/// Which instance a drop request wants removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VictimSelector {
    /// A concrete node id.
    NodeId(NodeId),
    /// A network address, resolved to a node id against the live instances.
    Address(String),
    /// No preference; the downscale strategy picks.
    Any,
}

impl VictimSelector {
    /// Interpret a free-form selector: empty means no preference.
    pub fn from_node_id(node_id: &str) -> Self {
        if node_id.is_empty() {
            VictimSelector::Any
        } else {
            VictimSelector::NodeId(node_id.to_string())
        }
    }
}

/// A pending request to grow a node type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateRequest {
    pub id: RequestId,
    /// Number of instances requested.
    pub count: u32,
    pub created_at: u64,
}

/// A pending (or applied, awaiting removal) request to shrink a node type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DropRequest {
    pub id: RequestId,
    pub selector: VictimSelector,
    /// Already subtracted from the target count; the request stays queued
    /// until the named instance is gone.
    #[serde(default)]
    pub applied: bool,
    pub created_at: u64,
}

/// Scaling requests and target count for one `(infra_id, node_type)`.
///
/// Requests are kept in insertion order, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScalingQueue {
    pub target_count: Option<u32>,
    #[serde(default)]
    pub create_requests: Vec<CreateRequest>,
    #[serde(default)]
    pub drop_requests: Vec<DropRequest>,
}

impl ScalingQueue {
    /// Build the composite key for the scaling table.
    pub fn table_key(infra_id: &str, node_type: &str) -> String {
        format!("{infra_id}:{node_type}")
    }

    /// Total number of instances asked for by pending create requests.
    /// Saturates at `u32::MAX`.
    pub fn pending_create_count(&self) -> u32 {
        self.create_requests
            .iter()
            .fold(0u32, |acc, r| acc.saturating_add(r.count))
    }

    pub fn pending_drops(&self) -> impl Iterator<Item = &DropRequest> {
        self.drop_requests.iter().filter(|r| !r.applied)
    }

    pub fn applied_drops(&self) -> impl Iterator<Item = &DropRequest> {
        self.drop_requests.iter().filter(|r| r.applied)
    }

    pub fn is_empty(&self) -> bool {
        self.target_count.is_none()
            && self.create_requests.is_empty()
            && self.drop_requests.is_empty()
    }
}
