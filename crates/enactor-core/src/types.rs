//! Domain types shared by every enactor component.
//!
//! Node types are the static side of an infrastructure (what should exist),
//! instances and [`DynamicState`] are the observed side (what does exist).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of an infrastructure instance.
pub type InfraId = String;

/// Identifier of a single running node.
pub type NodeId = String;

// ── Node types ────────────────────────────────────────────────────

/// A named class of nodes with shared scaling bounds and dependencies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeType {
    pub name: String,
    /// Names of the node types that must exist before this one is created.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub scaling: ScalingBounds,
}

impl NodeType {
    pub fn new(name: &str, min: u32, max: u32) -> Self {
        Self {
            name: name.to_string(),
            dependencies: Vec::new(),
            scaling: ScalingBounds { min, max },
        }
    }

    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }
}

/// Configured min/max instance counts, as declared.
///
/// Values are kept verbatim; correcting a misconfiguration (`min = 0`,
/// `max < min`) is the scaling policy's job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawScalingBounds")]
pub struct ScalingBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for ScalingBounds {
    fn default() -> Self {
        Self { min: 1, max: 1 }
    }
}

#[derive(Deserialize)]
struct RawScalingBounds {
    min: Option<u32>,
    max: Option<u32>,
}

impl From<RawScalingBounds> for ScalingBounds {
    fn from(raw: RawScalingBounds) -> Self {
        let min = raw.min.unwrap_or(1);
        Self {
            min,
            max: raw.max.unwrap_or(min),
        }
    }
}

// ── Instances ─────────────────────────────────────────────────────

/// Lifecycle state of a node instance, as reported by the execution side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Ready,
    Fail,
    Shutdown,
    Unknown,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeState::Pending => "pending",
            NodeState::Ready => "ready",
            NodeState::Fail => "fail",
            NodeState::Shutdown => "shutdown",
            NodeState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Network address of an instance: a single address or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum NetworkAddress {
    Single(String),
    Many(Vec<String>),
}

impl Default for NetworkAddress {
    fn default() -> Self {
        NetworkAddress::Many(Vec::new())
    }
}

impl NetworkAddress {
    /// All addresses, in declaration order.
    pub fn addresses(&self) -> Vec<&str> {
        match self {
            NetworkAddress::Single(a) => vec![a.as_str()],
            NetworkAddress::Many(list) => list.iter().map(String::as_str).collect(),
        }
    }

    /// Whether `addr` is one of this instance's addresses.
    pub fn contains(&self, addr: &str) -> bool {
        match self {
            NetworkAddress::Single(a) => a == addr,
            NetworkAddress::Many(list) => list.iter().any(|a| a == addr),
        }
    }
}

/// A running (or recently stopped) node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instance {
    pub node_id: NodeId,
    /// Name of the node type this instance belongs to.
    pub node_type: String,
    pub infra_id: InfraId,
    pub state: NodeState,
    #[serde(default)]
    pub address: NetworkAddress,
    /// Unix timestamp (seconds) when the instance was started.
    pub started_at: u64,
}

impl Instance {
    /// Build the composite key used by the instances table.
    pub fn table_key(&self) -> String {
        format!("{}:{}:{}", self.infra_id, self.node_type, self.node_id)
    }
}

// ── Dynamic state ─────────────────────────────────────────────────

/// Observed instances of an infrastructure: node type → node id → instance.
///
/// A snapshot, not the authoritative record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DynamicState(BTreeMap<String, BTreeMap<NodeId, Instance>>);

impl DynamicState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: Instance) {
        self.0
            .entry(instance.node_type.clone())
            .or_default()
            .insert(instance.node_id.clone(), instance);
    }

    pub fn remove(&mut self, node_type: &str, node_id: &str) -> Option<Instance> {
        self.0.get_mut(node_type)?.remove(node_id)
    }

    /// Instances of one node type. Absent node types have none.
    pub fn instances(&self, node_type: &str) -> Vec<&Instance> {
        self.0
            .get(node_type)
            .map(|m| m.values().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, node_type: &str) -> usize {
        self.0.get(node_type).map_or(0, |m| m.len())
    }

    pub fn contains(&self, node_type: &str, node_id: &str) -> bool {
        self.0
            .get(node_type)
            .is_some_and(|m| m.contains_key(node_id))
    }

    /// Find the node id of the instance of `node_type` listening on `addr`.
    pub fn find_by_address(&self, node_type: &str, addr: &str) -> Option<&NodeId> {
        self.0
            .get(node_type)?
            .values()
            .find(|i| i.address.contains(addr))
            .map(|i| &i.node_id)
    }

    /// Iterate over every instance of every node type.
    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.0.values().flat_map(|m| m.values())
    }

    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn total(&self) -> usize {
        self.0.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl FromIterator<Instance> for DynamicState {
    fn from_iter<I: IntoIterator<Item = Instance>>(iter: I) -> Self {
        let mut state = DynamicState::new();
        for instance in iter {
            state.insert(instance);
        }
        state
    }
}
