//! Static description of an infrastructure: node types grouped into
//! topological levels.
//!
//! Every dependency of a node type lives in a strictly earlier level, so
//! creating level `k` never has to wait on anything in level `k + 1`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

use crate::types::{InfraId, NodeType};

/// Errors detected while levelling or validating a topology.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("duplicate node type: {0}")]
    DuplicateNode(String),

    #[error("node type {node} depends on unknown node type {dependency}")]
    UnknownDependency { node: String, dependency: String },

    #[error("dependency cycle among node types: {0:?}")]
    Cycle(Vec<String>),

    #[error("node type {node} (level {level}) depends on {dependency} which is not in an earlier level")]
    LevelOrder {
        node: String,
        level: usize,
        dependency: String,
    },
}

/// Desired state of one infrastructure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topology {
    pub infra_id: InfraId,
    pub name: String,
    /// Node types grouped by level; level 0 has no dependencies.
    pub levels: Vec<Vec<NodeType>>,
}

impl Topology {
    /// Level a flat list of node types by their dependencies.
    ///
    /// Each node type lands on `1 + max(level of its dependencies)`.
    /// Inside a level node types are ordered by name.
    pub fn from_nodes(
        infra_id: &str,
        name: &str,
        nodes: Vec<NodeType>,
    ) -> Result<Self, TopologyError> {
        let mut by_name: BTreeMap<String, NodeType> = BTreeMap::new();
        for node in nodes {
            if by_name.contains_key(&node.name) {
                return Err(TopologyError::DuplicateNode(node.name));
            }
            by_name.insert(node.name.clone(), node);
        }

        for node in by_name.values() {
            for dep in &node.dependencies {
                if !by_name.contains_key(dep) {
                    return Err(TopologyError::UnknownDependency {
                        node: node.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        // Kahn-style relaxation: a node is placed once all its
        // dependencies are placed.
        let mut level_of: HashMap<String, usize> = HashMap::new();
        while level_of.len() < by_name.len() {
            let mut progressed = false;
            for node in by_name.values() {
                if level_of.contains_key(&node.name) {
                    continue;
                }
                let dep_levels: Option<Vec<usize>> = node
                    .dependencies
                    .iter()
                    .map(|d| level_of.get(d).copied())
                    .collect();
                if let Some(dep_levels) = dep_levels {
                    let level = dep_levels.into_iter().map(|l| l + 1).max().unwrap_or(0);
                    level_of.insert(node.name.clone(), level);
                    progressed = true;
                }
            }
            if !progressed {
                let stuck = by_name
                    .keys()
                    .filter(|n| !level_of.contains_key(*n))
                    .cloned()
                    .collect();
                return Err(TopologyError::Cycle(stuck));
            }
        }

        let depth = level_of.values().copied().max().map_or(0, |m| m + 1);
        let mut levels: Vec<Vec<NodeType>> = vec![Vec::new(); depth];
        for (node_name, node) in by_name {
            levels[level_of[&node_name]].push(node);
        }

        Ok(Self {
            infra_id: infra_id.to_string(),
            name: name.to_string(),
            levels,
        })
    }

    /// Check that every dependency sits in a strictly earlier level.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for (level, nodes) in self.levels.iter().enumerate() {
            for node in nodes {
                for dep in &node.dependencies {
                    if !seen.contains(dep.as_str()) {
                        return Err(TopologyError::LevelOrder {
                            node: node.name.clone(),
                            level,
                            dependency: dep.clone(),
                        });
                    }
                }
            }
            for node in nodes {
                if !seen.insert(node.name.as_str()) {
                    return Err(TopologyError::DuplicateNode(node.name.clone()));
                }
            }
        }
        Ok(())
    }

    /// All node types, level by level.
    pub fn node_types(&self) -> impl Iterator<Item = &NodeType> {
        self.levels.iter().flatten()
    }

    pub fn node_type(&self, name: &str) -> Option<&NodeType> {
        self.node_types().find(|n| n.name == name)
    }
}
