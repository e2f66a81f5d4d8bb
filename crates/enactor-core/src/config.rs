//! enactor.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::topology::{Topology, TopologyError};
use crate::types::NodeType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnactorConfig {
    #[serde(default)]
    pub enactor: EnactorSection,
    pub infrastructure: InfrastructureConfig,
}

/// Strategy selection and pass cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnactorSection {
    #[serde(default)]
    pub downscale_strategy: DownscaleKind,
    #[serde(default)]
    pub upkeep_strategy: UpkeepKind,
    #[serde(default = "default_pass_interval")]
    pub pass_interval_secs: u64,
}

impl Default for EnactorSection {
    fn default() -> Self {
        Self {
            downscale_strategy: DownscaleKind::default(),
            upkeep_strategy: UpkeepKind::default(),
            pass_interval_secs: default_pass_interval(),
        }
    }
}

fn default_pass_interval() -> u64 {
    10
}

/// Which instances to kill when a node type shrinks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownscaleKind {
    /// Sort by start time ascending, drop the trailing ones.
    #[default]
    Simple,
    /// Uniform sample without replacement.
    Random,
}

/// How the observed state is cleaned before a pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpkeepKind {
    /// Use the raw state as-is.
    #[default]
    Noop,
    /// Remove failed and shut-down instances, archiving failures.
    Basic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfrastructureConfig {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeType>,
}

impl EnactorConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EnactorConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Level the configured node types into a topology.
    pub fn topology(&self) -> Result<Topology, TopologyError> {
        let infra = &self.infrastructure;
        Topology::from_nodes(
            &infra.id,
            infra.name.as_deref().unwrap_or(&infra.id),
            infra.nodes.clone(),
        )
    }
}
