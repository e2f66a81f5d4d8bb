pub mod config;
pub mod instruction;
pub mod topology;
pub mod types;

pub use config::{DownscaleKind, EnactorConfig, UpkeepKind};
pub use instruction::{Batch, Delta, Instruction};
pub use topology::{Topology, TopologyError};
pub use types::*;
