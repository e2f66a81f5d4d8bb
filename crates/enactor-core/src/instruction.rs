//! Instructions issued to the execution side, and the ordered batches
//! ([`Delta`]) they are grouped into.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{InfraId, Instance, NodeType};

/// A request to change the infrastructure. Not a fact until performed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "instruction", rename_all = "snake_case")]
pub enum Instruction {
    CreateInfrastructure { infra_id: InfraId },
    CreateNode { infra_id: InfraId, node_type: NodeType },
    DropNode { instance: Instance },
    DropInfrastructure { infra_id: InfraId },
}

impl Instruction {
    /// Short name of the instruction kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Instruction::CreateInfrastructure { .. } => "create_infrastructure",
            Instruction::CreateNode { .. } => "create_node",
            Instruction::DropNode { .. } => "drop_node",
            Instruction::DropInfrastructure { .. } => "drop_infrastructure",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::CreateInfrastructure { infra_id }
            | Instruction::DropInfrastructure { infra_id } => {
                write!(f, "{{{} -> {}}}", self.kind(), infra_id)
            }
            Instruction::CreateNode { node_type, .. } => {
                write!(f, "{{{} -> {}}}", self.kind(), node_type.name)
            }
            Instruction::DropNode { instance } => {
                write!(f, "{{{} -> {}}}", self.kind(), instance.node_id)
            }
        }
    }
}

/// One batch: instructions without ordering constraints among themselves.
pub type Batch = Vec<Instruction>;

/// Ordered batches produced by a single reconciliation pass.
///
/// Batch 0 bootstraps the infrastructure, batch 1 holds every drop, and
/// each following batch creates the nodes of one topological level.
/// Batch `i + 1` may rely on the effects of batch `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    batches: Vec<Batch>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch, empty or not. Empty batches keep their slot so
    /// batch indices stay meaningful.
    pub fn push(&mut self, batch: Batch) {
        self.batches.push(batch);
    }

    /// All batches, including empty ones.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Batches that would actually be submitted.
    pub fn non_empty(&self) -> impl Iterator<Item = &Batch> {
        self.batches.iter().filter(|b| !b.is_empty())
    }

    pub fn instruction_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// True when the pass has nothing to do.
    pub fn is_empty(&self) -> bool {
        self.instruction_count() == 0
    }

    pub fn into_batches(self) -> Vec<Batch> {
        self.batches
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, batch) in self.batches.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[")?;
            for (j, instr) in batch.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{instr}")?;
            }
            write!(f, "]")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(name: &str) -> Instruction {
        Instruction::CreateNode {
            infra_id: "infra-1".into(),
            node_type: NodeType::new(name, 1, 1),
        }
    }

    #[test]
    fn delta_skips_empty_batches() {
        let mut delta = Delta::new();
        delta.push(vec![Instruction::CreateInfrastructure {
            infra_id: "infra-1".into(),
        }]);
        delta.push(vec![]);
        delta.push(vec![create("a"), create("a")]);

        assert_eq!(delta.batches().len(), 3);
        assert_eq!(delta.non_empty().count(), 2);
        assert_eq!(delta.instruction_count(), 3);
        assert!(!delta.is_empty());
    }

    #[test]
    fn delta_display() {
        let mut delta = Delta::new();
        delta.push(vec![Instruction::CreateInfrastructure {
            infra_id: "infra-1".into(),
        }]);
        delta.push(vec![]);
        delta.push(vec![create("a")]);
        assert_eq!(
            delta.to_string(),
            "[[{create_infrastructure -> infra-1}], [], [{create_node -> a}]]"
        );
    }

    #[test]
    fn delta_can_be_read_twice() {
        let mut delta = Delta::new();
        delta.push(vec![create("a")]);
        assert_eq!(delta.non_empty().count(), 1);
        assert_eq!(delta.non_empty().count(), 1);
    }

    #[test]
    fn instruction_serializes_with_tag() {
        let json = serde_json::to_value(Instruction::DropInfrastructure {
            infra_id: "infra-1".into(),
        })
        .unwrap();
        assert_eq!(json["instruction"], "drop_infrastructure");
        assert_eq!(json["infra_id"], "infra-1");
    }
}
