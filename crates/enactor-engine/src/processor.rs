//! The execution seam: whoever actually performs instructions.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info};

use enactor_core::{Batch, Instance, Instruction, NetworkAddress, NodeState};
use enactor_state::{StateStore, epoch_secs};

/// Boxed future returned by [`InfraProcessor::push_instructions`].
pub type PushFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Receives the non-empty batches of a delta, in order.
///
/// Instructions within a batch may be performed concurrently. Returning
/// means the batch has been issued; outcomes show up in the dynamic state
/// read by later passes.
pub trait InfraProcessor: Send + Sync {
    fn push_instructions(&self, batch: Batch) -> PushFuture<'_>;
}

/// Performs instructions directly against the state store: nodes become
/// `Ready` the moment they are created.
#[derive(Clone)]
pub struct LocalProcessor {
    state: StateStore,
}

impl LocalProcessor {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    fn perform(&self, instruction: Instruction) -> anyhow::Result<()> {
        match instruction {
            Instruction::CreateInfrastructure { infra_id } => {
                self.state.set_infrastructure_started(&infra_id, true)?;
                info!(%infra_id, "infrastructure created");
            }
            Instruction::CreateNode { infra_id, node_type } => {
                let instance = Instance {
                    node_id: uuid::Uuid::new_v4().to_string(),
                    node_type: node_type.name,
                    infra_id,
                    state: NodeState::Ready,
                    address: NetworkAddress::default(),
                    started_at: epoch_secs(),
                };
                self.state.register_instance(&instance)?;
                debug!(node_type = %instance.node_type, node_id = %instance.node_id, "node created");
            }
            Instruction::DropNode { instance } => {
                self.state.remove_instance(&instance)?;
                debug!(node_type = %instance.node_type, node_id = %instance.node_id, "node dropped");
            }
            Instruction::DropInfrastructure { infra_id } => {
                self.state.set_infrastructure_started(&infra_id, false)?;
                info!(%infra_id, "infrastructure dropped");
            }
        }
        Ok(())
    }
}

impl InfraProcessor for LocalProcessor {
    fn push_instructions(&self, batch: Batch) -> PushFuture<'_> {
        Box::pin(async move {
            for instruction in batch {
                self.perform(instruction)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enactor_core::{NodeType, Topology};

    fn setup() -> (StateStore, LocalProcessor) {
        let state = StateStore::open_in_memory().unwrap();
        let topology =
            Topology::from_nodes("infra-1", "demo", vec![NodeType::new("app", 1, 3)]).unwrap();
        state.put_infrastructure(&topology).unwrap();
        (state.clone(), LocalProcessor::new(state))
    }

    #[tokio::test]
    async fn performs_lifecycle() {
        let (state, processor) = setup();

        processor
            .push_instructions(vec![Instruction::CreateInfrastructure {
                infra_id: "infra-1".into(),
            }])
            .await
            .unwrap();
        assert!(state.is_infrastructure_started("infra-1").unwrap());

        let create = Instruction::CreateNode {
            infra_id: "infra-1".into(),
            node_type: NodeType::new("app", 1, 3),
        };
        processor
            .push_instructions(vec![create.clone(), create])
            .await
            .unwrap();
        let dynamic = state.get_raw_state("infra-1").unwrap();
        assert_eq!(dynamic.count("app"), 2);
        assert!(dynamic.iter().all(|i| i.state == NodeState::Ready));

        let victim = dynamic.instances("app")[0].clone();
        processor
            .push_instructions(vec![Instruction::DropNode { instance: victim.clone() }])
            .await
            .unwrap();
        let dynamic = state.get_raw_state("infra-1").unwrap();
        assert_eq!(dynamic.count("app"), 1);
        assert!(!dynamic.contains("app", &victim.node_id));

        processor
            .push_instructions(vec![Instruction::DropInfrastructure {
                infra_id: "infra-1".into(),
            }])
            .await
            .unwrap();
        assert!(!state.is_infrastructure_started("infra-1").unwrap());
    }

    #[tokio::test]
    async fn unknown_infrastructure_fails() {
        let (_, processor) = setup();
        let result = processor
            .push_instructions(vec![Instruction::CreateInfrastructure {
                infra_id: "missing".into(),
            }])
            .await;
        assert!(result.is_err());
    }
}
