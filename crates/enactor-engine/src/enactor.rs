//! Enactor: one infrastructure's reconciliation engine.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use enactor_core::{
    Batch, Delta, DownscaleKind, DynamicState, InfraId, Instance, Instruction, NodeType, Topology,
    UpkeepKind,
};
use enactor_scaling::{ScalingPolicy, TargetDecision};
use enactor_state::StateStore;
use enactor_upkeep::StateUpkeep;

use crate::downscale::DownscaleStrategy;
use crate::error::{EnactorError, EnactorResult};
use crate::processor::InfraProcessor;

/// Converges one infrastructure toward its topology, one pass at a time.
pub struct Enactor<P> {
    infra_id: InfraId,
    state: StateStore,
    policy: ScalingPolicy,
    upkeep: StateUpkeep,
    downscale: DownscaleStrategy,
    processor: P,
}

impl<P: InfraProcessor> Enactor<P> {
    /// Create an enactor with the `simple` downscale and `noop` upkeep
    /// strategies.
    pub fn new(infra_id: &str, state: StateStore, processor: P) -> Self {
        Self {
            infra_id: infra_id.to_string(),
            policy: ScalingPolicy::new(state.clone()),
            upkeep: StateUpkeep::new(state.clone(), UpkeepKind::default()),
            downscale: DownscaleStrategy::default(),
            state,
            processor,
        }
    }

    pub fn with_downscale(mut self, kind: DownscaleKind) -> Self {
        self.downscale = DownscaleStrategy::from(kind);
        self
    }

    pub fn with_upkeep(mut self, kind: UpkeepKind) -> Self {
        self.upkeep = StateUpkeep::new(self.state.clone(), kind);
        self
    }

    pub fn infra_id(&self) -> &str {
        &self.infra_id
    }

    pub fn policy(&self) -> &ScalingPolicy {
        &self.policy
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    // ── Delta construction ─────────────────────────────────────────

    /// Build the ordered batches that move `dynamic` toward `topology`.
    ///
    /// Consumes pending scaling requests. A node type whose target cannot
    /// be resolved is skipped for this pass.
    pub fn calculate_delta(
        &self,
        topology: &Topology,
        dynamic: &DynamicState,
    ) -> EnactorResult<Delta> {
        let infra_id = &topology.infra_id;
        let mut delta = Delta::new();

        let mut bootstrap = Batch::new();
        if !self.state.is_infrastructure_started(infra_id)? {
            bootstrap.push(Instruction::CreateInfrastructure {
                infra_id: infra_id.clone(),
            });
        }
        delta.push(bootstrap);

        let mut targets: BTreeMap<&str, u32> = BTreeMap::new();
        let mut drops = Batch::new();
        for node_type in topology.node_types() {
            let decision = match self.policy.process_requests(infra_id, node_type, dynamic) {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(
                        %infra_id,
                        node_type = %node_type.name,
                        error = %e,
                        "target count unavailable, node type skipped this pass"
                    );
                    continue;
                }
            };

            let observed = dynamic.count(&node_type.name) as u32;
            if decision.target < observed {
                let dropcount = (observed - decision.target) as usize;
                let victims = self.select_victims(node_type, dynamic, &decision, dropcount);
                debug!(
                    %infra_id,
                    node_type = %node_type.name,
                    observed,
                    target = decision.target,
                    victims = victims.len(),
                    "downscaling"
                );
                drops.extend(
                    victims
                        .into_iter()
                        .map(|instance| Instruction::DropNode { instance }),
                );
            }
            targets.insert(&node_type.name, decision.target);
        }
        delta.push(drops);

        for level in &topology.levels {
            let mut creates = Batch::new();
            for node_type in level {
                let Some(&target) = targets.get(node_type.name.as_str()) else {
                    continue;
                };
                let observed = dynamic.count(&node_type.name) as u32;
                for _ in observed..target {
                    creates.push(Instruction::CreateNode {
                        infra_id: infra_id.clone(),
                        node_type: node_type.clone(),
                    });
                }
            }
            delta.push(creates);
        }

        Ok(delta)
    }

    /// Named victims first, the strategy's picks for the rest.
    fn select_victims(
        &self,
        node_type: &NodeType,
        dynamic: &DynamicState,
        decision: &TargetDecision,
        dropcount: usize,
    ) -> Vec<Instance> {
        let (preferred, others): (Vec<Instance>, Vec<Instance>) = dynamic
            .instances(&node_type.name)
            .into_iter()
            .cloned()
            .partition(|i| decision.preferred_victims.contains(&i.node_id));

        let mut victims: Vec<Instance> = preferred.into_iter().take(dropcount).collect();
        let remaining = dropcount - victims.len();
        victims.extend(self.downscale.drop_nodes(&others, remaining));
        victims
    }

    // ── Submission ─────────────────────────────────────────────────

    /// Submit every non-empty batch, strictly in order.
    pub async fn enact_delta(&self, delta: Delta) -> EnactorResult<()> {
        for (index, batch) in delta.into_batches().into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }

            let bootstrap = index == 0
                && batch
                    .iter()
                    .any(|i| matches!(i, Instruction::CreateInfrastructure { .. }));
            let size = batch.len();
            debug!(infra_id = %self.infra_id, batch = index, size, "submitting batch");

            if let Err(source) = self.processor.push_instructions(batch).await {
                let infra_id = self.infra_id.clone();
                return Err(if bootstrap {
                    EnactorError::MissingInfrastructure { infra_id, source }
                } else {
                    EnactorError::Dispatch {
                        infra_id,
                        batch: index,
                        source,
                    }
                });
            }
        }
        Ok(())
    }

    // ── Passes ─────────────────────────────────────────────────────

    /// One convergence step: upkeep, delta, submission.
    pub async fn make_a_pass(&self) -> EnactorResult<()> {
        let topology = self
            .state
            .get_topology(&self.infra_id)?
            .ok_or_else(|| EnactorError::InfrastructureNotFound(self.infra_id.clone()))?;

        let dynamic = self.upkeep.acquire_dynamic_state(&self.infra_id)?;
        let delta = self.calculate_delta(&topology, &dynamic)?;

        if delta.is_empty() {
            debug!(infra_id = %self.infra_id, "pass: nothing to do");
        } else {
            info!(
                infra_id = %self.infra_id,
                instructions = delta.instruction_count(),
                %delta,
                "pass: enacting delta"
            );
        }
        self.enact_delta(delta).await
    }

    /// Run passes every `interval` until `shutdown` changes. A failed pass
    /// is logged and retried on the next tick.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            infra_id = %self.infra_id,
            interval_secs = interval.as_secs(),
            "enactor started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.make_a_pass().await {
                        error!(infra_id = %self.infra_id, error = %e, "pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!(infra_id = %self.infra_id, "enactor shutting down");
                    break;
                }
            }
        }
    }

    /// Tear the infrastructure down: drop every live instance, then the
    /// infrastructure itself.
    pub async fn drop_infrastructure(&self) -> EnactorResult<()> {
        let dynamic = self.state.get_raw_state(&self.infra_id)?;

        let mut delta = Delta::new();
        delta.push(
            dynamic
                .iter()
                .cloned()
                .map(|instance| Instruction::DropNode { instance })
                .collect(),
        );
        delta.push(vec![Instruction::DropInfrastructure {
            infra_id: self.infra_id.clone(),
        }]);

        info!(infra_id = %self.infra_id, nodes = dynamic.total(), "dropping infrastructure");
        self.enact_delta(delta).await
    }
}
