//! Pure classification of an observed-state snapshot.

use enactor_core::{DynamicState, Instance, NodeId, NodeState};

pub fn is_failed(instance: &Instance) -> bool {
    instance.state == NodeState::Fail
}

pub fn is_shutdown(instance: &Instance) -> bool {
    instance.state == NodeState::Shutdown
}

/// Result of [`sanitize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeOutcome {
    /// Every instance that is neither failed nor shut down, unchanged.
    pub clean: DynamicState,
    /// Failed instances, to be archived.
    pub failed: Vec<Instance>,
    /// Every instance taken out of the snapshot: failed and shut down.
    pub removed: Vec<Instance>,
}

impl SanitizeOutcome {
    pub fn removed_ids(&self) -> Vec<NodeId> {
        self.removed.iter().map(|i| i.node_id.clone()).collect()
    }
}

/// Split `raw` into the instances reconciliation may count and the ones
/// that have to go. FAIL and SHUTDOWN are treated as exclusive states.
pub fn sanitize(raw: &DynamicState) -> SanitizeOutcome {
    let mut outcome = SanitizeOutcome::default();
    for instance in raw.iter() {
        if is_failed(instance) {
            outcome.failed.push(instance.clone());
            outcome.removed.push(instance.clone());
        } else if is_shutdown(instance) {
            outcome.removed.push(instance.clone());
        } else {
            outcome.clean.insert(instance.clone());
        }
    }
    outcome
}
