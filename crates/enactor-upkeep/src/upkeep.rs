//! StateUpkeep: produces the dynamic state a pass reconciles against.

use tracing::{debug, info};

use enactor_core::{DynamicState, UpkeepKind};
use enactor_state::StateStore;

use crate::error::UpkeepResult;
use crate::sanitizer::sanitize;

/// Reads an infrastructure's observed state and cleans it according to
/// the configured strategy.
#[derive(Clone)]
pub struct StateUpkeep {
    state: StateStore,
    kind: UpkeepKind,
}

impl StateUpkeep {
    pub fn new(state: StateStore, kind: UpkeepKind) -> Self {
        Self { state, kind }
    }

    pub fn kind(&self) -> UpkeepKind {
        self.kind
    }

    /// Snapshot of the instances reconciliation may count.
    ///
    /// With [`UpkeepKind::Basic`], failed instances are archived and both
    /// failed and shut-down instances are removed from the store before
    /// the clean snapshot is returned.
    pub fn acquire_dynamic_state(&self, infra_id: &str) -> UpkeepResult<DynamicState> {
        let raw = self.state.get_raw_state(infra_id)?;
        match self.kind {
            UpkeepKind::Noop => Ok(raw),
            UpkeepKind::Basic => self.basic(infra_id, &raw),
        }
    }

    fn basic(&self, infra_id: &str, raw: &DynamicState) -> UpkeepResult<DynamicState> {
        let outcome = sanitize(raw);
        if outcome.removed.is_empty() {
            debug!(%infra_id, instances = raw.total(), "upkeep: state clean");
            return Ok(outcome.clean);
        }

        if !outcome.failed.is_empty() {
            self.state.store_failed_nodes(infra_id, &outcome.failed)?;
            for instance in &outcome.failed {
                info!(
                    %infra_id,
                    node_type = %instance.node_type,
                    node_id = %instance.node_id,
                    "upkeep: failed instance archived"
                );
            }
        }

        let removed = self.state.remove_nodes(infra_id, &outcome.removed_ids())?;
        info!(
            %infra_id,
            removed,
            failed = outcome.failed.len(),
            shutdown = outcome.removed.len() - outcome.failed.len(),
            "upkeep: dead instances removed"
        );
        Ok(outcome.clean)
    }
}
