//! ScalingPolicy: turns queued scaling requests into a target count.
//!
//! Producers outside the reconciliation pass (an autoscale signal, an
//! operator command) only append requests or overwrite the target. The
//! pass consumes them through [`ScalingPolicy::process_requests`], which
//! runs the whole fold for one node type inside a single store
//! transaction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use enactor_core::{DynamicState, NodeId, NodeType};
use enactor_state::{RequestId, ScalingQueue, StateStore, VictimSelector};

use crate::error::{ScalingError, ScalingResult};
use crate::limits::{ScalingLimits, get_scaling_limits};

/// Outcome of processing one node type's queue during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDecision {
    /// Authoritative instance count, within `limits`.
    pub target: u32,
    pub limits: ScalingLimits,
    /// Instances named by drop requests; dropped before anything the
    /// downscale strategy would pick.
    pub preferred_victims: Vec<NodeId>,
    /// Requested growth cut off by `max`.
    pub excess_creates: u32,
    /// Drop requests discarded to respect `min`.
    pub discarded_drops: u32,
    /// Drop requests naming instances that do not exist.
    pub stale_drops: u32,
}

/// Read-only scaling status of a node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingReport {
    pub node_type: String,
    pub actual: u32,
    pub target: u32,
    pub min: u32,
    pub max: u32,
}

/// Scaling state machine over the persisted request queues.
#[derive(Clone)]
pub struct ScalingPolicy {
    state: StateStore,
}

impl ScalingPolicy {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    /// Effective bounds of a node type.
    pub fn get_scaling_limits(&self, node_type: &NodeType) -> ScalingLimits {
        get_scaling_limits(node_type)
    }

    pub fn clamp(&self, count: u32, node_type: &NodeType) -> u32 {
        get_scaling_limits(node_type).clamp(count)
    }

    // ── Producers ──────────────────────────────────────────────────

    /// Ask for `count` more instances of a node type.
    pub fn add_create_request(
        &self,
        infra_id: &str,
        node_type: &str,
        count: u32,
    ) -> ScalingResult<RequestId> {
        if count == 0 {
            return Err(ScalingError::InvalidCount {
                node_type: node_type.to_string(),
                count,
            });
        }
        let id = self.state.set_scaling_createnode(infra_id, node_type, count)?;
        info!(%infra_id, %node_type, count, request_id = %id, "create request added");
        Ok(id)
    }

    /// Ask for one instance of a node type to be removed.
    pub fn add_drop_request(
        &self,
        infra_id: &str,
        node_type: &str,
        selector: VictimSelector,
    ) -> ScalingResult<RequestId> {
        let id = self
            .state
            .set_scaling_destroynode(infra_id, node_type, selector.clone())?;
        info!(%infra_id, %node_type, ?selector, request_id = %id, "drop request added");
        Ok(id)
    }

    /// Overwrite the persisted target. Clamped when next read.
    pub fn set_target_count(&self, infra_id: &str, node_type: &str, count: u32) -> ScalingResult<()> {
        self.state.set_target_count(infra_id, node_type, count)?;
        info!(%infra_id, %node_type, count, "target count set");
        Ok(())
    }

    // ── Readers ────────────────────────────────────────────────────

    /// Preview the target without consuming anything: persisted target
    /// (or the observed count), plus pending creates, minus pending drops
    /// that resolve to an existing instance, clamped.
    pub fn target_count(
        &self,
        infra_id: &str,
        node_type: &NodeType,
        existing: &DynamicState,
    ) -> ScalingResult<u32> {
        let limits = get_scaling_limits(node_type);
        let queue = self.state.get_scaling_queue(infra_id, &node_type.name)?;
        let observed = existing.count(&node_type.name) as i64;

        let base = queue.target_count.map_or(observed, i64::from);
        let creates = i64::from(queue.pending_create_count());
        let drops = count_resolvable_drops(&queue, existing, &node_type.name) as i64;

        let raw = (base + creates - drops).clamp(0, i64::from(u32::MAX)) as u32;
        Ok(limits.clamp(raw))
    }

    /// Status summary: observed vs. previewed target, with bounds.
    pub fn report(
        &self,
        infra_id: &str,
        node_type: &NodeType,
        existing: &DynamicState,
    ) -> ScalingResult<ScalingReport> {
        let limits = get_scaling_limits(node_type);
        Ok(ScalingReport {
            node_type: node_type.name.clone(),
            actual: existing.count(&node_type.name) as u32,
            target: self.target_count(infra_id, node_type, existing)?,
            min: limits.min,
            max: limits.max,
        })
    }

    // ── Consumers ──────────────────────────────────────────────────

    /// Consume every pending create request, adding their counts to
    /// `current_target`. Growth beyond `max` is dropped with a warning.
    pub fn process_create_requests(
        &self,
        infra_id: &str,
        node_type: &NodeType,
        current_target: u32,
    ) -> ScalingResult<u32> {
        let limits = get_scaling_limits(node_type);
        let (target, _) = self
            .state
            .update_scaling_queue(infra_id, &node_type.name, |queue| {
                apply_create_requests(queue, current_target, limits, infra_id, &node_type.name)
            })?;
        Ok(target)
    }

    /// Resolve pending drop requests against `existing` and subtract the
    /// survivors from `current_target`, never going below `min`.
    pub fn process_drop_requests(
        &self,
        infra_id: &str,
        node_type: &NodeType,
        current_target: u32,
        existing: &DynamicState,
    ) -> ScalingResult<u32> {
        let limits = get_scaling_limits(node_type);
        let outcome = self
            .state
            .update_scaling_queue(infra_id, &node_type.name, |queue| {
                apply_drop_requests(
                    queue,
                    current_target,
                    limits,
                    existing,
                    infra_id,
                    &node_type.name,
                )
            })?;
        Ok(outcome.target)
    }

    /// The per-pass fold for one node type, in one transaction:
    /// current target, then create requests, then drop requests.
    pub fn process_requests(
        &self,
        infra_id: &str,
        node_type: &NodeType,
        existing: &DynamicState,
    ) -> ScalingResult<TargetDecision> {
        let limits = get_scaling_limits(node_type);
        let name = node_type.name.as_str();
        let observed = existing.count(name) as u32;

        let decision = self.state.update_scaling_queue(infra_id, name, |queue| {
            let current = limits.clamp(queue.target_count.unwrap_or(observed));
            queue.target_count = Some(current);

            let (after_create, excess_creates) =
                apply_create_requests(queue, current, limits, infra_id, name);
            let drops = apply_drop_requests(queue, after_create, limits, existing, infra_id, name);

            TargetDecision {
                target: drops.target,
                limits,
                preferred_victims: drops.preferred_victims,
                excess_creates,
                discarded_drops: drops.discarded,
                stale_drops: drops.stale,
            }
        })?;

        debug!(
            %infra_id,
            node_type = %name,
            observed,
            target = decision.target,
            preferred_victims = decision.preferred_victims.len(),
            "target count resolved"
        );
        Ok(decision)
    }
}

// ── Queue folding ─────────────────────────────────────────────────

enum Resolution {
    Victim(NodeId),
    Any,
    Stale,
}

fn resolve(selector: &VictimSelector, existing: &DynamicState, node_type: &str) -> Resolution {
    match selector {
        VictimSelector::NodeId(id) if existing.contains(node_type, id) => {
            Resolution::Victim(id.clone())
        }
        VictimSelector::NodeId(_) => Resolution::Stale,
        VictimSelector::Address(addr) => existing
            .find_by_address(node_type, addr)
            .map_or(Resolution::Stale, |id| Resolution::Victim(id.clone())),
        VictimSelector::Any => Resolution::Any,
    }
}

/// Node ids already claimed by applied requests whose victim still exists.
fn claimed_victims(queue: &ScalingQueue, existing: &DynamicState, node_type: &str) -> HashSet<NodeId> {
    queue
        .applied_drops()
        .filter_map(|r| match resolve(&r.selector, existing, node_type) {
            Resolution::Victim(id) => Some(id),
            _ => None,
        })
        .collect()
}

fn count_resolvable_drops(queue: &ScalingQueue, existing: &DynamicState, node_type: &str) -> u32 {
    let mut claimed = claimed_victims(queue, existing, node_type);
    let mut count = 0;
    for request in queue.pending_drops() {
        match resolve(&request.selector, existing, node_type) {
            Resolution::Victim(id) if claimed.insert(id.clone()) => count += 1,
            Resolution::Any => count += 1,
            _ => {}
        }
    }
    count
}

fn apply_create_requests(
    queue: &mut ScalingQueue,
    current: u32,
    limits: ScalingLimits,
    infra_id: &str,
    node_type: &str,
) -> (u32, u32) {
    if queue.create_requests.is_empty() {
        return (limits.clamp(current), 0);
    }

    let requested = current.saturating_add(queue.pending_create_count());
    let target = limits.clamp(requested);
    let excess = requested.saturating_sub(limits.max);
    if excess > 0 {
        warn!(
            %infra_id,
            %node_type,
            requested,
            max = limits.max,
            excess,
            "scaling: create requests exceed maximum, excess ignored"
        );
    }

    debug!(
        %infra_id,
        %node_type,
        consumed = queue.create_requests.len(),
        from = current,
        to = target,
        "create requests processed"
    );
    queue.create_requests.clear();
    queue.target_count = Some(target);
    (target, excess)
}

struct DropOutcome {
    target: u32,
    preferred_victims: Vec<NodeId>,
    discarded: u32,
    stale: u32,
}

fn apply_drop_requests(
    queue: &mut ScalingQueue,
    current: u32,
    limits: ScalingLimits,
    existing: &DynamicState,
    infra_id: &str,
    node_type: &str,
) -> DropOutcome {
    let mut claimed = claimed_victims(queue, existing, node_type);
    let mut stale = 0;
    let mut kept = Vec::with_capacity(queue.drop_requests.len());

    for mut request in queue.drop_requests.drain(..) {
        if request.applied {
            // Applied requests live until their victim is gone.
            if matches!(resolve(&request.selector, existing, node_type), Resolution::Victim(_)) {
                kept.push(request);
            } else {
                debug!(%infra_id, %node_type, request_id = %request.id, "drop request fulfilled");
            }
            continue;
        }

        match resolve(&request.selector, existing, node_type) {
            Resolution::Any => kept.push(request),
            Resolution::Victim(id) if claimed.insert(id.clone()) => {
                request.selector = VictimSelector::NodeId(id);
                kept.push(request);
            }
            Resolution::Victim(id) => {
                stale += 1;
                warn!(%infra_id, %node_type, node_id = %id, request_id = %request.id,
                    "scaling: duplicate drop request for the same node, ignored");
            }
            Resolution::Stale => {
                stale += 1;
                warn!(%infra_id, %node_type, selector = ?request.selector, request_id = %request.id,
                    "scaling: drop request names no existing node, ignored");
            }
        }
    }

    let pending: Vec<RequestId> = kept
        .iter()
        .filter(|r| !r.applied)
        .map(|r| r.id.clone())
        .collect();

    let mut target = limits.clamp(current);
    let mut discarded = 0;

    if !pending.is_empty() {
        let wanted = pending.len() as u32;
        let room = target.saturating_sub(limits.min);
        if wanted > room {
            discarded = wanted - room;
            // Oldest requests go first.
            let dropped: HashSet<&RequestId> = pending.iter().take(discarded as usize).collect();
            for id in &dropped {
                warn!(%infra_id, %node_type, request_id = %id, min = limits.min,
                    "scaling: drop request ignored, minimum count reached");
            }
            kept.retain(|r| !dropped.contains(&r.id));
        }

        target = limits.clamp(target - (wanted - discarded));
        queue.target_count = Some(target);

        // Unnamed requests are done; named ones wait for their victim.
        kept.retain(|r| r.applied || r.selector != VictimSelector::Any);
        for request in kept.iter_mut() {
            request.applied = true;
        }

        debug!(
            %infra_id,
            %node_type,
            applied = wanted - discarded,
            discarded,
            from = current,
            to = target,
            "drop requests processed"
        );
    }

    let preferred_victims = kept
        .iter()
        .filter_map(|r| match &r.selector {
            VictimSelector::NodeId(id) => Some(id.clone()),
            _ => None,
        })
        .collect();

    queue.drop_requests = kept;

    DropOutcome {
        target,
        preferred_victims,
        discarded,
        stale,
    }
}
