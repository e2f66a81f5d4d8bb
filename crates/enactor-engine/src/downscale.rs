//! Downscale strategies: which instances go when a node type shrinks.

use rand::seq::SliceRandom;

use enactor_core::{DownscaleKind, Instance};

/// Victim selection policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DownscaleStrategy {
    /// Sort by start time ascending and take the tail, so the most
    /// recently started instances are dropped.
    #[default]
    Simple,
    /// Uniform sample without replacement.
    Random,
}

impl From<DownscaleKind> for DownscaleStrategy {
    fn from(kind: DownscaleKind) -> Self {
        match kind {
            DownscaleKind::Simple => DownscaleStrategy::Simple,
            DownscaleKind::Random => DownscaleStrategy::Random,
        }
    }
}

impl DownscaleStrategy {
    /// Pick `dropcount` distinct instances out of `existing`.
    ///
    /// Callers never ask for more than `existing.len()`; if they do, every
    /// instance is returned.
    pub fn drop_nodes(&self, existing: &[Instance], dropcount: usize) -> Vec<Instance> {
        let dropcount = dropcount.min(existing.len());
        if dropcount == 0 {
            return Vec::new();
        }

        match self {
            DownscaleStrategy::Simple => {
                let mut sorted = existing.to_vec();
                // node_id breaks ties so the choice is stable.
                sorted.sort_by(|a, b| {
                    a.started_at
                        .cmp(&b.started_at)
                        .then_with(|| a.node_id.cmp(&b.node_id))
                });
                sorted.split_off(sorted.len() - dropcount)
            }
            DownscaleStrategy::Random => {
                let mut rng = rand::thread_rng();
                existing
                    .choose_multiple(&mut rng, dropcount)
                    .cloned()
                    .collect()
            }
        }
    }
}
