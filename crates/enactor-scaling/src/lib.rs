//! enactor-scaling: request-driven target instance counts.
//!
//! Each `(infra_id, node_type)` owns a persisted `ScalingQueue`: an
//! optional target count plus pending create and drop requests. Once per
//! pass the policy folds the pending requests into the target and clamps
//! it to the node type's bounds.
//!
//! # Target algorithm
//!
//! ```text
//! limits  = (max(min, 1), max(max, limits.min))
//! current = clamp(persisted target ?? observed count)
//!
//! current += sum(create request counts)       // excess over max dropped
//! current -= count(resolvable drop requests)  // oldest discarded below min
//!
//! persist clamp(current)
//! ```
//!
//! Drop requests name their victim by node id, by network address, or not
//! at all. Addresses are rewritten to node ids once resolved; requests
//! naming instances that no longer exist are discarded.

pub mod error;
pub mod limits;
pub mod policy;

pub use error::{ScalingError, ScalingResult};
pub use limits::{ScalingLimits, clamp, get_scaling_limits};
pub use policy::{ScalingPolicy, ScalingReport, TargetDecision};
