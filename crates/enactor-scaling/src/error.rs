//! Scaling policy error types.

use thiserror::Error;

/// Errors that can occur while reading or updating scaling state.
///
/// Misconfigured bounds, stale drop requests and requests exceeding the
/// bounds are corrected in place and logged, never raised.
#[derive(Debug, Error)]
pub enum ScalingError {
    #[error("invalid request count for {node_type}: {count}")]
    InvalidCount { node_type: String, count: u32 },

    #[error("state store error: {0}")]
    State(#[from] enactor_state::StateError),
}

pub type ScalingResult<T> = Result<T, ScalingError>;
