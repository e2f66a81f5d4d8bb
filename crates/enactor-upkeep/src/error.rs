//! Upkeep error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpkeepError {
    #[error("state store error: {0}")]
    State(#[from] enactor_state::StateError),
}

pub type UpkeepResult<T> = Result<T, UpkeepError>;
