//! Engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnactorError {
    #[error("infrastructure not found: {0}")]
    InfrastructureNotFound(String),

    #[error("infrastructure {infra_id} could not be created: {source}")]
    MissingInfrastructure {
        infra_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("batch {batch} of infrastructure {infra_id} could not be submitted: {source}")]
    Dispatch {
        infra_id: String,
        batch: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("state store error: {0}")]
    State(#[from] enactor_state::StateError),

    #[error("upkeep error: {0}")]
    Upkeep(#[from] enactor_upkeep::UpkeepError),
}

pub type EnactorResult<T> = Result<T, EnactorError>;
