//! State store failures.
//!
//! Backend errors from redb are flattened to strings so callers can match
//! on the stage that failed without depending on redb themselves.

use thiserror::Error;

use enactor_core::InfraId;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    /// The database file could not be created or opened.
    #[error("cannot open enactor state: {0}")]
    Open(String),

    #[error("state transaction failed: {0}")]
    Transaction(String),

    #[error("cannot open state table: {0}")]
    Table(String),

    #[error("state read failed: {0}")]
    Read(String),

    #[error("state write failed: {0}")]
    Write(String),

    #[error("cannot encode record: {0}")]
    Serialize(String),

    /// A stored infrastructure, instance or scaling queue record is not
    /// valid JSON for its type. Reconciliation skips the affected node
    /// type rather than failing the pass.
    #[error("corrupt record: {0}")]
    Deserialize(String),

    /// The operation needs a registered infrastructure.
    #[error("infrastructure {0} is not registered")]
    UnknownInfrastructure(InfraId),
}
