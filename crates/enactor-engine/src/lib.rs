//! enactor-engine: the reconciliation engine.
//!
//! Each pass compares an infrastructure's topology with its sanitized
//! dynamic state and emits an ordered [`Delta`](enactor_core::Delta) of
//! instruction batches, which it hands to an [`InfraProcessor`].
//!
//! # Architecture
//!
//! ```text
//! Enactor::make_a_pass(infra_id)
//!   ├── StateStore::get_topology()
//!   ├── StateUpkeep::acquire_dynamic_state()
//!   ├── calculate_delta()
//!   │   ├── [0] CreateInfrastructure, unless started
//!   │   ├── [1] DropNode for every node type over target
//!   │   │       (ScalingPolicy::process_requests + DownscaleStrategy)
//!   │   └── [2..] CreateNode per topological level
//!   └── enact_delta() → InfraProcessor::push_instructions(), in order
//! ```
//!
//! Empty batches are never submitted. Batch `i + 1` is not submitted until
//! the call submitting batch `i` has returned.

pub mod downscale;
pub mod enactor;
pub mod error;
pub mod processor;

pub use downscale::DownscaleStrategy;
pub use enactor::Enactor;
pub use error::{EnactorError, EnactorResult};
pub use processor::{InfraProcessor, LocalProcessor, PushFuture};
