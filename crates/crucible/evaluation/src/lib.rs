//! Candidate quality evaluation
//!
//! Two pieces, both pure:
//!
//! - [`Scorer`] computes an eight-dimensional [`EvaluationVector`] for a
//!   single candidate. Every dimension is an independent probe over the
//!   source text; a probe that cannot determine a score yields 0 and never
//!   blocks the others.
//! - [`Checkpoint`] aggregates a batch of scored candidates into a
//!   continue / retry / abort decision with remediation hints.
//!
//! [`EvaluationVector`]: crucible_types::EvaluationVector

#![deny(unsafe_code)]

pub mod checkpoint;
pub mod scorer;

pub use checkpoint::{Checkpoint, CheckpointReport, CheckpointStatus};
pub use scorer::Scorer;

/// Errors from batch evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("cannot checkpoint an empty candidate batch")]
    EmptyBatch,
}
