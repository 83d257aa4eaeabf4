//! Crucible data model
//!
//! Shared types for the generation pipeline: candidates produced by the
//! synthesizer, the multi-dimensional quality vectors attached to them,
//! evolution runs with their population lineage, and saga workflow runs.
//!
//! Types here carry no behavior beyond their own invariants. Scoring,
//! selection, and orchestration live in the downstream crates.

#![deny(unsafe_code)]

pub mod candidate;
pub mod evolution;
pub mod ids;
pub mod metrics;
pub mod project;
pub mod specification;
pub mod workflow;

pub use candidate::{Candidate, EvaluationVector, Score};
pub use evolution::{EvolutionRun, EvolutionStatus, EvolutionStrategyKind, Individual};
pub use ids::{CandidateId, EvolutionRunId, IndividualId, ProjectId, WorkflowRunId};
pub use metrics::{Distribution, QualityMetrics};
pub use project::{ProjectRecord, ProjectStatus, ProjectUpdate};
pub use specification::{Pattern, Specification};
pub use workflow::{FailureReport, StepResult, WorkflowRun, WorkflowStatus};

/// Errors raised by model-level invariant checks.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("generation limit reached: {current} of {max}")]
    GenerationLimitReached { current: u32, max: u32 },
    #[error("run is not running (status {0})")]
    NotRunning(String),
}
