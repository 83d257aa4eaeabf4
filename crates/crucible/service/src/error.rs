//! Service-level and collaborator-level errors

use crucible_engine::StepError;
use crucible_types::{FailureReport, ProjectId};
use thiserror::Error;

/// Error raised by an external collaborator.
///
/// The variant carries the retry semantics: unavailability and storage
/// faults map onto retryable step errors, invalid input does not.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<CollaboratorError> for StepError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::Unavailable(message) => StepError::Transient(message),
            CollaboratorError::InvalidInput(message) => StepError::Validation(message),
            CollaboratorError::Storage(message) => StepError::Persistence(message),
        }
    }
}

/// Error surfaced by the service entry points.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] crucible_engine::EngineError),

    #[error(transparent)]
    Evolution(#[from] crucible_evolution::EvolutionError),

    #[error(transparent)]
    Evaluation(#[from] crucible_evaluation::EvaluationError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("project '{0}' not found")]
    ProjectNotFound(ProjectId),

    #[error("project '{0}' has no stored result to evolve")]
    NoStoredResult(ProjectId),

    #[error("run is missing output for step '{0}'")]
    MissingStepOutput(String),

    /// A generation workflow failed; raw step errors never cross this
    /// boundary, only the structured report does.
    #[error("generation failed: {0}")]
    Generation(FailureReport),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_errors_map_to_step_retry_semantics() {
        let transient: StepError = CollaboratorError::Unavailable("offline".into()).into();
        assert!(transient.is_retryable());

        let persistence: StepError = CollaboratorError::Storage("lock".into()).into();
        assert!(persistence.is_retryable());

        let validation: StepError = CollaboratorError::InvalidInput("empty".into()).into();
        assert!(!validation.is_retryable());
    }
}
