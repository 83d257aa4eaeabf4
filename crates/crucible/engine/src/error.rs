//! Errors raised by steps and by saga construction

use thiserror::Error;

/// Error returned by a step handler or compensation handler.
///
/// The variant decides retry behavior: transient and persistence
/// failures are retried up to the step's budget, validation and
/// quality failures are not.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    /// Input rejected before any side effect took place
    #[error("validation failed: {0}")]
    Validation(String),

    /// Transient fault (network, timeout, unavailable collaborator)
    #[error("transient failure: {0}")]
    Transient(String),

    /// Produced output fell below the acceptable quality bar
    #[error("critical quality failure: {0}")]
    CriticalQuality(String),

    /// Durable-state operation failed
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl StepError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Persistence(_))
    }
}

/// Structural errors detected before a saga runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("duplicate step name '{0}'")]
    DuplicateStep(String),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("dependency cycle involving step '{0}'")]
    DependencyCycle(String),

    #[error("saga has no steps")]
    EmptySaga,
}
