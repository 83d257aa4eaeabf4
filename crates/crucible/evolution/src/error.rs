/// Errors from the evolutionary optimizer.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("invalid configuration: {field} = {value} (expected {expected})")]
    InvalidConfig {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("fitness evaluation failed: {0}")]
    FitnessFailed(String),
    #[error("population bootstrap failed: {0}")]
    BootstrapFailed(String),
    #[error(transparent)]
    Model(#[from] crucible_types::ModelError),
}
