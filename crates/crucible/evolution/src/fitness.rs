//! Genome-to-fitness mapping behind a provider trait
//!
//! The optimizer never scores genomes itself; it asks a [`FitnessSource`].
//! The quality-vector mapping is the default, but a strategy may be paired
//! with any source (an A/B split can carry a win-rate source, for example).

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use crucible_evaluation::Scorer;
use crucible_types::{Candidate, Specification};

use crate::error::EvolutionError;

/// Maps a genome to a scalar fitness in `[0, 1]`.
#[async_trait]
pub trait FitnessSource: Send + Sync {
    async fn fitness(&self, genome: &str) -> Result<f64, EvolutionError>;
}

/// Default fitness: the candidate's quality-vector mean mapped onto `[0, 1]`.
pub struct ScorerFitness {
    scorer: Scorer,
}

impl ScorerFitness {
    pub fn new() -> Self {
        Self {
            scorer: Scorer::new(),
        }
    }

    /// A source whose domain-compliance dimension tracks the given
    /// specification.
    pub fn for_specification(spec: &Specification) -> Self {
        Self {
            scorer: Scorer::for_specification(spec),
        }
    }
}

impl Default for ScorerFitness {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FitnessSource for ScorerFitness {
    async fn fitness(&self, genome: &str) -> Result<f64, EvolutionError> {
        Ok(self.scorer.score(&Candidate::new(genome)).fitness())
    }
}

/// Fixed-value source for tests and demos.
pub struct ConstantFitness(pub f64);

#[async_trait]
impl FitnessSource for ConstantFitness {
    async fn fitness(&self, _genome: &str) -> Result<f64, EvolutionError> {
        Ok(self.0.clamp(0.0, 1.0))
    }
}

/// Always-failing source for error paths.
pub struct FailingFitness;

#[async_trait]
impl FitnessSource for FailingFitness {
    async fn fitness(&self, _genome: &str) -> Result<f64, EvolutionError> {
        Err(EvolutionError::FitnessFailed(
            "simulated fitness failure".into(),
        ))
    }
}

/// Succeeds for the first `fail_after` calls, then fails every call.
///
/// Exercises the mid-run failure path without touching the bootstrap.
pub struct FlakyFitness {
    value: f64,
    fail_after: usize,
    calls: AtomicUsize,
}

impl FlakyFitness {
    pub fn new(value: f64, fail_after: usize) -> Self {
        Self {
            value,
            fail_after,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FitnessSource for FlakyFitness {
    async fn fitness(&self, _genome: &str) -> Result<f64, EvolutionError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_after {
            Ok(self.value)
        } else {
            Err(EvolutionError::FitnessFailed("intermittent failure".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scorer_fitness_in_unit_range() {
        let source = ScorerFitness::new();
        let fitness = source
            .fitness("/// doc\npub fn f() {}\n#[test]\nfn t() { assert!(true); }")
            .await
            .unwrap();
        assert!(fitness > 0.0);
        assert!(fitness <= 1.0);
    }

    #[tokio::test]
    async fn scorer_fitness_rewards_domain_terms() {
        let spec = Specification::new().with_entity("Invoice");
        let source = ScorerFitness::for_specification(&spec);

        let with_term = source.fitness("pub struct Invoice {}").await.unwrap();
        let without = source.fitness("pub struct Receipt {}").await.unwrap();
        assert!(with_term > without);
    }

    #[tokio::test]
    async fn constant_fitness_clamps() {
        assert_eq!(ConstantFitness(1.5).fitness("x").await.unwrap(), 1.0);
        assert_eq!(ConstantFitness(-0.5).fitness("x").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn failing_fitness_errors() {
        let result = FailingFitness.fitness("x").await;
        assert!(matches!(result, Err(EvolutionError::FitnessFailed(_))));
    }

    #[tokio::test]
    async fn flaky_fitness_fails_after_budget() {
        let source = FlakyFitness::new(0.5, 2);
        assert!(source.fitness("a").await.is_ok());
        assert!(source.fitness("b").await.is_ok());
        assert!(source.fitness("c").await.is_err());
    }
}
