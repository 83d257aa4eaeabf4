//! Evolution runs and population members
//!
//! An [`EvolutionRun`] records one execution of the population-based
//! optimizer. The run owns the knobs it was started with and the
//! per-generation bookkeeping; the optimizer in `crucible-evolution`
//! owns the population itself.

use crate::ids::{EvolutionRunId, IndividualId};
use crate::ModelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Strategy Kind ────────────────────────────────────────────────────

/// Which search strategy drives variation and selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionStrategyKind {
    Genetic,
    Differential,
    ParticleSwarm,
    SimulatedAnnealing,
    AbTesting,
    Hybrid,
}

impl EvolutionStrategyKind {
    pub const ALL: [EvolutionStrategyKind; 6] = [
        Self::Genetic,
        Self::Differential,
        Self::ParticleSwarm,
        Self::SimulatedAnnealing,
        Self::AbTesting,
        Self::Hybrid,
    ];
}

impl std::fmt::Display for EvolutionStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Genetic => "genetic",
            Self::Differential => "differential",
            Self::ParticleSwarm => "particle_swarm",
            Self::SimulatedAnnealing => "simulated_annealing",
            Self::AbTesting => "ab_testing",
            Self::Hybrid => "hybrid",
        };
        write!(f, "{}", name)
    }
}

// ── Run Status ───────────────────────────────────────────────────────

/// Lifecycle state of an evolution run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EvolutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl EvolutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

// ── Evolution Run ────────────────────────────────────────────────────

/// One execution of the optimizer against a target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvolutionRun {
    pub id: EvolutionRunId,
    pub strategy: EvolutionStrategyKind,
    pub population_size: usize,
    pub max_generations: u32,
    pub current_generation: u32,
    /// Fitness at which the run converges, `[0, 1]`
    pub fitness_threshold: f64,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub selection_pressure: f64,
    pub elitism_fraction: f64,
    pub diversity_maintenance: bool,
    /// Minimum trailing-window improvement below which the run converges
    pub convergence_threshold: f64,
    pub status: EvolutionStatus,
    /// Best fitness seen so far; non-decreasing within a run
    pub best_fitness_achieved: f64,
    /// Mean fitness of the seeded population before any variation
    pub baseline_fitness: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl EvolutionRun {
    pub fn new(strategy: EvolutionStrategyKind, population_size: usize) -> Self {
        let now = Utc::now();
        Self {
            id: EvolutionRunId::generate(),
            strategy,
            population_size,
            max_generations: 50,
            current_generation: 0,
            fitness_threshold: 0.9,
            mutation_rate: 0.1,
            crossover_rate: 0.7,
            selection_pressure: 1.0,
            elitism_fraction: 0.1,
            diversity_maintenance: false,
            convergence_threshold: 0.001,
            status: EvolutionStatus::Pending,
            best_fitness_achieved: 0.0,
            baseline_fitness: 0.0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Transition Pending → Running and record the pre-variation baseline.
    pub fn start(&mut self, baseline_fitness: f64) {
        self.status = EvolutionStatus::Running;
        self.baseline_fitness = baseline_fitness;
        self.best_fitness_achieved = self.best_fitness_achieved.max(baseline_fitness);
        self.updated_at = Utc::now();
    }

    /// Record the outcome of one generation.
    ///
    /// Enforces the generation cap and the monotonicity of
    /// `best_fitness_achieved`.
    pub fn record_generation(&mut self, generation_best: f64) -> Result<(), ModelError> {
        if self.status != EvolutionStatus::Running {
            return Err(ModelError::NotRunning(format!("{:?}", self.status)));
        }
        if self.current_generation >= self.max_generations {
            return Err(ModelError::GenerationLimitReached {
                current: self.current_generation,
                max: self.max_generations,
            });
        }
        self.current_generation += 1;
        self.best_fitness_achieved = self.best_fitness_achieved.max(generation_best);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self) {
        self.status = EvolutionStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self) {
        self.status = EvolutionStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn cancel(&mut self) {
        self.status = EvolutionStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the run has hit its generation cap.
    pub fn generations_exhausted(&self) -> bool {
        self.current_generation >= self.max_generations
    }

    /// Improvement of the best over the seeded baseline.
    pub fn improvement_over_baseline(&self) -> f64 {
        self.best_fitness_achieved - self.baseline_fitness
    }
}

// ── Individual ───────────────────────────────────────────────────────

/// One population member within an evolution run.
///
/// Superseded individuals remain in the run archive for lineage and
/// audit; they are never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Individual {
    pub id: IndividualId,
    pub evolution_run_id: EvolutionRunId,
    /// Genome under variation (candidate source text)
    pub genome: String,
    /// Scalar fitness in `[0, 1]`, absent until evaluated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitness: Option<f64>,
    pub generation_born: u32,
}

impl Individual {
    pub fn new(run_id: EvolutionRunId, genome: impl Into<String>, generation_born: u32) -> Self {
        Self {
            id: IndividualId::generate(),
            evolution_run_id: run_id,
            genome: genome.into(),
            fitness: None,
            generation_born,
        }
    }

    pub fn with_fitness(mut self, fitness: f64) -> Self {
        self.fitness = Some(fitness.clamp(0.0, 1.0));
        self
    }

    pub fn is_scored(&self) -> bool {
        self.fitness.is_some()
    }

    /// Fitness, with unscored individuals treated as zero.
    pub fn fitness_or_zero(&self) -> f64 {
        self.fitness.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run() -> EvolutionRun {
        EvolutionRun::new(EvolutionStrategyKind::Genetic, 10)
    }

    #[test]
    fn run_lifecycle() {
        let mut run = make_run();
        assert_eq!(run.status, EvolutionStatus::Pending);

        run.start(0.4);
        assert_eq!(run.status, EvolutionStatus::Running);
        assert_eq!(run.baseline_fitness, 0.4);
        assert_eq!(run.best_fitness_achieved, 0.4);

        run.complete();
        assert!(run.is_terminal());
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn record_generation_monotonic_best() {
        let mut run = make_run();
        run.start(0.3);
        run.record_generation(0.5).unwrap();
        assert_eq!(run.best_fitness_achieved, 0.5);

        // A worse generation never lowers the best.
        run.record_generation(0.2).unwrap();
        assert_eq!(run.best_fitness_achieved, 0.5);
        assert_eq!(run.current_generation, 2);
    }

    #[test]
    fn record_generation_respects_cap() {
        let mut run = make_run();
        run.max_generations = 2;
        run.start(0.0);
        run.record_generation(0.1).unwrap();
        run.record_generation(0.2).unwrap();
        let err = run.record_generation(0.3).unwrap_err();
        assert!(matches!(err, ModelError::GenerationLimitReached { .. }));
        assert!(run.generations_exhausted());
    }

    #[test]
    fn record_generation_requires_running() {
        let mut run = make_run();
        let err = run.record_generation(0.1).unwrap_err();
        assert!(matches!(err, ModelError::NotRunning(_)));
    }

    #[test]
    fn individual_fitness_clamped() {
        let run = make_run();
        let ind = Individual::new(run.id.clone(), "genome", 0).with_fitness(1.5);
        assert_eq!(ind.fitness, Some(1.0));
        assert!(ind.is_scored());
    }

    #[test]
    fn strategy_kind_display() {
        assert_eq!(EvolutionStrategyKind::ParticleSwarm.to_string(), "particle_swarm");
        assert_eq!(EvolutionStrategyKind::ALL.len(), 6);
    }

    #[test]
    fn run_serde_round_trip() {
        let run = make_run();
        let json = serde_json::to_string(&run).unwrap();
        let restored: EvolutionRun = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, run.id);
        assert_eq!(restored.strategy, run.strategy);
    }
}
