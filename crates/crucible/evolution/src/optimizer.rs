//! Generation loop over a scored population
//!
//! The optimizer owns the population, its archive, and the trailing
//! best-fitness history; run-level bookkeeping lives on the
//! [`EvolutionRun`] record. Fitness evaluation is concurrent within a
//! generation with a join before selection; everything else is
//! single-threaded over the run state.

use std::cmp::Ordering;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crucible_types::{EvolutionRun, EvolutionStatus, EvolutionStrategyKind, Individual, ModelError};

use crate::error::EvolutionError;
use crate::fitness::FitnessSource;
use crate::strategy::{self, strategy_for, EvolutionStrategy, VariationContext};

/// Offspring at least this similar to an accepted member are reseeded.
const DIVERSITY_CEILING: f64 = 0.95;

/// How many already-accepted members a similarity scan compares against.
const DIVERSITY_SCAN: usize = 16;

/// Character prefix the similarity measure is computed over.
const SIMILARITY_PREFIX: usize = 512;

/// Mutation rate used to reseed a rejected near-duplicate.
const RESEED_RATE: f64 = 0.35;

// ── Config ───────────────────────────────────────────────────────────

/// Knobs for one evolution run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub strategy: EvolutionStrategyKind,
    pub population_size: usize,
    pub max_generations: u32,
    /// Fitness at which the run converges, `[0, 1]`
    pub fitness_threshold: f64,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub selection_pressure: f64,
    pub elitism_fraction: f64,
    pub diversity_maintenance: bool,
    /// Minimum trailing-window improvement below which the run converges
    pub convergence_threshold: f64,
    /// Trailing generations compared by the lack-of-improvement test
    pub convergence_window: usize,
    /// Genome the initial population is spread from
    pub seed_genome: String,
    /// Fixed RNG seed for reproducible runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl EvolutionConfig {
    pub fn new(strategy: EvolutionStrategyKind, seed_genome: impl Into<String>) -> Self {
        Self {
            strategy,
            population_size: 10,
            max_generations: 50,
            fitness_threshold: 0.9,
            mutation_rate: 0.1,
            crossover_rate: 0.7,
            selection_pressure: 1.0,
            elitism_fraction: 0.1,
            diversity_maintenance: false,
            convergence_threshold: 0.001,
            convergence_window: 5,
            seed_genome: seed_genome.into(),
            rng_seed: None,
        }
    }

    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    pub fn with_max_generations(mut self, generations: u32) -> Self {
        self.max_generations = generations;
        self
    }

    pub fn with_fitness_threshold(mut self, threshold: f64) -> Self {
        self.fitness_threshold = threshold;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    pub fn with_selection_pressure(mut self, pressure: f64) -> Self {
        self.selection_pressure = pressure;
        self
    }

    pub fn with_elitism_fraction(mut self, fraction: f64) -> Self {
        self.elitism_fraction = fraction;
        self
    }

    pub fn with_diversity_maintenance(mut self, enabled: bool) -> Self {
        self.diversity_maintenance = enabled;
        self
    }

    pub fn with_convergence_window(mut self, window: usize) -> Self {
        self.convergence_window = window;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Reject out-of-range knobs before a run is created.
    pub fn validate(&self) -> Result<(), EvolutionError> {
        if !(1..=1000).contains(&self.population_size) {
            return Err(invalid("population_size", self.population_size, "1..=1000"));
        }
        if !(1..=10_000).contains(&self.max_generations) {
            return Err(invalid("max_generations", self.max_generations, "1..=10000"));
        }
        if !(0.0..=1.0).contains(&self.fitness_threshold) {
            return Err(invalid("fitness_threshold", self.fitness_threshold, "0..=1"));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(invalid("mutation_rate", self.mutation_rate, "0..=1"));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(invalid("crossover_rate", self.crossover_rate, "0..=1"));
        }
        if !(0.0..=10.0).contains(&self.selection_pressure) {
            return Err(invalid("selection_pressure", self.selection_pressure, "0..=10"));
        }
        if !(0.0..=1.0).contains(&self.elitism_fraction) {
            return Err(invalid("elitism_fraction", self.elitism_fraction, "0..=1"));
        }
        if self.convergence_threshold < 0.0 {
            return Err(invalid(
                "convergence_threshold",
                self.convergence_threshold,
                ">= 0",
            ));
        }
        if self.convergence_window == 0 {
            return Err(invalid("convergence_window", self.convergence_window, ">= 1"));
        }
        Ok(())
    }
}

fn invalid(
    field: &'static str,
    value: impl std::fmt::Display,
    expected: &'static str,
) -> EvolutionError {
    EvolutionError::InvalidConfig {
        field,
        value: value.to_string(),
        expected,
    }
}

// ── Optimizer ────────────────────────────────────────────────────────

/// Drives one evolution run: seed, advance, converge.
pub struct Optimizer {
    strategy: Arc<dyn EvolutionStrategy>,
    fitness: Arc<dyn FitnessSource>,
    config: EvolutionConfig,
    rng: StdRng,
    population: Vec<Individual>,
    /// Superseded generations, appended to and never deleted.
    archive: Vec<Individual>,
    /// Best fitness after seeding and after every generation.
    best_history: Vec<f64>,
    best_genome: String,
}

impl Optimizer {
    pub fn new(
        config: EvolutionConfig,
        fitness: Arc<dyn FitnessSource>,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let best_genome = config.seed_genome.clone();
        Ok(Self {
            strategy: strategy_for(config.strategy),
            fitness,
            config,
            rng,
            population: Vec::new(),
            archive: Vec::new(),
            best_history: Vec::new(),
            best_genome,
        })
    }

    /// Seed and score the initial population.
    ///
    /// A fitness failure here is fatal: the returned run is `Failed` and
    /// accepts no further generations.
    pub async fn start(&mut self) -> Result<EvolutionRun, EvolutionError> {
        let mut run = self.make_run();
        let strategy = Arc::clone(&self.strategy);
        let genomes = strategy.seed(
            &self.config.seed_genome,
            self.config.population_size,
            &mut self.rng,
        );
        let mut population: Vec<Individual> = genomes
            .into_iter()
            .map(|genome| Individual::new(run.id.clone(), genome, 0))
            .collect();

        if let Err(err) = self.score_unscored(&mut population, true).await {
            tracing::error!(run_id = %run.id, error = %err, "Population bootstrap failed");
            run.fail();
            return Ok(run);
        }

        let baseline = population.iter().map(Individual::fitness_or_zero).sum::<f64>()
            / population.len() as f64;
        run.start(baseline);
        self.population = population;
        self.update_best_genome();
        self.best_history.push(run.best_fitness_achieved);

        tracing::info!(
            run_id = %run.id,
            strategy = %run.strategy,
            population_size = run.population_size,
            baseline_fitness = baseline,
            "Evolution run started"
        );
        Ok(run)
    }

    /// Run one generation: score, select, vary, replace.
    pub async fn advance_generation(&mut self, run: &mut EvolutionRun) -> Result<(), EvolutionError> {
        if run.status != EvolutionStatus::Running {
            return Err(ModelError::NotRunning(format!("{:?}", run.status)).into());
        }
        if run.generations_exhausted() {
            return Err(ModelError::GenerationLimitReached {
                current: run.current_generation,
                max: run.max_generations,
            }
            .into());
        }

        let mut population = std::mem::take(&mut self.population);
        self.score_unscored(&mut population, false).await?;
        population.sort_by(|a, b| {
            b.fitness_or_zero()
                .partial_cmp(&a.fitness_or_zero())
                .unwrap_or(Ordering::Equal)
        });

        let elite_count = ((self.config.elitism_fraction * population.len() as f64).ceil()
            as usize)
            .min(population.len());
        let fitnesses: Vec<f64> = population.iter().map(Individual::fitness_or_zero).collect();
        let born_in = run.current_generation + 1;
        let best_genome = self.best_genome.clone();
        let strategy = Arc::clone(&self.strategy);

        let mut next: Vec<Individual> = population[..elite_count].to_vec();
        while next.len() < population.len() {
            let first = strategy.select(&fitnesses, self.config.selection_pressure, &mut self.rng);
            let second = strategy.select(&fitnesses, self.config.selection_pressure, &mut self.rng);
            let ctx = VariationContext {
                generation: run.current_generation,
                max_generations: run.max_generations,
                mutation_rate: self.config.mutation_rate,
                crossover_rate: self.config.crossover_rate,
                best_genome: &best_genome,
            };
            let mut genome = strategy.vary(
                &population[first].genome,
                &population[second].genome,
                &ctx,
                &mut self.rng,
            );
            if self.config.diversity_maintenance && is_near_duplicate(&genome, &next) {
                genome = strategy::mutate(&genome, RESEED_RATE, &mut self.rng);
            }
            next.push(Individual::new(run.id.clone(), genome, born_in));
        }

        self.score_unscored(&mut next, false).await?;
        let generation_best = next
            .iter()
            .map(Individual::fitness_or_zero)
            .fold(0.0, f64::max);

        self.archive.extend(population);
        self.population = next;
        self.update_best_genome();
        run.record_generation(generation_best)?;
        self.best_history.push(run.best_fitness_achieved);

        tracing::debug!(
            run_id = %run.id,
            generation = run.current_generation,
            generation_best,
            best_fitness = run.best_fitness_achieved,
            "Generation advanced"
        );
        Ok(())
    }

    /// Decide whether the run is done, completing it when it is.
    ///
    /// Convergence is reached at the fitness threshold, at the generation
    /// budget, or when the trailing-window improvement stalls. Exhausting
    /// the budget without reaching the threshold still completes the run,
    /// with whatever best was achieved.
    pub fn check_convergence(&self, run: &mut EvolutionRun) -> bool {
        if run.is_terminal() {
            return true;
        }
        if run.status != EvolutionStatus::Running {
            return false;
        }
        if run.best_fitness_achieved >= run.fitness_threshold {
            tracing::info!(run_id = %run.id, best = run.best_fitness_achieved, "Converged at fitness threshold");
            run.complete();
            return true;
        }
        if run.generations_exhausted() {
            tracing::info!(run_id = %run.id, best = run.best_fitness_achieved, "Generation budget exhausted");
            run.complete();
            return true;
        }
        let window = self.config.convergence_window;
        if self.best_history.len() > window {
            let latest = self.best_history[self.best_history.len() - 1];
            let earlier = self.best_history[self.best_history.len() - 1 - window];
            if latest - earlier < run.convergence_threshold {
                tracing::info!(run_id = %run.id, best = latest, "Improvement stalled over trailing window");
                run.complete();
                return true;
            }
        }
        false
    }

    /// Cancel a non-terminal run. Idempotent on terminal runs.
    pub fn cancel(&self, run: &mut EvolutionRun) {
        if !run.is_terminal() {
            run.cancel();
            tracing::info!(run_id = %run.id, "Evolution run cancelled");
        }
    }

    /// Current population, best first only right after an advance.
    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// All superseded individuals, in the order they were retired.
    pub fn archive(&self) -> &[Individual] {
        &self.archive
    }

    /// Best scored individual across the population and the archive.
    pub fn best_individual(&self) -> Option<&Individual> {
        self.archive
            .iter()
            .chain(self.population.iter())
            .filter(|i| i.is_scored())
            .max_by(|a, b| {
                a.fitness_or_zero()
                    .partial_cmp(&b.fitness_or_zero())
                    .unwrap_or(Ordering::Equal)
            })
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    fn make_run(&self) -> EvolutionRun {
        let mut run = EvolutionRun::new(self.config.strategy, self.config.population_size);
        run.max_generations = self.config.max_generations;
        run.fitness_threshold = self.config.fitness_threshold;
        run.mutation_rate = self.config.mutation_rate;
        run.crossover_rate = self.config.crossover_rate;
        run.selection_pressure = self.config.selection_pressure;
        run.elitism_fraction = self.config.elitism_fraction;
        run.diversity_maintenance = self.config.diversity_maintenance;
        run.convergence_threshold = self.config.convergence_threshold;
        run
    }

    /// Score every unscored individual concurrently.
    ///
    /// In strict mode (bootstrap) any failure is fatal; otherwise a
    /// failing individual scores zero and the run continues.
    async fn score_unscored(
        &self,
        individuals: &mut [Individual],
        strict: bool,
    ) -> Result<(), EvolutionError> {
        let pending: Vec<usize> = individuals
            .iter()
            .enumerate()
            .filter(|(_, individual)| !individual.is_scored())
            .map(|(index, _)| index)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let results = futures::future::join_all(
            pending
                .iter()
                .map(|&index| self.fitness.fitness(&individuals[index].genome)),
        )
        .await;

        for (&index, result) in pending.iter().zip(results) {
            let fitness = match result {
                Ok(value) => value.clamp(0.0, 1.0),
                Err(err) if strict => {
                    return Err(EvolutionError::BootstrapFailed(err.to_string()));
                }
                Err(err) => {
                    tracing::warn!(
                        individual_id = %individuals[index].id,
                        error = %err,
                        "Fitness evaluation failed, scoring zero"
                    );
                    0.0
                }
            };
            individuals[index].fitness = Some(fitness);
        }
        Ok(())
    }

    fn update_best_genome(&mut self) {
        if let Some(best) = self
            .population
            .iter()
            .filter(|i| i.is_scored())
            .max_by(|a, b| {
                a.fitness_or_zero()
                    .partial_cmp(&b.fitness_or_zero())
                    .unwrap_or(Ordering::Equal)
            })
        {
            self.best_genome = best.genome.clone();
        }
    }
}

/// Bounded similarity scan against already-accepted members.
fn is_near_duplicate(genome: &str, accepted: &[Individual]) -> bool {
    accepted
        .iter()
        .rev()
        .take(DIVERSITY_SCAN)
        .any(|member| similarity(genome, &member.genome) >= DIVERSITY_CEILING)
}

/// Positional character overlap over a bounded prefix.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().take(SIMILARITY_PREFIX).collect();
    let b: Vec<char> = b.chars().take(SIMILARITY_PREFIX).collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let matching = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    matching as f64 / longest as f64
}
