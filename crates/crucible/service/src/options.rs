//! Entry-point options for generation and evolution

use crucible_types::EvolutionStrategyKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the final artifact is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Prototype,
    Production,
}

/// How much the service may do without an operator.
///
/// `Autonomous` lets the service act on a retry-with-improvements
/// verdict by regenerating on its own; `Supervised` surfaces the
/// verdict and stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    #[default]
    Supervised,
    Autonomous,
}

/// Options accepted by [`generate`].
///
/// [`generate`]: crate::CrucibleService::generate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// How many candidate strategies the synthesizer produces
    pub strategy_count: usize,
    /// Checkpoint acceptance threshold on the `[0, 100]` scale
    pub quality_threshold: f64,
    pub mode: GenerationMode,
    pub autonomy_level: AutonomyLevel,
    /// Pause between autonomous regeneration attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            strategy_count: 5,
            quality_threshold: 80.0,
            mode: GenerationMode::Prototype,
            autonomy_level: AutonomyLevel::Supervised,
            interval: None,
        }
    }
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy_count(mut self, count: usize) -> Self {
        self.strategy_count = count.max(1);
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold.clamp(0.0, 100.0);
        self
    }

    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_autonomy_level(mut self, level: AutonomyLevel) -> Self {
        self.autonomy_level = level;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

/// Options accepted by [`start_evolution`].
///
/// [`start_evolution`]: crate::CrucibleService::start_evolution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvolveOptions {
    pub strategy: EvolutionStrategyKind,
    pub population_size: usize,
    pub max_generations: u32,
    /// Convergence threshold on the `[0, 1]` fitness scale
    pub fitness_threshold: f64,
    /// Acceptance threshold for the post-run checkpoint, `[0, 100]`
    pub quality_threshold: f64,
    /// Pause between generations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl Default for EvolveOptions {
    fn default() -> Self {
        Self {
            strategy: EvolutionStrategyKind::Genetic,
            population_size: 10,
            max_generations: 25,
            fitness_threshold: 0.9,
            quality_threshold: 80.0,
            interval: None,
            rng_seed: None,
        }
    }
}

impl EvolveOptions {
    pub fn new(strategy: EvolutionStrategyKind) -> Self {
        Self {
            strategy,
            ..Self::default()
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

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold.clamp(0.0, 100.0);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}
