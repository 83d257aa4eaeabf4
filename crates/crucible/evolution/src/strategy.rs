//! Search strategies behind a common trait
//!
//! The optimizer depends only on `seed` / `select` / `vary`. Strategies
//! are stateless; per-generation context arrives through
//! [`VariationContext`] and randomness through a caller-owned RNG so a
//! seeded run replays exactly.

use std::cmp::Ordering;
use std::sync::Arc;

use crucible_types::EvolutionStrategyKind;
use rand::rngs::StdRng;
use rand::Rng;

/// Mutation rate applied when spreading the seed genome.
const SEED_SPREAD: f64 = 0.05;

/// Per-character replacement rate once an offspring is chosen for mutation.
const CHAR_MUTATION: f64 = 0.02;

/// Per-character rate at full annealing temperature.
const ANNEAL_CHAR_RATE: f64 = 0.1;

/// Share of positions pulled from the companion parent.
const COGNITIVE_SHARE: f64 = 0.15;

/// Share of positions pulled from the best genome seen so far.
const SOCIAL_SHARE: f64 = 0.3;

/// Floor added to every weight so zero-fitness individuals stay selectable.
const SELECTION_FLOOR: f64 = 1e-6;

/// Per-generation inputs to variation.
#[derive(Clone, Copy, Debug)]
pub struct VariationContext<'a> {
    pub generation: u32,
    pub max_generations: u32,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    /// Genome of the best individual seen so far
    pub best_genome: &'a str,
}

/// One search strategy: how a population is seeded, selected from, and varied.
pub trait EvolutionStrategy: Send + Sync {
    fn kind(&self) -> EvolutionStrategyKind;

    /// Initial population derived from one seed genome. The seed itself
    /// is always kept as the first member.
    fn seed(&self, seed_genome: &str, population_size: usize, rng: &mut StdRng) -> Vec<String> {
        (0..population_size)
            .map(|i| {
                if i == 0 {
                    seed_genome.to_string()
                } else {
                    mutate(seed_genome, SEED_SPREAD, rng)
                }
            })
            .collect()
    }

    /// Pick a parent index from the fitness slice.
    fn select(&self, fitnesses: &[f64], pressure: f64, rng: &mut StdRng) -> usize {
        proportionate(fitnesses, pressure, rng)
    }

    /// Produce one offspring genome from two parents.
    fn vary(&self, first: &str, second: &str, ctx: &VariationContext<'_>, rng: &mut StdRng)
        -> String;
}

/// Build the implementation for a strategy kind.
pub fn strategy_for(kind: EvolutionStrategyKind) -> Arc<dyn EvolutionStrategy> {
    match kind {
        EvolutionStrategyKind::Genetic => Arc::new(Genetic),
        EvolutionStrategyKind::Differential => Arc::new(Differential),
        EvolutionStrategyKind::ParticleSwarm => Arc::new(ParticleSwarm),
        EvolutionStrategyKind::SimulatedAnnealing => Arc::new(SimulatedAnnealing),
        EvolutionStrategyKind::AbTesting => Arc::new(AbTesting),
        EvolutionStrategyKind::Hybrid => Arc::new(Hybrid),
    }
}

// ── Strategies ───────────────────────────────────────────────────────

/// Single-point crossover with character-level mutation.
pub struct Genetic;

impl EvolutionStrategy for Genetic {
    fn kind(&self) -> EvolutionStrategyKind {
        EvolutionStrategyKind::Genetic
    }

    fn vary(
        &self,
        first: &str,
        second: &str,
        ctx: &VariationContext<'_>,
        rng: &mut StdRng,
    ) -> String {
        let child = if rng.gen::<f64>() < ctx.crossover_rate {
            crossover(first, second, rng)
        } else {
            first.to_string()
        };
        if rng.gen::<f64>() < ctx.mutation_rate {
            mutate(&child, CHAR_MUTATION, rng)
        } else {
            child
        }
    }
}

/// Splices the parents' differing positions into the first parent.
pub struct Differential;

impl EvolutionStrategy for Differential {
    fn kind(&self) -> EvolutionStrategyKind {
        EvolutionStrategyKind::Differential
    }

    fn vary(
        &self,
        first: &str,
        second: &str,
        ctx: &VariationContext<'_>,
        rng: &mut StdRng,
    ) -> String {
        let a: Vec<char> = first.chars().collect();
        let b: Vec<char> = second.chars().collect();
        let mut child = a.clone();
        for i in 0..child.len().min(b.len()) {
            if a[i] != b[i] && rng.gen::<f64>() < ctx.crossover_rate {
                child[i] = b[i];
            }
        }
        let child: String = child.into_iter().collect();
        if rng.gen::<f64>() < ctx.mutation_rate {
            mutate(&child, CHAR_MUTATION, rng)
        } else {
            child
        }
    }
}

/// Pulls offspring toward the companion parent and the best genome so far.
pub struct ParticleSwarm;

impl EvolutionStrategy for ParticleSwarm {
    fn kind(&self) -> EvolutionStrategyKind {
        EvolutionStrategyKind::ParticleSwarm
    }

    fn vary(
        &self,
        first: &str,
        second: &str,
        ctx: &VariationContext<'_>,
        rng: &mut StdRng,
    ) -> String {
        let child = blend(first, second, COGNITIVE_SHARE, rng);
        let child = blend(&child, ctx.best_genome, SOCIAL_SHARE, rng);
        if rng.gen::<f64>() < ctx.mutation_rate {
            mutate(&child, CHAR_MUTATION, rng)
        } else {
            child
        }
    }
}

/// Temperature-scheduled mutation; the rate cools to zero at the final
/// generation. Never recombines.
pub struct SimulatedAnnealing;

impl EvolutionStrategy for SimulatedAnnealing {
    fn kind(&self) -> EvolutionStrategyKind {
        EvolutionStrategyKind::SimulatedAnnealing
    }

    fn vary(
        &self,
        first: &str,
        _second: &str,
        ctx: &VariationContext<'_>,
        rng: &mut StdRng,
    ) -> String {
        mutate(first, ANNEAL_CHAR_RATE * temperature(ctx), rng)
    }
}

/// Champion versus challenger: selection alternates between the current
/// best and a uniform pick; variation never recombines.
pub struct AbTesting;

impl EvolutionStrategy for AbTesting {
    fn kind(&self) -> EvolutionStrategyKind {
        EvolutionStrategyKind::AbTesting
    }

    fn select(&self, fitnesses: &[f64], _pressure: f64, rng: &mut StdRng) -> usize {
        let champion = fitnesses
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);
        if rng.gen_bool(0.5) {
            champion
        } else {
            rng.gen_range(0..fitnesses.len())
        }
    }

    fn vary(
        &self,
        first: &str,
        _second: &str,
        ctx: &VariationContext<'_>,
        rng: &mut StdRng,
    ) -> String {
        if rng.gen::<f64>() < ctx.mutation_rate {
            mutate(first, CHAR_MUTATION, rng)
        } else {
            first.to_string()
        }
    }
}

/// Genetic recombination with annealing-style cooling on the mutation rate.
pub struct Hybrid;

impl EvolutionStrategy for Hybrid {
    fn kind(&self) -> EvolutionStrategyKind {
        EvolutionStrategyKind::Hybrid
    }

    fn vary(
        &self,
        first: &str,
        second: &str,
        ctx: &VariationContext<'_>,
        rng: &mut StdRng,
    ) -> String {
        let child = if rng.gen::<f64>() < ctx.crossover_rate {
            crossover(first, second, rng)
        } else {
            first.to_string()
        };
        if rng.gen::<f64>() < ctx.mutation_rate {
            mutate(&child, CHAR_MUTATION * temperature(ctx), rng)
        } else {
            child
        }
    }
}

// ── Operators ────────────────────────────────────────────────────────

fn temperature(ctx: &VariationContext<'_>) -> f64 {
    let progress = f64::from(ctx.generation) / f64::from(ctx.max_generations.max(1));
    (1.0 - progress).max(0.0)
}

/// Fitness-proportionate selection; `pressure` exponentiates the weights,
/// so 0 is uniform and higher values sharpen bias toward top performers.
fn proportionate(fitnesses: &[f64], pressure: f64, rng: &mut StdRng) -> usize {
    let weights: Vec<f64> = fitnesses
        .iter()
        .map(|f| (f.max(0.0) + SELECTION_FLOOR).powf(pressure))
        .collect();
    let total: f64 = weights.iter().sum();
    let mut point = rng.gen::<f64>() * total;
    for (i, weight) in weights.iter().enumerate() {
        point -= weight;
        if point <= 0.0 {
            return i;
        }
    }
    weights.len().saturating_sub(1)
}

/// Swap tails at a random cut point in each parent.
pub(crate) fn crossover(first: &str, second: &str, rng: &mut StdRng) -> String {
    let a: Vec<char> = first.chars().collect();
    let b: Vec<char> = second.chars().collect();
    if a.is_empty() || b.is_empty() {
        return first.to_string();
    }
    let cut_a = rng.gen_range(0..=a.len());
    let cut_b = rng.gen_range(0..=b.len());
    a[..cut_a].iter().chain(b[cut_b..].iter()).collect()
}

/// Replace each character with probability `rate`.
pub(crate) fn mutate(genome: &str, rate: f64, rng: &mut StdRng) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz_(){};= ";
    genome
        .chars()
        .map(|ch| {
            if rng.gen::<f64>() < rate {
                ALPHABET[rng.gen_range(0..ALPHABET.len())] as char
            } else {
                ch
            }
        })
        .collect()
}

/// Character-wise blend: each position takes the `toward` character with
/// probability `share`.
fn blend(base: &str, toward: &str, share: f64, rng: &mut StdRng) -> String {
    let toward: Vec<char> = toward.chars().collect();
    base.chars()
        .enumerate()
        .map(|(i, ch)| {
            if i < toward.len() && rng.gen::<f64>() < share {
                toward[i]
            } else {
                ch
            }
        })
        .collect()
}
