//! Population-based optimization of generated candidates
//!
//! One [`Optimizer`] drives one [`EvolutionRun`]: it seeds a population
//! from a starting genome, scores it through a [`FitnessSource`], and
//! advances generations under a pluggable [`EvolutionStrategy`] until
//! the run converges. The generation loop is single-threaded over its
//! own state; only fitness evaluation fans out concurrently.
//!
//! [`EvolutionRun`]: crucible_types::EvolutionRun

#![deny(unsafe_code)]

pub mod error;
pub mod fitness;
pub mod optimizer;
pub mod strategy;

pub use error::EvolutionError;
pub use fitness::{ConstantFitness, FailingFitness, FitnessSource, FlakyFitness, ScorerFitness};
pub use optimizer::{EvolutionConfig, Optimizer};
pub use strategy::{strategy_for, EvolutionStrategy, VariationContext};
