//! Generation pipeline and service entry points
//!
//! [`CrucibleService`] wires external collaborators into a saga-backed
//! generation pipeline: requirements are parsed, strategies generated,
//! candidates evaluated against a checkpoint, and the winner persisted.
//! Stored projects can then be improved further through an evolution
//! run. Simulated collaborators make the whole surface testable without
//! any external system.

#![deny(unsafe_code)]

pub mod collaborators;
pub mod error;
pub mod health;
pub mod options;
pub mod pipeline;
pub mod service;

pub use collaborators::{
    CodeSynthesizer, FailingAnalyzer, FailingInterpreter, FailingProjectStore, FailingSynthesizer,
    InMemoryProjectStore, PatternAnalyzer, ProjectStore, RequirementsInterpreter,
    SimulatedAnalyzer, SimulatedInterpreter, SimulatedSynthesizer,
};
pub use error::{CollaboratorError, ServiceError};
pub use health::{aggregate, SystemHealth};
pub use options::{AutonomyLevel, EvolveOptions, GenerateOptions, GenerationMode};
pub use pipeline::{candidate_quality, EvaluationOutput, GenerationPipeline, SelectionOutput};
pub use service::{CrucibleService, EvolutionHandle, ProjectHandle};
