//! Structured requirement output consumed by the pipeline
//!
//! The requirements interpreter is an external collaborator; the core
//! only consumes its structured output.

use serde::{Deserialize, Serialize};

/// Parsed requirements: what the synthesizer generates against.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    /// Domain entities named by the requirements
    pub entities: Vec<String>,
    /// Features to be delivered
    pub features: Vec<String>,
    /// Hard constraints the artifact must respect
    pub constraints: Vec<String>,
    /// Interpreter confidence in its parse, `[0, 1]`
    pub confidence_score: f64,
}

impl Specification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entities.push(entity.into());
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn with_confidence(mut self, score: f64) -> Self {
        self.confidence_score = score.clamp(0.0, 1.0);
        self
    }

    /// Terms a compliant artifact is expected to mention.
    pub fn domain_terms(&self) -> impl Iterator<Item = &str> {
        self.entities
            .iter()
            .chain(self.features.iter())
            .map(String::as_str)
    }
}

/// A generation pattern suggested by the pattern analyzer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    pub description: String,
}

impl Pattern {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}
