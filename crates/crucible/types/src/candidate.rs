//! Candidates and their quality vectors
//!
//! A [`Candidate`] is one generated artifact variant. It is immutable once
//! created; the scorer attaches an [`EvaluationVector`] by producing a new
//! value rather than mutating in place.

use crate::ids::CandidateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Score ────────────────────────────────────────────────────────────

/// A quality score on a single dimension, held in `[0, 100]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Score(f64);

impl Score {
    /// Clamp into range. NaN folds to zero.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 100.0))
        }
    }

    pub fn zero() -> Self {
        Self(0.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

// ── Evaluation Vector ────────────────────────────────────────────────

/// Multi-dimensional quality score for a single candidate.
///
/// Fixed set of dimensions; derived and read-only once attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationVector {
    pub compilation_success: Score,
    pub test_coverage: Score,
    pub documentation_quality: Score,
    pub performance_score: Score,
    pub design_quality: Score,
    pub domain_compliance: Score,
    pub usability_score: Score,
    pub maintainability_index: Score,
}

impl EvaluationVector {
    /// All dimensions as `(name, score)` pairs, in declaration order.
    pub fn dimensions(&self) -> [(&'static str, Score); 8] {
        [
            ("compilation_success", self.compilation_success),
            ("test_coverage", self.test_coverage),
            ("documentation_quality", self.documentation_quality),
            ("performance_score", self.performance_score),
            ("design_quality", self.design_quality),
            ("domain_compliance", self.domain_compliance),
            ("usability_score", self.usability_score),
            ("maintainability_index", self.maintainability_index),
        ]
    }

    /// Mean across all eight dimensions, on the `[0, 100]` scale.
    pub fn average(&self) -> f64 {
        let dims = self.dimensions();
        dims.iter().map(|(_, s)| s.value()).sum::<f64>() / dims.len() as f64
    }

    /// Scalar fitness on `[0, 1]` (mean / 100).
    pub fn fitness(&self) -> f64 {
        self.average() / 100.0
    }

    /// A vector with every dimension at zero.
    pub fn zeroed() -> Self {
        Self {
            compilation_success: Score::zero(),
            test_coverage: Score::zero(),
            documentation_quality: Score::zero(),
            performance_score: Score::zero(),
            design_quality: Score::zero(),
            domain_compliance: Score::zero(),
            usability_score: Score::zero(),
            maintainability_index: Score::zero(),
        }
    }
}

// ── Candidate ────────────────────────────────────────────────────────

/// One generated artifact variant produced by the synthesizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique candidate identifier
    pub id: CandidateId,
    /// Generated source text
    pub source_text: String,
    /// Quality vector, attached by the scorer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationVector>,
    /// Generation this candidate was born in (0 for first-pass strategies)
    pub generation: u32,
    /// Parents this candidate was recombined from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_ids: Vec<CandidateId>,
    /// When the candidate was created
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(source_text: impl Into<String>) -> Self {
        Self {
            id: CandidateId::generate(),
            source_text: source_text.into(),
            evaluation: None,
            generation: 0,
            parent_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_parents(mut self, parents: Vec<CandidateId>) -> Self {
        self.parent_ids = parents;
        self
    }

    /// Return a copy of this candidate with the vector attached.
    pub fn with_evaluation(mut self, vector: EvaluationVector) -> Self {
        self.evaluation = Some(vector);
        self
    }

    /// Scalar fitness, or `None` if the candidate is unscored.
    pub fn fitness(&self) -> Option<f64> {
        self.evaluation.as_ref().map(|v| v.fitness())
    }
}
