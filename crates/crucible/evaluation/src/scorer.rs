//! Eight independent quality probes over candidate source text
//!
//! Probes are heuristic and structural. They do not execute or fully
//! parse the candidate; they look at markers a reviewer would scan for.
//! Each probe is side-effect-free and total: undeterminable input scores
//! zero for that dimension only.

use crucible_types::{Candidate, EvaluationVector, Score, Specification};

/// Scores a single candidate on every quality dimension.
///
/// Pure and deterministic: identical input yields an identical vector.
#[derive(Clone, Debug, Default)]
pub struct Scorer {
    /// Lowercased terms a compliant candidate is expected to mention
    required_terms: Vec<String>,
}

impl Scorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scorer whose domain-compliance probe checks the given
    /// specification's entities and features.
    pub fn for_specification(spec: &Specification) -> Self {
        Self {
            required_terms: spec.domain_terms().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// Compute the full evaluation vector for one candidate.
    pub fn score(&self, candidate: &Candidate) -> EvaluationVector {
        let text = candidate.source_text.as_str();

        let compilation_success = Score::new(probe_compilation(text));
        let test_coverage = Score::new(probe_test_coverage(text));
        let documentation_quality = Score::new(probe_documentation(text));
        let performance_score = Score::new(probe_performance(text));
        let design_quality = Score::new(probe_design(text));
        let domain_compliance = Score::new(self.probe_domain_compliance(text));
        let usability_score = Score::new(probe_usability(text));

        // Defined as the exact mean of these three, never probed directly.
        let maintainability_index = Score::new(
            (documentation_quality.value() + design_quality.value() + test_coverage.value()) / 3.0,
        );

        let vector = EvaluationVector {
            compilation_success,
            test_coverage,
            documentation_quality,
            performance_score,
            design_quality,
            domain_compliance,
            usability_score,
            maintainability_index,
        };

        tracing::debug!(
            candidate_id = %candidate.id,
            average = vector.average(),
            compilation = compilation_success.value(),
            "Candidate scored"
        );

        vector
    }

    fn probe_domain_compliance(&self, text: &str) -> f64 {
        // Nothing demanded means nothing violated.
        if self.required_terms.is_empty() {
            return 100.0;
        }
        let lower = text.to_lowercase();
        let present = self
            .required_terms
            .iter()
            .filter(|term| lower.contains(term.as_str()))
            .count();
        present as f64 / self.required_terms.len() as f64 * 100.0
    }
}

// ── Probes ───────────────────────────────────────────────────────────

/// Syntactic-parse check: non-empty text with balanced delimiters.
fn probe_compilation(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let mut stack = Vec::new();
    for ch in text.chars() {
        match ch {
            '(' | '[' | '{' => stack.push(ch),
            ')' => {
                if stack.pop() != Some('(') {
                    return 0.0;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return 0.0;
                }
            }
            '}' => {
                if stack.pop() != Some('{') {
                    return 0.0;
                }
            }
            _ => {}
        }
    }

    if stack.is_empty() {
        100.0
    } else {
        0.0
    }
}

/// Test-marker density: `#[test]` attributes and assertions.
fn probe_test_coverage(text: &str) -> f64 {
    let tests = text.matches("#[test]").count();
    let asserts = text.matches("assert").count();
    (tests as f64 * 30.0 + asserts as f64 * 5.0).min(100.0)
}

/// Comment-line density.
fn probe_documentation(text: &str) -> f64 {
    let total = text.lines().count();
    if total == 0 {
        return 0.0;
    }
    let documented = text
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            trimmed.starts_with("///") || trimmed.starts_with("//!") || trimmed.starts_with("//")
        })
        .count();
    (documented as f64 / total as f64 * 400.0).min(100.0)
}

/// Penalizes nested loops and repeated clones.
fn probe_performance(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let nested_loops = text
        .lines()
        .filter(|line| {
            let indent = line.len() - line.trim_start().len();
            let trimmed = line.trim_start();
            indent >= 8 && (trimmed.starts_with("for ") || trimmed.starts_with("while "))
        })
        .count();
    let clones = text.matches(".clone()").count();

    (100.0 - nested_loops as f64 * 20.0 - clones as f64 * 5.0).max(0.0)
}

/// Structural markers: functions, data types, impls, traits, line discipline.
fn probe_design(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let mut score: f64 = 0.0;
    if text.contains("fn ") {
        score += 25.0;
    }
    if text.contains("struct ") || text.contains("enum ") {
        score += 25.0;
    }
    if text.contains("impl ") {
        score += 20.0;
    }
    if text.contains("trait ") {
        score += 15.0;
    }

    let lines = text.lines().count();
    let long_lines = text.lines().filter(|l| l.len() > 100).count();
    if lines > 0 && long_lines * 10 <= lines {
        score += 15.0;
    }

    score.min(100.0)
}

/// Public-surface markers.
fn probe_usability(text: &str) -> f64 {
    let pub_items = text.matches("pub fn ").count()
        + text.matches("pub struct ").count()
        + text.matches("pub enum ").count()
        + text.matches("pub trait ").count();
    (pub_items as f64 * 20.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"
//! Billing service
/// Computes an invoice total.
pub fn invoice_total(items: &[u64]) -> u64 {
    items.iter().sum()
}

pub struct Invoice {
    total: u64,
}

#[test]
fn totals_sum() {
    assert_eq!(invoice_total(&[1, 2]), 3);
}
"#;

    fn scored(text: &str) -> EvaluationVector {
        Scorer::new().score(&Candidate::new(text))
    }

    #[test]
    fn well_formed_source_compiles() {
        let v = scored(WELL_FORMED);
        assert_eq!(v.compilation_success.value(), 100.0);
        assert!(v.test_coverage.value() > 0.0);
        assert!(v.documentation_quality.value() > 0.0);
        assert!(v.usability_score.value() > 0.0);
    }

    #[test]
    fn unparseable_source_zeroes_only_compilation() {
        // Unbalanced brace: compilation fails, other probes still run.
        let v = scored("/// doc\npub fn broken( {");
        assert_eq!(v.compilation_success.value(), 0.0);
        assert!(v.documentation_quality.value() > 0.0);
        assert!(v.usability_score.value() > 0.0);
    }

    #[test]
    fn empty_source_scores_zero_everywhere_probed() {
        let v = scored("");
        assert_eq!(v.compilation_success.value(), 0.0);
        assert_eq!(v.test_coverage.value(), 0.0);
        assert_eq!(v.documentation_quality.value(), 0.0);
        assert_eq!(v.performance_score.value(), 0.0);
        assert_eq!(v.design_quality.value(), 0.0);
        assert_eq!(v.usability_score.value(), 0.0);
    }

    #[test]
    fn maintainability_is_exact_mean() {
        let v = scored(WELL_FORMED);
        let expected = (v.documentation_quality.value()
            + v.design_quality.value()
            + v.test_coverage.value())
            / 3.0;
        assert_eq!(v.maintainability_index.value(), expected);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let candidate = Candidate::new(WELL_FORMED);
        let scorer = Scorer::new();
        assert_eq!(scorer.score(&candidate), scorer.score(&candidate));
    }

    #[test]
    fn domain_compliance_tracks_required_terms() {
        let spec = Specification::new()
            .with_entity("Invoice")
            .with_feature("refund");
        let scorer = Scorer::for_specification(&spec);

        let half = scorer.score(&Candidate::new("pub struct Invoice {}"));
        assert_eq!(half.domain_compliance.value(), 50.0);

        let full = scorer.score(&Candidate::new("pub struct Invoice {} // refund flow"));
        assert_eq!(full.domain_compliance.value(), 100.0);
    }

    #[test]
    fn domain_compliance_defaults_full_without_terms() {
        let v = scored("anything");
        assert_eq!(v.domain_compliance.value(), 100.0);
    }

    #[test]
    fn nested_loops_penalized() {
        let flat = scored("fn f() {\n    for i in 0..10 { work(i); }\n}");
        let nested = scored("fn f() {\n    for i in 0..10 {\n        for j in 0..10 { work(i, j); }\n    }\n}");
        assert!(nested.performance_score.value() < flat.performance_score.value());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_dimension_in_range(text in ".*") {
                let v = Scorer::new().score(&Candidate::new(text));
                for (_, score) in v.dimensions() {
                    prop_assert!(score.value() >= 0.0);
                    prop_assert!(score.value() <= 100.0);
                }
            }

            #[test]
            fn maintainability_mean_holds(text in ".*") {
                let v = Scorer::new().score(&Candidate::new(text));
                let expected = (v.documentation_quality.value()
                    + v.design_quality.value()
                    + v.test_coverage.value())
                    / 3.0;
                prop_assert_eq!(v.maintainability_index.value(), expected);
            }
        }
    }
}
