//! Batch quality gate: continue, retry with hints, or abort
//!
//! A checkpoint looks at a whole scored batch, never a single candidate.
//! It is pure: the same batch and threshold always produce the same
//! report, and candidates are never mutated.

use crucible_types::{Candidate, Distribution, EvaluationVector, QualityMetrics};

use crate::EvaluationError;

/// Outcome of a checkpoint decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CheckpointStatus {
    /// Batch quality suffices, proceed to selection.
    Continue,
    /// Batch is salvageable, regenerate with the listed improvements.
    RetryWithImprovements,
    /// Batch contains critical failures and falls short overall.
    Abort,
}

/// Full checkpoint output: decision, metrics, and remediation hints.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CheckpointReport {
    pub status: CheckpointStatus,
    pub metrics: QualityMetrics,
    /// Deduplicated remediation hints drawn from below-threshold candidates.
    pub improvements: Vec<String>,
    /// Human-oriented batch summary lines.
    pub recommendations: Vec<String>,
}

/// Applies the decision policy to a scored batch.
#[derive(Clone, Copy, Debug)]
pub struct Checkpoint {
    /// Pass threshold on the `[0, 100]` quality scale.
    threshold: f64,
}

/// Minimum fraction of compiling candidates for the primary pass rule.
const SUCCESS_RATE_FLOOR: f64 = 0.8;

/// Fraction of the threshold accepted when no candidate failed critically.
const SOFT_PASS_FACTOR: f64 = 0.9;

/// Below this domain-compliance score a candidate fails critically.
const DOMAIN_COMPLIANCE_FLOOR: f64 = 50.0;

impl Checkpoint {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 100.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Evaluate a batch and decide how the pipeline proceeds.
    ///
    /// Candidates without an evaluation vector count as all-zero scores.
    pub fn evaluate(&self, candidates: &[Candidate]) -> Result<CheckpointReport, EvaluationError> {
        if candidates.is_empty() {
            return Err(EvaluationError::EmptyBatch);
        }

        let metrics = self.metrics(candidates);
        let status = self.decide(&metrics);
        let improvements = self.improvements(candidates);
        let recommendations = recommendations(&metrics, status, self.threshold);

        tracing::info!(
            status = ?status,
            average_quality = metrics.average_quality,
            success_rate = metrics.success_rate,
            critical_failures = metrics.critical_failures.len(),
            batch_size = candidates.len(),
            "Checkpoint decided"
        );

        Ok(CheckpointReport {
            status,
            metrics,
            improvements,
            recommendations,
        })
    }

    fn metrics(&self, candidates: &[Candidate]) -> QualityMetrics {
        let averages: Vec<f64> = candidates
            .iter()
            .map(|c| vector_of(c).average())
            .collect();
        let average_quality = averages.iter().sum::<f64>() / averages.len() as f64;

        let compiling = candidates
            .iter()
            .filter(|c| vector_of(c).compilation_success.value() > 0.0)
            .count();
        let success_rate = compiling as f64 / candidates.len() as f64;

        let critical_failures = candidates
            .iter()
            .filter(|c| is_critical_failure(&vector_of(c)))
            .map(|c| c.id.clone())
            .collect();

        QualityMetrics {
            average_quality,
            success_rate,
            critical_failures,
            distribution: Distribution::from_values(&averages),
        }
    }

    /// Rules apply in order; the first that matches wins.
    fn decide(&self, metrics: &QualityMetrics) -> CheckpointStatus {
        if metrics.average_quality >= self.threshold && metrics.success_rate >= SUCCESS_RATE_FLOOR {
            return CheckpointStatus::Continue;
        }
        if !metrics.has_critical_failures()
            && metrics.average_quality >= self.threshold * SOFT_PASS_FACTOR
        {
            return CheckpointStatus::Continue;
        }
        if metrics.has_critical_failures() {
            return CheckpointStatus::Abort;
        }
        CheckpointStatus::RetryWithImprovements
    }

    /// Hints come only from candidates below the pass threshold; a strong
    /// candidate's weak dimension is not actionable batch feedback.
    fn improvements(&self, candidates: &[Candidate]) -> Vec<String> {
        let mut hints = Vec::new();
        for candidate in candidates {
            let vector = vector_of(candidate);
            if vector.average() >= self.threshold {
                continue;
            }
            if vector.documentation_quality.value() < 50.0 {
                push_unique(&mut hints, "add documentation");
            }
            if vector.test_coverage.value() < 60.0 {
                push_unique(&mut hints, "increase test coverage");
            }
            if vector.performance_score.value() < 70.0 {
                push_unique(&mut hints, "optimize performance");
            }
        }
        hints
    }
}

fn vector_of(candidate: &Candidate) -> EvaluationVector {
    candidate
        .evaluation
        .clone()
        .unwrap_or_else(EvaluationVector::zeroed)
}

fn is_critical_failure(vector: &EvaluationVector) -> bool {
    vector.compilation_success.value() == 0.0
        || vector.domain_compliance.value() < DOMAIN_COMPLIANCE_FLOOR
}

fn push_unique(hints: &mut Vec<String>, hint: &str) {
    if !hints.iter().any(|h| h == hint) {
        hints.push(hint.to_string());
    }
}

fn recommendations(
    metrics: &QualityMetrics,
    status: CheckpointStatus,
    threshold: f64,
) -> Vec<String> {
    let mut lines = vec![format!(
        "average quality {:.1} against threshold {:.1}",
        metrics.average_quality, threshold
    )];
    if metrics.success_rate < 1.0 {
        lines.push(format!(
            "{:.0}% of candidates compiled",
            metrics.success_rate * 100.0
        ));
    }
    if metrics.has_critical_failures() {
        lines.push(format!(
            "{} candidate(s) failed critically",
            metrics.critical_failures.len()
        ));
    }
    match status {
        CheckpointStatus::Continue => lines.push("batch accepted".to_string()),
        CheckpointStatus::RetryWithImprovements => {
            lines.push("regenerate weak candidates with the listed improvements".to_string());
        }
        CheckpointStatus::Abort => {
            lines.push("halt generation and surface the failure".to_string());
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_types::Score;

    fn vector_with(compilation: f64, uniform: f64) -> EvaluationVector {
        EvaluationVector {
            compilation_success: Score::new(compilation),
            test_coverage: Score::new(uniform),
            documentation_quality: Score::new(uniform),
            performance_score: Score::new(uniform),
            design_quality: Score::new(uniform),
            domain_compliance: Score::new(uniform),
            usability_score: Score::new(uniform),
            maintainability_index: Score::new(uniform),
        }
    }

    fn make_candidate(compilation: f64, uniform: f64) -> Candidate {
        Candidate::new("fn generated() {}").with_evaluation(vector_with(compilation, uniform))
    }

    #[test]
    fn healthy_batch_continues() {
        // Average 85, nine of ten compile, threshold 80.
        let mut batch: Vec<Candidate> = (0..9).map(|_| make_candidate(85.0, 85.0)).collect();
        batch.push(make_candidate(0.0, 85.0));

        let report = Checkpoint::new(80.0).evaluate(&batch).unwrap();
        // The non-compiling candidate is critical, but rule one fires first.
        assert_eq!(report.status, CheckpointStatus::Continue);
        assert!((report.metrics.success_rate - 0.9).abs() < 1e-9);
    }

    #[test]
    fn critical_failure_aborts_despite_high_average() {
        let batch = vec![
            make_candidate(100.0, 95.0),
            make_candidate(100.0, 95.0),
            make_candidate(0.0, 95.0),
        ];

        // Success rate 2/3 blocks rule one; the critical failure blocks the
        // soft pass and forces an abort.
        let report = Checkpoint::new(90.0).evaluate(&batch).unwrap();
        assert_eq!(report.status, CheckpointStatus::Abort);
        assert_eq!(report.metrics.critical_failures.len(), 1);
        assert_eq!(report.metrics.critical_failures[0], batch[2].id);
    }

    #[test]
    fn low_domain_compliance_is_critical() {
        let mut vector = vector_with(100.0, 80.0);
        vector.domain_compliance = Score::new(40.0);
        let batch = vec![Candidate::new("fn x() {}").with_evaluation(vector)];

        let report = Checkpoint::new(95.0).evaluate(&batch).unwrap();
        assert_eq!(report.status, CheckpointStatus::Abort);
        assert_eq!(report.metrics.critical_failures.len(), 1);
    }

    #[test]
    fn soft_pass_without_critical_failures() {
        // Average 74 misses threshold 80 but clears 0.9 * 80 = 72.
        let batch = vec![make_candidate(100.0, 74.0), make_candidate(100.0, 74.0)];

        let report = Checkpoint::new(80.0).evaluate(&batch).unwrap();
        assert_eq!(report.status, CheckpointStatus::Continue);
    }

    #[test]
    fn weak_but_clean_batch_retries() {
        let batch = vec![make_candidate(100.0, 55.0), make_candidate(100.0, 55.0)];

        let report = Checkpoint::new(80.0).evaluate(&batch).unwrap();
        assert_eq!(report.status, CheckpointStatus::RetryWithImprovements);
        assert!(report
            .improvements
            .contains(&"increase test coverage".to_string()));
        assert!(report
            .improvements
            .contains(&"optimize performance".to_string()));
    }

    #[test]
    fn improvements_are_deduplicated() {
        let batch = vec![make_candidate(100.0, 55.0), make_candidate(100.0, 58.0)];

        let report = Checkpoint::new(90.0).evaluate(&batch).unwrap();
        let coverage_hints = report
            .improvements
            .iter()
            .filter(|h| h.as_str() == "increase test coverage")
            .count();
        assert_eq!(coverage_hints, 1);
    }

    #[test]
    fn strong_candidates_contribute_no_hints() {
        // Above threshold, even with a weak documentation dimension.
        let mut vector = vector_with(100.0, 95.0);
        vector.documentation_quality = Score::new(30.0);
        let batch = vec![Candidate::new("fn x() {}").with_evaluation(vector)];

        let report = Checkpoint::new(80.0).evaluate(&batch).unwrap();
        assert!(report.improvements.is_empty());
    }

    #[test]
    fn unscored_candidates_count_as_zero() {
        let batch = vec![Candidate::new("fn x() {}")];

        let report = Checkpoint::new(80.0).evaluate(&batch).unwrap();
        assert_eq!(report.status, CheckpointStatus::Abort);
        assert_eq!(report.metrics.average_quality, 0.0);
        assert_eq!(report.metrics.success_rate, 0.0);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let err = Checkpoint::new(80.0).evaluate(&[]).unwrap_err();
        assert!(matches!(err, EvaluationError::EmptyBatch));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let batch = vec![make_candidate(100.0, 70.0), make_candidate(0.0, 40.0)];
        let checkpoint = Checkpoint::new(80.0);

        let first = checkpoint.evaluate(&batch).unwrap();
        let second = checkpoint.evaluate(&batch).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn abort_implies_critical_failures() {
        // Sweep a grid of batches; whenever the decision is Abort the
        // metrics must name at least one critical failure.
        for compilation in [0.0, 50.0, 100.0] {
            for uniform in [20.0, 45.0, 60.0, 90.0] {
                let batch = vec![make_candidate(compilation, uniform)];
                let report = Checkpoint::new(80.0).evaluate(&batch).unwrap();
                if report.status == CheckpointStatus::Abort {
                    assert!(report.metrics.has_critical_failures());
                }
            }
        }
    }

    #[test]
    fn report_round_trips_through_json() {
        let batch = vec![make_candidate(100.0, 85.0)];
        let report = Checkpoint::new(80.0).evaluate(&batch).unwrap();

        let json = serde_json::to_string(&report).unwrap();
        let restored: CheckpointReport = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, report);
    }
}
