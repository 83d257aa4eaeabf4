//! Batch-level quality metrics
//!
//! Derived from a batch of scored candidates at checkpoint time.
//! Never persisted.

use crate::ids::CandidateId;
use serde::{Deserialize, Serialize};

/// Spread of per-candidate average quality across a batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub std_dev: f64,
}

impl Distribution {
    /// Compute from a set of per-candidate averages. Empty input yields zeros.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted: Vec<f64> = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };

        let mean = sorted.iter().sum::<f64>() / n as f64;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

        Self {
            min: sorted[0],
            max: sorted[n - 1],
            median,
            std_dev: variance.sqrt(),
        }
    }
}

/// Aggregate quality of one candidate batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Mean of per-candidate average quality, `[0, 100]`
    pub average_quality: f64,
    /// Fraction of candidates with a non-zero compilation score, `[0, 1]`
    pub success_rate: f64,
    /// Candidates that failed critically
    pub critical_failures: Vec<CandidateId>,
    /// Spread of per-candidate averages
    pub distribution: Distribution,
}

impl QualityMetrics {
    pub fn has_critical_failures(&self) -> bool {
        !self.critical_failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_empty() {
        let d = Distribution::from_values(&[]);
        assert_eq!(d, Distribution::default());
    }

    #[test]
    fn distribution_single() {
        let d = Distribution::from_values(&[42.0]);
        assert_eq!(d.min, 42.0);
        assert_eq!(d.max, 42.0);
        assert_eq!(d.median, 42.0);
        assert_eq!(d.std_dev, 0.0);
    }

    #[test]
    fn distribution_even_count_median() {
        let d = Distribution::from_values(&[10.0, 20.0, 30.0, 40.0]);
        assert_eq!(d.median, 25.0);
        assert_eq!(d.min, 10.0);
        assert_eq!(d.max, 40.0);
    }

    #[test]
    fn distribution_std_dev() {
        let d = Distribution::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((d.std_dev - 2.0).abs() < 1e-9);
    }

    #[test]
    fn metrics_critical_flag() {
        let mut m = QualityMetrics::default();
        assert!(!m.has_critical_failures());
        m.critical_failures.push(CandidateId::generate());
        assert!(m.has_critical_failures());
    }
}
