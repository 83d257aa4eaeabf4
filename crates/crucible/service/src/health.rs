//! Stateless system health aggregation
//!
//! Health is computed on demand from a store snapshot; nothing here
//! keeps live counters.

use crucible_types::{ProjectRecord, ProjectStatus};
use serde::{Deserialize, Serialize};

/// One point-in-time view of the project fleet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_flight: usize,
    /// Mean stored quality score, absent until a project carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_quality: Option<f64>,
    /// Non-terminal status holding the most projects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottleneck: Option<ProjectStatus>,
}

/// Aggregate a snapshot of project records.
pub fn aggregate(records: &[ProjectRecord]) -> SystemHealth {
    let total = records.len();
    let completed = records
        .iter()
        .filter(|r| r.status == ProjectStatus::Completed)
        .count();
    let failed = records
        .iter()
        .filter(|r| r.status == ProjectStatus::Failed)
        .count();
    let in_flight = total - completed - failed;

    let scores: Vec<f64> = records.iter().filter_map(|r| r.quality_score).collect();
    let average_quality = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let bottleneck = [
        ProjectStatus::Pending,
        ProjectStatus::Generating,
        ProjectStatus::Testing,
    ]
    .into_iter()
    .map(|status| {
        let count = records.iter().filter(|r| r.status == status).count();
        (status, count)
    })
    .filter(|(_, count)| *count > 0)
    .max_by_key(|(_, count)| *count)
    .map(|(status, _)| status);

    SystemHealth {
        total,
        completed,
        failed,
        in_flight,
        average_quality,
        bottleneck,
    }
}
