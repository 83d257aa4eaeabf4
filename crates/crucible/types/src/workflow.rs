//! Workflow runs: saga executions and their step results
//!
//! A [`WorkflowRun`] tracks one end-to-end saga execution: the ordered
//! step results, the run status, and timestamps. The engine in
//! `crucible-engine` is the sole writer of this state.

use crate::ids::{CandidateId, WorkflowRunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Run Status ───────────────────────────────────────────────────────

/// Lifecycle state of a workflow run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WorkflowStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    /// A step failed terminally; compensating actions are unwinding
    /// completed steps
    Compensating,
    /// Terminal failure; the best-effort compensation pass has finished
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

// ── Step Result ──────────────────────────────────────────────────────

/// Outcome of one saga step, including every retry attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    /// Input captured at first attempt; retries reuse it verbatim
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempt_count: u32,
}

impl StepResult {
    pub fn succeeded(
        name: impl Into<String>,
        input: serde_json::Value,
        output: serde_json::Value,
        attempt_count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            output: Some(output),
            error: None,
            attempt_count,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        input: serde_json::Value,
        error: impl Into<String>,
        attempt_count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            output: None,
            error: Some(error.into()),
            attempt_count,
        }
    }

    pub fn is_success(&self) -> bool {
        self.output.is_some() && self.error.is_none()
    }
}

// ── Workflow Run ─────────────────────────────────────────────────────

/// One saga execution: ordered step results plus lifecycle status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: WorkflowRunId,
    /// Step results in completion order
    pub steps: Vec<StepResult>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowRunId::generate(),
            steps: Vec::new(),
            status: WorkflowStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = WorkflowStatus::Running;
        self.updated_at = Utc::now();
    }

    /// Append a step result in completion order.
    pub fn record_step(&mut self, result: StepResult) {
        self.steps.push(result);
        self.updated_at = Utc::now();
    }

    pub fn succeed(&mut self) {
        self.status = WorkflowStatus::Succeeded;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn begin_compensation(&mut self) {
        self.status = WorkflowStatus::Compensating;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self) {
        self.status = WorkflowStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn cancel(&mut self) {
        self.status = WorkflowStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Find a step result by name.
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Output of the most recently completed successful step.
    pub fn final_output(&self) -> Option<&serde_json::Value> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.is_success())
            .and_then(|s| s.output.as_ref())
    }
}

impl Default for WorkflowRun {
    fn default() -> Self {
        Self::new()
    }
}

// ── Failure Report ───────────────────────────────────────────────────

/// Structured failure surfaced across the external boundary.
///
/// Raw internal errors never leave the engine; a failed run is always
/// described by which stage failed, whether compensation completed, and
/// the best candidate found so far.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailureReport {
    pub stage: String,
    pub attempt_count: u32,
    pub cause: String,
    pub compensation_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_candidate: Option<CandidateId>,
}

impl std::fmt::Display for FailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "stage '{}' failed after {} attempt(s): {} (compensation {})",
            self.stage,
            self.attempt_count,
            self.cause,
            if self.compensation_completed {
                "completed"
            } else {
                "incomplete"
            }
        )
    }
}
