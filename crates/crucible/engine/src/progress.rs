//! Progress reporting for saga runs

use crucible_types::WorkflowRunId;
use std::sync::Mutex;

/// One observable moment in a saga run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    RunStarted {
        run_id: WorkflowRunId,
    },
    StepStarted {
        step: String,
        attempt: u32,
    },
    StepSucceeded {
        step: String,
        attempt: u32,
    },
    StepRetrying {
        step: String,
        attempt: u32,
        error: String,
    },
    StepFailed {
        step: String,
        attempts: u32,
        error: String,
    },
    CompensationStarted {
        step: String,
    },
    CompensationSucceeded {
        step: String,
    },
    CompensationFailed {
        step: String,
        error: String,
    },
    RunSucceeded {
        run_id: WorkflowRunId,
    },
    RunFailed {
        run_id: WorkflowRunId,
        stage: String,
    },
    RunCancelled {
        run_id: WorkflowRunId,
    },
}

/// Receives progress events as the engine emits them.
///
/// Sinks are called from the engine loop and must not block.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

// ── Tracing Sink ─────────────────────────────────────────────────────

/// Default sink: forwards events to the `tracing` subscriber.
#[derive(Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { run_id } => {
                tracing::info!(run_id = %run_id, "workflow run started");
            }
            ProgressEvent::StepStarted { step, attempt } => {
                tracing::info!(%step, attempt, "step started");
            }
            ProgressEvent::StepSucceeded { step, attempt } => {
                tracing::info!(%step, attempt, "step succeeded");
            }
            ProgressEvent::StepRetrying {
                step,
                attempt,
                error,
            } => {
                tracing::warn!(%step, attempt, %error, "step retrying");
            }
            ProgressEvent::StepFailed {
                step,
                attempts,
                error,
            } => {
                tracing::error!(%step, attempts, %error, "step failed");
            }
            ProgressEvent::CompensationStarted { step } => {
                tracing::info!(%step, "compensation started");
            }
            ProgressEvent::CompensationSucceeded { step } => {
                tracing::info!(%step, "compensation succeeded");
            }
            ProgressEvent::CompensationFailed { step, error } => {
                tracing::warn!(%step, %error, "compensation failed");
            }
            ProgressEvent::RunSucceeded { run_id } => {
                tracing::info!(run_id = %run_id, "workflow run succeeded");
            }
            ProgressEvent::RunFailed { run_id, stage } => {
                tracing::error!(run_id = %run_id, %stage, "workflow run failed");
            }
            ProgressEvent::RunCancelled { run_id } => {
                tracing::warn!(run_id = %run_id, "workflow run cancelled");
            }
        }
    }
}

// ── Recording Sink ───────────────────────────────────────────────────

/// Captures every event in order. Intended for tests and diagnostics.
#[derive(Default)]
pub struct RecordingProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}
