//! Saga execution: concurrent scheduling, retries, compensation
//!
//! The engine loop is the sole writer of a [`WorkflowRun`]. Step
//! handlers run on spawned tasks and report back over an mpsc channel;
//! the loop applies each completion, schedules newly ready steps, and
//! unwinds compensation in reverse completion order when a step fails
//! terminally.

use crate::error::{EngineError, StepError};
use crate::progress::{ProgressEvent, ProgressSink, TracingProgressSink};
use crate::saga::SagaDefinition;
use crate::step::{CompensationHandler, StepContext, StepDefinition};
use crucible_types::{FailureReport, StepResult, WorkflowRun, WorkflowStatus};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Runs validated sagas to completion, compensation, or cancellation.
pub struct SagaEngine {
    progress: Arc<dyn ProgressSink>,
}

impl Default for SagaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SagaEngine {
    pub fn new() -> Self {
        Self {
            progress: Arc::new(TracingProgressSink),
        }
    }

    pub fn with_progress(progress: Arc<dyn ProgressSink>) -> Self {
        Self { progress }
    }

    /// Run a saga with no external cancellation.
    pub async fn run(
        &self,
        definition: &SagaDefinition,
        parameters: Value,
    ) -> Result<WorkflowRun, EngineError> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_with_cancellation(definition, parameters, cancel_rx)
            .await
    }

    /// Run a saga, stopping the schedule when `cancel_rx` flips to true.
    ///
    /// Cancellation blocks steps that have not started; in-flight steps
    /// run to their own completion or timeout and are recorded.
    pub async fn run_with_cancellation(
        &self,
        definition: &SagaDefinition,
        parameters: Value,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> Result<WorkflowRun, EngineError> {
        definition.validate()?;

        let steps: HashMap<String, StepDefinition> = definition
            .steps()
            .iter()
            .map(|s| (s.name.clone(), s.clone()))
            .collect();

        let mut run = WorkflowRun::new();
        run.start();
        self.progress.report(ProgressEvent::RunStarted {
            run_id: run.id.clone(),
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<(String, Result<Value, StepError>, u32)>();

        let mut scheduled: HashSet<String> = HashSet::new();
        let mut succeeded: HashSet<String> = HashSet::new();
        let mut outputs: HashMap<String, Value> = HashMap::new();
        let mut inputs: HashMap<String, Value> = HashMap::new();
        let mut compensations: Vec<(String, Arc<dyn CompensationHandler>, Value)> = Vec::new();
        let mut in_flight = 0usize;
        let mut halted = false;
        let mut cancel_requested = *cancel_rx.borrow();
        let mut watch_alive = true;
        let mut failed_stage = String::new();

        loop {
            if !halted && !cancel_requested {
                for name in ready_steps(definition, &succeeded, &scheduled) {
                    let Some(step) = steps.get(&name) else {
                        continue;
                    };
                    scheduled.insert(name.clone());

                    let upstream: HashMap<String, Value> = step
                        .dependencies
                        .iter()
                        .filter_map(|dep| outputs.get(dep).map(|v| (dep.clone(), v.clone())))
                        .collect();
                    let ctx = StepContext::new(parameters.clone(), upstream);
                    inputs.insert(name.clone(), ctx.to_record());
                    in_flight += 1;

                    spawn_step(step.clone(), ctx, tx.clone(), Arc::clone(&self.progress));
                }
            }

            if in_flight == 0 {
                break;
            }

            tokio::select! {
                completion = rx.recv() => {
                    let Some((name, result, attempts)) = completion else {
                        break;
                    };
                    in_flight -= 1;
                    let input = inputs.remove(&name).unwrap_or(Value::Null);
                    match result {
                        Ok(output) => {
                            run.record_step(StepResult::succeeded(
                                name.clone(),
                                input,
                                output.clone(),
                                attempts,
                            ));
                            succeeded.insert(name.clone());
                            if let Some(comp) = steps.get(&name).and_then(|s| s.compensation.clone())
                            {
                                compensations.push((name.clone(), comp, output.clone()));
                            }
                            outputs.insert(name, output);
                        }
                        Err(err) => {
                            run.record_step(StepResult::failed(
                                name.clone(),
                                input,
                                err.to_string(),
                                attempts,
                            ));
                            if !halted {
                                failed_stage = name;
                                halted = true;
                            }
                        }
                    }
                }
                changed = cancel_rx.changed(), if watch_alive => {
                    match changed {
                        Ok(()) => {
                            if *cancel_rx.borrow() {
                                cancel_requested = true;
                            }
                        }
                        Err(_) => watch_alive = false,
                    }
                }
            }
        }

        if halted {
            run.begin_compensation();
            self.unwind(&compensations).await;
            run.fail();
            self.progress.report(ProgressEvent::RunFailed {
                run_id: run.id.clone(),
                stage: failed_stage,
            });
        } else if cancel_requested && succeeded.len() < definition.steps().len() {
            run.cancel();
            self.progress.report(ProgressEvent::RunCancelled {
                run_id: run.id.clone(),
            });
        } else {
            run.succeed();
            self.progress.report(ProgressEvent::RunSucceeded {
                run_id: run.id.clone(),
            });
        }

        Ok(run)
    }

    /// Undo completed steps in reverse completion order, best effort.
    async fn unwind(&self, compensations: &[(String, Arc<dyn CompensationHandler>, Value)]) {
        for (name, handler, output) in compensations.iter().rev() {
            self.progress.report(ProgressEvent::CompensationStarted {
                step: name.clone(),
            });
            match handler.compensate(output).await {
                Ok(()) => {
                    self.progress.report(ProgressEvent::CompensationSucceeded {
                        step: name.clone(),
                    });
                }
                Err(err) => {
                    tracing::warn!(step = %name, error = %err, "compensation failed");
                    self.progress.report(ProgressEvent::CompensationFailed {
                        step: name.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
    }
}

fn ready_steps(
    definition: &SagaDefinition,
    succeeded: &HashSet<String>,
    scheduled: &HashSet<String>,
) -> Vec<String> {
    definition
        .steps()
        .iter()
        .filter(|s| {
            !scheduled.contains(&s.name) && s.dependencies.iter().all(|d| succeeded.contains(d))
        })
        .map(|s| s.name.clone())
        .collect()
}

fn spawn_step(
    step: StepDefinition,
    ctx: StepContext,
    tx: mpsc::UnboundedSender<(String, Result<Value, StepError>, u32)>,
    progress: Arc<dyn ProgressSink>,
) {
    tokio::spawn(async move {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            progress.report(ProgressEvent::StepStarted {
                step: step.name.clone(),
                attempt,
            });

            // Each attempt gets a clone of the same context, so retries
            // see identical inputs.
            let result = match step.timeout {
                Some(limit) => match tokio::time::timeout(limit, step.handler.execute(ctx.clone()))
                    .await
                {
                    Ok(inner) => inner,
                    Err(_) => Err(StepError::Transient(format!(
                        "timed out after {}ms",
                        limit.as_millis()
                    ))),
                },
                None => step.handler.execute(ctx.clone()).await,
            };

            match result {
                Ok(output) => {
                    progress.report(ProgressEvent::StepSucceeded {
                        step: step.name.clone(),
                        attempt,
                    });
                    let _ = tx.send((step.name, Ok(output), attempt));
                    return;
                }
                Err(err) if err.is_retryable() && attempt <= step.max_retries => {
                    progress.report(ProgressEvent::StepRetrying {
                        step: step.name.clone(),
                        attempt,
                        error: err.to_string(),
                    });
                }
                Err(err) => {
                    progress.report(ProgressEvent::StepFailed {
                        step: step.name.clone(),
                        attempts: attempt,
                        error: err.to_string(),
                    });
                    let _ = tx.send((step.name, Err(err), attempt));
                    return;
                }
            }
        }
    });
}

/// Describe a failed run across the external boundary.
///
/// Returns `None` while no step has failed.
pub fn failure_report(run: &WorkflowRun) -> Option<FailureReport> {
    let failed = run.steps.iter().find(|s| s.error.is_some())?;
    Some(FailureReport {
        stage: failed.name.clone(),
        attempt_count: failed.attempt_count,
        cause: failed.error.clone().unwrap_or_default(),
        compensation_completed: run.status == WorkflowStatus::Failed,
        best_candidate: None,
    })
}
