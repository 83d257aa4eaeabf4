//! Entry points: generation, evolution, and health
//!
//! [`CrucibleService`] owns the collaborators and runs the workflows.
//! Raw step errors never cross this boundary; a failed generation is
//! always described by a [`FailureReport`].
//!
//! [`FailureReport`]: crucible_types::FailureReport

use crate::collaborators::{
    CodeSynthesizer, InMemoryProjectStore, PatternAnalyzer, ProjectStore, RequirementsInterpreter,
    SimulatedAnalyzer, SimulatedInterpreter, SimulatedSynthesizer,
};
use crate::error::ServiceError;
use crate::health::{self, SystemHealth};
use crate::options::{AutonomyLevel, EvolveOptions, GenerateOptions};
use crate::pipeline::{
    self, candidate_quality, EvaluationOutput, GenerationPipeline, SelectionOutput,
};
use crucible_engine::{ProgressSink, SagaEngine};
use crucible_evaluation::{Checkpoint, CheckpointStatus, Scorer};
use crucible_evolution::{EvolutionConfig, Optimizer, ScorerFitness};
use crucible_types::{
    Candidate, CandidateId, EvolutionRun, EvolutionStatus, FailureReport, ProjectId,
    ProjectRecord, ProjectStatus, ProjectUpdate, WorkflowRun, WorkflowRunId, WorkflowStatus,
};
use serde::Serialize;
use std::sync::Arc;

// ── Handles ──────────────────────────────────────────────────────────

/// Successful generation outcome.
#[derive(Clone, Debug, Serialize)]
pub struct ProjectHandle {
    pub project_id: ProjectId,
    pub workflow_run_id: WorkflowRunId,
    pub best_candidate: CandidateId,
    /// Mean evaluation score of the selected candidate, `[0, 100]`
    pub quality_score: f64,
    pub checkpoint_status: CheckpointStatus,
    /// Remediation hints from the checkpoint, if any
    pub improvements: Vec<String>,
    /// Generation attempts consumed, including autonomous retries
    pub attempts: u32,
}

/// Outcome of an evolution run against a stored project result.
#[derive(Clone, Debug, Serialize)]
pub struct EvolutionHandle {
    pub project_id: ProjectId,
    pub run: EvolutionRun,
    /// Whether the evolved artifact passed the acceptance checkpoint
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_quality: Option<f64>,
}

// ── Service ──────────────────────────────────────────────────────────

/// Owns the collaborators and drives generation and evolution.
pub struct CrucibleService {
    interpreter: Arc<dyn RequirementsInterpreter>,
    analyzer: Arc<dyn PatternAnalyzer>,
    synthesizer: Arc<dyn CodeSynthesizer>,
    store: Arc<dyn ProjectStore>,
    engine: SagaEngine,
}

impl CrucibleService {
    pub fn new(
        interpreter: Arc<dyn RequirementsInterpreter>,
        analyzer: Arc<dyn PatternAnalyzer>,
        synthesizer: Arc<dyn CodeSynthesizer>,
        store: Arc<dyn ProjectStore>,
    ) -> Self {
        Self {
            interpreter,
            analyzer,
            synthesizer,
            store,
            engine: SagaEngine::new(),
        }
    }

    /// A service wired entirely to simulated collaborators.
    pub fn simulated() -> Self {
        Self::new(
            Arc::new(SimulatedInterpreter::new()),
            Arc::new(SimulatedAnalyzer::new()),
            Arc::new(SimulatedSynthesizer::new()),
            Arc::new(InMemoryProjectStore::new()),
        )
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.engine = SagaEngine::with_progress(sink);
        self
    }

    pub fn store(&self) -> Arc<dyn ProjectStore> {
        Arc::clone(&self.store)
    }

    fn pipeline(&self) -> GenerationPipeline {
        GenerationPipeline::new(
            Arc::clone(&self.interpreter),
            Arc::clone(&self.analyzer),
            Arc::clone(&self.synthesizer),
            Arc::clone(&self.store),
        )
    }

    /// Create a project and run the generation saga to completion.
    ///
    /// Under [`AutonomyLevel::Autonomous`] a retry-with-improvements
    /// verdict triggers one regeneration with a widened strategy batch.
    pub async fn generate(
        &self,
        name: &str,
        requirements_text: &str,
        options: GenerateOptions,
    ) -> Result<ProjectHandle, ServiceError> {
        let record = ProjectRecord::new(name, requirements_text);
        let project_id = record.id.clone();
        self.store.insert(record).await?;

        let max_attempts = match options.autonomy_level {
            AutonomyLevel::Autonomous => 2,
            AutonomyLevel::Supervised => 1,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let attempt_options = if attempt == 1 {
                options.clone()
            } else {
                options
                    .clone()
                    .with_strategy_count(options.strategy_count + 2)
            };

            self.store
                .update(&project_id, ProjectUpdate::status(ProjectStatus::Generating))
                .await?;

            let saga = self.pipeline().saga(&project_id)?;
            let parameters = serde_json::json!({
                "project_id": project_id,
                "name": name,
                "requirements": requirements_text,
                "language": "en",
                "strategy_count": attempt_options.strategy_count,
                "quality_threshold": attempt_options.quality_threshold,
                "mode": attempt_options.mode,
            });
            let run = self.engine.run(&saga, parameters).await?;

            if run.status != WorkflowStatus::Succeeded {
                return Err(ServiceError::Generation(describe_failure(&run)));
            }

            let evaluation: EvaluationOutput = step_output(&run, pipeline::EVALUATE_CANDIDATES)?;
            let selection: SelectionOutput = step_output(&run, pipeline::SELECT_BEST)?;
            let status = evaluation.report.status;

            if status == CheckpointStatus::RetryWithImprovements && attempt < max_attempts {
                tracing::info!(
                    project_id = %project_id,
                    attempt,
                    hints = evaluation.report.improvements.len(),
                    "regenerating after retry verdict"
                );
                if let Some(pause) = options.interval {
                    tokio::time::sleep(pause).await;
                }
                continue;
            }

            tracing::info!(
                project_id = %project_id,
                run_id = %run.id,
                quality = selection.quality,
                attempts = attempt,
                "generation finished"
            );
            return Ok(ProjectHandle {
                project_id,
                workflow_run_id: run.id.clone(),
                best_candidate: selection.candidate.id,
                quality_score: selection.quality,
                checkpoint_status: status,
                improvements: evaluation.report.improvements,
                attempts: attempt,
            });
        }
    }

    /// Evolve a project's stored result and re-run acceptance on the
    /// best individual. Persists at every generation boundary.
    pub async fn start_evolution(
        &self,
        project_id: &ProjectId,
        options: EvolveOptions,
    ) -> Result<EvolutionHandle, ServiceError> {
        let record = self
            .store
            .get(project_id)
            .await?
            .ok_or_else(|| ServiceError::ProjectNotFound(project_id.clone()))?;
        let seed_genome = record
            .result
            .clone()
            .ok_or_else(|| ServiceError::NoStoredResult(project_id.clone()))?;

        let spec = self
            .interpreter
            .parse(&record.requirements_text, "en")
            .await?;

        let mut config = EvolutionConfig::new(options.strategy, seed_genome)
            .with_population_size(options.population_size)
            .with_max_generations(options.max_generations)
            .with_fitness_threshold(options.fitness_threshold);
        if let Some(seed) = options.rng_seed {
            config = config.with_rng_seed(seed);
        }
        let fitness = Arc::new(ScorerFitness::for_specification(&spec));
        let mut optimizer = Optimizer::new(config, fitness)?;

        self.store
            .update(project_id, ProjectUpdate::status(ProjectStatus::Testing))
            .await?;

        let mut run = optimizer.start().await?;
        while !optimizer.check_convergence(&mut run) {
            optimizer.advance_generation(&mut run).await?;
            self.store
                .update(
                    project_id,
                    ProjectUpdate::default()
                        .with_quality_score(run.best_fitness_achieved * 100.0),
                )
                .await?;
            if let Some(pause) = options.interval {
                tokio::time::sleep(pause).await;
            }
        }

        if run.status != EvolutionStatus::Completed {
            self.store
                .update(
                    project_id,
                    ProjectUpdate::status(ProjectStatus::Failed)
                        .with_error_message("evolution run did not complete"),
                )
                .await?;
            return Ok(EvolutionHandle {
                project_id: project_id.clone(),
                run,
                accepted: false,
                final_quality: None,
            });
        }

        let Some(best) = optimizer.best_individual().cloned() else {
            self.store
                .update(project_id, ProjectUpdate::status(ProjectStatus::Completed))
                .await?;
            return Ok(EvolutionHandle {
                project_id: project_id.clone(),
                run,
                accepted: false,
                final_quality: None,
            });
        };

        let candidate = Candidate::new(best.genome.clone()).with_generation(best.generation_born);
        let scorer = Scorer::for_specification(&spec);
        let vector = scorer.score(&candidate);
        let scored = candidate.with_evaluation(vector);
        let quality = candidate_quality(&scored);
        let report =
            Checkpoint::new(options.quality_threshold).evaluate(std::slice::from_ref(&scored))?;
        let accepted = report.status == CheckpointStatus::Continue;

        let mut update = ProjectUpdate::status(ProjectStatus::Completed);
        if accepted {
            update = update
                .with_result(best.genome)
                .with_quality_score(quality)
                .with_best_candidate(scored.id.clone());
        }
        self.store.update(project_id, update).await?;

        tracing::info!(
            project_id = %project_id,
            run_id = %run.id,
            accepted,
            best_fitness = run.best_fitness_achieved,
            "evolution finished"
        );
        Ok(EvolutionHandle {
            project_id: project_id.clone(),
            run,
            accepted,
            final_quality: Some(quality),
        })
    }

    /// Aggregate health from a fresh store snapshot.
    pub async fn health(&self) -> Result<SystemHealth, ServiceError> {
        Ok(health::aggregate(&self.store.list().await?))
    }
}

// ── Failure shaping ──────────────────────────────────────────────────

/// Build the boundary-safe report for a run that did not succeed.
fn describe_failure(run: &WorkflowRun) -> FailureReport {
    let mut report = crucible_engine::failure_report(run).unwrap_or_else(|| FailureReport {
        stage: "workflow".into(),
        attempt_count: 0,
        cause: "workflow did not complete".into(),
        compensation_completed: run.status == WorkflowStatus::Failed,
        best_candidate: None,
    });
    report.best_candidate = best_candidate_so_far(run);
    report
}

/// Best candidate identified before the run stopped, if any step got
/// that far.
fn best_candidate_so_far(run: &WorkflowRun) -> Option<CandidateId> {
    if let Some(output) = run
        .step(pipeline::SELECT_BEST)
        .and_then(|s| s.output.clone())
    {
        if let Ok(selection) = serde_json::from_value::<SelectionOutput>(output) {
            return Some(selection.candidate.id);
        }
    }
    if let Some(output) = run
        .step(pipeline::EVALUATE_CANDIDATES)
        .and_then(|s| s.output.clone())
    {
        if let Ok(evaluation) = serde_json::from_value::<EvaluationOutput>(output) {
            return evaluation
                .candidates
                .into_iter()
                .max_by(|a, b| candidate_quality(a).total_cmp(&candidate_quality(b)))
                .map(|c| c.id);
        }
    }
    None
}

fn step_output<T: serde::de::DeserializeOwned>(
    run: &WorkflowRun,
    step: &str,
) -> Result<T, ServiceError> {
    let value = run
        .step(step)
        .and_then(|s| s.output.clone())
        .ok_or_else(|| ServiceError::MissingStepOutput(step.to_string()))?;
    serde_json::from_value(value).map_err(|_| ServiceError::MissingStepOutput(step.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::FailingSynthesizer;
    use crucible_types::EvolutionStrategyKind;

    const RICH_REQUIREMENTS: &str = "Create Invoice and Customer records. Support refund \
                                     and report. The service must stay deterministic.";

    fn failing_synth_service() -> CrucibleService {
        CrucibleService::new(
            Arc::new(SimulatedInterpreter::new()),
            Arc::new(SimulatedAnalyzer::new()),
            Arc::new(FailingSynthesizer),
            Arc::new(InMemoryProjectStore::new()),
        )
    }

    #[tokio::test]
    async fn generate_end_to_end_with_simulated_collaborators() {
        let service = CrucibleService::simulated();
        let handle = service
            .generate("billing", RICH_REQUIREMENTS, GenerateOptions::default())
            .await
            .unwrap();

        assert!(handle.quality_score > 80.0);
        assert_eq!(handle.checkpoint_status, CheckpointStatus::Continue);
        assert_eq!(handle.attempts, 1);

        let stored = service
            .store()
            .get(&handle.project_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ProjectStatus::Completed);
        assert!(stored.result.unwrap().contains("Invoice"));
        assert_eq!(stored.best_candidate, Some(handle.best_candidate));
    }

    #[tokio::test]
    async fn failed_generation_surfaces_a_structured_report() {
        let service = failing_synth_service();
        let err = service
            .generate("billing", RICH_REQUIREMENTS, GenerateOptions::default())
            .await
            .unwrap_err();

        let ServiceError::Generation(report) = err else {
            panic!("expected a generation failure report");
        };
        assert_eq!(report.stage, pipeline::GENERATE_STRATEGIES);
        assert_eq!(report.attempt_count, 4);
        assert!(report.compensation_completed);
        assert!(report.best_candidate.is_none());
    }

    #[tokio::test]
    async fn failed_generation_marks_the_project_failed() {
        let service = failing_synth_service();
        let err = service
            .generate("billing", RICH_REQUIREMENTS, GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Generation(_)));

        let records = service.store().list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ProjectStatus::Failed);
        assert_eq!(
            records[0].error_message.as_deref(),
            Some("generation rolled back")
        );
    }

    #[tokio::test]
    async fn critical_batch_aborts_without_a_best_candidate() {
        let service = CrucibleService::new(
            Arc::new(SimulatedInterpreter::new()),
            Arc::new(SimulatedAnalyzer::new()),
            Arc::new(SimulatedSynthesizer::with_flaw_every(1)),
            Arc::new(InMemoryProjectStore::new()),
        );
        let err = service
            .generate("billing", RICH_REQUIREMENTS, GenerateOptions::default())
            .await
            .unwrap_err();

        let ServiceError::Generation(report) = err else {
            panic!("expected a generation failure report");
        };
        assert_eq!(report.stage, pipeline::EVALUATE_CANDIDATES);
        assert!(report.compensation_completed);
        assert!(report.best_candidate.is_none());
    }

    #[tokio::test]
    async fn autonomous_mode_retries_a_weak_batch_once() {
        // Requirements with no entities or features produce thin
        // artifacts: clean but weak, which lands in the retry verdict
        // at this threshold.
        let service = CrucibleService::simulated();
        let options = GenerateOptions::new()
            .with_quality_threshold(70.0)
            .with_autonomy_level(AutonomyLevel::Autonomous);
        let handle = service
            .generate("lean", "keep the pipeline lean and fast", options)
            .await
            .unwrap();

        assert_eq!(handle.attempts, 2);
        assert_eq!(
            handle.checkpoint_status,
            CheckpointStatus::RetryWithImprovements
        );
    }

    #[tokio::test]
    async fn supervised_mode_surfaces_the_retry_verdict() {
        let service = CrucibleService::simulated();
        let options = GenerateOptions::new().with_quality_threshold(70.0);
        let handle = service
            .generate("lean", "keep the pipeline lean and fast", options)
            .await
            .unwrap();

        assert_eq!(handle.attempts, 1);
        assert_eq!(
            handle.checkpoint_status,
            CheckpointStatus::RetryWithImprovements
        );
    }

    #[tokio::test]
    async fn evolution_runs_to_a_terminal_state_and_persists() {
        let service = CrucibleService::simulated();
        let handle = service
            .generate("billing", RICH_REQUIREMENTS, GenerateOptions::default())
            .await
            .unwrap();

        let options = EvolveOptions::new(EvolutionStrategyKind::Genetic)
            .with_population_size(6)
            .with_max_generations(3)
            .with_fitness_threshold(1.0)
            .with_rng_seed(7);
        let evolution = service
            .start_evolution(&handle.project_id, options)
            .await
            .unwrap();

        assert!(evolution.run.is_terminal());
        assert!(evolution.run.current_generation <= 3);
        assert!(evolution.final_quality.is_some());

        let stored = service
            .store()
            .get(&handle.project_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ProjectStatus::Completed);
    }

    #[tokio::test]
    async fn evolution_rejects_unknown_projects() {
        let service = CrucibleService::simulated();
        let err = service
            .start_evolution(&ProjectId::generate(), EvolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ProjectNotFound(_)));
    }

    #[tokio::test]
    async fn evolution_requires_a_stored_result() {
        let service = CrucibleService::simulated();
        let record = ProjectRecord::new("empty", "Create Invoice records.");
        let id = record.id.clone();
        service.store().insert(record).await.unwrap();

        let err = service
            .start_evolution(&id, EvolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NoStoredResult(_)));
    }

    #[tokio::test]
    async fn health_reflects_the_store_snapshot() {
        let service = CrucibleService::simulated();
        service
            .generate("billing", RICH_REQUIREMENTS, GenerateOptions::default())
            .await
            .unwrap();

        let health = service.health().await.unwrap();
        assert_eq!(health.total, 1);
        assert_eq!(health.completed, 1);
        assert_eq!(health.failed, 0);
        assert!(health.average_quality.unwrap() > 80.0);
        assert!(health.bottleneck.is_none());
    }
}
