//! Saga assembly for the generation pipeline
//!
//! Wires the collaborators into the canonical step graph:
//! `parse_requirements` feeds `analyze_patterns` and
//! `generate_strategies`, whose candidates flow through
//! `evaluate_candidates` and `select_best` into `persist_result`.
//!
//! Step payloads travel as JSON values; each handler deserializes the
//! upstream outputs it declared and nothing else.

use crate::collaborators::{
    CodeSynthesizer, PatternAnalyzer, ProjectStore, RequirementsInterpreter,
};
use crate::options::GenerationMode;
use crucible_engine::{
    EngineError, FnCompensation, FnHandler, SagaDefinition, StepContext, StepDefinition, StepError,
};
use crucible_evaluation::{Checkpoint, CheckpointReport, CheckpointStatus, Scorer};
use crucible_types::{
    Candidate, Pattern, ProjectId, ProjectStatus, ProjectUpdate, Specification,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const PARSE_REQUIREMENTS: &str = "parse_requirements";
pub const ANALYZE_PATTERNS: &str = "analyze_patterns";
pub const GENERATE_STRATEGIES: &str = "generate_strategies";
pub const EVALUATE_CANDIDATES: &str = "evaluate_candidates";
pub const SELECT_BEST: &str = "select_best";
pub const PERSIST_RESULT: &str = "persist_result";

/// Output of the `evaluate_candidates` step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationOutput {
    pub candidates: Vec<Candidate>,
    pub report: CheckpointReport,
}

/// Output of the `select_best` step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectionOutput {
    pub candidate: Candidate,
    /// Mean of the candidate's evaluation vector, `[0, 100]`
    pub quality: f64,
}

/// Mean quality of a candidate, with unscored candidates at zero.
pub fn candidate_quality(candidate: &Candidate) -> f64 {
    candidate
        .evaluation
        .as_ref()
        .map(|v| v.average())
        .unwrap_or(0.0)
}

/// Builds the generation saga over a fixed set of collaborators.
#[derive(Clone)]
pub struct GenerationPipeline {
    interpreter: Arc<dyn RequirementsInterpreter>,
    analyzer: Arc<dyn PatternAnalyzer>,
    synthesizer: Arc<dyn CodeSynthesizer>,
    store: Arc<dyn ProjectStore>,
}

impl GenerationPipeline {
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
        }
    }

    /// Assemble the saga for one project.
    ///
    /// Run parameters are expected to carry `requirements`,
    /// `strategy_count`, `quality_threshold`, and `mode`.
    pub fn saga(&self, project_id: &ProjectId) -> Result<SagaDefinition, EngineError> {
        SagaDefinition::new("generation")
            .add_step(
                StepDefinition::new(PARSE_REQUIREMENTS, self.parse_handler())
                    .with_compensation(self.mark_failed_compensation(project_id)),
            )?
            .add_step(
                StepDefinition::new(ANALYZE_PATTERNS, self.analyze_handler())
                    .depends_on(PARSE_REQUIREMENTS),
            )?
            .add_step(
                StepDefinition::new(GENERATE_STRATEGIES, self.generate_handler())
                    .depends_on(PARSE_REQUIREMENTS)
                    .depends_on(ANALYZE_PATTERNS)
                    .with_max_retries(3)
                    .with_compensation(discard_candidates_compensation()),
            )?
            .add_step(
                StepDefinition::new(EVALUATE_CANDIDATES, evaluate_handler())
                    .depends_on(PARSE_REQUIREMENTS)
                    .depends_on(GENERATE_STRATEGIES),
            )?
            .add_step(
                StepDefinition::new(SELECT_BEST, select_handler())
                    .depends_on(EVALUATE_CANDIDATES),
            )?
            .add_step(
                StepDefinition::new(PERSIST_RESULT, self.persist_handler(project_id))
                    .depends_on(SELECT_BEST)
                    .with_max_retries(2),
            )
    }

    fn parse_handler(&self) -> Arc<dyn crucible_engine::StepHandler> {
        let interpreter = Arc::clone(&self.interpreter);
        Arc::new(FnHandler(move |ctx: StepContext| {
            let interpreter = Arc::clone(&interpreter);
            async move {
                let text = required_param_str(&ctx, "requirements")?;
                let language = ctx
                    .parameters()
                    .get("language")
                    .and_then(Value::as_str)
                    .unwrap_or("en")
                    .to_string();
                let spec = interpreter
                    .parse(&text, &language)
                    .await
                    .map_err(StepError::from)?;
                to_step_value(&spec)
            }
        }))
    }

    fn analyze_handler(&self) -> Arc<dyn crucible_engine::StepHandler> {
        let analyzer = Arc::clone(&self.analyzer);
        Arc::new(FnHandler(move |ctx: StepContext| {
            let analyzer = Arc::clone(&analyzer);
            async move {
                let spec: Specification = upstream_as(&ctx, PARSE_REQUIREMENTS)?;
                let patterns = analyzer
                    .analyze_for_generation(&spec)
                    .await
                    .map_err(StepError::from)?;
                to_step_value(&patterns)
            }
        }))
    }

    fn generate_handler(&self) -> Arc<dyn crucible_engine::StepHandler> {
        let synthesizer = Arc::clone(&self.synthesizer);
        Arc::new(FnHandler(move |ctx: StepContext| {
            let synthesizer = Arc::clone(&synthesizer);
            async move {
                let spec: Specification = upstream_as(&ctx, PARSE_REQUIREMENTS)?;
                let patterns: Vec<Pattern> = upstream_as(&ctx, ANALYZE_PATTERNS)?;
                let count = ctx
                    .parameters()
                    .get("strategy_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(5) as usize;
                let candidates = synthesizer
                    .generate_strategies(&spec, &patterns, count)
                    .await
                    .map_err(StepError::from)?;
                to_step_value(&candidates)
            }
        }))
    }

    fn persist_handler(&self, project_id: &ProjectId) -> Arc<dyn crucible_engine::StepHandler> {
        let synthesizer = Arc::clone(&self.synthesizer);
        let store = Arc::clone(&self.store);
        let project_id = project_id.clone();
        Arc::new(FnHandler(move |ctx: StepContext| {
            let synthesizer = Arc::clone(&synthesizer);
            let store = Arc::clone(&store);
            let project_id = project_id.clone();
            async move {
                let selection: SelectionOutput = upstream_as(&ctx, SELECT_BEST)?;
                let mode: GenerationMode = ctx
                    .parameters()
                    .get("mode")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|err| StepError::Validation(format!("bad mode parameter: {err}")))?
                    .unwrap_or_default();

                let final_code = synthesizer
                    .generate_final_code(&selection.candidate, mode)
                    .await
                    .map_err(StepError::from)?;
                store
                    .update(
                        &project_id,
                        ProjectUpdate::status(ProjectStatus::Completed)
                            .with_result(final_code.clone())
                            .with_quality_score(selection.quality)
                            .with_best_candidate(selection.candidate.id.clone()),
                    )
                    .await
                    .map_err(StepError::from)?;

                Ok(serde_json::json!({
                    "candidate_id": selection.candidate.id,
                    "quality": selection.quality,
                    "result_bytes": final_code.len(),
                }))
            }
        }))
    }

    fn mark_failed_compensation(
        &self,
        project_id: &ProjectId,
    ) -> Arc<dyn crucible_engine::CompensationHandler> {
        let store = Arc::clone(&self.store);
        let project_id = project_id.clone();
        Arc::new(FnCompensation(move |_output: Value| {
            let store = Arc::clone(&store);
            let project_id = project_id.clone();
            async move {
                store
                    .update(
                        &project_id,
                        ProjectUpdate::status(ProjectStatus::Failed)
                            .with_error_message("generation rolled back"),
                    )
                    .await
                    .map_err(StepError::from)
            }
        }))
    }
}

fn evaluate_handler() -> Arc<dyn crucible_engine::StepHandler> {
    Arc::new(FnHandler(|ctx: StepContext| async move {
        let spec: Specification = upstream_as(&ctx, PARSE_REQUIREMENTS)?;
        let candidates: Vec<Candidate> = upstream_as(&ctx, GENERATE_STRATEGIES)?;
        let threshold = ctx
            .parameters()
            .get("quality_threshold")
            .and_then(Value::as_f64)
            .unwrap_or(80.0);

        let scorer = Scorer::for_specification(&spec);
        let scored: Vec<Candidate> = candidates
            .into_iter()
            .map(|candidate| {
                let vector = scorer.score(&candidate);
                candidate.with_evaluation(vector)
            })
            .collect();

        let report = Checkpoint::new(threshold)
            .evaluate(&scored)
            .map_err(|err| StepError::Validation(err.to_string()))?;
        if report.status == CheckpointStatus::Abort {
            let detail = if report.recommendations.is_empty() {
                "critical failures in batch".to_string()
            } else {
                report.recommendations.join("; ")
            };
            return Err(StepError::CriticalQuality(detail));
        }

        to_step_value(&EvaluationOutput {
            candidates: scored,
            report,
        })
    }))
}

fn select_handler() -> Arc<dyn crucible_engine::StepHandler> {
    Arc::new(FnHandler(|ctx: StepContext| async move {
        let output: EvaluationOutput = upstream_as(&ctx, EVALUATE_CANDIDATES)?;
        let best = output
            .candidates
            .into_iter()
            .max_by(|a, b| candidate_quality(a).total_cmp(&candidate_quality(b)))
            .ok_or_else(|| StepError::Validation("no candidates to select".into()))?;
        let quality = candidate_quality(&best);
        to_step_value(&SelectionOutput {
            candidate: best,
            quality,
        })
    }))
}

fn discard_candidates_compensation() -> Arc<dyn crucible_engine::CompensationHandler> {
    Arc::new(FnCompensation(move |output: Value| async move {
        let discarded = output.as_array().map(Vec::len).unwrap_or(0);
        tracing::info!(discarded, "discarding generated candidates");
        Ok(())
    }))
}

fn to_step_value<T: Serialize>(value: &T) -> Result<Value, StepError> {
    serde_json::to_value(value).map_err(|err| StepError::Validation(err.to_string()))
}

fn upstream_as<T: serde::de::DeserializeOwned>(
    ctx: &StepContext,
    step: &str,
) -> Result<T, StepError> {
    let value = ctx
        .upstream(step)
        .ok_or_else(|| StepError::Validation(format!("missing upstream output from '{step}'")))?;
    serde_json::from_value(value.clone())
        .map_err(|err| StepError::Validation(format!("malformed output from '{step}': {err}")))
}

fn required_param_str(ctx: &StepContext, key: &str) -> Result<String, StepError> {
    ctx.parameters()
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StepError::Validation(format!("missing parameter '{key}'")))
}
