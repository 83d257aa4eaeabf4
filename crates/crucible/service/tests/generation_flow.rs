use async_trait::async_trait;
use crucible_evaluation::CheckpointStatus;
use crucible_service::{
    AutonomyLevel, CodeSynthesizer, CollaboratorError, CrucibleService, EvolveOptions,
    GenerateOptions, GenerationMode, InMemoryProjectStore, ProjectStore, SimulatedAnalyzer,
    SimulatedInterpreter,
};
use crucible_types::{Candidate, EvolutionStrategyKind, Pattern, ProjectStatus, Specification};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const THIN_GENOME: &str = "pub fn run(input: u64) -> u64 { input }\n";

const SOLID_GENOME: &str = "\
//! Billing module
//! Invoice lifecycle helpers.

/// A single invoice.
pub struct Invoice {
    pub total: u64,
}

impl Invoice {
    /// Open an invoice with a starting total.
    pub fn open(total: u64) -> Self {
        Self { total }
    }

    /// Apply a refund against the total.
    pub fn refund(&mut self, amount: u64) {
        self.total = self.total.saturating_sub(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_keeps_the_total() {
        assert_eq!(Invoice::open(40).total, 40);
    }

    #[test]
    fn refund_never_underflows() {
        let mut invoice = Invoice::open(10);
        invoice.refund(25);
        assert_eq!(invoice.total, 0);
    }
}
";

/// Produces a weak first batch, then solid batches from the second
/// call on. Mirrors an external generator that improves once it is
/// given checkpoint feedback.
struct ImprovingSynthesizer {
    batches: AtomicUsize,
}

impl ImprovingSynthesizer {
    fn new() -> Self {
        Self {
            batches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CodeSynthesizer for ImprovingSynthesizer {
    async fn generate_strategies(
        &self,
        _spec: &Specification,
        _patterns: &[Pattern],
        count: usize,
    ) -> Result<Vec<Candidate>, CollaboratorError> {
        let batch = self.batches.fetch_add(1, Ordering::SeqCst);
        let genome = if batch == 0 { THIN_GENOME } else { SOLID_GENOME };
        Ok((0..count).map(|_| Candidate::new(genome)).collect())
    }

    async fn generate_final_code(
        &self,
        selected: &Candidate,
        _mode: GenerationMode,
    ) -> Result<String, CollaboratorError> {
        Ok(selected.source_text.clone())
    }
}

fn service_with(synthesizer: Arc<dyn CodeSynthesizer>) -> CrucibleService {
    CrucibleService::new(
        Arc::new(SimulatedInterpreter::new()),
        Arc::new(SimulatedAnalyzer::new()),
        synthesizer,
        Arc::new(InMemoryProjectStore::new()),
    )
}

#[tokio::test]
async fn autonomous_retry_recovers_from_a_weak_first_batch() {
    let service = service_with(Arc::new(ImprovingSynthesizer::new()));
    let options = GenerateOptions::new()
        .with_quality_threshold(70.0)
        .with_autonomy_level(AutonomyLevel::Autonomous);

    let handle = service
        .generate("billing", "keep the pipeline small. it must stay fast.", options)
        .await
        .expect("generation");

    assert_eq!(handle.attempts, 2);
    assert_eq!(handle.checkpoint_status, CheckpointStatus::Continue);
    assert!(handle.quality_score >= 70.0);

    let record = service
        .store()
        .get(&handle.project_id)
        .await
        .expect("store")
        .expect("record");
    assert_eq!(record.status, ProjectStatus::Completed);
    assert_eq!(record.result.as_deref(), Some(SOLID_GENOME));
}

#[tokio::test]
async fn supervised_run_stops_at_the_weak_batch() {
    let service = service_with(Arc::new(ImprovingSynthesizer::new()));
    let options = GenerateOptions::new().with_quality_threshold(70.0);

    let handle = service
        .generate("billing", "keep the pipeline small. it must stay fast.", options)
        .await
        .expect("generation");

    assert_eq!(handle.attempts, 1);
    assert_eq!(
        handle.checkpoint_status,
        CheckpointStatus::RetryWithImprovements
    );
    assert!(!handle.improvements.is_empty());
}

#[tokio::test]
async fn generated_project_evolves_and_health_tracks_the_lifecycle() {
    let service = CrucibleService::simulated();
    let generated = service
        .generate(
            "ledger",
            "Create Invoice and Customer records. Support refund and report. \
             The service must stay deterministic.",
            GenerateOptions::new(),
        )
        .await
        .expect("generation");

    let after_generation = service.health().await.expect("health");
    assert_eq!(after_generation.total, 1);
    assert_eq!(after_generation.completed, 1);
    assert_eq!(after_generation.in_flight, 0);

    let options = EvolveOptions::new(EvolutionStrategyKind::Genetic)
        .with_population_size(6)
        .with_max_generations(3)
        .with_fitness_threshold(1.0)
        .with_rng_seed(11);
    let outcome = service
        .start_evolution(&generated.project_id, options)
        .await
        .expect("evolution");

    assert!(outcome.run.status.is_terminal());
    assert!(outcome.run.current_generation <= 3);
    assert!(outcome.run.best_fitness_achieved >= outcome.run.baseline_fitness);

    let after_evolution = service.health().await.expect("health");
    assert_eq!(after_evolution.total, 1);
    assert_eq!(after_evolution.completed, 1);
    let record = service
        .store()
        .get(&generated.project_id)
        .await
        .expect("store")
        .expect("record");
    assert!(record.quality_score.is_some());
}
