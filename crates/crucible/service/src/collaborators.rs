//! External collaborator traits and their simulated stand-ins
//!
//! The pipeline only ever talks to these traits. Each has a
//! `Simulated*` implementation good enough to exercise the full system
//! offline and a `Failing*` implementation for failure-path tests.

use crate::error::CollaboratorError;
use crate::options::GenerationMode;
use async_trait::async_trait;
use crucible_types::{
    Candidate, Pattern, ProjectId, ProjectRecord, ProjectUpdate, Specification,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

// ── Traits ───────────────────────────────────────────────────────────

/// Turns free-form requirements text into a structured specification.
#[async_trait]
pub trait RequirementsInterpreter: Send + Sync {
    async fn parse(&self, text: &str, language: &str)
        -> Result<Specification, CollaboratorError>;
}

/// Suggests generation patterns for a specification.
#[async_trait]
pub trait PatternAnalyzer: Send + Sync {
    async fn analyze_for_generation(
        &self,
        spec: &Specification,
    ) -> Result<Vec<Pattern>, CollaboratorError>;
}

/// Produces candidate artifacts and renders the final one.
#[async_trait]
pub trait CodeSynthesizer: Send + Sync {
    /// Generate `count` independent candidate strategies.
    async fn generate_strategies(
        &self,
        spec: &Specification,
        patterns: &[Pattern],
        count: usize,
    ) -> Result<Vec<Candidate>, CollaboratorError>;

    /// Render the selected candidate as the final artifact.
    async fn generate_final_code(
        &self,
        selected: &Candidate,
        mode: GenerationMode,
    ) -> Result<String, CollaboratorError>;
}

/// Durable project state.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn insert(&self, record: ProjectRecord) -> Result<(), CollaboratorError>;
    async fn update(
        &self,
        id: &ProjectId,
        update: ProjectUpdate,
    ) -> Result<(), CollaboratorError>;
    async fn get(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, CollaboratorError>;
    async fn list(&self) -> Result<Vec<ProjectRecord>, CollaboratorError>;
}

// ── Simulated Interpreter ────────────────────────────────────────────

const FEATURE_VERBS: &[&str] = &[
    "create", "list", "update", "delete", "search", "checkout", "refund", "report", "export",
    "import",
];

const STOP_WORDS: &[&str] = &["the", "a", "an", "it", "this", "and", "or"];

/// Heuristic interpreter: capitalized tokens become entities, known
/// verbs become features, "must" sentences become constraints.
#[derive(Clone, Debug, Default)]
pub struct SimulatedInterpreter;

impl SimulatedInterpreter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RequirementsInterpreter for SimulatedInterpreter {
    async fn parse(
        &self,
        text: &str,
        _language: &str,
    ) -> Result<Specification, CollaboratorError> {
        if text.trim().is_empty() {
            return Err(CollaboratorError::InvalidInput(
                "requirements text is empty".into(),
            ));
        }

        let mut spec = Specification::new();
        for token in text.split(|c: char| !c.is_alphanumeric()) {
            if token.len() < 2 {
                continue;
            }
            let lower = token.to_lowercase();
            if STOP_WORDS.contains(&lower.as_str()) {
                continue;
            }
            if FEATURE_VERBS.contains(&lower.as_str()) {
                if !spec.features.contains(&lower) {
                    spec = spec.with_feature(lower);
                }
            } else if token.chars().next().is_some_and(|c| c.is_uppercase())
                && !spec.entities.iter().any(|e| e == token)
            {
                spec = spec.with_entity(token);
            }
        }

        for sentence in text.split('.') {
            let trimmed = sentence.trim();
            if trimmed.to_lowercase().contains("must") {
                spec = spec.with_constraint(trimmed);
            }
        }

        let confidence = match (spec.entities.is_empty(), spec.features.is_empty()) {
            (false, false) => 0.9,
            (false, true) | (true, false) => 0.6,
            (true, true) => 0.3,
        };
        Ok(spec.with_confidence(confidence))
    }
}

/// Interpreter that is always offline.
#[derive(Clone, Debug, Default)]
pub struct FailingInterpreter;

#[async_trait]
impl RequirementsInterpreter for FailingInterpreter {
    async fn parse(
        &self,
        _text: &str,
        _language: &str,
    ) -> Result<Specification, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "requirements interpreter offline".into(),
        ))
    }
}

// ── Simulated Analyzer ───────────────────────────────────────────────

/// Pattern analyzer driven by the shape of the specification.
#[derive(Clone, Debug, Default)]
pub struct SimulatedAnalyzer;

impl SimulatedAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PatternAnalyzer for SimulatedAnalyzer {
    async fn analyze_for_generation(
        &self,
        spec: &Specification,
    ) -> Result<Vec<Pattern>, CollaboratorError> {
        let mut patterns = vec![Pattern::new("module", "one module per bounded concern")];
        if !spec.entities.is_empty() {
            patterns.push(Pattern::new("repository", "data access behind a trait"));
        }
        if spec
            .features
            .iter()
            .any(|f| matches!(f.as_str(), "create" | "update" | "delete"))
        {
            patterns.push(Pattern::new("command", "state changes as explicit commands"));
        }
        if !spec.constraints.is_empty() {
            patterns.push(Pattern::new("builder", "validated construction via builders"));
        }
        Ok(patterns)
    }
}

/// Analyzer that is always offline.
#[derive(Clone, Debug, Default)]
pub struct FailingAnalyzer;

#[async_trait]
impl PatternAnalyzer for FailingAnalyzer {
    async fn analyze_for_generation(
        &self,
        _spec: &Specification,
    ) -> Result<Vec<Pattern>, CollaboratorError> {
        Err(CollaboratorError::Unavailable("pattern analyzer offline".into()))
    }
}

// ── Simulated Synthesizer ────────────────────────────────────────────

/// Template-driven synthesizer.
///
/// Emits one Rust-flavored artifact per strategy, mentioning every
/// entity and feature the specification names. `with_flaw_every`
/// injects an unparseable candidate at a fixed cadence for testing
/// checkpoint behavior.
#[derive(Clone, Debug, Default)]
pub struct SimulatedSynthesizer {
    flaw_every: usize,
}

impl SimulatedSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `every`-th candidate structurally broken.
    pub fn with_flaw_every(every: usize) -> Self {
        Self { flaw_every: every }
    }

    fn render(spec: &Specification, patterns: &[Pattern], index: usize) -> String {
        let pattern = patterns
            .get(index % patterns.len().max(1))
            .map(|p| p.name.as_str())
            .unwrap_or("module");

        let mut out = format!("//! Generated artifact, {pattern} layout\n");
        if !spec.entities.is_empty() {
            out.push_str(&format!("//! Entities: {}\n", spec.entities.join(", ")));
        }
        if !spec.features.is_empty() {
            out.push_str(&format!("//! Features: {}\n", spec.features.join(", ")));
        }

        for entity in &spec.entities {
            out.push_str(&format!(
                "\n/// {entity} record.\npub struct {entity} {{\n    pub id: u64,\n}}\n\
                 \nimpl {entity} {{\n    /// Builds a {entity} with the given id.\n    \
                 pub fn new(id: u64) -> Self {{\n        Self {{ id }}\n    }}\n}}\n"
            ));
        }
        for feature in &spec.features {
            out.push_str(&format!(
                "\n/// Applies the {feature} operation.\npub fn {feature}(input: u64) -> u64 {{\n    \
                 input.wrapping_add({})\n}}\n",
                index + 1
            ));
        }

        if let Some(feature) = spec.features.first() {
            out.push_str(&format!(
                "\n#[test]\nfn {feature}_applies() {{\n    assert_eq!({feature}(0), {});\n}}\n",
                index + 1
            ));
        }
        if let Some(entity) = spec.entities.first() {
            out.push_str(&format!(
                "\n#[test]\nfn {}_keeps_id() {{\n    assert_eq!({entity}::new(7).id, 7);\n}}\n",
                entity.to_lowercase()
            ));
        }
        out
    }
}

#[async_trait]
impl CodeSynthesizer for SimulatedSynthesizer {
    async fn generate_strategies(
        &self,
        spec: &Specification,
        patterns: &[Pattern],
        count: usize,
    ) -> Result<Vec<Candidate>, CollaboratorError> {
        if count == 0 {
            return Err(CollaboratorError::InvalidInput(
                "strategy count must be at least 1".into(),
            ));
        }
        let candidates = (0..count)
            .map(|index| {
                let source = if self.flaw_every > 0 && (index + 1) % self.flaw_every == 0 {
                    format!("pub fn broken_{index}( {{")
                } else {
                    Self::render(spec, patterns, index)
                };
                Candidate::new(source)
            })
            .collect();
        Ok(candidates)
    }

    async fn generate_final_code(
        &self,
        selected: &Candidate,
        mode: GenerationMode,
    ) -> Result<String, CollaboratorError> {
        let rendered = match mode {
            GenerationMode::Prototype => selected.source_text.clone(),
            GenerationMode::Production => format!(
                "//! Production artifact\n//! Hardened for release use.\n{}",
                selected.source_text
            ),
        };
        Ok(rendered)
    }
}

/// Synthesizer that is always unavailable.
#[derive(Clone, Debug, Default)]
pub struct FailingSynthesizer;

#[async_trait]
impl CodeSynthesizer for FailingSynthesizer {
    async fn generate_strategies(
        &self,
        _spec: &Specification,
        _patterns: &[Pattern],
        _count: usize,
    ) -> Result<Vec<Candidate>, CollaboratorError> {
        Err(CollaboratorError::Unavailable("code synthesizer unavailable".into()))
    }

    async fn generate_final_code(
        &self,
        _selected: &Candidate,
        _mode: GenerationMode,
    ) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable("code synthesizer unavailable".into()))
    }
}

// ── Stores ───────────────────────────────────────────────────────────

/// Project store backed by a guarded map.
#[derive(Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<ProjectId, ProjectRecord>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn insert(&self, record: ProjectRecord) -> Result<(), CollaboratorError> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&record.id) {
            return Err(CollaboratorError::Storage(format!(
                "duplicate project '{}'",
                record.id
            )));
        }
        projects.insert(record.id.clone(), record);
        Ok(())
    }

    async fn update(
        &self,
        id: &ProjectId,
        update: ProjectUpdate,
    ) -> Result<(), CollaboratorError> {
        let mut projects = self.projects.write().await;
        let record = projects
            .get_mut(id)
            .ok_or_else(|| CollaboratorError::Storage(format!("unknown project '{id}'")))?;
        record.apply(update);
        Ok(())
    }

    async fn get(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, CollaboratorError> {
        Ok(self.projects.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<ProjectRecord>, CollaboratorError> {
        let mut records: Vec<ProjectRecord> =
            self.projects.read().await.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}

/// Store that rejects every operation.
#[derive(Clone, Debug, Default)]
pub struct FailingProjectStore;

#[async_trait]
impl ProjectStore for FailingProjectStore {
    async fn insert(&self, _record: ProjectRecord) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Storage("project store unavailable".into()))
    }

    async fn update(
        &self,
        _id: &ProjectId,
        _update: ProjectUpdate,
    ) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Storage("project store unavailable".into()))
    }

    async fn get(&self, _id: &ProjectId) -> Result<Option<ProjectRecord>, CollaboratorError> {
        Err(CollaboratorError::Storage("project store unavailable".into()))
    }

    async fn list(&self) -> Result<Vec<ProjectRecord>, CollaboratorError> {
        Err(CollaboratorError::Storage("project store unavailable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_evaluation::Scorer;
    use crucible_types::ProjectStatus;

    #[tokio::test]
    async fn interpreter_extracts_structure() {
        let spec = SimulatedInterpreter::new()
            .parse(
                "Create Invoice and Customer records. Support refund. \
                 The service must stay deterministic.",
                "en",
            )
            .await
            .unwrap();

        assert!(spec.entities.iter().any(|e| e == "Invoice"));
        assert!(spec.entities.iter().any(|e| e == "Customer"));
        assert!(spec.features.contains(&"create".to_string()));
        assert!(spec.features.contains(&"refund".to_string()));
        assert_eq!(spec.constraints.len(), 1);
        assert_eq!(spec.confidence_score, 0.9);
    }

    #[tokio::test]
    async fn interpreter_rejects_empty_text() {
        let err = SimulatedInterpreter::new().parse("   ", "en").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn analyzer_suggests_patterns_from_spec_shape() {
        let spec = Specification::new()
            .with_entity("Order")
            .with_feature("create")
            .with_constraint("must be idempotent");
        let patterns = SimulatedAnalyzer::new()
            .analyze_for_generation(&spec)
            .await
            .unwrap();
        let names: Vec<&str> = patterns.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"repository"));
        assert!(names.contains(&"command"));
        assert!(names.contains(&"builder"));
    }

    #[tokio::test]
    async fn synthesizer_emits_scoreable_candidates() {
        let spec = Specification::new()
            .with_entity("Invoice")
            .with_feature("refund");
        let patterns = vec![Pattern::new("module", "")];
        let candidates = SimulatedSynthesizer::new()
            .generate_strategies(&spec, &patterns, 3)
            .await
            .unwrap();
        assert_eq!(candidates.len(), 3);

        let scorer = Scorer::for_specification(&spec);
        for candidate in &candidates {
            let vector = scorer.score(candidate);
            assert_eq!(vector.compilation_success.value(), 100.0);
            assert_eq!(vector.domain_compliance.value(), 100.0);
            assert!(vector.average() > 80.0);
        }
    }

    #[tokio::test]
    async fn flawed_candidates_fail_the_parse_probe() {
        let spec = Specification::new().with_entity("Invoice");
        let candidates = SimulatedSynthesizer::with_flaw_every(2)
            .generate_strategies(&spec, &[], 4)
            .await
            .unwrap();

        let scorer = Scorer::new();
        let broken = candidates
            .iter()
            .filter(|c| scorer.score(c).compilation_success.is_zero())
            .count();
        assert_eq!(broken, 2);
    }

    #[tokio::test]
    async fn production_mode_prepends_release_banner() {
        let candidate = Candidate::new("pub fn f() {}");
        let code = SimulatedSynthesizer::new()
            .generate_final_code(&candidate, GenerationMode::Production)
            .await
            .unwrap();
        assert!(code.starts_with("//! Production artifact"));
        assert!(code.ends_with("pub fn f() {}"));
    }

    #[tokio::test]
    async fn store_round_trip_and_update() {
        let store = InMemoryProjectStore::new();
        let record = ProjectRecord::new("billing", "generate a billing service");
        let id = record.id.clone();
        store.insert(record).await.unwrap();

        store
            .update(&id, ProjectUpdate::status(ProjectStatus::Generating))
            .await
            .unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ProjectStatus::Generating);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_rejects_updates_to_unknown_projects() {
        let store = InMemoryProjectStore::new();
        let err = store
            .update(&ProjectId::generate(), ProjectUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Storage(_)));
    }
}
