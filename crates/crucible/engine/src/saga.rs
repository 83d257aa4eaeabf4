//! Saga definitions: named step graphs validated before execution

use crate::error::EngineError;
use crate::step::StepDefinition;
use std::collections::{HashMap, VecDeque};

/// An ordered collection of steps forming one saga.
///
/// Steps reference each other by name through their dependency lists;
/// [`SagaDefinition::validate`] rejects duplicates, unknown references,
/// and cycles before the engine runs anything.
#[derive(Clone, Debug, Default)]
pub struct SagaDefinition {
    pub name: String,
    steps: Vec<StepDefinition>,
}

impl SagaDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn add_step(mut self, step: StepDefinition) -> Result<Self, EngineError> {
        if self.steps.iter().any(|s| s.name == step.name) {
            return Err(EngineError::DuplicateStep(step.name));
        }
        self.steps.push(step);
        Ok(self)
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Check the step graph is non-empty, closed, and acyclic.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.steps.is_empty() {
            return Err(EngineError::EmptySaga);
        }

        for step in &self.steps {
            for dep in &step.dependencies {
                if !self.steps.iter().any(|s| &s.name == dep) {
                    return Err(EngineError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        // Kahn's algorithm; any step left with in-degree > 0 sits on a cycle.
        let mut indegree: HashMap<&str, usize> = self
            .steps
            .iter()
            .map(|s| (s.name.as_str(), s.dependencies.len()))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for step in &self.steps {
            for dep in &step.dependencies {
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(step.name.as_str());
            }
        }

        let mut ready: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut visited = 0usize;
        while let Some(name) = ready.pop_front() {
            visited += 1;
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(d) = indegree.get_mut(dependent) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        if visited < self.steps.len() {
            let stuck = self
                .steps
                .iter()
                .find(|s| indegree.get(s.name.as_str()).copied().unwrap_or(0) > 0)
                .map(|s| s.name.clone())
                .unwrap_or_default();
            return Err(EngineError::DependencyCycle(stuck));
        }

        Ok(())
    }
}
