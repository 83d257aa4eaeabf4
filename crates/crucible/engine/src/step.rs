//! Step definitions: handlers, compensation, retry and timeout knobs

use crate::error::StepError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

// ── Step Context ─────────────────────────────────────────────────────

/// Input visible to one step attempt.
///
/// A context is built once when the step is scheduled and cloned for
/// every retry, so each attempt sees identical inputs. A step only
/// sees outputs of steps it declared as dependencies.
#[derive(Clone, Debug)]
pub struct StepContext {
    parameters: Value,
    upstream: HashMap<String, Value>,
}

impl StepContext {
    pub fn new(parameters: Value, upstream: HashMap<String, Value>) -> Self {
        Self {
            parameters,
            upstream,
        }
    }

    /// Saga-wide parameters passed to the run.
    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Output of a declared dependency, if it has one.
    pub fn upstream(&self, name: &str) -> Option<&Value> {
        self.upstream.get(name)
    }

    pub(crate) fn to_record(&self) -> Value {
        serde_json::json!({
            "parameters": self.parameters,
            "upstream": self.upstream,
        })
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Forward action of a saga step.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(&self, ctx: StepContext) -> Result<Value, StepError>;
}

/// Undo action paired with a completed step.
///
/// Receives the output the forward action produced, so it can undo
/// exactly what was done.
#[async_trait]
pub trait CompensationHandler: Send + Sync {
    async fn compensate(&self, output: &Value) -> Result<(), StepError>;
}

/// Adapter so plain async closures can serve as step handlers.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> StepHandler for FnHandler<F>
where
    F: Fn(StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, StepError>> + Send,
{
    async fn execute(&self, ctx: StepContext) -> Result<Value, StepError> {
        (self.0)(ctx).await
    }
}

/// Adapter so plain async closures can serve as compensation handlers.
pub struct FnCompensation<F>(pub F);

#[async_trait]
impl<F, Fut> CompensationHandler for FnCompensation<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), StepError>> + Send,
{
    async fn compensate(&self, output: &Value) -> Result<(), StepError> {
        (self.0)(output.clone()).await
    }
}

// ── Step Definition ──────────────────────────────────────────────────

/// One named step of a saga: its handler, dependencies, retry budget,
/// optional timeout, and optional compensation.
#[derive(Clone)]
pub struct StepDefinition {
    pub name: String,
    pub dependencies: Vec<String>,
    /// Extra attempts after the first; 0 means no retries
    pub max_retries: u32,
    pub timeout: Option<Duration>,
    pub handler: Arc<dyn StepHandler>,
    pub compensation: Option<Arc<dyn CompensationHandler>>,
}

impl StepDefinition {
    pub fn new(name: impl Into<String>, handler: Arc<dyn StepHandler>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            max_retries: 0,
            timeout: None,
            handler,
            compensation: None,
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_compensation(mut self, compensation: Arc<dyn CompensationHandler>) -> Self {
        self.compensation = Some(compensation);
        self
    }
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("has_compensation", &self.compensation.is_some())
            .finish()
    }
}
