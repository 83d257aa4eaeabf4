//! Saga workflow engine
//!
//! A [`SagaDefinition`] names its steps and their dependency edges; the
//! [`SagaEngine`] runs every ready step concurrently, retries transient
//! failures with identical inputs, and unwinds compensation in reverse
//! completion order when a step fails terminally. Run state lives in
//! [`crucible_types::WorkflowRun`], written only by the engine loop.

#![deny(unsafe_code)]

pub mod engine;
pub mod error;
pub mod progress;
pub mod saga;
pub mod step;

pub use engine::{failure_report, SagaEngine};
pub use error::{EngineError, StepError};
pub use progress::{ProgressEvent, ProgressSink, RecordingProgressSink, TracingProgressSink};
pub use saga::SagaDefinition;
pub use step::{
    CompensationHandler, FnCompensation, FnHandler, StepContext, StepDefinition, StepHandler,
};
