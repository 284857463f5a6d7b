//! The step trait and closure adapters.

use super::END;
use crate::errors::AgentflowError;
use crate::state::{PipelineState, StatePatch, StepUpdate};
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;

/// One named unit of pipeline work.
///
/// A step reads the current state and returns either a full replacement or a patch
/// of the fields it changed. Returning an error aborts the invocation; the engine
/// never retries a step.
#[async_trait]
pub trait Step: Send + Sync + Debug {
    /// Returns the step name.
    fn name(&self) -> &str;

    /// Runs the step.
    async fn run(&self, state: &PipelineState) -> Result<StepUpdate, AgentflowError>;
}

/// A step backed by a synchronous closure.
pub struct FnStep<F>
where
    F: Fn(&PipelineState) -> Result<StepUpdate, AgentflowError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStep<F>
where
    F: Fn(&PipelineState) -> Result<StepUpdate, AgentflowError> + Send + Sync,
{
    /// Wraps `func` as a step.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStep<F>
where
    F: Fn(&PipelineState) -> Result<StepUpdate, AgentflowError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(&PipelineState) -> Result<StepUpdate, AgentflowError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        (self.func)(state)
    }
}

/// A step backed by an async closure. The closure receives its own copy of the state.
pub struct AsyncFnStep<F, Fut>
where
    F: Fn(PipelineState) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StepUpdate, AgentflowError>> + Send,
{
    name: String,
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnStep<F, Fut>
where
    F: Fn(PipelineState) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StepUpdate, AgentflowError>> + Send,
{
    /// Wraps `func` as a step.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnStep<F, Fut>
where
    F: Fn(PipelineState) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StepUpdate, AgentflowError>> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStep").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Step for AsyncFnStep<F, Fut>
where
    F: Fn(PipelineState) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StepUpdate, AgentflowError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        (self.func)(state.clone()).await
    }
}

/// The terminal step. Leaves the state unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndStep;

#[async_trait]
impl Step for EndStep {
    fn name(&self) -> &str {
        END
    }

    async fn run(&self, _state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        Ok(StatePatch::new().into())
    }
}
