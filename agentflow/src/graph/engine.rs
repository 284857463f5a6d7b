//! Sequential execution of a validated graph.

use super::step::Step;
use crate::errors::AgentflowError;
use crate::events::{types, EventSink, NoOpEventSink};
use crate::observability::SpanTimer;
use crate::state::PipelineState;
use crate::utils::generate_run_id;
use std::sync::Arc;
use tracing::Instrument;

/// A validated graph, ready to run.
///
/// Built by [`GraphBuilder`](super::GraphBuilder). Steps run one at a time in
/// topological order; concurrency inside a step is the step's own business.
#[derive(Clone)]
pub struct GraphEngine {
    name: String,
    entry: String,
    /// Steps in execution order.
    steps: Vec<(String, Arc<dyn Step>)>,
    edges: Vec<(String, String)>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for GraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEngine")
            .field("name", &self.name)
            .field("entry", &self.entry)
            .field("order", &self.execution_order())
            .finish_non_exhaustive()
    }
}

impl GraphEngine {
    pub(super) fn new(
        name: String,
        entry: String,
        steps: Vec<(String, Arc<dyn Step>)>,
        edges: Vec<(String, String)>,
    ) -> Self {
        Self {
            name,
            entry,
            steps,
            edges,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Routes lifecycle events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the entry step name.
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.entry
    }

    /// Returns step names in execution order.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the declared edges.
    #[must_use]
    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    /// Runs every step against `state` and returns the final state.
    ///
    /// # Errors
    ///
    /// Returns [`AgentflowError::PipelineAborted`] wrapping the first step error.
    /// No later step runs and no partial state is returned.
    pub async fn execute(&self, state: PipelineState) -> Result<PipelineState, AgentflowError> {
        let run_id = generate_run_id();
        let span = tracing::info_span!("pipeline", name = %self.name, run_id = %run_id);
        self.execute_steps(state, run_id.to_string())
            .instrument(span)
            .await
    }

    async fn execute_steps(
        &self,
        mut state: PipelineState,
        run_id: String,
    ) -> Result<PipelineState, AgentflowError> {
        let pipeline_timer = SpanTimer::start(self.name.clone());
        tracing::info!(steps = self.steps.len(), "Pipeline started");
        self.sink.try_emit(
            types::PIPELINE_STARTED,
            Some(serde_json::json!({
                "pipeline": &self.name,
                "run_id": &run_id,
                "steps": self.execution_order(),
            })),
        );

        for (name, step) in &self.steps {
            self.sink.try_emit(
                types::STEP_STARTED,
                Some(serde_json::json!({ "pipeline": &self.name, "step": name })),
            );
            let timer = SpanTimer::start(name.clone());

            match step.run(&state).await {
                Ok(update) => {
                    state = state.merge(update);
                    let duration_ms = timer.finish();
                    tracing::debug!(step = %name, duration_ms, "Step completed");
                    self.sink.try_emit(
                        types::STEP_COMPLETED,
                        Some(serde_json::json!({
                            "pipeline": &self.name,
                            "step": name,
                            "duration_ms": duration_ms,
                        })),
                    );
                }
                Err(err) => {
                    let duration_ms = timer.finish();
                    tracing::error!(step = %name, error = %err, duration_ms, "Step failed");
                    self.sink.try_emit(
                        types::STEP_FAILED,
                        Some(serde_json::json!({
                            "pipeline": &self.name,
                            "step": name,
                            "error": err.to_string(),
                            "duration_ms": duration_ms,
                        })),
                    );
                    self.sink.try_emit(
                        types::PIPELINE_FAILED,
                        Some(serde_json::json!({
                            "pipeline": &self.name,
                            "run_id": &run_id,
                            "step": name,
                        })),
                    );
                    return Err(AgentflowError::aborted(&self.name, name, err));
                }
            }
        }

        let duration_ms = pipeline_timer.finish();
        tracing::info!(duration_ms, "Pipeline completed");
        self.sink.try_emit(
            types::PIPELINE_COMPLETED,
            Some(serde_json::json!({
                "pipeline": &self.name,
                "run_id": &run_id,
                "duration_ms": duration_ms,
            })),
        );
        Ok(state)
    }
}
