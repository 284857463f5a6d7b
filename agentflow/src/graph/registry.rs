//! Name-to-factory lookup for pipelines.

use super::engine::GraphEngine;
use crate::errors::{AgentflowError, ContractErrorInfo, PipelineValidationError};
use crate::events::{EventSink, NoOpEventSink};
use crate::state::PipelineState;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a fresh engine for one invocation.
pub type GraphFactory =
    Arc<dyn Fn() -> Result<GraphEngine, PipelineValidationError> + Send + Sync>;

/// Registered pipelines.
///
/// Populate it during startup through `&mut`, then share it as
/// `Arc<PipelineRegistry>`; lookups only need `&self`.
pub struct PipelineRegistry {
    factories: BTreeMap<String, GraphFactory>,
    sink: Arc<dyn EventSink>,
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self {
            factories: BTreeMap::new(),
            sink: Arc::new(NoOpEventSink),
        }
    }
}

impl std::fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("pipelines", &self.names())
            .finish_non_exhaustive()
    }
}

impl PipelineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `sink` to every engine this registry hands out.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Registers a factory under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is already registered.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), PipelineValidationError>
    where
        F: Fn() -> Result<GraphEngine, PipelineValidationError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{name}' is already registered"
            ))
            .with_error_info(
                ContractErrorInfo::new("REGISTRY-DUPLICATE", format!("Duplicate pipeline '{name}'"))
                    .with_fix_hint("Register each pipeline name once during startup."),
            ));
        }
        tracing::debug!(pipeline = %name, "Registered pipeline");
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Builds a fresh engine for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentflowError::PipelineNotFound`] for an unknown name, or the
    /// factory's validation error.
    pub fn get(&self, name: &str) -> Result<GraphEngine, AgentflowError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| AgentflowError::PipelineNotFound {
                name: name.to_string(),
            })?;
        let engine = factory()?;
        Ok(engine.with_event_sink(Arc::clone(&self.sink)))
    }

    /// Looks up `name` and runs it against `state`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentflowError::PipelineNotFound`] for an unknown name, the
    /// factory's validation error, or whatever the pipeline run fails with.
    pub async fn run(
        &self,
        name: &str,
        state: PipelineState,
    ) -> Result<PipelineState, AgentflowError> {
        self.get(name)?.execute(state).await
    }

    /// Builds every registered graph once, surfacing shape errors at startup.
    ///
    /// # Errors
    ///
    /// Returns the first factory error, with the pipeline name prefixed.
    pub fn validate_all(&self) -> Result<(), PipelineValidationError> {
        for (name, factory) in &self.factories {
            if let Err(err) = factory() {
                let message = format!("Pipeline '{name}': {}", err.message);
                return Err(PipelineValidationError { message, ..err });
            }
        }
        Ok(())
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Number of registered pipelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::graph::{FnStep, GraphBuilder, Step};
    use crate::state::{Request, StateField, StatePatch};
    use pretty_assertions::assert_eq;

    fn answer_graph() -> Result<GraphEngine, PipelineValidationError> {
        let step: Arc<dyn Step> = Arc::new(FnStep::new("answer", |state: &PipelineState| {
            let reply = format!("echo {}", state.request.query);
            Ok(StatePatch::new().set(StateField::Answer(Some(reply))).into())
        }));
        GraphBuilder::new("echo").add_node("answer", step)?.build()
    }

    fn cyclic_graph() -> Result<GraphEngine, PipelineValidationError> {
        let noop =
            || -> Arc<dyn Step> { Arc::new(FnStep::new("n", |_| Ok(StatePatch::new().into()))) };
        GraphBuilder::new("cyclic")
            .add_node("a", noop())?
            .add_node("b", noop())?
            .add_edge("a", "b")
            .add_edge("b", "a")
            .build()
    }

    #[tokio::test]
    async fn test_register_and_run() {
        let mut registry = PipelineRegistry::new();
        registry.register("echo", answer_graph).unwrap();
        let registry = Arc::new(registry);

        let state = registry
            .run("echo", PipelineState::new(Request::new().with_query("hi")))
            .await
            .unwrap();
        assert_eq!(state.answer.as_deref(), Some("echo hi"));
        assert!(registry.contains("echo"));
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = PipelineRegistry::new();
        registry.register("echo", answer_graph).unwrap();
        let err = registry.register("echo", answer_graph).unwrap_err();
        assert_eq!(err.code(), Some("REGISTRY-DUPLICATE"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_name() {
        let registry = PipelineRegistry::new();
        assert!(registry.is_empty());
        let err = registry
            .run("missing", PipelineState::new(Request::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentflowError::PipelineNotFound { name } if name == "missing"));
    }

    #[test]
    fn test_validate_all_surfaces_bad_graph() {
        let mut registry = PipelineRegistry::new();
        registry.register("echo", answer_graph).unwrap();
        registry.register("cyclic", cyclic_graph).unwrap();

        let err = registry.validate_all().unwrap_err();
        assert_eq!(err.code(), Some("GRAPH-CYCLE"));
        assert!(err.message.starts_with("Pipeline 'cyclic'"));
        assert!(matches!(registry.get("cyclic"), Err(AgentflowError::Validation(_))));
    }

    #[tokio::test]
    async fn test_registry_sink_reaches_engines() {
        let sink = Arc::new(CollectingEventSink::new());
        let mut registry = PipelineRegistry::new().with_event_sink(sink.clone());
        registry.register("echo", answer_graph).unwrap();

        registry
            .run("echo", PipelineState::new(Request::new()))
            .await
            .unwrap();
        assert_eq!(sink.events_of_type("pipeline.").len(), 2);
    }
}
