//! `fast_research`: one web search, hits stored as sources.

use super::{with_timeout, WorkflowDeps, FAST_RESEARCH};
use crate::errors::{AgentflowError, PipelineValidationError};
use crate::graph::{GraphBuilder, GraphEngine, Step, END, START};
use crate::state::{PipelineState, StateField, StatePatch, StepUpdate};
use async_trait::async_trait;
use std::sync::Arc;

/// Builds the `fast_research` graph.
pub fn build_fast_research(deps: &WorkflowDeps) -> Result<GraphEngine, PipelineValidationError> {
    GraphBuilder::new(FAST_RESEARCH)
        .add_node(START, Arc::new(ClearSources))?
        .add_node("search", Arc::new(WebSearch { deps: deps.clone() }))?
        .add_edge(START, "search")
        .add_edge("search", END)
        .with_entry_point(START)
        .build()
}

#[derive(Debug)]
struct ClearSources;

#[async_trait]
impl Step for ClearSources {
    fn name(&self) -> &str {
        START
    }

    async fn run(&self, _state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        Ok(StatePatch::new().set(StateField::Sources(Vec::new())).into())
    }
}

/// Queries the search backend once, retried with the salvage budget.
#[derive(Debug)]
struct WebSearch {
    deps: WorkflowDeps,
}

impl WebSearch {
    fn top_k(&self, requested: Option<usize>) -> usize {
        let research = &self.deps.config.research;
        requested
            .unwrap_or(research.default_top_k)
            .clamp(1, research.max_top_k.max(1))
    }
}

#[async_trait]
impl Step for WebSearch {
    fn name(&self) -> &str {
        "search"
    }

    async fn run(&self, state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        let query = state.request.query.trim();
        if query.is_empty() {
            return Ok(StatePatch::new().set(StateField::Sources(Vec::new())).into());
        }

        let top_k = self.top_k(state.request.top_k);
        let search = &self.deps.services.search;
        let timeout = self.deps.config.runner.call_timeout();
        let report = self
            .deps
            .config
            .runner
            .fallback_policy()
            .run("search", || with_timeout(search.search(query, top_k), timeout, "search"))
            .await;
        let hits = report.result?;

        tracing::info!(query, top_k, hits = hits.len(), "Search completed");
        Ok(StatePatch::new().set(StateField::Sources(hits)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentflowConfig, ResearchConfig};
    use crate::runner::RunnerConfig;
    use crate::state::Request;
    use crate::testing::{stub_services, StubCompletion, StubParser, StubSearch, StubSpeech};
    use pretty_assertions::assert_eq;

    fn setup(search: StubSearch) -> (GraphEngine, Arc<StubSearch>) {
        let mut config = AgentflowConfig::default()
            .with_runner(RunnerConfig::new().with_base_delay_ms(1));
        config.research = ResearchConfig {
            default_top_k: 3,
            max_top_k: 5,
        };
        let search = Arc::new(search);
        let deps = WorkflowDeps::new(
            stub_services(
                Arc::new(StubParser::new()),
                Arc::new(StubCompletion::default()),
                Arc::new(StubSpeech::new()),
                search.clone(),
            ),
            Arc::new(config),
        );
        (build_fast_research(&deps).unwrap(), search)
    }

    #[test]
    fn test_graph_shape() {
        let (engine, _) = setup(StubSearch::default());
        assert_eq!(engine.execution_order(), vec![START, "search", END]);
    }

    #[tokio::test]
    async fn test_default_and_clamped_top_k() {
        let (engine, search) = setup(StubSearch::with_hits(10));

        let state = engine
            .execute(PipelineState::new(Request::new().with_query("rust async")))
            .await
            .unwrap();
        assert_eq!(state.sources.len(), 3);
        assert_eq!(state.sources[0].title, "Result 1");

        let state = engine
            .execute(PipelineState::new(
                Request::new().with_query("rust async").with_top_k(50),
            ))
            .await
            .unwrap();
        assert_eq!(state.sources.len(), 5);

        engine
            .execute(PipelineState::new(
                Request::new().with_query("rust async").with_top_k(0),
            ))
            .await
            .unwrap();
        let requested: Vec<usize> = search.queries().into_iter().map(|(_, k)| k).collect();
        assert_eq!(requested, vec![3, 5, 1]);
    }

    #[tokio::test]
    async fn test_blank_query_skips_search() {
        let (engine, search) = setup(StubSearch::with_hits(10));
        let state = engine
            .execute(PipelineState::new(Request::new().with_query("  ")))
            .await
            .unwrap();
        assert!(state.sources.is_empty());
        assert!(search.queries().is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_aborts() {
        let (engine, search) = setup(StubSearch::failing());
        let err = engine
            .execute(PipelineState::new(Request::new().with_query("q")))
            .await
            .unwrap_err();
        assert!(matches!(err.root_cause(), AgentflowError::Service(_)));
        assert_eq!(search.queries().len(), 3);
    }
}
