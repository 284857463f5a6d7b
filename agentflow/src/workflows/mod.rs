//! Built-in pipelines.
//!
//! | Name | Steps |
//! |---|---|
//! | `kb_podcast` | `_start_ → parse_files → generate_script → generate_audio → _end_` |
//! | `intelligent_qa` | `_start_ → parallel_parse → chat → _end_` |
//! | `fast_research` | `_start_ → search → _end_` |

mod podcast;
mod qa;
mod research;

pub use podcast::build_kb_podcast;
pub use qa::{build_intelligent_qa, infer_target_files};
pub use research::build_fast_research;

use crate::config::AgentflowConfig;
use crate::errors::{AgentflowError, PipelineValidationError, ServiceError};
use crate::graph::PipelineRegistry;
use crate::runner::ConcurrentTaskRunner;
use crate::services::{CompletionRequest, Services};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Registry name of the podcast pipeline.
pub const KB_PODCAST: &str = "kb_podcast";
/// Registry name of the Q&A pipeline.
pub const INTELLIGENT_QA: &str = "intelligent_qa";
/// Registry name of the search pipeline.
pub const FAST_RESEARCH: &str = "fast_research";

/// Registers every built-in pipeline.
///
/// # Errors
///
/// Returns an error if any of the names is already taken.
pub fn register_builtin(
    registry: &mut PipelineRegistry,
    services: Services,
    config: Arc<AgentflowConfig>,
) -> Result<(), PipelineValidationError> {
    let deps = WorkflowDeps::new(services, config);

    let podcast = deps.clone();
    registry.register(KB_PODCAST, move || build_kb_podcast(&podcast))?;
    let qa = deps.clone();
    registry.register(INTELLIGENT_QA, move || build_intelligent_qa(&qa))?;
    registry.register(FAST_RESEARCH, move || build_fast_research(&deps))?;
    Ok(())
}

/// Collaborators and configuration shared by every step of a workflow.
#[derive(Debug, Clone)]
pub struct WorkflowDeps {
    /// External collaborators.
    pub services: Services,
    /// Process configuration.
    pub config: Arc<AgentflowConfig>,
}

impl WorkflowDeps {
    /// Bundles collaborators and configuration.
    #[must_use]
    pub fn new(services: Services, config: Arc<AgentflowConfig>) -> Self {
        Self { services, config }
    }

    pub(crate) fn runner(&self, label: &str) -> Result<ConcurrentTaskRunner, AgentflowError> {
        Ok(ConcurrentTaskRunner::new(self.config.runner.clone())?.with_label(label))
    }

    /// One completion, retried serially with the salvage budget.
    pub(crate) async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<String, AgentflowError> {
        let policy = self.config.runner.fallback_policy();
        let timeout = self.config.runner.call_timeout();
        let completion = &self.services.completion;
        let report = policy
            .run("completion", || {
                with_timeout(completion.complete(&request), timeout, "completion")
            })
            .await;
        report.result.map_err(Into::into)
    }
}

/// Bounds one collaborator call. Expiry becomes [`ServiceError::Timeout`].
pub(crate) async fn with_timeout<T, F>(
    call: F,
    limit: Option<Duration>,
    service: &str,
) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            Err(ServiceError::timeout(
                service,
                u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            ))
        }),
        None => call.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stub_services, StubCompletion, StubParser, StubSearch, StubSpeech};

    fn deps(completion: StubCompletion) -> WorkflowDeps {
        let config = AgentflowConfig::default().with_runner(
            crate::runner::RunnerConfig::new()
                .with_base_delay_ms(1)
                .with_call_timeout_ms(Some(1_000)),
        );
        WorkflowDeps::new(
            stub_services(
                Arc::new(StubParser::new()),
                Arc::new(completion),
                Arc::new(StubSpeech::new()),
                Arc::new(StubSearch::with_hits(3)),
            ),
            Arc::new(config),
        )
    }

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: prompt.into(),
            model: "m".into(),
            endpoint: String::new(),
            temperature: 0.7,
            attachment: None,
        }
    }

    #[test]
    fn test_register_builtin_names() {
        let mut registry = PipelineRegistry::new();
        let deps = deps(StubCompletion::default());
        register_builtin(&mut registry, deps.services.clone(), deps.config.clone()).unwrap();

        assert_eq!(registry.names(), vec![FAST_RESEARCH, INTELLIGENT_QA, KB_PODCAST]);
        registry.validate_all().unwrap();

        let err = register_builtin(&mut registry, deps.services, deps.config).unwrap_err();
        assert_eq!(err.code(), Some("REGISTRY-DUPLICATE"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_retries_transient_failures() {
        let deps = deps(StubCompletion::new("ok").with_transient_failure("flaky", 2));
        let reply = deps.complete(request("flaky")).await.unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_gives_up_after_budget() {
        let deps = deps(StubCompletion::new("ok").with_failure("broken"));
        let err = deps.complete(request("broken")).await.unwrap_err();
        assert!(matches!(err, AgentflowError::Service(ServiceError::Failed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_maps_expiry() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ServiceError>(())
        };
        let err = with_timeout(slow, Some(Duration::from_millis(10)), "speech")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { after_ms: 10, .. }));
    }
}
