//! Error types for agentflow.
//!
//! The taxonomy separates four failure families:
//!
//! - validation failures of pure inputs (graph shape, registry, runner config),
//! - transient service failures raised by external collaborators,
//! - permanent item failures surfaced by the task runner,
//! - pipeline aborts raised when a step returns an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for agentflow operations.
#[derive(Debug, Error)]
pub enum AgentflowError {
    /// A graph, registry or runner configuration failed validation.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// No pipeline is registered under the requested name.
    #[error("Pipeline not found: {name}")]
    PipelineNotFound {
        /// The requested pipeline name.
        name: String,
    },

    /// An external collaborator call failed.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// A work item exhausted both retry phases.
    #[error("{0}")]
    ItemFailed(#[from] ItemFailure),

    /// A step failed and the invocation was aborted.
    #[error("Pipeline '{pipeline}' aborted at step '{step}': {source}")]
    PipelineAborted {
        /// The pipeline name.
        pipeline: String,
        /// The step that failed.
        step: String,
        /// The step's error.
        #[source]
        source: Box<AgentflowError>,
    },

    /// A step read a state field that no earlier step wrote.
    #[error("State field '{field}' has not been set")]
    MissingField {
        /// The field name.
        field: &'static str,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentflowError {
    /// Creates a pipeline abort wrapping the step error.
    #[must_use]
    pub fn aborted(pipeline: impl Into<String>, step: impl Into<String>, source: Self) -> Self {
        Self::PipelineAborted {
            pipeline: pipeline.into(),
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, unwrapping pipeline aborts.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::PipelineAborted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Metadata about a validation error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "GRAPH-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

/// Error raised when a graph, registry or runner configuration is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The steps involved in the error.
    pub steps: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            steps: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the steps involved.
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a cycle is detected in a graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of steps forming the cycle.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "GRAPH-CYCLE",
            format!("Graph contains a cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the edges in the cycle to break it.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            steps: err.cycle_path.clone(),
            error_info: Some(err.error_info),
        }
    }
}

/// Coarse classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The call exceeded its timeout.
    Timeout,
    /// The service rejected or failed the call.
    Service,
    /// The requested model is not served by the endpoint.
    ModelUnavailable,
    /// The operation failed for a reason outside the service taxonomy.
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Service => "service",
            Self::ModelUnavailable => "model_unavailable",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Errors raised by external collaborators (completion, speech, parsing, search).
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The call did not finish in time.
    #[error("{service} call timed out after {after_ms}ms")]
    Timeout {
        /// The collaborator name.
        service: String,
        /// The timeout that elapsed.
        after_ms: u64,
    },

    /// The call failed.
    #[error("{service} call failed: {message}")]
    Failed {
        /// The collaborator name.
        service: String,
        /// The failure message.
        message: String,
    },

    /// The endpoint does not serve the requested model.
    #[error("{service} model '{model}' is not available at this endpoint")]
    ModelUnavailable {
        /// The collaborator name.
        service: String,
        /// The model id.
        model: String,
    },
}

impl ServiceError {
    /// Creates a failed-call error.
    #[must_use]
    pub fn failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(service: impl Into<String>, after_ms: u64) -> Self {
        Self::Timeout {
            service: service.into(),
            after_ms,
        }
    }

    /// Returns the failure classification.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Failed { .. } => FailureKind::Service,
            Self::ModelUnavailable { .. } => FailureKind::ModelUnavailable,
        }
    }
}

/// A captured failure of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// The failure classification.
    pub kind: FailureKind,
    /// The failure message of the last attempt.
    pub message: String,
}

impl TaskFailure {
    /// Creates a new task failure.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl From<ServiceError> for TaskFailure {
    fn from(err: ServiceError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<AgentflowError> for TaskFailure {
    fn from(err: AgentflowError) -> Self {
        match err {
            AgentflowError::Service(service) => service.into(),
            other => Self::new(FailureKind::Other, other.to_string()),
        }
    }
}

/// Raised when a fail-fast step finds an item that failed both retry phases.
#[derive(Debug, Clone, Error)]
#[error("Item {index} failed after {attempts} attempt(s): {failure}")]
pub struct ItemFailure {
    /// The item's input position.
    pub index: usize,
    /// Total attempts spent on the item.
    pub attempts: u32,
    /// The last captured failure.
    pub failure: TaskFailure,
}

/// Convenience result alias.
pub type Result<T, E = AgentflowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);

        assert!(err.to_string().contains("a -> b -> a"));
        assert_eq!(err.error_info.code, "GRAPH-CYCLE");

        let validation: PipelineValidationError = err.into();
        assert_eq!(validation.code(), Some("GRAPH-CYCLE"));
        assert_eq!(validation.steps.len(), 3);
    }

    #[test]
    fn test_service_error_kind() {
        assert_eq!(ServiceError::timeout("tts", 10).kind(), FailureKind::Timeout);
        assert_eq!(ServiceError::failed("tts", "503").kind(), FailureKind::Service);

        let failure: TaskFailure = ServiceError::failed("tts", "boom").into();
        assert_eq!(failure.kind, FailureKind::Service);
        assert!(failure.message.contains("boom"));
    }

    #[test]
    fn test_abort_root_cause() {
        let err = AgentflowError::aborted(
            "kb_podcast",
            "generate_audio",
            AgentflowError::MissingField { field: "podcast_script" },
        );

        assert!(err.to_string().contains("generate_audio"));
        assert!(matches!(
            err.root_cause(),
            AgentflowError::MissingField { field: "podcast_script" }
        ));
    }
}
