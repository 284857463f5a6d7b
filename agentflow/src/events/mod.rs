//! Lifecycle events emitted by the graph engine.
//!
//! Sinks receive `pipeline.*` and `step.*` events with a small JSON payload. The
//! engine uses [`NoOpEventSink`] unless a registry is given another sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names.
pub mod types {
    /// A pipeline invocation began.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A pipeline invocation finished successfully.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A pipeline invocation aborted.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    /// A step began.
    pub const STEP_STARTED: &str = "step.started";
    /// A step returned an update.
    pub const STEP_COMPLETED: &str = "step.completed";
    /// A step returned an error.
    pub const STEP_FAILED: &str = "step.failed";
}
