//! # Agentflow
//!
//! An execution substrate for LLM-agent workflows.
//!
//! Agentflow provides the pieces a multi-step agent pipeline is assembled from:
//!
//! - **Graph pipelines**: named steps joined by edges, validated before they run and
//!   executed in deterministic topological order
//! - **Pipeline state**: one record per invocation, updated by full replacement or by
//!   field-level patches
//! - **Bounded fan-out**: a concurrent task runner with per-item retries and a serial
//!   salvage pass for whatever the parallel phase could not finish
//! - **Segmentation**: character-budget text chunking and speaker-labeled dialogue
//!   parsing for speech synthesis
//! - **Built-in workflows**: knowledge-base podcast, document Q&A and fast web search
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentflow::prelude::*;
//! use std::sync::Arc;
//!
//! let mut registry = PipelineRegistry::new();
//! register_builtin(&mut registry, services, Arc::new(AgentflowConfig::default()))?;
//! registry.validate_all()?;
//!
//! let request = Request::new().with_files(["notes.md"]).with_query("summarize notes");
//! let state = registry.run("intelligent_qa", PipelineState::new(request)).await?;
//! println!("{}", state.require_answer()?);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod errors;
pub mod events;
pub mod graph;
pub mod observability;
pub mod runner;
pub mod segmentation;
pub mod services;
pub mod state;
pub mod testing;
pub mod utils;
pub mod workflows;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::AgentflowConfig;
    pub use crate::errors::{
        AgentflowError, ContractErrorInfo, CycleDetectedError, FailureKind, ItemFailure,
        PipelineValidationError, ServiceError, TaskFailure,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::graph::{GraphBuilder, GraphEngine, PipelineRegistry, Step, END, START};
    pub use crate::runner::{ConcurrentTaskRunner, RetryPolicy, RunReport, RunnerConfig};
    pub use crate::segmentation::{segment_dialogue, segment_text, SpeakerAliases};
    pub use crate::services::Services;
    pub use crate::state::{PipelineState, Request, StateField, StatePatch, StepUpdate};
    pub use crate::workflows::{register_builtin, WorkflowDeps};
}
