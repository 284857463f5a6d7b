//! The mutable record threaded through a pipeline.
//!
//! A [`PipelineState`] is created once per invocation from an immutable [`Request`],
//! then updated by every step in order, either wholesale ([`StepUpdate::Replace`]) or
//! field by field ([`StepUpdate::Patch`]). Ad hoc values live in a typed
//! [`Extensions`] map addressed through the constants in [`keys`].

mod extensions;
mod patch;
mod pipeline_state;
mod request;

pub use extensions::{keys, ExtensionKey, Extensions};
pub use patch::{StateField, StatePatch, StepUpdate};
pub use pipeline_state::{AnalysisOutcome, ContentOutcome, FileAnalysis, FileContent, PipelineState};
pub use request::{ChatMessage, PodcastMode, Request};
