//! Named steps, the edges between them, and the engine that runs them in order.
//!
//! A [`GraphBuilder`] validates the shape of a graph before anything runs: cycles,
//! dangling edges and a missing or ambiguous entry are all build
//! errors. The resulting [`GraphEngine`] executes steps one at a time in topological
//! order, merging each step's [`StepUpdate`](crate::state::StepUpdate) into the state.
//! [`PipelineRegistry`] maps pipeline names to engine factories.

mod builder;
mod engine;
mod registry;
mod step;


pub use builder::GraphBuilder;
pub use engine::GraphEngine;
pub use registry::{GraphFactory, PipelineRegistry};
pub use step::{AsyncFnStep, EndStep, FnStep, Step};

/// Name of the conventional first step.
pub const START: &str = "_start_";

/// Name of the terminal no-op step. Added automatically when an edge targets it.
pub const END: &str = "_end_";
