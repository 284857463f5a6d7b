//! Retry and bounded fan-out primitives used inside pipeline steps.
//!
//! This module provides:
//! - A linear-backoff retry policy around one fallible async operation
//! - A concurrent task runner with a serial salvage phase for failed items
//! - Index-keyed task outcomes that preserve input order

mod concurrent;
mod outcome;
mod retry;

pub use concurrent::{ConcurrentTaskRunner, RunnerConfig};
pub use outcome::{RunReport, TaskOutcome, WorkItem};
pub use retry::{
    run_with_retry, AttemptOutcome, BackoffStrategy, JitterStrategy, RetryAttempt, RetryPolicy,
    RetryReport,
};
