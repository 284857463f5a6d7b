//! Work items and index-keyed outcomes.

use crate::errors::{ItemFailure, TaskFailure};
use std::time::Duration;

/// One unit of fan-out work: its input position and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<P> {
    /// Position in the input sequence.
    pub index: usize,
    /// The payload handed to the operation.
    pub payload: P,
}

impl<P> WorkItem<P> {
    /// Creates a new work item.
    #[must_use]
    pub fn new(index: usize, payload: P) -> Self {
        Self { index, payload }
    }
}

/// The final success-or-failure of one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome<T> {
    /// Position of the item in the input sequence.
    pub index: usize,
    /// Attempts spent across both phases.
    pub attempts: u32,
    /// True when the item failed fan-out and was recovered by serial salvage.
    pub salvaged: bool,
    /// The item's result.
    pub result: Result<T, TaskFailure>,
}

impl<T> TaskOutcome<T> {
    /// Returns true if the item succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the success value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// Returns the captured failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&TaskFailure> {
        self.result.as_ref().err()
    }
}

/// Ordered outcomes of one runner invocation.
///
/// `outcomes[i]` always belongs to input item `i`. Callers inspect the report and
/// decide between best-effort ([`RunReport::into_results`]) and fail-fast
/// ([`RunReport::into_values`]) handling.
#[derive(Debug, Clone)]
pub struct RunReport<T> {
    outcomes: Vec<TaskOutcome<T>>,
    duration: Duration,
}

impl<T> RunReport<T> {
    pub(crate) fn new(outcomes: Vec<TaskOutcome<T>>, duration: Duration) -> Self {
        Self { outcomes, duration }
    }

    /// Returns the outcomes in input order.
    #[must_use]
    pub fn outcomes(&self) -> &[TaskOutcome<T>] {
        &self.outcomes
    }

    /// Returns the number of outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if the run had no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Returns the wall-clock duration of both phases.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of items that still failed after salvage.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    /// Number of items recovered by salvage.
    #[must_use]
    pub fn salvaged_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.salvaged).count()
    }

    /// Returns true if every item succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(TaskOutcome::is_success)
    }

    /// Consumes the report, keeping every item's result in input order.
    #[must_use]
    pub fn into_results(self) -> Vec<Result<T, TaskFailure>> {
        self.outcomes.into_iter().map(|o| o.result).collect()
    }

    /// Consumes the report, returning the values in input order.
    ///
    /// # Errors
    ///
    /// Returns the lowest-indexed permanently failed item.
    pub fn into_values(self) -> Result<Vec<T>, ItemFailure> {
        self.outcomes
            .into_iter()
            .map(|o| {
                o.result.map_err(|failure| ItemFailure {
                    index: o.index,
                    attempts: o.attempts,
                    failure,
                })
            })
            .collect()
    }
}
