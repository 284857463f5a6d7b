//! Bounded concurrent fan-out with a serial salvage phase.
//!
//! Phase one launches every item at once behind a counting semaphore, each wrapped
//! in a small retry budget. Phase two revisits only the failed items, one at a
//! time and without the limiter, with a larger budget. Each item's final outcome
//! lands in its own slot, so output order always matches input order.

use super::outcome::{RunReport, TaskOutcome, WorkItem};
use super::retry::{BackoffStrategy, JitterStrategy, RetryPolicy};
use crate::errors::{ContractErrorInfo, FailureKind, PipelineValidationError, TaskFailure};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Configuration for a [`ConcurrentTaskRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum in-flight calls during fan-out.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Attempts per item during fan-out.
    #[serde(default = "default_primary_attempts")]
    pub primary_attempts: u32,
    /// Attempts per failed item during serial salvage.
    #[serde(default = "default_fallback_attempts")]
    pub fallback_attempts: u32,
    /// Base backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// How the delay grows between attempts. Linear gives `base × attempt`.
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Randomisation applied to each delay.
    #[serde(default)]
    pub jitter: JitterStrategy,
    /// Per-call timeout in milliseconds; a timeout counts as a failed attempt.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: Option<u64>,
}

fn default_concurrency_limit() -> usize {
    4
}

fn default_primary_attempts() -> u32 {
    2
}

fn default_fallback_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    800
}

fn default_max_delay_ms() -> u64 {
    30_000
}

#[allow(clippy::unnecessary_wraps)]
fn default_call_timeout_ms() -> Option<u64> {
    Some(120_000)
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            primary_attempts: default_primary_attempts(),
            fallback_attempts: default_fallback_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::default(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl RunnerConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency limit.
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Sets both attempt budgets.
    #[must_use]
    pub fn with_attempts(mut self, primary: u32, fallback: u32) -> Self {
        self.primary_attempts = primary;
        self.fallback_attempts = fallback;
        self
    }

    /// Sets the base backoff delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the backoff growth and jitter used by both phases.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffStrategy, jitter: JitterStrategy) -> Self {
        self.backoff = backoff;
        self.jitter = jitter;
        self
    }

    /// Sets or clears the per-call timeout.
    #[must_use]
    pub fn with_call_timeout_ms(mut self, timeout: Option<u64>) -> Self {
        self.call_timeout_ms = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the concurrency limit is zero or above
    /// [`Semaphore::MAX_PERMITS`], or if either attempt budget is zero.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        let problem = if self.concurrency_limit == 0 {
            Some("concurrency_limit must be at least 1")
        } else if self.concurrency_limit > Semaphore::MAX_PERMITS {
            Some("concurrency_limit exceeds the semaphore permit limit")
        } else if self.primary_attempts == 0 || self.fallback_attempts == 0 {
            Some("attempt budgets must be at least 1")
        } else {
            None
        };

        match problem {
            Some(message) => Err(PipelineValidationError::new(message).with_error_info(
                ContractErrorInfo::new("RUNNER-CONFIG", message)
                    .with_fix_hint(
                        "Use a concurrency limit between 1 and Semaphore::MAX_PERMITS \
                         and positive attempt budgets.",
                    ),
            )),
            None => Ok(()),
        }
    }

    /// Retry policy for the fan-out phase.
    #[must_use]
    pub fn primary_policy(&self) -> RetryPolicy {
        self.policy(self.primary_attempts)
    }

    /// Retry policy for the salvage phase.
    #[must_use]
    pub fn fallback_policy(&self) -> RetryPolicy {
        self.policy(self.fallback_attempts)
    }

    /// Per-call timeout, if configured.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    fn policy(&self, attempts: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(attempts)
            .with_base_delay_ms(self.base_delay_ms)
            .with_max_delay_ms(self.max_delay_ms)
            .with_backoff(self.backoff)
            .with_jitter(self.jitter)
    }
}

/// Runs homogeneous work items under a concurrency cap, then salvages failures serially.
#[derive(Debug, Clone)]
pub struct ConcurrentTaskRunner {
    config: RunnerConfig,
    label: String,
}

impl ConcurrentTaskRunner {
    /// Creates a runner from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: RunnerConfig) -> Result<Self, PipelineValidationError> {
        config.validate()?;
        Ok(Self {
            config,
            label: "runner".to_string(),
        })
    }

    /// Sets the label used in log records.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs `operation` over every payload and returns one outcome per payload, in order.
    ///
    /// A failing item never cancels or delays its siblings. Salvage starts only after
    /// every fan-out attempt has settled, and each item spends at most
    /// `primary_attempts + fallback_attempts` attempts.
    pub async fn run<P, T, E, F, Fut>(&self, payloads: Vec<P>, operation: F) -> RunReport<T>
    where
        P: Sync,
        T: Send,
        E: Into<TaskFailure>,
        F: Fn(&WorkItem<P>) -> Fut + Sync,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let start = Instant::now();
        let items: Vec<WorkItem<P>> = payloads
            .into_iter()
            .enumerate()
            .map(|(index, payload)| WorkItem::new(index, payload))
            .collect();
        let mut slots: Vec<Option<TaskOutcome<T>>> = items.iter().map(|_| None).collect();

        // Fan-out: every item in flight, calls bounded by the semaphore.
        let limiter = Semaphore::new(self.config.concurrency_limit);
        let primary = self.config.primary_policy();
        let mut pending: FuturesUnordered<_> = items
            .iter()
            .map(|item| {
                let primary = &primary;
                let limiter = &limiter;
                let operation = &operation;
                async move {
                    let key = format!("{}[{}]", self.label, item.index);
                    let report = primary
                        .run(&key, || self.call_once(item, Some(limiter), operation))
                        .await;
                    (item.index, report)
                }
            })
            .collect();

        while let Some((index, report)) = pending.next().await {
            slots[index] = Some(TaskOutcome {
                index,
                attempts: report.attempt_count(),
                salvaged: false,
                result: report.result,
            });
        }
        drop(pending);

        let failed: Vec<usize> = slots
            .iter()
            .flatten()
            .filter(|o| !o.is_success())
            .map(|o| o.index)
            .collect();

        // Salvage: failed items one at a time, full fallback budget, no limiter.
        if !failed.is_empty() {
            tracing::warn!(
                runner = %self.label,
                failed = failed.len(),
                total = items.len(),
                "Retrying failed items serially"
            );
            let fallback = self.config.fallback_policy();
            for index in failed {
                let item = &items[index];
                let key = format!("{}[{}]", self.label, index);
                let report = fallback
                    .run(&key, || self.call_once(item, None, &operation))
                    .await;
                let prior_attempts = slots[index].as_ref().map_or(0, |o| o.attempts);
                let salvaged = report.result.is_ok();
                if let Err(failure) = &report.result {
                    tracing::error!(
                        runner = %self.label,
                        index,
                        error = %failure,
                        "Item failed after salvage"
                    );
                }
                slots[index] = Some(TaskOutcome {
                    index,
                    attempts: prior_attempts + report.attempt_count(),
                    salvaged,
                    result: report.result,
                });
            }
        }

        let outcomes: Vec<TaskOutcome<T>> = slots.into_iter().flatten().collect();
        let report = RunReport::new(outcomes, start.elapsed());
        tracing::debug!(
            runner = %self.label,
            items = report.len(),
            salvaged = report.salvaged_count(),
            failed = report.failed_count(),
            duration_ms = report.duration().as_secs_f64() * 1000.0,
            "Runner finished"
        );
        report
    }

    /// One attempt: take a permit if limited, then call with the configured timeout.
    async fn call_once<P, T, E, F, Fut>(
        &self,
        item: &WorkItem<P>,
        limiter: Option<&Semaphore>,
        operation: &F,
    ) -> Result<T, TaskFailure>
    where
        E: Into<TaskFailure>,
        F: Fn(&WorkItem<P>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // The permit is released before any backoff sleep.
        let _permit = match limiter {
            Some(semaphore) => Some(semaphore.acquire().await.map_err(|_| {
                TaskFailure::new(FailureKind::Other, "concurrency limiter closed")
            })?),
            None => None,
        };

        match self.config.call_timeout() {
            Some(limit) => match tokio::time::timeout(limit, operation(item)).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(TaskFailure::new(
                    FailureKind::Timeout,
                    format!("call timed out after {}ms", limit.as_millis()),
                )),
            },
            None => operation(item).await.map_err(Into::into),
        }
    }
}
