//! Retry with configurable backoff around a single fallible async operation.
//!
//! The policy has no concurrency awareness. The task runner reuses it with a small
//! attempt budget during fan-out and a larger one during serial salvage.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^(attempt - 1)
    Exponential,
    /// delay = base * attempt
    #[default]
    Linear,
    /// delay = base (constant)
    Constant,
}

/// Jitter strategy to spread out synchronized retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

/// Retry configuration for one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 800,
            max_delay_ms: 30_000,
            backoff_strategy: BackoffStrategy::Linear,
            jitter_strategy: JitterStrategy::None,
        }
    }
}

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The operation returned `Ok`.
    Succeeded,
    /// The operation returned `Err` with this message.
    Failed(String),
}

/// Record of one attempt made by a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    /// Attempt number (1-indexed).
    pub number: u32,
    /// Backoff waited before this attempt started.
    pub delay_before: Duration,
    /// The attempt's outcome.
    pub outcome: AttemptOutcome,
}

/// The final result of a retried operation together with its attempt history.
#[derive(Debug)]
pub struct RetryReport<T, E> {
    /// The last attempt's result.
    pub result: Result<T, E>,
    /// Every attempt made, in order.
    pub attempts: Vec<RetryAttempt>,
}

impl<T, E> RetryReport<T, E> {
    /// Returns the number of attempts made.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }

    /// Calculates the wait after the given failed attempt (1-indexed).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms;
        let attempt = attempt.max(1);

        let delay = match self.backoff_strategy {
            BackoffStrategy::Exponential => {
                base.saturating_mul(2u64.saturating_pow(attempt - 1))
            }
            BackoffStrategy::Linear => base.saturating_mul(u64::from(attempt)),
            BackoffStrategy::Constant => base,
        }
        .min(self.max_delay_ms);

        let jittered = match self.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }

    /// Runs `operation` until it succeeds or the attempt budget is spent.
    ///
    /// A budget of zero is treated as one attempt. The last error is returned on
    /// exhaustion.
    pub async fn run<T, E, F, Fut>(&self, key: &str, mut operation: F) -> RetryReport<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = Vec::new();
        let mut delay_before = Duration::ZERO;
        let mut number = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    attempts.push(RetryAttempt {
                        number,
                        delay_before,
                        outcome: AttemptOutcome::Succeeded,
                    });
                    return RetryReport {
                        result: Ok(value),
                        attempts,
                    };
                }
                Err(e) => {
                    attempts.push(RetryAttempt {
                        number,
                        delay_before,
                        outcome: AttemptOutcome::Failed(e.to_string()),
                    });
                    if number >= max_attempts {
                        tracing::debug!(key, attempts = number, error = %e, "Retries exhausted");
                        return RetryReport {
                            result: Err(e),
                            attempts,
                        };
                    }

                    delay_before = self.delay_after(number);
                    tracing::debug!(
                        key,
                        attempt = number,
                        delay_ms = u64::try_from(delay_before.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retrying after error"
                    );
                    tokio::time::sleep(delay_before).await;
                    number += 1;
                }
            }
        }
    }
}

/// Runs `operation` up to `attempts` times with linear backoff of `base_delay × attempt`.
pub async fn run_with_retry<T, E, F, Fut>(
    operation: F,
    attempts: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let policy = RetryPolicy::new()
        .with_max_attempts(attempts)
        .with_base_delay_ms(u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX))
        .with_max_delay_ms(u64::MAX)
        .with_backoff(BackoffStrategy::Linear)
        .with_jitter(JitterStrategy::None);

    policy.run("operation", operation).await.result
}
