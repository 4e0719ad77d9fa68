//! Retry loop for a single fallible async operation.
//!
//! [`RetryExecutor::run`] tries the operation up to `max_retries + 1` times.
//! Fatal errors (see [`is_retryable`]) are returned on first occurrence; a
//! transient error is only returned once the budget is spent, and it is the
//! error from the final attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use pulse_core::RetryPolicy;

use crate::backoff::Backoff;
use crate::classify::is_retryable;
use crate::progress::{ProgressTracker, UploadProgress};

/// Retry budget and delay bounds for one [`RetryExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Retries after the initial try; total tries are `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::from(&RetryPolicy::default())
    }
}

impl From<&RetryPolicy> for RetryOptions {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            max_retries: policy.max_retries,
            base_delay_ms: policy.base_delay_ms,
            max_delay_ms: policy.max_delay_ms,
        }
    }
}

impl RetryOptions {
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// A failed attempt that is about to be retried.
#[derive(Debug)]
pub struct RetryAttempt<'a, E> {
    /// The attempt that just failed, starting at 1.
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: &'a E,
    /// How long the executor will sleep before the next attempt.
    pub delay: Duration,
}

/// Runs async operations with bounded retries and jittered exponential backoff.
///
/// The executor holds only configuration; every run draws from a fresh
/// jitter source, so runs never influence each other.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    options: RetryOptions,
    jitter_seed: Option<u64>,
}

impl RetryExecutor {
    #[must_use]
    pub fn new(options: RetryOptions) -> Self {
        Self {
            options,
            jitter_seed: None,
        }
    }

    /// Makes every run use the same reproducible jitter sequence.
    #[must_use]
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    #[must_use]
    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Runs `operation` until it succeeds, fails fatally, or the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last error once
    /// `max_retries + 1` attempts have all failed.
    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with(operation, |_| {}).await
    }

    /// Like [`run`](Self::run), invoking `on_retry` before each backoff sleep.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_with<T, E, F, Fut, C>(
        &self,
        mut operation: F,
        mut on_retry: C,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnMut(&RetryAttempt<'_, E>),
    {
        let max_attempts = self.options.max_attempts();
        let mut backoff = self.backoff();
        let mut attempt = 1u32;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_retryable(&err) || attempt >= max_attempts {
                return Err(err);
            }

            let delay = backoff.delay(attempt);
            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "transient error, retrying after backoff"
            );
            on_retry(&RetryAttempt {
                attempt,
                max_attempts,
                error: &err,
                delay,
            });
            drop(err);

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Runs `operation` while reporting every phase through `tracker`.
    ///
    /// Emits `uploading(0)` before each attempt, `retrying` before each
    /// backoff sleep, and `success` or `failed` once the run settles.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_tracked<T, E, F, Fut, S>(
        &self,
        mut operation: F,
        tracker: &mut ProgressTracker<S>,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        S: FnMut(UploadProgress),
    {
        // The operation and retry callbacks never run at the same time.
        let tracker = std::cell::RefCell::new(tracker);
        let result = self
            .run_with(
                || {
                    tracker.borrow_mut().uploading(0);
                    operation()
                },
                |retry| {
                    tracker
                        .borrow_mut()
                        .retrying(retry.attempt, &retry.error.to_string(), retry.delay);
                },
            )
            .await;

        let tracker = tracker.into_inner();
        match &result {
            Ok(_) => tracker.success(),
            Err(err) => tracker.failed(&err.to_string()),
        }
        result
    }

    fn backoff(&self) -> Backoff {
        match self.jitter_seed {
            Some(seed) => {
                Backoff::seeded(self.options.base_delay_ms, self.options.max_delay_ms, seed)
            }
            None => Backoff::from_entropy(self.options.base_delay_ms, self.options.max_delay_ms),
        }
    }
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
