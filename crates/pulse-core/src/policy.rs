//! Tunable policy constants for polling and retrying.
//!
//! Every number that governs how hard pulse leans on the remote API lives
//! here, so tests and deployments can move the boundaries without touching
//! the algorithms that read them.

use std::time::Duration;

/// Remaining-request count below which the poller stops issuing per-market calls.
pub const DEFAULT_LOW_WATER_MARK: u32 = 10;

/// Number of per-market checks in flight at once during a batch round.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Period between scheduled batch rounds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_mins(1);

/// Retries after the initial attempt (`3` means four tries in total).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry, before jitter.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// Upper bound on any single retry delay, jitter included.
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Rate-budget and scheduling policy for the market poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerPolicy {
    /// Back off when the probe reports fewer remaining requests than this.
    pub low_water_mark: u32,
    /// Window size for bounded-concurrency batch rounds. Never zero.
    pub concurrency: usize,
    pub poll_interval: Duration,
}

impl Default for PollerPolicy {
    fn default() -> Self {
        Self {
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Retry budget and backoff bounds for a single retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}
