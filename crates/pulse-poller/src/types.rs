use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Remaining-request budget assumed when the probe omits it.
const DEFAULT_BUDGET: u32 = 100;

/// How far ahead the budget resets when the probe omits `reset_at`.
const DEFAULT_RESET_WINDOW_SECS: i64 = 60;

/// Latest known status of one market.
///
/// Only successful checks produce a `PollResult`, so a cached entry always
/// has `exists == true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    pub id: String,
    pub exists: bool,
    pub volume: f64,
    pub liquidity: f64,
    pub last_checked: DateTime<Utc>,
}

/// Rate budget derived from the last successful probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
    /// `remaining` fell below the configured low-water mark.
    pub should_backoff: bool,
}

/// Probe payload with defaults applied, before the backoff policy is consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitInfo {
    /// Fills absent fields with `remaining = 100`, `limit = 100`, `reset_at = now + 60s`.
    pub(crate) fn from_body(body: Option<RateLimitBody>, now: DateTime<Utc>) -> Self {
        let body = body.unwrap_or_default();
        Self {
            remaining: body.remaining.unwrap_or(DEFAULT_BUDGET),
            limit: body.limit.unwrap_or(DEFAULT_BUDGET),
            reset_at: body
                .reset_at
                .and_then(DateTime::from_timestamp_millis)
                .unwrap_or(now + Duration::seconds(DEFAULT_RESET_WINDOW_SECS)),
        }
    }

    #[must_use]
    pub fn into_state(self, low_water_mark: u32) -> RateLimitState {
        RateLimitState {
            should_backoff: self.remaining < low_water_mark,
            remaining: self.remaining,
            limit: self.limit,
            reset_at: self.reset_at,
        }
    }
}

/// Per-market payload returned by the remote status endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketStatus {
    pub exists: bool,
    pub volume: f64,
    pub liquidity: f64,
}

/// Snapshot of the poller for a status line or a "paused" indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollerStatus {
    pub polling: bool,
    /// The last known rate budget says to back off; scheduled rounds are skipped.
    pub backing_off: bool,
    pub targets: usize,
    pub cached: usize,
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct StatsResponse {
    #[serde(default)]
    pub rate_limit: Option<RateLimitBody>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RateLimitBody {
    pub remaining: Option<u32>,
    pub limit: Option<u32>,
    /// Epoch milliseconds.
    pub reset_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MarketStatusBody {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub liquidity: f64,
}

impl From<MarketStatusBody> for MarketStatus {
    fn from(body: MarketStatusBody) -> Self {
        Self {
            exists: body.exists,
            volume: body.volume,
            liquidity: body.liquidity,
        }
    }
}
