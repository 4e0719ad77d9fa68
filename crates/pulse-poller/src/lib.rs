//! Rate-limit-aware background polling of remote market status.
//!
//! [`BackoffPoller`] keeps a cache of the latest [`PollResult`] per market,
//! refreshed on a fixed period in bounded-concurrency windows. One cheap
//! rate-limit probe gates every round: when the remote reports that its
//! request budget is nearly spent, the whole round is skipped.

pub mod api;
pub mod client;
pub mod error;
pub mod poller;
pub mod types;

pub use api::MarketApi;
pub use client::MarketClient;
pub use error::PollerError;
pub use poller::BackoffPoller;
pub use types::{MarketStatus, PollResult, PollerStatus, RateLimitInfo, RateLimitState};
