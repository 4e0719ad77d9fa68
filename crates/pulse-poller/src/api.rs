//! Seam between the poller and the remote market API.

use std::future::Future;
use std::sync::Arc;

use crate::error::PollerError;
use crate::types::{MarketStatus, RateLimitInfo};

/// Remote endpoints the poller depends on.
///
/// [`MarketClient`](crate::MarketClient) is the HTTP implementation; tests
/// substitute in-memory fakes.
pub trait MarketApi: Send + Sync {
    /// Cheap probe of the caller's remaining request budget.
    fn fetch_rate_limit(&self) -> impl Future<Output = Result<RateLimitInfo, PollerError>> + Send;

    /// Status of a single market. `Ok(None)` when the remote has no answer for it.
    fn fetch_market_status(
        &self,
        market_id: &str,
    ) -> impl Future<Output = Result<Option<MarketStatus>, PollerError>> + Send;
}

impl<T: MarketApi> MarketApi for Arc<T> {
    fn fetch_rate_limit(&self) -> impl Future<Output = Result<RateLimitInfo, PollerError>> + Send {
        (**self).fetch_rate_limit()
    }

    fn fetch_market_status(
        &self,
        market_id: &str,
    ) -> impl Future<Output = Result<Option<MarketStatus>, PollerError>> + Send {
        (**self).fetch_market_status(market_id)
    }
}
