//! HTTP client for the market API's stats and per-market status endpoints.
//!
//! Wraps `reqwest` with base-URL normalisation, optional bearer auth, and
//! typed decoding of the two JSON shapes the poller consumes.

use std::time::Duration;

use chrono::Utc;
use pulse_core::AppConfig;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use crate::api::MarketApi;
use crate::error::PollerError;
use crate::types::{MarketStatus, MarketStatusBody, RateLimitInfo, StatsResponse};

/// Client for the remote market API.
///
/// Use [`MarketClient::new`] with the production base URL, or point it at a
/// wiremock server in tests.
pub struct MarketClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl MarketClient {
    /// Creates a client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`PollerError::InvalidBaseUrl`] if
    /// `base_url` is not an absolute hierarchical URL.
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, PollerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Exactly one trailing slash, so endpoint paths append to the base
        // path instead of replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| PollerError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(PollerError::InvalidBaseUrl {
                base_url: base_url.to_owned(),
                reason: "URL cannot be used as a base".to_owned(),
            });
        }

        Ok(Self {
            client,
            base_url: parsed,
            api_key: None,
        })
    }

    /// Builds a client from the loaded application config.
    ///
    /// # Errors
    ///
    /// Same as [`MarketClient::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, PollerError> {
        let client = Self::new(
            &config.api_base_url,
            config.request_timeout_secs,
            &config.user_agent,
        )?;
        Ok(match &config.api_key {
            Some(key) => client.with_api_key(key),
            None => client,
        })
    }

    /// Sends `key` as a bearer token on every request.
    #[must_use]
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_owned());
        self
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get(&self, url: &Url) -> Result<Response, PollerError> {
        let mut request = self.client.get(url.clone());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        Ok(request.send().await?)
    }

    async fn decode<T: DeserializeOwned>(
        response: Response,
        context: String,
    ) -> Result<T, PollerError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| PollerError::Deserialize { context, source })
    }
}

impl MarketApi for MarketClient {
    /// `GET {base}/stats`. Absent budget fields fall back to defaults.
    async fn fetch_rate_limit(&self) -> Result<RateLimitInfo, PollerError> {
        let url = self.endpoint(&["stats"]);
        let response = self.get(&url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PollerError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: StatsResponse = Self::decode(response, url.to_string()).await?;
        Ok(RateLimitInfo::from_body(body.rate_limit, Utc::now()))
    }

    /// `GET {base}/markets/{id}/status`. Any non-2xx answer means "no result".
    async fn fetch_market_status(
        &self,
        market_id: &str,
    ) -> Result<Option<MarketStatus>, PollerError> {
        let url = self.endpoint(&["markets", market_id, "status"]);
        let response = self.get(&url).await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(market_id, status = status.as_u16(), "market status unavailable");
            return Ok(None);
        }

        let body: MarketStatusBody =
            Self::decode(response, format!("market status ({market_id})")).await?;
        Ok(Some(body.into()))
    }
}
