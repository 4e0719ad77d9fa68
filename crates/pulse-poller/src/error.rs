use thiserror::Error;

/// Errors returned by the market API adapters.
///
/// [`BackoffPoller`](crate::BackoffPoller) never surfaces these to its
/// callers; they are logged and the affected round or market is skipped.
#[derive(Debug, Error)]
pub enum PollerError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}
