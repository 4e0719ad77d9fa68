//! `upload` command: PUT a file with retries and JSON progress lines.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use pulse_core::AppConfig;
use pulse_retry::{ProgressTracker, RetryExecutor, RetryOptions, UploadProgress};
use reqwest::Client;
use thiserror::Error;

use crate::print_json_line;

/// Upload failures, worded so that transient ones classify as retryable.
#[derive(Debug, Error)]
pub(crate) enum UploadError {
    #[error("upload timeout")]
    Timeout,

    #[error("network connection failed: {0}")]
    Connection(String),

    #[error("upload failed with HTTP {0}")]
    Status(u16),

    #[error("upload request could not be sent: {0}")]
    Request(String),
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// # Errors
///
/// Returns an error if the file cannot be read, the HTTP client cannot be
/// built, or every attempt fails.
pub(crate) async fn run_upload(
    config: &AppConfig,
    file: &Path,
    url: &str,
    max_retries: Option<u32>,
) -> anyhow::Result<()> {
    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(&config.user_agent)
        .build()
        .context("failed to build upload client")?;

    let mut options = RetryOptions::from(&config.retry);
    if let Some(max_retries) = max_retries {
        options.max_retries = max_retries;
    }
    let executor = RetryExecutor::new(options);
    let mut tracker = ProgressTracker::new(options.max_attempts(), |p: UploadProgress| {
        print_json_line(&p);
    });

    tracing::info!(
        file = %file.display(),
        bytes = body.len(),
        max_attempts = options.max_attempts(),
        "starting upload"
    );
    let status = put_with_retry(&client, url, &body, &executor, &mut tracker).await?;
    tracing::info!(status, "upload complete");
    Ok(())
}

/// PUTs `body` to `url` through `executor`, reporting to `tracker`.
///
/// Returns the final HTTP status code on success.
pub(crate) async fn put_with_retry<S>(
    client: &Client,
    url: &str,
    body: &[u8],
    executor: &RetryExecutor,
    tracker: &mut ProgressTracker<S>,
) -> Result<u16, UploadError>
where
    S: FnMut(UploadProgress),
{
    executor
        .run_tracked(|| put_once(client, url, body.to_vec()), tracker)
        .await
}

async fn put_once(client: &Client, url: &str, body: Vec<u8>) -> Result<u16, UploadError> {
    let response = client.put(url).body(body).send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(status.as_u16())
    } else {
        Err(UploadError::Status(status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use pulse_retry::{is_retryable, UploadStatus};
    use wiremock::matchers::{body_bytes, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fast_executor(max_retries: u32) -> RetryExecutor {
        RetryExecutor::new(RetryOptions {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 5,
        })
        .with_jitter_seed(7)
    }

    #[test]
    fn error_messages_classify_as_expected() {
        assert!(is_retryable(&UploadError::Timeout));
        assert!(is_retryable(&UploadError::Connection(
            "tcp connect error".to_owned()
        )));
        assert!(is_retryable(&UploadError::Status(503)));
        assert!(is_retryable(&UploadError::Status(502)));
        assert!(!is_retryable(&UploadError::Status(400)));
        assert!(!is_retryable(&UploadError::Status(500)));
        assert!(!is_retryable(&UploadError::Request("builder error".to_owned())));
    }

    #[tokio::test]
    async fn transient_status_is_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/snapshot"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/snapshot"))
            .and(body_bytes(b"payload".to_vec()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut events = Vec::new();
        let executor = fast_executor(3);
        let mut tracker = ProgressTracker::new(4, |p: UploadProgress| events.push(p));
        let status = put_with_retry(
            &Client::new(),
            &format!("{}/snapshot", server.uri()),
            b"payload",
            &executor,
            &mut tracker,
        )
        .await
        .expect("second attempt should succeed");

        assert_eq!(status, 201);
        let statuses: Vec<(UploadStatus, u32)> =
            events.iter().map(|p| (p.status, p.attempt)).collect();
        assert_eq!(
            statuses,
            vec![
                (UploadStatus::Uploading, 1),
                (UploadStatus::Retrying, 2),
                (UploadStatus::Uploading, 2),
                (UploadStatus::Success, 2),
            ]
        );
        assert_eq!(
            events[1].error.as_deref(),
            Some("upload failed with HTTP 503")
        );
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let mut events = Vec::new();
        let executor = fast_executor(3);
        let mut tracker = ProgressTracker::new(4, |p: UploadProgress| events.push(p));
        let err = put_with_retry(&Client::new(), &server.uri(), b"x", &executor, &mut tracker)
            .await
            .expect_err("400 is fatal");

        assert!(matches!(err, UploadError::Status(400)));
        let last = events.last().expect("a final snapshot is emitted");
        assert_eq!(last.status, UploadStatus::Failed);
        assert_eq!(last.error.as_deref(), Some("upload failed with HTTP 400"));
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(504))
            .expect(3)
            .mount(&server)
            .await;

        let executor = fast_executor(2);
        let mut tracker = ProgressTracker::new(3, |_: UploadProgress| {});
        let err = put_with_retry(&Client::new(), &server.uri(), b"x", &executor, &mut tracker)
            .await
            .expect_err("every attempt fails");

        assert!(matches!(err, UploadError::Status(504)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_connection_error() {
        let executor = fast_executor(0);
        let mut tracker = ProgressTracker::new(1, |_: UploadProgress| {});
        // Port 9 (discard) on loopback is closed on test machines.
        let err = put_with_retry(
            &Client::new(),
            "http://127.0.0.1:9/",
            b"x",
            &executor,
            &mut tracker,
        )
        .await
        .expect_err("nothing listens on port 9");

        assert!(matches!(err, UploadError::Connection(_)));
        assert!(is_retryable(&err));
    }
}
