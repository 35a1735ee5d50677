use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::error::SourceError;

pub const USER_AGENT: &str = concat!("UpbitListingsBot/", env!("CARGO_PKG_VERSION"), " (+local)");

const RETRY_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    /// Delay before the `attempt`-th retry (1-based): `factor * 2^(attempt - 1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_factor * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    pub fn is_retryable_status(status: StatusCode) -> bool {
        RETRY_STATUSES.contains(&status)
    }

    fn is_retryable_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }
}

/// GET-only client shared by both sources. Transient failures are retried
/// here so callers only ever see a final outcome.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Self::with_retry_policy(timeout, RetryPolicy::default())
    }

    pub fn with_retry_policy(timeout: Duration, retry: RetryPolicy) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, retry })
    }

    pub async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let response = self.get(url).await?;
        Ok(response.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        let mut attempt = 0;

        loop {
            let outcome = self.client.get(url).send().await;

            let retryable = match &outcome {
                Ok(response) => RetryPolicy::is_retryable_status(response.status()),
                Err(e) => RetryPolicy::is_retryable_error(e),
            };

            if retryable && attempt < self.retry.max_retries {
                attempt += 1;
                let delay = self.retry.backoff(attempt);
                match &outcome {
                    Ok(response) => tracing::debug!(
                        "GET {} returned {}, retry {}/{} in {:?}",
                        url,
                        response.status(),
                        attempt,
                        self.retry.max_retries,
                        delay
                    ),
                    Err(e) => tracing::debug!(
                        "GET {} failed ({}), retry {}/{} in {:?}",
                        url,
                        e,
                        attempt,
                        self.retry.max_retries,
                        delay
                    ),
                }
                tokio::time::sleep(delay).await;
                continue;
            }

            let response = outcome?;
            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            return Ok(response);
        }
    }
}
