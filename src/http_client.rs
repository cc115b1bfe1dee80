use crate::config::NetworkConfig;
use crate::error::{NetworkError, NetworkResult};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Status and body of one completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub ok: bool,
    pub body: String,
}

impl FetchResponse {
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Only a plain 200 counts as a usable document
    pub fn is_usable(&self) -> bool {
        self.ok && self.status == 200
    }
}

/// Retrieves the raw text behind a source URL
///
/// Non-2xx statuses are returned as responses, not errors. An `Err` means no
/// response was received at all.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> NetworkResult<FetchResponse>;
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds (for exponential backoff cap)
    pub max_retry_delay_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            user_agent: format!("anyxml-source/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&NetworkConfig> for HttpClientConfig {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            timeout_seconds: network.timeout_seconds,
            retry_attempts: network.retry_attempts,
            retry_delay_ms: network.retry_delay_ms,
            ..Self::default()
        }
    }
}

/// Async HTTP client for downloading source documents
pub struct AsyncHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AsyncHttpClient {
    pub fn new(config: HttpClientConfig) -> NetworkResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| NetworkError::ClientSetup {
                details: e.to_string(),
            })?;

        Ok(Self { client, config })
    }

    /// Get response with retry logic
    ///
    /// Server errors and connection failures are retried with exponential
    /// backoff. When the retries run out on a server error, that last
    /// response is returned as is.
    async fn get_response_with_retry(&self, url: &str) -> NetworkResult<Response> {
        let mut current_attempt = 0;

        loop {
            match self.make_request(url).await {
                Ok(response) => {
                    if response.status().is_server_error()
                        && current_attempt < self.config.retry_attempts
                    {
                        tracing::debug!(url, status = %response.status(), attempt = current_attempt, "retrying");
                        self.wait_before_retry(current_attempt).await;
                        current_attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(error) => {
                    if current_attempt < self.config.retry_attempts && self.is_retryable_error(&error)
                    {
                        tracing::debug!(url, error = %error, attempt = current_attempt, "retrying");
                        self.wait_before_retry(current_attempt).await;
                        current_attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Make a single HTTP request with timeout
    async fn make_request(&self, url: &str) -> NetworkResult<Response> {
        let request_future = self.client.get(url).send();

        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            request_future,
        )
        .await
        .map_err(|_| NetworkError::Timeout {
            url: url.to_string(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(NetworkError::from)
    }

    /// Wait before retry with exponential backoff
    async fn wait_before_retry(&self, attempt: u32) {
        sleep(self.backoff_delay(attempt)).await;
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .config
            .retry_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.config.max_retry_delay_ms))
    }

    fn is_retryable_error(&self, error: &NetworkError) -> bool {
        match error {
            NetworkError::Http(reqwest_error) => {
                reqwest_error.is_timeout() || reqwest_error.is_connect()
            }
            NetworkError::Timeout { .. } => true,
            NetworkError::ClientSetup { .. } => false,
        }
    }
}

#[async_trait]
impl Fetcher for AsyncHttpClient {
    async fn fetch(&self, url: &str) -> NetworkResult<FetchResponse> {
        let response = self.get_response_with_retry(url).await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(FetchResponse {
            status: status.as_u16(),
            ok: status.is_success(),
            body,
        })
    }
}
