//! HTTP fetching with bounded retry and backoff
//!
//! [`Fetcher`] wraps a shared `reqwest::Client` and retries transient failures:
//! HTTP 429, HTTP >= 500, and network-level errors. Other 4xx responses are
//! permanent and surface immediately. Backoff honors a `Retry-After` header
//! (seconds) when present, otherwise doubles from `base_delay` up to
//! `max_delay` (see [`RetryConfig`]).

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::types::FileBody;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Retrying HTTP fetcher
///
/// Cheap to clone; all clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl Fetcher {
    /// Create a fetcher with the given retry configuration
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            retry,
        }
    }

    /// Fetch a URL, retrying transient failures
    ///
    /// The response body is decoded as text when the content-type indicates
    /// text, XML, or JSON, otherwise returned as raw bytes. Returns the last
    /// observed error once retries are exhausted.
    pub async fn fetch(&self, url: &str, headers: HeaderMap) -> Result<FileBody> {
        let response = self.send_with_retry(url, headers).await?;
        let is_text = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(is_textual_content_type)
            .unwrap_or(false);

        if is_text {
            Ok(FileBody::Text(response.text().await?))
        } else {
            Ok(FileBody::Binary(response.bytes().await?.to_vec()))
        }
    }

    /// Fetch a URL and deserialize the JSON response body
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str, headers: HeaderMap) -> Result<T> {
        let response = self.send_with_retry(url, headers).await?;
        Ok(response.json().await?)
    }

    /// Send a request, retrying on transient failure, and return the successful response
    async fn send_with_retry(&self, url: &str, headers: HeaderMap) -> Result<reqwest::Response> {
        let mut last_error = Error::Other(format!("no attempt made for {url}"));

        for attempt in 0..=self.retry.max_retries {
            let result = self
                .client
                .get(url)
                .headers(headers.clone())
                .send()
                .await
                .map_err(Error::Network);

            let error = match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let delay = retry_after(&response);
                    let error = Error::HttpStatus {
                        status: response.status().as_u16(),
                        url: url.to_string(),
                    };
                    if error.is_retryable() && attempt < self.retry.max_retries {
                        let delay = delay.unwrap_or_else(|| self.retry.backoff(attempt));
                        tracing::warn!(
                            url,
                            status = response.status().as_u16(),
                            attempt = attempt + 1,
                            max_retries = self.retry.max_retries,
                            delay_ms = delay.as_millis(),
                            "request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        last_error = error;
                        continue;
                    }
                    error
                }
                Err(error) => {
                    if error.is_retryable() && attempt < self.retry.max_retries {
                        let delay = self.retry.backoff(attempt);
                        tracing::warn!(
                            url,
                            error = %error,
                            attempt = attempt + 1,
                            max_retries = self.retry.max_retries,
                            delay_ms = delay.as_millis(),
                            "network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        last_error = error;
                        continue;
                    }
                    error
                }
            };

            return Err(error);
        }

        Err(last_error)
    }
}

/// Parse a `Retry-After` header (seconds form) into a delay
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    // Only used for 429/5xx responses, where the seconds form is what the
    // upstream service sends
    if response.status() != StatusCode::TOO_MANY_REQUESTS
        && !response.status().is_server_error()
    {
        return None;
    }
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// True when a content-type header denotes a textual body
fn is_textual_content_type(content_type: &str) -> bool {
    content_type.contains("text") || content_type.contains("xml") || content_type.contains("json")
}
