//! HTTP client for the assessor endpoints with rate limiting and retries
//!
//! Provides a polite HTTP client for a long-running enumeration: a direct
//! `governor` rate limiter in front of every attempt, exponential backoff on
//! network errors and retryable statuses, and immediate failure on anything
//! else.

use anyhow::{Context, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::{CrawlError, CrawlResult};

/// HTTP client configuration for crawling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    /// Attempts per request, including the first one
    pub max_retries: u32,
    /// Backoff base; attempt `n` waits `base * 2^(n-1)`
    pub retry_base_delay_ms: u64,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "parcel-crawler/0.1 (Research Tool)".to_string(),
            timeout_seconds: 30,
            max_requests_per_second: 5,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            follow_redirects: true,
        }
    }
}

/// Rate-limited HTTP client; every attempt, retries included, waits for a token.
pub struct HttpClient {
    client: Client,
    rate_limiter: DefaultDirectRateLimiter,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .gzip(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            config,
        })
    }

    /// GET `url?query` and return the body text.
    pub async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> CrawlResult<String> {
        self.send_with_policy(url, || self.client.get(url).query(query))
            .await
    }

    /// POST `form` to `url` and return the body text.
    pub async fn post_form_text(&self, url: &str, form: &[(&str, &str)]) -> CrawlResult<String> {
        self.send_with_policy(url, || self.client.post(url).form(form))
            .await
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    async fn send_with_policy<F>(&self, url: &str, build: F) -> CrawlResult<String>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.config.max_retries.max(1);
        let base_delay = Duration::from_millis(self.config.retry_base_delay_ms);
        let mut last_err = None;

        for attempt in 1..=max_attempts {
            self.rate_limiter.until_ready().await;
            debug!("🌐 HTTP (attempt {}/{}): {}", attempt, max_attempts, url);

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .map_err(|e| CrawlError::transport(url, format!("Failed to read response body: {e}")));
                    }

                    let err = CrawlError::HttpStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    };
                    if !is_retryable_status(status) || attempt == max_attempts {
                        return Err(err);
                    }

                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.parse::<u64>().ok());
                    let delay = backoff_delay(base_delay, attempt, retry_after);
                    warn!("⚠️ HTTP error {} on attempt {}, retrying in {:?}: {}", status, attempt, delay, url);
                    last_err = Some(err);
                    sleep(delay).await;
                }
                Err(e) => {
                    warn!("⚠️ Network error on attempt {}: {}", attempt, e);
                    last_err = Some(CrawlError::transport(url, e));
                    if attempt < max_attempts {
                        sleep(backoff_delay(base_delay, attempt, None)).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| CrawlError::transport(url, "no attempt was made")))
    }
}

/// Statuses worth another attempt; everything else fails the request at once.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Exponential backoff, stretched to honor a numeric `Retry-After` (seconds).
pub fn backoff_delay(base: Duration, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let computed = base.saturating_mul(2_u32.pow(exponent));
    retry_after_secs
        .map(Duration::from_secs)
        .map_or(computed, |retry_after| retry_after.max(computed))
}
