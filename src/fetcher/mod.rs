//! Feed fetcher for hostile upstream sources.
//!
//! Every attempt goes through the shared [`HostThrottle`], sends a full
//! browser header set, and failed attempts back off through the injected
//! [`Clock`].

pub mod clock;
pub mod headers;
pub mod retry;
pub mod throttle;
pub mod url_guard;

pub use clock::{Clock, ManualClock, SystemClock};
pub use retry::AttemptFailure;
pub use throttle::HostThrottle;
pub use url_guard::validate_url;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::FetcherConfig;
use crate::{RelayError, Result};

/// Category of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    /// The source answered 403 or 429 on every attempt.
    Blocked,
    /// Connection failure, bad status, oversized body or rejected URL.
    Network,
    /// The last attempt timed out.
    Timeout,
}

impl FetchFailure {
    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchFailure::Blocked => "blocked",
            FetchFailure::Network => "network",
            FetchFailure::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch failure after all retries.
#[derive(Debug, Clone, Error)]
#[error("fetch {reason}: {message}")]
pub struct FetchError {
    /// Failure category.
    pub reason: FetchFailure,
    /// Human readable cause.
    pub message: String,
}

impl FetchError {
    /// Create a fetch error.
    pub fn new(reason: FetchFailure, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// A successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Raw (decompressed) body.
    pub body: Vec<u8>,
    /// HTTP status code.
    pub status: u16,
}

/// Anything that can fetch a feed document.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch `url`, retrying per policy.
    async fn fetch(&self, url: &str) -> std::result::Result<FetchResponse, FetchError>;
}

/// Outcome of one attempt that did not succeed.
enum AttemptError {
    /// Worth another attempt.
    Retry(AttemptFailure),
    /// Give up immediately.
    Fatal(FetchError),
}

/// HTTP feed fetcher.
pub struct Fetcher {
    client: Client,
    throttle: Arc<HostThrottle>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    max_body_bytes: u64,
    block_private_hosts: bool,
}

impl Fetcher {
    /// Create a fetcher sharing `throttle` and sleeping through `clock`.
    pub fn new(
        config: &FetcherConfig,
        throttle: Arc<HostThrottle>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            throttle,
            clock,
            max_attempts: config.max_attempts.max(1),
            max_body_bytes: config.max_feed_size_bytes,
            block_private_hosts: config.block_private_hosts,
        })
    }

    /// Create a fetcher with the system clock and its own throttle.
    pub fn from_config(config: &FetcherConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let throttle = Arc::new(HostThrottle::new(
            clock.clone(),
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        ));
        Self::new(config, throttle, clock)
    }

    async fn attempt(&self, url: &str) -> std::result::Result<FetchResponse, AttemptError> {
        let profile = headers::pick_profile();
        debug!("GET {} as {:?}", url, profile.family);

        let mut response = self
            .client
            .get(url)
            .headers(headers::browser_headers(profile))
            .send()
            .await
            .map_err(|e| AttemptError::Retry(classify(&e)))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(AttemptError::Retry(AttemptFailure::Forbidden));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::Retry(AttemptFailure::RateLimited));
        }
        if status.is_server_error() {
            return Err(AttemptError::Retry(AttemptFailure::ServerError(
                status.as_u16(),
            )));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(FetchError::new(
                FetchFailure::Network,
                format!("HTTP {status}"),
            )));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes {
                return Err(AttemptError::Fatal(self.too_large(length)));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AttemptError::Retry(classify(&e)))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_body_bytes {
                return Err(AttemptError::Fatal(self.too_large(body.len() as u64)));
            }
        }

        Ok(FetchResponse {
            body,
            status: status.as_u16(),
        })
    }

    fn too_large(&self, size: u64) -> FetchError {
        FetchError::new(
            FetchFailure::Network,
            format!(
                "feed too large: {} bytes (max {} bytes)",
                size, self.max_body_bytes
            ),
        )
    }
}

#[async_trait]
impl FeedFetcher for Fetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
        let parsed = validate_url(url, self.block_private_hosts)?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        let mut last_failure = None;
        for attempt in 0..self.max_attempts {
            self.throttle.acquire(&host).await;

            match self.attempt(url).await {
                Ok(response) => {
                    info!(
                        "Fetched {} ({} bytes, attempt {})",
                        url,
                        response.body.len(),
                        attempt + 1
                    );
                    return Ok(response);
                }
                Err(AttemptError::Fatal(e)) => {
                    warn!("Fetch of {} failed: {}", url, e);
                    return Err(e);
                }
                Err(AttemptError::Retry(failure)) => {
                    warn!(
                        "Fetch attempt {}/{} for {} failed: {}",
                        attempt + 1,
                        self.max_attempts,
                        url,
                        failure
                    );
                    if attempt + 1 < self.max_attempts {
                        self.clock.sleep(failure.backoff(attempt)).await;
                    }
                    last_failure = Some(failure);
                }
            }
        }

        let failure = last_failure
            .unwrap_or_else(|| AttemptFailure::Network("no attempt was made".to_string()));
        Err(failure.into_exhausted(self.max_attempts))
    }
}

fn classify(e: &reqwest::Error) -> AttemptFailure {
    if e.is_timeout() {
        AttemptFailure::Timeout(e.to_string())
    } else {
        AttemptFailure::Network(e.to_string())
    }
}
