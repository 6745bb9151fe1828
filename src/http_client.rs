//! Retrying HTTP content fetcher.
//!
//! Used by the JSON-API and markdown strategies. The fetcher never interprets
//! the body; it only applies a browser-like header set, a hard per-attempt
//! timeout and bounded retry with linear backoff.
//!
//! - Thrown transport errors (connect, DNS, reset, timeout) are retried up to
//!   `retries` extra times, sleeping `attempt * backoff_step` in between.
//! - A received non-2xx response is returned immediately as
//!   [`FetchError::Status`]; retrying a deterministic 4xx/5xx is wasted work.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::error::FetchError;
use crate::fingerprint::{desktop_chrome, to_header_map};

/// One GET request as handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl FetchRequest {
    /// Value of a header, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl TransportResponse {
    /// 200 response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            reason: "OK".to_string(),
            body: body.into(),
        }
    }

    /// Response with an arbitrary status and empty body.
    pub fn status(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            body: String::new(),
        }
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A failed attempt that never produced a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Network(String),
}

/// The network seam. Production uses [`ReqwestTransport`]; tests script
/// responses.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: &FetchRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client that negotiates HTTP/2 or HTTP/1.1 with the server.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            // Don't assume HTTP/2 - let server negotiate
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &FetchRequest) -> Result<TransportResponse, TransportError> {
        // reqwest negotiates Accept-Encoding itself; a manual value would
        // disable transparent decompression.
        let pairs: Vec<(String, String)> = request
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("Accept-Encoding"))
            .cloned()
            .collect();

        let response = self
            .client
            .get(&request.url)
            .headers(to_header_map(&pairs))
            .timeout(request.timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        debug!(
            status = %status,
            version = ?response.version(),
            content_encoding = ?response.headers().get("content-encoding"),
            "Response received"
        );

        let body = response.text().await.map_err(classify)?;
        Ok(TransportResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body,
        })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

/// Per-call fetch options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Hard limit for each attempt.
    pub timeout: Duration,
    /// Overrides the desktop Chrome user agent.
    pub user_agent: Option<String>,
    /// Extra attempts after the first.
    pub retries: u32,
    /// Backoff unit: the wait after attempt `n` is `n * backoff_step`.
    pub backoff_step: Duration,
    /// Overrides the `Accept` header.
    pub accept: Option<String>,
    /// Appended after the profile headers (e.g. `Referer`, `Origin`).
    pub extra_headers: Vec<(String, String)>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: None,
            retries: 2,
            backoff_step: Duration::from_secs(1),
            accept: None,
            extra_headers: Vec::new(),
        }
    }
}

impl FetchOptions {
    fn headers(&self) -> Vec<(String, String)> {
        let mut profile = desktop_chrome();
        if let Some(ua) = &self.user_agent {
            profile = profile.with_user_agent(ua.clone());
        }
        if let Some(accept) = &self.accept {
            profile = profile.with_accept(accept.clone());
        }
        let mut headers = profile.header_pairs();
        headers.extend(self.extra_headers.iter().cloned());
        headers
    }
}

/// Retrying fetcher over an [`HttpTransport`].
#[derive(Clone)]
pub struct ContentFetcher {
    transport: Arc<dyn HttpTransport>,
}

impl ContentFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Fetcher over a fresh [`ReqwestTransport`].
    pub fn with_reqwest() -> Result<Self, reqwest::Error> {
        Ok(Self::new(Arc::new(ReqwestTransport::new()?)))
    }

    /// Fetch `url` and return the raw body text.
    ///
    /// Makes at most `options.retries + 1` attempts.
    #[instrument(skip(self, options), fields(url = %url))]
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        let request = FetchRequest {
            url: url.to_string(),
            headers: options.headers(),
            timeout: options.timeout,
        };
        let attempts = options.retries.saturating_add(1);
        let mut last_error = TransportError::Network("no attempt made".to_string());

        for attempt in 1..=attempts {
            debug!(attempt, attempts, "Fetching");
            let attempted = tokio::time::timeout(options.timeout, self.transport.get(&request)).await;
            let outcome = match attempted {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::Timeout),
            };

            match outcome {
                Ok(response) if response.is_success() => {
                    info!(status = response.status, bytes = response.body.len(), "Fetched");
                    return Ok(response.body);
                }
                Ok(response) => {
                    warn!(status = response.status, "Non-success status, not retrying");
                    return Err(FetchError::Status {
                        status: response.status,
                        reason: response.reason,
                    });
                }
                Err(err) => {
                    warn!(attempt, error = %err, "Fetch attempt failed");
                    last_error = err;
                    if attempt < attempts {
                        tokio::time::sleep(options.backoff_step * attempt).await;
                    }
                }
            }
        }

        Err(match last_error {
            TransportError::Timeout => FetchError::Timeout {
                attempts,
                timeout: options.timeout,
            },
            TransportError::Network(message) => FetchError::Network { attempts, message },
        })
    }
}
