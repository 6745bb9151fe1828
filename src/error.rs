//! Error types for fetching, browsing and extraction.
//!
//! Every expected failure of an extraction is one of these values; the
//! orchestrator turns them into an [`ExtractionResult`](crate::ExtractionResult)
//! envelope and never lets them escape as panics.

use std::time::Duration;

use thiserror::Error;

use crate::platform::Platform;

/// Failure of the retrying HTTP fetcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Server answered with a non-2xx status. Never retried.
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// Every attempt ran into the per-attempt timeout.
    #[error("Request timeout after {}ms ({attempts} attempts)", timeout.as_millis())]
    Timeout { attempts: u32, timeout: Duration },

    /// Transport failure (DNS, connect, TLS, reset) on the final attempt.
    #[error("Failed to fetch content after {attempts} attempts: {message}")]
    Network { attempts: u32, message: String },
}

impl FetchError {
    /// HTTP status code, when the failure was a received response.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure inside the headless browser driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("browser unavailable: {0}")]
    Unavailable(String),

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("navigation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("selector `{0}` did not appear")]
    SelectorMissing(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("page handler panicked: {0}")]
    Panicked(String),
}

/// Failure of a platform extractor or of the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Invalid URL provided")]
    EmptyUrl,

    #[error("Unsupported platform URL format")]
    UnsupportedPlatform,

    #[error("Invalid {platform} URL format: {url}")]
    InvalidUrlFormat { platform: Platform, url: String },

    #[error("Conversation not found")]
    NotFound,

    #[error("Access denied")]
    AccessDenied,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Request timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("No conversation data received: {0}")]
    NoData(String),

    #[error("Invalid message data: {0}")]
    InvalidMessage(String),

    #[error("No conversation messages found")]
    EmptyConversation,

    #[error("{0} is not yet supported")]
    NotImplemented(String),

    #[error("HTML extraction failed: {0}")]
    Browser(#[from] BrowserError),

    #[error("Extraction failed: {0}")]
    Unexpected(String),
}

impl ExtractError {
    /// Stable machine-readable code for callers and telemetry.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyUrl | Self::InvalidUrlFormat { .. } => "INVALID_URL_FORMAT",
            Self::UnsupportedPlatform => "UNSUPPORTED_PLATFORM",
            Self::NotFound => "CONVERSATION_NOT_FOUND",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::RateLimited => "RATE_LIMITED",
            Self::Http { .. } => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Network(_) => "NETWORK_ERROR",
            Self::NoData(_) => "NO_DATA",
            Self::InvalidMessage(_) => "INVALID_MESSAGE",
            Self::EmptyConversation => "EMPTY_CONVERSATION",
            Self::NotImplemented(_) => "NOT_IMPLEMENTED",
            Self::Browser(_) => "BROWSER_ERROR",
            Self::Unexpected(_) => "UNKNOWN_ERROR",
        }
    }

    /// Whether retrying later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::Timeout(_)
                | Self::Network(_)
                | Self::Browser(BrowserError::Timeout(_))
        )
    }
}

impl From<FetchError> for ExtractError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status { status: 404, .. } => Self::NotFound,
            FetchError::Status { status: 403, .. } => Self::AccessDenied,
            FetchError::Status { status: 429, .. } => Self::RateLimited,
            FetchError::Status { status, .. } => Self::Http { status },
            FetchError::Timeout { timeout, .. } => Self::Timeout(timeout),
            FetchError::Network { message, .. } => Self::Network(message),
        }
    }
}
