//! Platform table and URL detection.
//!
//! Each platform carries two patterns: a broad, domain-qualified pattern used
//! to recognise which platform a share URL belongs to, and a strict pattern
//! describing the exact shape its extractor can handle. Detection only uses
//! the broad one, so a URL on the right domain with a malformed conversation
//! ID is reported as malformed rather than unsupported.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::conversation::ExtractionMethod;
use crate::error::ExtractError;

/// Supported chat platforms, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Claude,
    #[serde(rename = "chatgpt")]
    ChatGpt,
    Copilot,
    Gemini,
    Grok,
    Perplexity,
}

impl Platform {
    /// All platforms in detection order.
    pub const ALL: [Platform; 6] = [
        Platform::Claude,
        Platform::ChatGpt,
        Platform::Copilot,
        Platform::Gemini,
        Platform::Grok,
        Platform::Perplexity,
    ];

    /// Lowercase identifier, stable across releases (used in cache keys).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Claude => "claude",
            Platform::ChatGpt => "chatgpt",
            Platform::Copilot => "copilot",
            Platform::Gemini => "gemini",
            Platform::Grok => "grok",
            Platform::Perplexity => "perplexity",
        }
    }

    /// Static configuration for this platform.
    #[must_use]
    pub fn config(self) -> &'static PlatformConfig {
        let index = Platform::ALL
            .iter()
            .position(|p| *p == self)
            .unwrap_or_default();
        &PLATFORM_CONFIGS[index]
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        self.config().name
    }

    /// Declared extraction method.
    #[must_use]
    pub fn method(self) -> ExtractionMethod {
        self.config().method
    }

    /// Whether `url` has the exact shape this platform's extractor expects.
    #[must_use]
    pub fn is_valid_url(self, url: &str) -> bool {
        self.config().strict_pattern.is_match(url)
    }

    /// Conversation id embedded in a valid share URL, for platforms whose
    /// internal API is keyed by it.
    #[must_use]
    pub fn share_id(self, url: &str) -> Option<&str> {
        let config = self.config();
        if !config.has_internal_api {
            return None;
        }
        config
            .strict_pattern
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or(ExtractError::UnsupportedPlatform)
    }
}

/// Static per-platform configuration.
#[derive(Debug)]
pub struct PlatformConfig {
    pub platform: Platform,
    pub name: &'static str,
    pub url_pattern: Regex,
    pub strict_pattern: Regex,
    pub method: ExtractionMethod,
    pub has_internal_api: bool,
}

fn pattern(re: &str) -> Regex {
    // Patterns are compile-time constants exercised by the unit tests below.
    Regex::new(re).expect("static platform pattern")
}

/// Configuration table, indexed in [`Platform::ALL`] order.
pub static PLATFORM_CONFIGS: Lazy<[PlatformConfig; 6]> = Lazy::new(|| {
    [
        PlatformConfig {
            platform: Platform::Claude,
            name: "Claude",
            url_pattern: pattern(r"^https://claude\.ai/share/[^/?#\s]+$"),
            strict_pattern: pattern(
                r"^https://claude\.ai/share/([a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12})$",
            ),
            method: ExtractionMethod::Json,
            has_internal_api: true,
        },
        PlatformConfig {
            platform: Platform::ChatGpt,
            name: "ChatGPT",
            url_pattern: pattern(r"^https://chatgpt\.com/share/[^/?#\s]+$"),
            strict_pattern: pattern(r"^https://chatgpt\.com/share/[a-f0-9-]+$"),
            method: ExtractionMethod::Html,
            has_internal_api: false,
        },
        PlatformConfig {
            platform: Platform::Copilot,
            name: "Microsoft Copilot",
            url_pattern: pattern(r"^https://copilot\.microsoft\.com/shares/[^/?#\s]+$"),
            strict_pattern: pattern(r"^https://copilot\.microsoft\.com/shares/([a-zA-Z0-9_-]+)$"),
            method: ExtractionMethod::Json,
            has_internal_api: true,
        },
        PlatformConfig {
            platform: Platform::Gemini,
            name: "Google Gemini",
            url_pattern: pattern(
                r"^https://(g\.co/gemini/share|gemini\.google\.com/(share|app))/[^/?#\s]+$",
            ),
            strict_pattern: pattern(
                r"^https://(g\.co/gemini/share|gemini\.google\.com/(share|app))/[a-zA-Z0-9]+$",
            ),
            method: ExtractionMethod::Html,
            has_internal_api: false,
        },
        PlatformConfig {
            platform: Platform::Grok,
            name: "Grok",
            url_pattern: pattern(r"^https://grok\.com/share/[^/?#\s]+$"),
            strict_pattern: pattern(r"^https://grok\.com/share/[a-zA-Z0-9_-]+$"),
            method: ExtractionMethod::Html,
            has_internal_api: false,
        },
        PlatformConfig {
            platform: Platform::Perplexity,
            name: "Perplexity",
            url_pattern: pattern(r"^https://www\.perplexity\.ai/search/[^/?#\s]+$"),
            strict_pattern: pattern(r"^https://www\.perplexity\.ai/search/[a-zA-Z0-9_-]+$"),
            method: ExtractionMethod::Html,
            has_internal_api: false,
        },
    ]
});

/// Map a raw URL to its platform.
///
/// Pure function over the static table: the first platform (in
/// [`Platform::ALL`] order) whose broad pattern matches wins.
pub fn detect(url: &str) -> Result<Platform, ExtractError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ExtractError::EmptyUrl);
    }

    PLATFORM_CONFIGS
        .iter()
        .find(|config| config.url_pattern.is_match(url))
        .map(|config| config.platform)
        .ok_or(ExtractError::UnsupportedPlatform)
}

/// Whether `url` belongs to any supported platform.
#[must_use]
pub fn is_supported_url(url: &str) -> bool {
    detect(url).is_ok()
}
