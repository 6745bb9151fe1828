//! Markdown strategy (extension point).
//!
//! Selected only through an explicit method override. The share page is
//! fetched and scanned for a title, but no markdown conversation layout is
//! defined for any platform yet, so the strategy always ends in a typed
//! `NOT_IMPLEMENTED` failure rather than an empty success.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use super::{ConversationExtractor, ExtractContext};
use crate::conversation::{ExtractionMethod, ProcessedConversation};
use crate::error::ExtractError;
use crate::fingerprint::desktop_chrome;
use crate::platform::Platform;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("static heading pattern"));

/// Markdown strategy bound to one platform.
pub struct MarkdownExtractor {
    platform: Platform,
}

pub static GROK_MARKDOWN: MarkdownExtractor = MarkdownExtractor {
    platform: Platform::Grok,
};

/// Text of the first level-one heading.
#[must_use]
pub fn title_hint(markdown: &str) -> Option<&str> {
    HEADING
        .captures(markdown)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl ConversationExtractor for MarkdownExtractor {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Md
    }

    #[instrument(skip(self, ctx))]
    async fn extract(
        &self,
        url: &str,
        ctx: &ExtractContext<'_>,
    ) -> Result<ProcessedConversation, ExtractError> {
        let body = ctx
            .fetcher
            .fetch(url, &ctx.options.fetch_options(&desktop_chrome()))
            .await?;
        debug!(bytes = body.len(), title = ?title_hint(&body), "Fetched markdown source");

        Err(ExtractError::NotImplemented(format!(
            "Markdown extraction for {}",
            self.platform
        )))
    }
}
