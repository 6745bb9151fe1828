//! Google Gemini share pages (rendered DOM).
//!
//! Gemini's share view renders more reliably for a mobile Safari user agent
//! and rarely reaches network idle, so navigation waits for
//! `DOMContentLoaded` (falling back to `load`) and then settles briefly.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{scrape, ConversationExtractor, ExtractContext};
use crate::browser::WaitUntil;
use crate::conversation::{ExtractionMethod, ProcessedConversation, Role};
use crate::dom::{CodeBlockRule, DomProfile, FallbackRule};
use crate::error::ExtractError;
use crate::platform::Platform;

static TITLE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Gemini\s*-\s*").expect("static title pattern"));

pub static PROFILE: DomProfile = DomProfile {
    platform: Platform::Gemini,
    ready_selector: ".message, .content, .text, .query-container, .model-response",
    user_selectors: &[
        ".user-query-container",
        "[data-role=\"user\"]",
        ".query-container",
        ".message-container[data-message-author=\"user\"]",
        ".message-container.user",
        "[data-message-author=\"user\"]",
        ".request-container",
        ".user-message",
    ],
    assistant_selectors: &[
        ".response-container",
        "[data-role=\"assistant\"]",
        ".model-response",
        ".message-container[data-message-author=\"assistant\"]",
        ".message-container.assistant",
        "[data-message-author=\"assistant\"]",
        ".gemini-response",
        ".assistant-message",
    ],
    code_blocks: CodeBlockRule {
        container: "pre",
        code: "code",
        label: None,
    },
    fallbacks: &[FallbackRule {
        selector: ".message, .msg, .content, .text, .query, .response",
        default_role: Role::Assistant,
        min_len: 1,
    }],
    user_hints: &[
        ".user",
        ".request",
        "[data-role=\"user\"]",
        "[data-message-author=\"user\"]",
        ".query-container",
    ],
    title_prefix: &TITLE_PREFIX,
    mobile: true,
    wait_until: WaitUntil::DomContentLoaded,
    fallback_wait: Some(WaitUntil::Load),
    settle: Duration::from_secs(3),
};

/// Gemini strategy (HTML).
pub struct GeminiExtractor;

#[async_trait]
impl ConversationExtractor for GeminiExtractor {
    fn platform(&self) -> Platform {
        Platform::Gemini
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Html
    }

    async fn extract(
        &self,
        url: &str,
        ctx: &ExtractContext<'_>,
    ) -> Result<ProcessedConversation, ExtractError> {
        scrape(url, ctx, &PROFILE).await
    }
}
