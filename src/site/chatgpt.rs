//! ChatGPT share pages (rendered DOM).

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
    Lazy::new(|| Regex::new(r"^ChatGPT\s*-\s*").expect("static title pattern"));

/// Turn containers carry their author in `data-turn` (current markup) or
/// `data-message-author-role` (older markup).
pub static PROFILE: DomProfile = DomProfile {
    platform: Platform::ChatGpt,
    ready_selector: "[data-turn], [data-message-author-role]",
    user_selectors: &[
        "[data-turn=\"user\"]",
        "[data-message-author-role=\"user\"]",
    ],
    assistant_selectors: &[
        "[data-turn=\"assistant\"]",
        "[data-message-author-role=\"assistant\"]",
    ],
    code_blocks: CodeBlockRule {
        container: "pre",
        code: "code",
        label: None,
    },
    fallbacks: &[
        FallbackRule {
            selector: ".markdown",
            default_role: Role::Assistant,
            min_len: 1,
        },
        FallbackRule {
            selector: "[class*=\"user-message\"]",
            default_role: Role::User,
            min_len: 1,
        },
    ],
    user_hints: &["[class*=\"user-message\"]"],
    title_prefix: &TITLE_PREFIX,
    mobile: false,
    wait_until: WaitUntil::NetworkIdle,
    fallback_wait: Some(WaitUntil::Load),
    settle: Duration::ZERO,
};

/// ChatGPT strategy (HTML).
pub struct ChatGptExtractor;

#[async_trait]
impl ConversationExtractor for ChatGptExtractor {
    fn platform(&self) -> Platform {
        Platform::ChatGpt
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
