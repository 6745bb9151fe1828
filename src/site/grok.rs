//! Grok share pages (rendered DOM).

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
    Lazy::new(|| Regex::new(r"(?i)^Grok\s*[-:]\s*").expect("static title pattern"));

/// User turns are `.message-bubble`s; responses render into
/// `.response-content-markdown`, with code in `@container/code-block` divs
/// whose header carries the language label.
pub static PROFILE: DomProfile = DomProfile {
    platform: Platform::Grok,
    ready_selector: ".response-content-markdown, .message-bubble",
    user_selectors: &[".message-bubble"],
    assistant_selectors: &[".response-content-markdown"],
    code_blocks: CodeBlockRule {
        container: "div[class*=\"@container/code-block\"]",
        code: "code",
        label: Some("span.font-mono.text-xs"),
    },
    fallbacks: &[
        FallbackRule {
            selector: ".prose",
            default_role: Role::Assistant,
            min_len: 50,
        },
        FallbackRule {
            selector: "[class*=\"markdown\"]",
            default_role: Role::Assistant,
            min_len: 50,
        },
        FallbackRule {
            selector: "[class*=\"message\"]",
            default_role: Role::User,
            min_len: 30,
        },
    ],
    user_hints: &[],
    title_prefix: &TITLE_PREFIX,
    mobile: false,
    wait_until: WaitUntil::NetworkIdle,
    fallback_wait: Some(WaitUntil::Load),
    settle: Duration::ZERO,
};

/// Grok strategy (HTML).
pub struct GrokExtractor;

#[async_trait]
impl ConversationExtractor for GrokExtractor {
    fn platform(&self) -> Platform {
        Platform::Grok
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{segments, ContentSegment};
    use crate::dom::extract_from_html;

    const PAGE: &str = r#"<html><head><title>Grok: Fizzbuzz help</title></head><body>
        <div class="items-end"><div class="message-bubble"><span>Write fizzbuzz in JS</span></div></div>
        <div class="items-start"><div class="message-bubble">
          <div class="response-content-markdown">
            <p>Sure:</p>
            <div class="not-prose"><div class="relative @container/code-block">
              <div class="flex"><span class="font-mono text-xs">javascript</span><button>Copy</button></div>
              <pre><code>for (let i = 1; i &lt;= 15; i++) console.log(i);</code></pre>
            </div></div>
          </div>
        </div></div>
    </body></html>"#;

    #[test]
    fn bubble_wrapping_a_response_is_not_a_user_turn() {
        let out = extract_from_html(PAGE, &PROFILE);
        let roles: Vec<_> = out.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(out.messages[0].content, "Write fizzbuzz in JS");
    }

    #[test]
    fn code_label_sets_language() {
        let out = extract_from_html(PAGE, &PROFILE);
        let segs = segments(&out.messages[1].content);
        assert_eq!(segs[0], ContentSegment::Text { text: "Sure:".into() });
        assert_eq!(
            segs[1],
            ContentSegment::Code {
                language: "javascript".into(),
                code: "for (let i = 1; i <= 15; i++) console.log(i);".into()
            }
        );
    }

    #[test]
    fn title_prefix_is_case_insensitive() {
        let out = extract_from_html(PAGE, &PROFILE);
        assert_eq!(out.title, "Fizzbuzz help");

        let html = r#"<html><head><title>grok - Trip</title></head><body><div class="message-bubble">x</div></body></html>"#;
        assert_eq!(extract_from_html(html, &PROFILE).title, "Trip");
    }

    #[test]
    fn fallbacks_use_length_thresholds() {
        let long_answer = "An answer that is comfortably longer than fifty characters in total.";
        let html = format!(
            r#"<html><head><title>Grok</title></head><body>
            <div class="prose">short</div>
            <div class="prose">{long_answer}</div>
            <div class="chat-message">A question long enough to count here</div>
            <div class="chat-message">tiny</div>
        </body></html>"#
        );
        let out = extract_from_html(&html, &PROFILE);
        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].role, Role::Assistant);
        assert_eq!(out.messages[0].content, long_answer);
        assert_eq!(out.messages[1].role, Role::User);
        assert_eq!(out.title, "A question long enough to count here");
    }
}
