//! Platform extraction strategies.
//!
//! One [`ConversationExtractor`] per (platform, method) pair, selected
//! through a static table rather than a type hierarchy.
//!
//! # Architecture
//!
//! - [`ConversationExtractor`]: async trait each strategy implements
//! - [`ExtractContext`]: the shared fetcher, browser driver, options and id source
//! - [`extractor_for`]: static (platform, method) → extractor lookup
//!
//! JSON strategies ([`claude`], [`copilot`]) call an internal API through the
//! retrying fetcher. DOM strategies ([`chatgpt`], [`gemini`], [`grok`]) render
//! the share page in a headless browser and run a [`DomProfile`] over it.

pub mod chatgpt;
pub mod claude;
pub mod copilot;
pub mod gemini;
pub mod grok;
pub mod markdown;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::browser::{render_page, BrowserDriver, LaunchOptions};
use crate::conversation::{ConversationMessage, ExtractionMethod, ProcessedConversation};
use crate::dom::{extract_from_html, DomProfile};
use crate::error::ExtractError;
use crate::fingerprint::BrowserProfile;
use crate::http_client::{ContentFetcher, FetchOptions};
use crate::ids::IdSource;
use crate::platform::Platform;

/// Per-call extraction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Bound for each browser navigation and the ready-selector wait.
    pub browser_timeout: Duration,
    /// Bound for each HTTP attempt.
    pub http_timeout: Duration,
    /// Extra HTTP attempts after the first.
    pub retries: u32,
    pub backoff_step: Duration,
    /// Messages beyond this count are discarded.
    pub max_messages: usize,
    /// Append Claude artifacts to message content as code blocks.
    pub include_artifacts: bool,
    /// Append `[Attachment: name]` notes for Claude attachments.
    pub include_attachments: bool,
    /// Replaces the platform's post-render settle delay.
    pub settle: Option<Duration>,
    /// Replaces the platform's declared extraction method.
    pub method: Option<ExtractionMethod>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            browser_timeout: Duration::from_secs(15),
            http_timeout: Duration::from_secs(10),
            retries: 2,
            backoff_step: Duration::from_secs(1),
            max_messages: 1000,
            include_artifacts: true,
            include_attachments: false,
            settle: None,
            method: None,
        }
    }
}

impl ExtractOptions {
    /// Fetch options for an API call presenting `profile`.
    #[must_use]
    pub fn fetch_options(&self, profile: &BrowserProfile) -> FetchOptions {
        FetchOptions {
            timeout: self.http_timeout,
            user_agent: Some(profile.user_agent.clone()),
            retries: self.retries,
            backoff_step: self.backoff_step,
            accept: Some(profile.accept.clone()),
            extra_headers: Vec::new(),
        }
    }
}

/// Shared collaborators handed to every extractor.
pub struct ExtractContext<'a> {
    pub fetcher: &'a ContentFetcher,
    pub browser: &'a dyn BrowserDriver,
    pub launch: &'a LaunchOptions,
    pub options: &'a ExtractOptions,
    pub ids: &'a dyn IdSource,
}

/// A platform extraction strategy.
#[async_trait]
pub trait ConversationExtractor: Send + Sync {
    fn platform(&self) -> Platform;

    fn method(&self) -> ExtractionMethod;

    /// Extract the conversation behind a share URL that already passed
    /// strict validation.
    async fn extract(
        &self,
        url: &str,
        ctx: &ExtractContext<'_>,
    ) -> Result<ProcessedConversation, ExtractError>;
}

static EXTRACTORS: [&dyn ConversationExtractor; 6] = [
    &claude::ClaudeExtractor,
    &copilot::CopilotExtractor,
    &chatgpt::ChatGptExtractor,
    &gemini::GeminiExtractor,
    &grok::GrokExtractor,
    &markdown::GROK_MARKDOWN,
];

/// Strategy registered for `platform` using `method`.
#[must_use]
pub fn extractor_for(
    platform: Platform,
    method: ExtractionMethod,
) -> Option<&'static dyn ConversationExtractor> {
    EXTRACTORS
        .iter()
        .copied()
        .find(|e| e.platform() == platform && e.method() == method)
}

/// Render `url` in the browser and run `profile` over the result.
pub(crate) async fn scrape(
    url: &str,
    ctx: &ExtractContext<'_>,
    profile: &DomProfile,
) -> Result<ProcessedConversation, ExtractError> {
    let plan = profile.navigation_plan(ctx.options.browser_timeout, ctx.options.settle);
    let page = render_page(ctx.browser, ctx.launch, url, &plan).await?;
    if let Some(e) = &page.selector_error {
        debug!(error = %e, "Extracting without ready selector");
    }

    let extraction = extract_from_html(&page.html, profile);
    let messages = cap_messages(extraction.messages, ctx.options.max_messages);
    info!(
        platform = %profile.platform,
        messages = messages.len(),
        "Scraped conversation"
    );

    ProcessedConversation::new(messages, extraction.title, profile.platform)
}

/// Keep the first `max` messages.
pub(crate) fn cap_messages(
    mut messages: Vec<ConversationMessage>,
    max: usize,
) -> Vec<ConversationMessage> {
    if messages.len() > max {
        warn!(total = messages.len(), max, "Truncating conversation");
        messages.truncate(max);
    }
    messages
}

/// Parse a JSON API body.
pub(crate) fn parse_json(body: &str) -> Result<serde_json::Value, ExtractError> {
    if body.trim().is_empty() {
        return Err(ExtractError::NoData("empty response body".to_string()));
    }
    serde_json::from_str(body).map_err(|e| ExtractError::NoData(format!("invalid JSON: {e}")))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Mock collaborators shared by the strategy tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::browser::{BrowserDriver, BrowserSession, LaunchOptions, PageSession, WaitUntil};
    use crate::error::BrowserError;
    use crate::http_client::{FetchRequest, HttpTransport, TransportError, TransportResponse};

    use super::ExtractOptions;

    /// Defaults with a negligible retry backoff.
    pub fn fast_options() -> ExtractOptions {
        ExtractOptions {
            backoff_step: Duration::from_millis(1),
            ..ExtractOptions::default()
        }
    }

    /// Transport replaying canned responses; the last one repeats.
    pub struct CannedTransport {
        responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
        pub requests: Mutex<Vec<FetchRequest>>,
    }

    impl CannedTransport {
        pub fn new(responses: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn json(body: &serde_json::Value) -> Arc<Self> {
            Self::new(vec![Ok(TransportResponse::ok(body.to_string()))])
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for CannedTransport {
        async fn get(&self, request: &FetchRequest) -> Result<TransportResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.pop_front().unwrap()
            } else {
                responses.front().cloned().unwrap()
            }
        }
    }

    /// Driver serving a fixed HTML document.
    pub struct StaticPageDriver {
        html: String,
        pub launches: AtomicUsize,
        pub closes: Arc<AtomicUsize>,
        pub user_agents: Arc<Mutex<Vec<String>>>,
        pub waits: Arc<Mutex<Vec<WaitUntil>>>,
    }

    impl StaticPageDriver {
        pub fn new(html: impl Into<String>) -> Self {
            Self {
                html: html.into(),
                launches: AtomicUsize::new(0),
                closes: Arc::new(AtomicUsize::new(0)),
                user_agents: Arc::new(Mutex::new(Vec::new())),
                waits: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    struct StaticBrowser {
        html: String,
        closes: Arc<AtomicUsize>,
        user_agents: Arc<Mutex<Vec<String>>>,
        waits: Arc<Mutex<Vec<WaitUntil>>>,
    }

    struct StaticPage {
        html: String,
        closes: Arc<AtomicUsize>,
        user_agents: Arc<Mutex<Vec<String>>>,
        waits: Arc<Mutex<Vec<WaitUntil>>>,
    }

    #[async_trait]
    impl BrowserDriver for StaticPageDriver {
        async fn launch(&self, _: &LaunchOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StaticBrowser {
                html: self.html.clone(),
                closes: self.closes.clone(),
                user_agents: self.user_agents.clone(),
                waits: self.waits.clone(),
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for StaticBrowser {
        async fn new_page(&mut self) -> Result<Box<dyn PageSession>, BrowserError> {
            Ok(Box::new(StaticPage {
                html: self.html.clone(),
                closes: self.closes.clone(),
                user_agents: self.user_agents.clone(),
                waits: self.waits.clone(),
            }))
        }

        async fn close(&mut self) -> Result<(), BrowserError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl PageSession for StaticPage {
        async fn add_init_script(&mut self, _: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn set_user_agent(&mut self, ua: &str) -> Result<(), BrowserError> {
            self.user_agents.lock().unwrap().push(ua.to_string());
            Ok(())
        }

        async fn set_extra_headers(&mut self, _: &[(String, String)]) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn navigate(&mut self, _: &str, wait: WaitUntil) -> Result<(), BrowserError> {
            self.waits.lock().unwrap().push(wait);
            Ok(())
        }

        async fn wait_for_selector(&mut self, _: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn content(&mut self) -> Result<String, BrowserError> {
            Ok(self.html.clone())
        }

        async fn url(&mut self) -> Result<Option<String>, BrowserError> {
            Ok(None)
        }

        async fn close(&mut self) -> Result<(), BrowserError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_declared_methods() {
        for platform in Platform::ALL {
            let found = extractor_for(platform, platform.method());
            if platform == Platform::Perplexity {
                assert!(found.is_none());
            } else {
                assert_eq!(found.map(|e| e.platform()), Some(platform));
            }
        }
    }

    #[test]
    fn markdown_strategy_only_for_grok() {
        assert!(extractor_for(Platform::Grok, ExtractionMethod::Md).is_some());
        assert!(extractor_for(Platform::Claude, ExtractionMethod::Md).is_none());
        assert!(extractor_for(Platform::ChatGpt, ExtractionMethod::Json).is_none());
    }

    #[test]
    fn defaults_match_documented_values() {
        let options = ExtractOptions::default();
        assert_eq!(options.browser_timeout, Duration::from_secs(15));
        assert_eq!(options.http_timeout, Duration::from_secs(10));
        assert_eq!(options.retries, 2);
        assert_eq!(options.max_messages, 1000);
        assert!(options.include_artifacts);
        assert!(!options.include_attachments);
    }

    #[test]
    fn cap_messages_truncates() {
        let messages = vec![
            ConversationMessage::new(crate::Role::User, "a"),
            ConversationMessage::new(crate::Role::Assistant, "b"),
            ConversationMessage::new(crate::Role::User, "c"),
        ];
        assert_eq!(cap_messages(messages.clone(), 2).len(), 2);
        assert_eq!(cap_messages(messages, 10).len(), 3);
    }

    #[test]
    fn empty_body_is_no_data() {
        assert_eq!(parse_json("  ").unwrap_err().code(), "NO_DATA");
        assert_eq!(parse_json("<html>").unwrap_err().code(), "NO_DATA");
        assert!(parse_json("{}").is_ok());
    }
}
