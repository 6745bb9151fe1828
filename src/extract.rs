//! Extraction orchestrator.
//!
//! [`Extractor::extract_conversation`] is the single entry point: detect the
//! platform, validate the URL against the platform's strict shape, dispatch
//! to the registered strategy and wrap the outcome in an
//! [`ExtractionResult`]. It never returns an error or lets a panic escape;
//! every failure becomes a `success: false` envelope carrying the platform,
//! the method and the elapsed time.
//!
//! There are no retries at this level. The fetcher retries transport
//! failures and the browser layer makes its single fallback navigation.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::FutureExt;
use tracing::{error, info, instrument, warn};

use crate::browser::{default_driver, panic_message, BrowserDriver, LaunchOptions};
use crate::conversation::{ExtractionMethod, ExtractionResult};
use crate::error::ExtractError;
use crate::http_client::ContentFetcher;
use crate::ids::{IdSource, RandomIds};
use crate::platform::{detect, Platform};
use crate::site::{extractor_for, ExtractContext, ExtractOptions};

/// Conversation extractor for share URLs of every supported platform.
///
/// Holds no per-call state; one instance can serve concurrent extractions.
/// Each HTML extraction launches its own browser.
///
/// # Example
///
/// ```rust,no_run
/// use chatshare::Extractor;
///
/// # async fn example() -> anyhow::Result<()> {
/// let extractor = Extractor::new()?;
/// let result = extractor
///     .extract_conversation("https://claude.ai/share/0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d")
///     .await;
/// if let Some(conversation) = &result.conversation {
///     println!("{}", conversation.transcript());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Extractor {
    fetcher: ContentFetcher,
    browser: Arc<dyn BrowserDriver>,
    launch: LaunchOptions,
    options: ExtractOptions,
    ids: Arc<dyn IdSource>,
}

impl Extractor {
    /// Extractor over reqwest and this build's default browser driver.
    pub fn new() -> Result<Self> {
        let fetcher = ContentFetcher::with_reqwest().context("failed to build HTTP client")?;
        Ok(Self::with_parts(fetcher, default_driver()))
    }

    /// Extractor over explicit collaborators, with default options.
    pub fn with_parts(fetcher: ContentFetcher, browser: Arc<dyn BrowserDriver>) -> Self {
        Self {
            fetcher,
            browser,
            launch: LaunchOptions::default(),
            options: ExtractOptions::default(),
            ids: Arc::new(RandomIds),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_launch_options(mut self, launch: LaunchOptions) -> Self {
        self.launch = launch;
        self
    }

    /// Source for ids of messages the upstream payload left without one.
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract the conversation behind `url`.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn extract_conversation(&self, url: &str) -> ExtractionResult {
        let started = Instant::now();

        let platform = match detect(url) {
            Ok(platform) => platform,
            Err(err) => {
                warn!(error = %err, "Platform detection failed");
                let method = ExtractionMethod::Unknown;
                return ExtractionResult::failed(&err, None, method, elapsed_ms(started));
            }
        };
        let url = url.trim();

        if !platform.is_valid_url(url) {
            let err = ExtractError::InvalidUrlFormat {
                platform,
                url: url.to_string(),
            };
            warn!(%platform, "URL failed strict validation");
            let elapsed = elapsed_ms(started);
            return ExtractionResult::failed(&err, Some(platform), platform.method(), elapsed);
        }

        let method = self.options.method.unwrap_or_else(|| platform.method());
        let Some(extractor) = extractor_for(platform, method) else {
            let err = unsupported(platform, method);
            warn!(%platform, %method, "No extractor registered");
            return ExtractionResult::failed(&err, Some(platform), method, elapsed_ms(started));
        };

        let ctx = ExtractContext {
            fetcher: &self.fetcher,
            browser: self.browser.as_ref(),
            launch: &self.launch,
            options: &self.options,
            ids: self.ids.as_ref(),
        };
        let outcome = AssertUnwindSafe(extractor.extract(url, &ctx))
            .catch_unwind()
            .await;
        let elapsed = elapsed_ms(started);

        match outcome {
            Ok(Ok(conversation)) => {
                info!(
                    %platform,
                    %method,
                    messages = conversation.messages.len(),
                    elapsed_ms = elapsed,
                    "Extraction succeeded"
                );
                ExtractionResult::succeeded(conversation, method, elapsed)
            }
            Ok(Err(err)) => {
                warn!(%platform, code = err.code(), error = %err, "Extraction failed");
                ExtractionResult::failed(&err, Some(platform), method, elapsed)
            }
            Err(panic) => {
                let err = ExtractError::Unexpected(panic_message(panic.as_ref()));
                error!(%platform, error = %err, "Extractor panicked");
                ExtractionResult::failed(&err, Some(platform), method, elapsed)
            }
        }
    }
}

fn unsupported(platform: Platform, method: ExtractionMethod) -> ExtractError {
    if method == platform.method() {
        ExtractError::NotImplemented(format!("Platform {platform}"))
    } else {
        ExtractError::NotImplemented(format!("{method} extraction for {platform}"))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
