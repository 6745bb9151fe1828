//! Headless browser driver.
//!
//! The DOM-scraping platforms render their share pages client-side, so we
//! drive a real browser, wait for the conversation to appear, and hand the
//! rendered HTML to the [`dom`](crate::dom) layer.
//!
//! # Architecture
//!
//! - [`BrowserDriver`]: launches an isolated browser per extraction
//! - [`BrowserSession`] / [`PageSession`]: the CDP operations we need
//! - [`render_page`]: scoped acquisition. The page and the browser are closed
//!   exactly once on every exit path, including errors and panics inside
//!   page handling; errors during cleanup are logged, never propagated.
//!
//! The traits are the seam tests mock; [`chromium::ChromiumDriver`] is the
//! real implementation (feature `headless`).

#[cfg(feature = "headless")]
pub mod chromium;
pub mod stealth;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, info, instrument, warn};

use crate::error::BrowserError;
use crate::fingerprint::{desktop_chrome, BrowserProfile};

/// Page readiness condition for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// Load event plus a quiet network window.
    NetworkIdle,
    /// `load` event.
    Load,
    /// `DOMContentLoaded`: the most lenient condition.
    DomContentLoaded,
}

/// How to open one share page.
#[derive(Debug, Clone)]
pub struct NavigationPlan {
    pub profile: BrowserProfile,
    pub wait_until: WaitUntil,
    /// Single retry condition used when the primary navigation fails.
    pub fallback_wait: Option<WaitUntil>,
    /// Selector signalling that the conversation rendered. Absence is logged,
    /// not fatal.
    pub wait_for_selector: Option<String>,
    /// Bound for each navigation and for the selector wait.
    pub timeout: Duration,
    /// Extra pause for late client-side rendering.
    pub settle: Duration,
}

impl Default for NavigationPlan {
    fn default() -> Self {
        Self {
            profile: desktop_chrome(),
            wait_until: WaitUntil::NetworkIdle,
            fallback_wait: Some(WaitUntil::Load),
            wait_for_selector: None,
            timeout: Duration::from_secs(15),
            settle: Duration::ZERO,
        }
    }
}

/// Browser process options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Chrome/Chromium binary; auto-detected when `None`.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Added after [`stealth::LAUNCH_ARGS`].
    pub extra_args: Vec<String>,
    pub launch_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            extra_args: Vec::new(),
            launch_timeout: Duration::from_secs(30),
        }
    }
}

impl LaunchOptions {
    /// Stealth args followed by the user's extras.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        stealth::LAUNCH_ARGS
            .iter()
            .map(|a| (*a).to_string())
            .chain(self.extra_args.iter().cloned())
            .collect()
    }
}

/// Result of rendering a share page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub html: String,
    pub final_url: Option<String>,
    /// Why the plan's readiness selector was not seen, when it wasn't.
    /// Extraction still runs over whatever rendered.
    pub selector_error: Option<BrowserError>,
}

/// Launches browsers.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch(
        &self,
        options: &LaunchOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// A running browser process.
#[async_trait]
pub trait BrowserSession: Send {
    async fn new_page(&mut self) -> Result<Box<dyn PageSession>, BrowserError>;

    /// Terminate the process. Called exactly once by [`render_page`].
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// One tab.
#[async_trait]
pub trait PageSession: Send {
    /// Register a script that runs before every document's own scripts.
    async fn add_init_script(&mut self, script: &str) -> Result<(), BrowserError>;

    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), BrowserError>;

    async fn set_extra_headers(&mut self, headers: &[(String, String)]) -> Result<(), BrowserError>;

    /// Navigate and wait for `wait`. Unbounded: callers apply the timeout.
    async fn navigate(&mut self, url: &str, wait: WaitUntil) -> Result<(), BrowserError>;

    /// Resolve once `selector` matches. Unbounded: callers apply the timeout.
    async fn wait_for_selector(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// Serialized DOM of the current document.
    async fn content(&mut self) -> Result<String, BrowserError>;

    async fn url(&mut self) -> Result<Option<String>, BrowserError>;

    /// Close the tab. Called exactly once by [`render_page`].
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// Driver used when the crate is built without a browser backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDriver;

#[async_trait]
impl BrowserDriver for UnavailableDriver {
    async fn launch(
        &self,
        _options: &LaunchOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        Err(BrowserError::Unavailable(
            "built without the `headless` feature".to_string(),
        ))
    }
}

/// The default driver for this build.
#[must_use]
pub fn default_driver() -> std::sync::Arc<dyn BrowserDriver> {
    #[cfg(feature = "headless")]
    {
        std::sync::Arc::new(chromium::ChromiumDriver)
    }

    #[cfg(not(feature = "headless"))]
    {
        std::sync::Arc::new(UnavailableDriver)
    }
}

/// Launch a browser, render `url` according to `plan`, and release
/// everything.
#[instrument(skip(driver, launch, plan), fields(url = %url))]
pub async fn render_page(
    driver: &dyn BrowserDriver,
    launch: &LaunchOptions,
    url: &str,
    plan: &NavigationPlan,
) -> Result<RenderedPage, BrowserError> {
    let launched = tokio::time::timeout(launch.launch_timeout, driver.launch(launch)).await;
    let mut browser = match launched {
        Ok(browser) => browser?,
        Err(_) => return Err(BrowserError::Launch("launch timed out".to_string())),
    };

    let outcome = AssertUnwindSafe(render_in_browser(browser.as_mut(), url, plan))
        .catch_unwind()
        .await;

    if let Err(e) = browser.close().await {
        debug!(error = %e, "Ignoring browser close failure");
    }

    outcome.unwrap_or_else(|panic| Err(BrowserError::Panicked(panic_message(panic.as_ref()))))
}

async fn render_in_browser(
    browser: &mut dyn BrowserSession,
    url: &str,
    plan: &NavigationPlan,
) -> Result<RenderedPage, BrowserError> {
    let mut page = browser.new_page().await?;

    let outcome = AssertUnwindSafe(drive_page(page.as_mut(), url, plan))
        .catch_unwind()
        .await;

    if let Err(e) = page.close().await {
        debug!(error = %e, "Ignoring page close failure");
    }

    outcome.unwrap_or_else(|panic| Err(BrowserError::Panicked(panic_message(panic.as_ref()))))
}

async fn drive_page(
    page: &mut dyn PageSession,
    url: &str,
    plan: &NavigationPlan,
) -> Result<RenderedPage, BrowserError> {
    page.add_init_script(stealth::STEALTH_SCRIPT).await?;
    page.set_user_agent(&plan.profile.user_agent).await?;
    page.set_extra_headers(&plan.profile.extra_browser_headers()).await?;

    info!(
        wait = ?plan.wait_until,
        mobile = plan.profile.mobile,
        timeout_ms = plan.timeout.as_millis(),
        "Navigating"
    );

    if let Err(err) = navigate_bounded(page, url, plan.wait_until, plan.timeout).await {
        let Some(fallback) = plan.fallback_wait else {
            return Err(err);
        };
        warn!(error = %err, fallback = ?fallback, "Navigation failed, retrying with fallback wait");
        navigate_bounded(page, url, fallback, plan.timeout).await?;
    }

    let selector_error = match &plan.wait_for_selector {
        Some(selector) => {
            match tokio::time::timeout(plan.timeout, page.wait_for_selector(selector)).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(_) => Some(BrowserError::SelectorMissing(selector.clone())),
            }
        }
        None => None,
    };
    if let Some(e) = &selector_error {
        warn!(error = %e, "Ready selector not seen; extracting anyway");
    }

    if !plan.settle.is_zero() {
        debug!(settle_ms = plan.settle.as_millis(), "Waiting for dynamic content");
        tokio::time::sleep(plan.settle).await;
    }

    let html = page.content().await?;
    let final_url = page.url().await.unwrap_or_default();
    debug!(bytes = html.len(), final_url = ?final_url, "Page rendered");

    Ok(RenderedPage {
        html,
        final_url,
        selector_error,
    })
}

async fn navigate_bounded(
    page: &mut dyn PageSession,
    url: &str,
    wait: WaitUntil,
    timeout: Duration,
) -> Result<(), BrowserError> {
    match tokio::time::timeout(timeout, page.navigate(url, wait)).await {
        Ok(result) => result,
        Err(_) => Err(BrowserError::Timeout(timeout)),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
