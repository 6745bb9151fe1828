//! Chromium backend over the DevTools protocol (`chromiumoxide`).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserDriver, BrowserSession, LaunchOptions, PageSession, WaitUntil};
use crate::error::BrowserError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Resource count must stay unchanged this long to count as network idle.
const NETWORK_QUIET: Duration = Duration::from_millis(500);

/// Launches a fresh Chrome/Chromium with its own profile directory per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumDriver;

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch(
        &self,
        options: &LaunchOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let profile_dir = std::env::temp_dir().join(format!(
            "chatshare-{}",
            uuid::Uuid::new_v4().simple()
        ));

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&profile_dir)
            .args(options.args());
        if let Some(exe) = &options.executable {
            builder = builder.chrome_executable(exe);
        }
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        info!(profile = %profile_dir.display(), headless = options.headless, "Browser launched");

        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            handler,
            profile_dir,
        }))
    }
}

/// `browser` is `None` once the session has been released, either by
/// [`BrowserSession::close`] or by `Drop` when the owning future is cancelled.
struct ChromiumSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&mut self) -> Result<Box<dyn PageSession>, BrowserError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| BrowserError::Protocol("browser already closed".to_string()))?;
        let page = browser.new_page("about:blank").await.map_err(protocol)?;
        Ok(Box::new(ChromiumPage { page: Some(page) }))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let closed = browser.close().await.map(|_| ());
        if closed.is_ok() {
            let _ = browser.wait().await;
        }
        drop(browser);
        self.handler.abort();

        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!(profile = %self.profile_dir.display(), error = %e, "Profile dir not removed");
        }

        closed.map_err(protocol)
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        let Some(browser) = self.browser.take() else {
            return;
        };

        // Dropping `Browser` kills the child process.
        drop(browser);
        self.handler.abort();
        warn!(profile = %self.profile_dir.display(), "Browser released without close");

        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            debug!(profile = %self.profile_dir.display(), error = %e, "Profile dir not removed");
        }
    }
}

struct ChromiumPage {
    page: Option<Page>,
}

impl ChromiumPage {
    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::Protocol("page already closed".to_string()))
    }

    async fn ready_state(&self) -> Result<String, BrowserError> {
        self.page()?
            .evaluate("document.readyState")
            .await
            .map_err(protocol)?
            .into_value::<String>()
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn resource_count(&self) -> Result<u64, BrowserError> {
        self.page()?
            .evaluate("performance.getEntriesByType('resource').length")
            .await
            .map_err(protocol)?
            .into_value::<u64>()
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }
}

fn protocol(e: chromiumoxide::error::CdpError) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

fn navigation(e: chromiumoxide::error::CdpError) -> BrowserError {
    BrowserError::Navigation(e.to_string())
}

#[async_trait]
impl PageSession for ChromiumPage {
    async fn add_init_script(&mut self, script: &str) -> Result<(), BrowserError> {
        self.page()?
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), BrowserError> {
        self.page()?
            .execute(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn set_extra_headers(
        &mut self,
        headers: &[(String, String)],
    ) -> Result<(), BrowserError> {
        let map: serde_json::Map<String, serde_json::Value> = headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        self.page()?
            .execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(map),
            )))
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str, wait: WaitUntil) -> Result<(), BrowserError> {
        match wait {
            WaitUntil::Load => {
                self.page()?.goto(url).await.map_err(navigation)?;
            }
            WaitUntil::DomContentLoaded => {
                self.page()?
                    .execute(NavigateParams::new(url))
                    .await
                    .map_err(navigation)?;
                loop {
                    let state = self.ready_state().await.unwrap_or_default();
                    if state == "interactive" || state == "complete" {
                        break;
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
            WaitUntil::NetworkIdle => {
                self.page()?.goto(url).await.map_err(navigation)?;
                let mut last = self.resource_count().await.unwrap_or(0);
                let mut quiet = Duration::ZERO;
                while quiet < NETWORK_QUIET {
                    tokio::time::sleep(POLL_INTERVAL).await;
                    let current = self.resource_count().await.unwrap_or(last);
                    if current == last {
                        quiet += POLL_INTERVAL;
                    } else {
                        last = current;
                        quiet = Duration::ZERO;
                    }
                }
            }
        }
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str) -> Result<(), BrowserError> {
        loop {
            if self.page()?.find_element(selector).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        self.page()?.content().await.map_err(protocol)
    }

    async fn url(&mut self) -> Result<Option<String>, BrowserError> {
        self.page()?.url().await.map_err(protocol)
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        match self.page.take() {
            Some(page) => page.close().await.map_err(protocol),
            None => Ok(()),
        }
    }
}
