//! Mock collaborators for the integration tests.
//!
//! No network, no browser: transports replay scripted responses and the
//! driver serves a fixed document while counting what was opened and closed.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chatshare::browser::{BrowserSession, PageSession};
use chatshare::http_client::{FetchRequest, TransportError, TransportResponse};
use chatshare::{
    BrowserDriver, BrowserError, ContentFetcher, ExtractOptions, Extractor, HttpTransport,
    LaunchOptions, SequentialIds, WaitUntil,
};

pub const CLAUDE_URL: &str = "https://claude.ai/share/0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d";
pub const CHATGPT_URL: &str = "https://chatgpt.com/share/67a0-bc12";
pub const COPILOT_URL: &str = "https://copilot.microsoft.com/shares/AbC_12-x";

/// Options with millisecond backoff and browser bounds.
pub fn fast_options() -> ExtractOptions {
    ExtractOptions {
        backoff_step: Duration::from_millis(1),
        browser_timeout: Duration::from_millis(100),
        settle: Some(Duration::ZERO),
        ..ExtractOptions::default()
    }
}

pub fn extractor(transport: Arc<ScriptedTransport>, driver: Arc<MockDriver>) -> Extractor {
    Extractor::with_parts(ContentFetcher::new(transport), driver)
        .with_options(fast_options())
        .with_ids(Arc::new(SequentialIds::new()))
}

// ─── HTTP ────────────────────────────────────────────────────────────────────

/// Replays responses in order; the last one repeats.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn json(body: &serde_json::Value) -> Arc<Self> {
        Self::new(vec![Ok(TransportResponse::ok(body.to_string()))])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: &FetchRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(request.url.clone());
        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => Err(TransportError::Network("no scripted response".to_string())),
            1 => responses[0].clone(),
            _ => responses.pop_front().unwrap(),
        }
    }
}

// ─── Browser ─────────────────────────────────────────────────────────────────

/// How the mock page behaves.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PageBehavior {
    Serve,
    HangOnNavigate,
    PanicOnContent,
}

/// Driver serving one document, counting launches and closes.
///
/// Sessions dropped without `close` count as abandoned, which is how a
/// cancelled extraction releases them.
pub struct MockDriver {
    html: String,
    behavior: PageBehavior,
    pub launches: AtomicUsize,
    pub page_closes: Arc<AtomicUsize>,
    pub browser_closes: Arc<AtomicUsize>,
    pub pages_abandoned: Arc<AtomicUsize>,
    pub browsers_abandoned: Arc<AtomicUsize>,
    pub waits: Arc<Mutex<Vec<WaitUntil>>>,
}

impl MockDriver {
    pub fn serving(html: impl Into<String>) -> Arc<Self> {
        Self::with_behavior(html, PageBehavior::Serve)
    }

    pub fn with_behavior(html: impl Into<String>, behavior: PageBehavior) -> Arc<Self> {
        Arc::new(Self {
            html: html.into(),
            behavior,
            launches: AtomicUsize::new(0),
            page_closes: Arc::new(AtomicUsize::new(0)),
            browser_closes: Arc::new(AtomicUsize::new(0)),
            pages_abandoned: Arc::new(AtomicUsize::new(0)),
            browsers_abandoned: Arc::new(AtomicUsize::new(0)),
            waits: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn page_closes(&self) -> usize {
        self.page_closes.load(Ordering::SeqCst)
    }

    pub fn browser_closes(&self) -> usize {
        self.browser_closes.load(Ordering::SeqCst)
    }

    pub fn pages_abandoned(&self) -> usize {
        self.pages_abandoned.load(Ordering::SeqCst)
    }

    pub fn browsers_abandoned(&self) -> usize {
        self.browsers_abandoned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn launch(&self, _: &LaunchOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockBrowser {
            html: self.html.clone(),
            behavior: self.behavior,
            page_closes: self.page_closes.clone(),
            browser_closes: self.browser_closes.clone(),
            pages_abandoned: self.pages_abandoned.clone(),
            abandoned: self.browsers_abandoned.clone(),
            closed: false,
            waits: self.waits.clone(),
        }))
    }
}

struct MockBrowser {
    html: String,
    behavior: PageBehavior,
    page_closes: Arc<AtomicUsize>,
    browser_closes: Arc<AtomicUsize>,
    pages_abandoned: Arc<AtomicUsize>,
    abandoned: Arc<AtomicUsize>,
    closed: bool,
    waits: Arc<Mutex<Vec<WaitUntil>>>,
}

impl Drop for MockBrowser {
    fn drop(&mut self) {
        if !self.closed {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl BrowserSession for MockBrowser {
    async fn new_page(&mut self) -> Result<Box<dyn PageSession>, BrowserError> {
        Ok(Box::new(MockPage {
            html: self.html.clone(),
            behavior: self.behavior,
            closes: self.page_closes.clone(),
            abandoned: self.pages_abandoned.clone(),
            closed: false,
            waits: self.waits.clone(),
        }))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.closed = true;
        self.browser_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockPage {
    html: String,
    behavior: PageBehavior,
    closes: Arc<AtomicUsize>,
    abandoned: Arc<AtomicUsize>,
    closed: bool,
    waits: Arc<Mutex<Vec<WaitUntil>>>,
}

impl Drop for MockPage {
    fn drop(&mut self) {
        if !self.closed {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl PageSession for MockPage {
    async fn add_init_script(&mut self, _: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn set_user_agent(&mut self, _: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn set_extra_headers(&mut self, _: &[(String, String)]) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn navigate(&mut self, _: &str, wait: WaitUntil) -> Result<(), BrowserError> {
        self.waits.lock().unwrap().push(wait);
        if self.behavior == PageBehavior::HangOnNavigate {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn wait_for_selector(&mut self, _: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        if self.behavior == PageBehavior::PanicOnContent {
            panic!("renderer crashed");
        }
        Ok(self.html.clone())
    }

    async fn url(&mut self) -> Result<Option<String>, BrowserError> {
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.closed = true;
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
