//! `chatshare` - Shared AI chat conversation extractor
//!
//! Turns a public share link from Claude, ChatGPT, Gemini, Copilot or Grok
//! into one normalized [`ProcessedConversation`].
//!
//! # Features
//!
//! - **Detection**: static per-platform URL patterns, broad for detection and
//!   strict for validation
//! - **JSON APIs**: Claude and Copilot through a retrying HTTP fetcher
//! - **Rendered DOM**: ChatGPT, Gemini and Grok through a stealth headless
//!   browser with selector fallback chains (feature `headless`)
//! - **Code blocks**: recovered with a best-effort language tag and carried
//!   inline in sentinel encoding, decodable with [`segments`]
//!
//! # Example
//!
//! ```rust,no_run
//! use chatshare::Extractor;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let extractor = Extractor::new()?;
//!     let result = extractor
//!         .extract_conversation("https://chatgpt.com/share/67a0-bc12")
//!         .await;
//!     match &result.conversation {
//!         Some(conversation) => println!("{}", conversation.transcript()),
//!         None => eprintln!("{}", result.error.unwrap_or_default()),
//!     }
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod config;
pub mod content;
pub mod conversation;
pub mod dom;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod http_client;
pub mod ids;
pub mod language;
pub mod platform;
pub mod site;

pub use browser::{default_driver, BrowserDriver, LaunchOptions, WaitUntil};
pub use config::Config;
pub use content::{encode_code_block, render_plain, segments, ContentSegment};
pub use conversation::{
    default_title, ConversationMessage, ExtractionMetadata, ExtractionMethod, ExtractionResult,
    ProcessedConversation, Role,
};
pub use error::{BrowserError, ExtractError, FetchError};
pub use extract::Extractor;
pub use http_client::{ContentFetcher, FetchOptions, HttpTransport};
pub use ids::{IdSource, RandomIds, SequentialIds};
pub use language::{detect_language, LanguageTag};
pub use platform::{detect, is_supported_url, Platform};
pub use site::ExtractOptions;

/// Version of chatshare
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
