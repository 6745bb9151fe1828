//! Normalized conversation schema shared by every extractor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::{self, ContentSegment};
use crate::error::ExtractError;
use crate::platform::Platform;

/// Speaker of a conversation turn. Closed set: anything else is dropped
/// during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a platform's content is retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Json,
    Html,
    Md,
    Unknown,
}

impl ExtractionMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionMethod::Json => "json",
            ExtractionMethod::Html => "html",
            ExtractionMethod::Md => "md",
            ExtractionMethod::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExtractionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            "md" | "markdown" => Ok(Self::Md),
            other => Err(format!("unknown extraction method `{other}`")),
        }
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    /// Prose with code blocks inlined in sentinel encoding.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
            id: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Option<String>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    /// Content split into prose and decoded code blocks.
    #[must_use]
    pub fn segments(&self) -> Vec<ContentSegment> {
        content::segments(&self.content)
    }
}

/// The normalized output contract.
///
/// Can only be built with at least one message; see [`ProcessedConversation::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedConversation {
    pub messages: Vec<ConversationMessage>,
    pub title: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProcessedConversation {
    /// Build a conversation, rejecting an empty message list and replacing a
    /// blank title with the platform's generic one.
    pub fn new(
        messages: Vec<ConversationMessage>,
        title: impl Into<String>,
        platform: Platform,
    ) -> Result<Self, ExtractError> {
        if messages.is_empty() {
            return Err(ExtractError::EmptyConversation);
        }

        let title = title.into();
        let title = if title.trim().is_empty() {
            default_title(platform)
        } else {
            title.trim().to_string()
        };

        Ok(Self {
            messages,
            title,
            platform,
            model: None,
        })
    }

    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.trim().is_empty());
        self
    }

    /// Plain `User:` / `Assistant:` transcript, the form prompt builders consume.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{speaker}: {}", content::render_plain(&m.content))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Generic platform-qualified title.
#[must_use]
pub fn default_title(platform: Platform) -> String {
    match platform {
        Platform::Copilot => "Microsoft Copilot Conversation".to_string(),
        other => format!("{} Conversation", other.display_name().trim_start_matches("Google ")),
    }
}

/// Timing and method details attached to every result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    /// Wall-clock milliseconds spent in the extraction call.
    pub extraction_time: u64,
    pub method: ExtractionMethod,
    pub message_count: usize,
}

/// Outer envelope returned by [`Extractor::extract_conversation`](crate::Extractor::extract_conversation).
///
/// Exactly one of `conversation` / `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ProcessedConversation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error code, see [`ExtractError::code`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExtractionMetadata>,
}

impl ExtractionResult {
    pub(crate) fn succeeded(
        conversation: ProcessedConversation,
        method: ExtractionMethod,
        extraction_time: u64,
    ) -> Self {
        let message_count = conversation.messages.len();
        Self {
            success: true,
            platform: Some(conversation.platform),
            conversation: Some(conversation),
            error: None,
            code: None,
            metadata: Some(ExtractionMetadata {
                extraction_time,
                method,
                message_count,
            }),
        }
    }

    pub(crate) fn failed(
        error: &ExtractError,
        platform: Option<Platform>,
        method: ExtractionMethod,
        extraction_time: u64,
    ) -> Self {
        Self {
            success: false,
            conversation: None,
            error: Some(error.to_string()),
            code: Some(error.code().to_string()),
            platform,
            metadata: Some(ExtractionMetadata {
                extraction_time,
                method,
                message_count: 0,
            }),
        }
    }

    /// Messages of a successful result, empty otherwise.
    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        self.conversation
            .as_ref()
            .map_or(&[][..], |c| c.messages.as_slice())
    }
}
