//! Microsoft Copilot share links via the conversation-shares API.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{cap_messages, parse_json, ConversationExtractor, ExtractContext, ExtractOptions};
use crate::conversation::{ConversationMessage, ExtractionMethod, ProcessedConversation, Role};
use crate::error::ExtractError;
use crate::fingerprint::desktop_chrome;
use crate::ids::IdSource;
use crate::platform::Platform;

const API_BASE: &str = "https://copilot.microsoft.com/c/api/conversations/shares";
const IMAGE_NOTE: &str = "[Note: This message contained images that are not included in the digest]";

/// Copilot strategy (JSON).
pub struct CopilotExtractor;

#[async_trait]
impl ConversationExtractor for CopilotExtractor {
    fn platform(&self) -> Platform {
        Platform::Copilot
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Json
    }

    #[instrument(skip(self, ctx), fields(platform = "copilot"))]
    async fn extract(
        &self,
        url: &str,
        ctx: &ExtractContext<'_>,
    ) -> Result<ProcessedConversation, ExtractError> {
        let id = Platform::Copilot
            .share_id(url)
            .ok_or_else(|| ExtractError::InvalidUrlFormat {
                platform: Platform::Copilot,
                url: url.to_string(),
            })?;
        let api_url = format!("{API_BASE}/{id}");

        let fetch = ctx
            .options
            .fetch_options(&desktop_chrome().with_accept("application/json"));
        let body = ctx.fetcher.fetch(&api_url, &fetch).await?;
        let payload = parse_json(&body)?;
        map_copilot_share(&payload, ctx.options, ctx.ids)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharePayload {
    #[serde(default)]
    conversation_title: Option<String>,
    messages: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    /// Usually a string; numbers are accepted and stringified.
    #[serde(default)]
    id: Option<Value>,
    author: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Map a share payload to the normalized conversation.
///
/// Messages are re-ordered by `createdAt` because the API does not return
/// them chronologically.
pub fn map_copilot_share(
    payload: &Value,
    options: &ExtractOptions,
    ids: &dyn IdSource,
) -> Result<ProcessedConversation, ExtractError> {
    let share: SharePayload = serde_json::from_value(payload.clone())
        .map_err(|e| ExtractError::NoData(format!("unexpected Copilot payload: {e}")))?;
    let raw = share
        .messages
        .ok_or_else(|| ExtractError::NoData("messages not found".to_string()))?;

    let parsed: Vec<RawMessage> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<RawMessage>(value) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(index, error = %e, "Skipping Copilot message");
                None
            }
        })
        .collect();

    let messages: Vec<_> = sort_chronologically(parsed)
        .into_iter()
        .filter_map(|raw| map_message(raw, ids))
        .collect();
    debug!(mapped = messages.len(), "Mapped Copilot messages");

    let messages = cap_messages(messages, options.max_messages);
    ProcessedConversation::new(
        messages,
        share.conversation_title.unwrap_or_default(),
        Platform::Copilot,
    )
}

/// Stable sort by `createdAt`; payload order is kept unless every message
/// carries a parseable timestamp.
fn sort_chronologically(messages: Vec<RawMessage>) -> Vec<RawMessage> {
    let times: Option<Vec<DateTime<FixedOffset>>> = messages
        .iter()
        .map(|m| m.created_at.as_deref().and_then(|t| DateTime::parse_from_rfc3339(t).ok()))
        .collect();
    let Some(times) = times else {
        debug!("Unparseable createdAt, keeping payload order");
        return messages;
    };

    let mut timed: Vec<_> = times.into_iter().zip(messages).collect();
    timed.sort_by_key(|(time, _)| *time);
    timed.into_iter().map(|(_, message)| message).collect()
}

fn map_message(raw: RawMessage, ids: &dyn IdSource) -> Option<ConversationMessage> {
    let role = match raw.author.as_str() {
        "human" => Role::User,
        "ai" => Role::Assistant,
        other => {
            warn!(author = other, "Skipping Copilot message with unknown author");
            return None;
        }
    };

    let text = raw
        .content
        .iter()
        .filter(|p| p.kind == "text")
        .filter_map(|p| p.text.as_deref())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let has_images = raw.content.iter().any(|p| p.kind == "image");

    let content = match (text.trim().is_empty(), has_images) {
        (true, false) => return None,
        (true, true) => IMAGE_NOTE.to_string(),
        (false, true) => format!("{text}\n\n{IMAGE_NOTE}"),
        (false, false) => text,
    };

    let id = raw
        .id
        .and_then(|id| match id {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| ids.next_id("msg"));
    Some(
        ConversationMessage::new(role, content)
            .with_id(Some(id))
            .with_timestamp(raw.created_at),
    )
}
