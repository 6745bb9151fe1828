//! Claude share links via the internal snapshot API.
//!
//! `https://claude.ai/share/<uuid>` is backed by
//! `https://claude.ai/api/chat_snapshots/<uuid>`, which returns the whole
//! conversation as JSON.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use super::{cap_messages, parse_json, ConversationExtractor, ExtractContext, ExtractOptions};
use crate::content::encode_code_block;
use crate::conversation::{ConversationMessage, ExtractionMethod, ProcessedConversation, Role};
use crate::dom::excerpt;
use crate::error::ExtractError;
use crate::fingerprint::desktop_chrome;
use crate::ids::IdSource;
use crate::language::LanguageTag;
use crate::platform::Platform;

const API_BASE: &str = "https://claude.ai/api/chat_snapshots";
const TITLE_MAX_CHARS: usize = 100;

/// Claude strategy (JSON).
pub struct ClaudeExtractor;

#[async_trait]
impl ConversationExtractor for ClaudeExtractor {
    fn platform(&self) -> Platform {
        Platform::Claude
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Json
    }

    #[instrument(skip(self, ctx), fields(platform = "claude"))]
    async fn extract(
        &self,
        url: &str,
        ctx: &ExtractContext<'_>,
    ) -> Result<ProcessedConversation, ExtractError> {
        let id = Platform::Claude
            .share_id(url)
            .ok_or_else(|| ExtractError::InvalidUrlFormat {
                platform: Platform::Claude,
                url: url.to_string(),
            })?;
        let api_url = format!("{API_BASE}/{id}");

        let mut fetch = ctx
            .options
            .fetch_options(&desktop_chrome().with_accept("application/json"));
        fetch.extra_headers = vec![
            ("Referer".to_string(), "https://claude.ai/".to_string()),
            ("Origin".to_string(), "https://claude.ai".to_string()),
        ];

        let body = ctx.fetcher.fetch(&api_url, &fetch).await?;
        let payload = parse_json(&body)?;
        map_claude_snapshot(&payload, ctx.options, ctx.ids)
    }
}

/// Map a snapshot payload to the normalized conversation.
///
/// Deterministic for a given payload and id source. Messages that fail to
/// map are skipped and logged.
pub fn map_claude_snapshot(
    payload: &Value,
    options: &ExtractOptions,
    ids: &dyn IdSource,
) -> Result<ProcessedConversation, ExtractError> {
    let data = payload
        .as_object()
        .ok_or_else(|| ExtractError::NoData("snapshot is not a JSON object".to_string()))?;

    let title = first_str(data, &["name", "title"])
        .map(|t| excerpt(t, TITLE_MAX_CHARS))
        .unwrap_or_default();

    let raw_messages = data
        .get("chat_messages")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let messages: Vec<_> = raw_messages
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| match map_message(raw, options, ids) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(index, error = %e, "Skipping Claude message");
                None
            }
        })
        .collect();
    debug!(raw = raw_messages.len(), mapped = messages.len(), "Mapped Claude messages");

    let messages = cap_messages(messages, options.max_messages);
    let model = first_str(data, &["model"]).map(str::to_string);
    Ok(ProcessedConversation::new(messages, title, Platform::Claude)?.with_model(model))
}

fn map_message(
    raw: &Value,
    options: &ExtractOptions,
    ids: &dyn IdSource,
) -> Result<ConversationMessage, ExtractError> {
    let msg = raw
        .as_object()
        .ok_or_else(|| ExtractError::InvalidMessage("not an object".to_string()))?;

    let role = message_role(msg)
        .ok_or_else(|| ExtractError::InvalidMessage("missing or unrecognized role".to_string()))?;

    let mut content = message_text(msg);

    if options.include_artifacts {
        for artifact in msg.get("artifacts").and_then(Value::as_array).into_iter().flatten() {
            if let Some(block) = artifact_block(artifact) {
                push_block(&mut content, &block);
            }
        }
    }

    if options.include_attachments {
        for attachment in msg.get("attachments").and_then(Value::as_array).into_iter().flatten() {
            if let Some(name) = attachment
                .as_object()
                .and_then(|a| first_str(a, &["name", "file_name"]))
            {
                push_block(&mut content, &format!("[Attachment: {name}]"));
            }
        }
    }

    if content.trim().is_empty() {
        return Err(ExtractError::InvalidMessage("no text content".to_string()));
    }

    let id = first_str(msg, &["uuid", "id"])
        .map_or_else(|| ids.next_id("msg"), str::to_string);
    let timestamp = first_str(msg, &["created_at", "timestamp"]).map(str::to_string);

    Ok(ConversationMessage::new(role, content)
        .with_id(Some(id))
        .with_timestamp(timestamp))
}

fn message_role(msg: &Map<String, Value>) -> Option<Role> {
    match msg.get("sender").and_then(Value::as_str) {
        Some("human") => return Some(Role::User),
        Some("assistant") => return Some(Role::Assistant),
        _ => {}
    }
    match msg.get("role").and_then(Value::as_str) {
        Some("user") => Some(Role::User),
        Some("assistant") => Some(Role::Assistant),
        _ => None,
    }
}

/// `text`, a string `content`, or the text blocks of an array `content`.
fn message_text(msg: &Map<String, Value>) -> String {
    if let Some(text) = msg.get("text").and_then(Value::as_str).filter(|t| !t.trim().is_empty()) {
        return text.trim().to_string();
    }
    match msg.get("content") {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        _ => String::new(),
    }
}

fn artifact_block(artifact: &Value) -> Option<String> {
    let artifact = artifact.as_object()?;
    let code = first_str(artifact, &["content", "text"]).filter(|c| !c.trim().is_empty())?;

    let language = match first_str(artifact, &["language"]) {
        Some(name) => LanguageTag::from_name(name),
        None => match artifact.get("type").and_then(Value::as_str) {
            Some("html") => LanguageTag::Html,
            Some("svg") => LanguageTag::Xml,
            Some("text") => LanguageTag::PlainText,
            Some("mermaid") => LanguageTag::Other,
            _ => LanguageTag::Unknown,
        },
    };

    let block = encode_code_block(language.as_str(), code.trim());
    Some(match first_str(artifact, &["title", "name"]) {
        Some(title) => format!("{title}\n{block}"),
        None => block,
    })
}

fn push_block(content: &mut String, block: &str) {
    if !content.is_empty() {
        content.push_str("\n\n");
    }
    content.push_str(block);
}

fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{LaunchOptions, UnavailableDriver};
    use crate::content::{segments, ContentSegment};
    use crate::http_client::{ContentFetcher, TransportResponse};
    use crate::ids::SequentialIds;
    use crate::site::testing::{fast_options, CannedTransport};
    use serde_json::json;

    const SHARE: &str = "https://claude.ai/share/0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d";

    fn snapshot() -> Value {
        json!({
            "uuid": "0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d",
            "name": "Borrow checker questions",
            "model": "claude-sonnet",
            "chat_messages": [
                {"uuid": "m1", "sender": "human", "text": "Why does this not compile?", "created_at": "2025-01-01T10:00:00Z"},
                {"uuid": "m2", "sender": "assistant", "text": "Because of a mutable borrow.", "created_at": "2025-01-01T10:00:05Z"}
            ]
        })
    }

    async fn run(transport: std::sync::Arc<CannedTransport>, url: &str) -> Result<ProcessedConversation, ExtractError> {
        let fetcher = ContentFetcher::new(transport);
        let options = fast_options();
        let ids = SequentialIds::new();
        let ctx = ExtractContext {
            fetcher: &fetcher,
            browser: &UnavailableDriver,
            launch: &LaunchOptions::default(),
            options: &options,
            ids: &ids,
        };
        ClaudeExtractor.extract(url, &ctx).await
    }

    #[tokio::test]
    async fn extracts_two_message_snapshot() {
        let transport = CannedTransport::json(&snapshot());
        let conversation = run(transport.clone(), SHARE).await.unwrap();

        assert_eq!(conversation.platform, Platform::Claude);
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].role, Role::User);
        assert_eq!(conversation.messages[1].role, Role::Assistant);
        assert_eq!(conversation.title, "Borrow checker questions");
        assert_eq!(conversation.model.as_deref(), Some("claude-sonnet"));
        assert_eq!(conversation.messages[0].id.as_deref(), Some("m1"));
        assert_eq!(
            conversation.messages[0].timestamp.as_deref(),
            Some("2025-01-01T10:00:00Z")
        );
    }

    #[tokio::test]
    async fn calls_snapshot_endpoint_with_json_headers() {
        let transport = CannedTransport::json(&snapshot());
        run(transport.clone(), SHARE).await.unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(
            requests[0].url,
            "https://claude.ai/api/chat_snapshots/0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d"
        );
        assert_eq!(requests[0].header("accept"), Some("application/json"));
        assert_eq!(requests[0].header("referer"), Some("https://claude.ai/"));
        assert_eq!(requests[0].header("origin"), Some("https://claude.ai"));
    }

    #[tokio::test]
    async fn malformed_share_id_makes_no_request() {
        let transport = CannedTransport::json(&snapshot());
        let err = run(transport.clone(), "https://claude.ai/share/not-a-uuid")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_URL_FORMAT");
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn status_codes_map_to_typed_errors() {
        for (status, code) in [
            (404, "CONVERSATION_NOT_FOUND"),
            (403, "ACCESS_DENIED"),
            (429, "RATE_LIMITED"),
            (500, "HTTP_ERROR"),
        ] {
            let transport = CannedTransport::new(vec![Ok(TransportResponse::status(status, "x"))]);
            let err = run(transport.clone(), SHARE).await.unwrap_err();
            assert_eq!(err.code(), code, "status {status}");
            assert_eq!(transport.calls(), 1, "non-2xx is never retried");
        }
    }

    #[test]
    fn malformed_message_is_dropped() {
        let payload = json!({
            "name": "Partial",
            "chat_messages": [
                {"uuid": "ok", "sender": "human", "text": "hello"},
                {"uuid": "broken"}
            ]
        });
        let conversation =
            map_claude_snapshot(&payload, &ExtractOptions::default(), &SequentialIds::new()).unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].content, "hello");
    }

    #[test]
    fn unknown_roles_and_non_objects_are_dropped() {
        let payload = json!({
            "chat_messages": [
                "oops",
                {"sender": "system", "text": "hidden"},
                {"role": "assistant", "text": "visible"}
            ]
        });
        let conversation =
            map_claude_snapshot(&payload, &ExtractOptions::default(), &SequentialIds::new()).unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].role, Role::Assistant);
        assert_eq!(conversation.title, "Claude Conversation");
    }

    #[test]
    fn mapping_is_idempotent() {
        let payload = json!({
            "name": "Same",
            "chat_messages": [
                {"sender": "human", "text": "no id here"},
                {"sender": "assistant", "text": "nor here"}
            ]
        });
        let options = ExtractOptions::default();
        let first = map_claude_snapshot(&payload, &options, &SequentialIds::new()).unwrap();
        let second = map_claude_snapshot(&payload, &options, &SequentialIds::new()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(first.messages[0].id.as_deref(), Some("msg_0"));
        assert_eq!(first.messages[1].id.as_deref(), Some("msg_1"));
    }

    #[test]
    fn empty_snapshot_is_a_failure() {
        let payload = json!({"name": "Nothing", "chat_messages": []});
        let err = map_claude_snapshot(&payload, &ExtractOptions::default(), &SequentialIds::new())
            .unwrap_err();
        assert_eq!(err, ExtractError::EmptyConversation);

        let err = map_claude_snapshot(&json!([]), &ExtractOptions::default(), &SequentialIds::new())
            .unwrap_err();
        assert_eq!(err.code(), "NO_DATA");
    }

    #[test]
    fn long_titles_are_truncated() {
        let payload = json!({
            "name": "t".repeat(120),
            "chat_messages": [{"sender": "human", "text": "hi"}]
        });
        let conversation =
            map_claude_snapshot(&payload, &ExtractOptions::default(), &SequentialIds::new()).unwrap();
        assert_eq!(conversation.title, format!("{}...", "t".repeat(100)));
    }

    #[test]
    fn content_blocks_are_joined() {
        let payload = json!({
            "chat_messages": [{
                "sender": "assistant",
                "content": [
                    {"type": "text", "text": "first"},
                    {"type": "tool_use", "name": "search"},
                    {"type": "text", "text": "second"}
                ]
            }]
        });
        let conversation =
            map_claude_snapshot(&payload, &ExtractOptions::default(), &SequentialIds::new()).unwrap();
        assert_eq!(conversation.messages[0].content, "first\n\nsecond");
    }

    #[test]
    fn artifacts_become_code_blocks() {
        let payload = json!({
            "chat_messages": [{
                "sender": "assistant",
                "text": "Here is the script.",
                "artifacts": [{"title": "fib.py", "language": "python", "content": "def fib(n):\n    pass"}],
                "attachments": [{"name": "notes.txt"}]
            }]
        });

        let conversation =
            map_claude_snapshot(&payload, &ExtractOptions::default(), &SequentialIds::new()).unwrap();
        let segs = segments(&conversation.messages[0].content);
        assert_eq!(
            segs.last(),
            Some(&ContentSegment::Code {
                language: "python".into(),
                code: "def fib(n):\n    pass".into()
            })
        );
        assert!(!conversation.messages[0].content.contains("[Attachment"));

        let options = ExtractOptions {
            include_artifacts: false,
            include_attachments: true,
            ..ExtractOptions::default()
        };
        let conversation = map_claude_snapshot(&payload, &options, &SequentialIds::new()).unwrap();
        assert_eq!(
            conversation.messages[0].content,
            "Here is the script.\n\n[Attachment: notes.txt]"
        );
    }

    #[test]
    fn max_messages_applies() {
        let messages: Vec<_> = (0..5)
            .map(|i| json!({"sender": "human", "text": format!("m{i}")}))
            .collect();
        let payload = json!({"chat_messages": messages});
        let options = ExtractOptions {
            max_messages: 3,
            ..ExtractOptions::default()
        };
        let conversation = map_claude_snapshot(&payload, &options, &SequentialIds::new()).unwrap();
        assert_eq!(conversation.messages.len(), 3);
    }
}
