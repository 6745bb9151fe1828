//! Inline code-block sentinel encoding.
//!
//! A message's `content` is one string. Code blocks recovered from the page
//! are spliced into it as
//! `CODE_BLOCK_START:<language>:<url-encoded code>:CODE_BLOCK_END`
//! so prose and code travel together. [`segments`] decodes that back into a
//! tagged list for consumers that want structure.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

const START: &str = "CODE_BLOCK_START:";
const END: &str = ":CODE_BLOCK_END";

/// A piece of message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentSegment {
    Text { text: String },
    Code { language: String, code: String },
}

/// Encode one code block as an inline sentinel.
#[must_use]
pub fn encode_code_block(language: &str, code: &str) -> String {
    format!(
        "{START}{}:{}{END}",
        sanitize_language(language),
        urlencoding::encode(code)
    )
}

/// Language labels must not break the `:`-delimited frame.
fn sanitize_language(language: &str) -> Cow<'_, str> {
    let trimmed = language.trim();
    if trimmed.is_empty() {
        return Cow::Borrowed("unknown");
    }
    if trimmed.contains(|c: char| c == ':' || c.is_whitespace()) {
        Cow::Owned(
            trimmed
                .chars()
                .map(|c| if c == ':' || c.is_whitespace() { '-' } else { c })
                .collect(),
        )
    } else {
        Cow::Borrowed(trimmed)
    }
}

/// Split content into text and code segments.
///
/// Malformed sentinels (no terminator, undecodable payload) are kept as text.
/// Whitespace-only text between blocks is dropped.
#[must_use]
pub fn segments(content: &str) -> Vec<ContentSegment> {
    let mut out = Vec::new();
    // Text since the last code block, untrimmed until flushed.
    let mut pending = String::new();
    let mut rest = content;

    while let Some(start) = rest.find(START) {
        let after = &rest[start + START.len()..];
        let Some(decoded) = decode_frame(after) else {
            // Not a real frame: keep the marker text and keep scanning.
            pending.push_str(&rest[..start + START.len()]);
            rest = after;
            continue;
        };

        pending.push_str(&rest[..start]);
        flush_text(&mut out, &mut pending);
        out.push(ContentSegment::Code {
            language: decoded.language,
            code: decoded.code,
        });
        rest = &after[decoded.consumed..];
    }
    pending.push_str(rest);
    flush_text(&mut out, &mut pending);
    out
}

struct Frame {
    language: String,
    code: String,
    consumed: usize,
}

fn decode_frame(after: &str) -> Option<Frame> {
    let colon = after.find(':')?;
    let language = &after[..colon];
    if language.is_empty() || language.contains(char::is_whitespace) {
        return None;
    }
    let payload_and_tail = &after[colon + 1..];
    let end = payload_and_tail.find(END)?;
    let payload = &payload_and_tail[..end];
    let code = urlencoding::decode(payload).ok()?.into_owned();

    Some(Frame {
        language: language.to_string(),
        code,
        consumed: colon + 1 + end + END.len(),
    })
}

fn flush_text(out: &mut Vec<ContentSegment>, pending: &mut String) {
    let text = pending.trim();
    if !text.is_empty() {
        out.push(ContentSegment::Text {
            text: text.to_string(),
        });
    }
    pending.clear();
}

/// Render content with code blocks as fenced markdown.
#[must_use]
pub fn render_plain(content: &str) -> String {
    if !content.contains(START) {
        return content.trim().to_string();
    }

    segments(content)
        .into_iter()
        .map(|segment| match segment {
            ContentSegment::Text { text } => text,
            ContentSegment::Code { language, code } => {
                let fence_lang = if language == "unknown" { "" } else { language.as_str() };
                format!("```{fence_lang}\n{code}\n```")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
