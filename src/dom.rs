//! Conversation extraction from rendered share-page HTML.
//!
//! Each DOM-scraping platform is described by a [`DomProfile`]: ordered
//! selector strategies per role, a code-block rule, broad fallback rules and
//! a title rule. A markup change on the platform side is a data edit here,
//! not new control flow.
//!
//! [`extract_from_html`] is pure (HTML in, messages out) so profiles can be
//! tested against fixtures without a browser.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use ego_tree::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

use crate::browser::{NavigationPlan, WaitUntil};
use crate::content::encode_code_block;
use crate::conversation::{default_title, ConversationMessage, Role};
use crate::fingerprint::{desktop_chrome, mobile_safari};
use crate::language::{detect_language, LanguageTag};
use crate::platform::Platform;

/// Longest title excerpt taken from the first user message.
const TITLE_EXCERPT_CHARS: usize = 100;

/// Elements whose text is never message content.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "button", "svg"];

/// Elements rendered on their own line.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "li", "ul", "ol", "br", "h1", "h2", "h3", "h4", "h5",
    "h6", "pre", "blockquote", "table", "tr", "hr",
];

/// Where code blocks live inside a message and how they are labelled.
#[derive(Debug, Clone, Copy)]
pub struct CodeBlockRule {
    /// Element replaced wholesale by the sentinel.
    pub container: &'static str,
    /// Element holding the code text, searched inside the container.
    pub code: &'static str,
    /// Element holding a visible language label, searched inside the container.
    pub label: Option<&'static str>,
}

/// Broad selector used when no role-specific strategy matched.
#[derive(Debug, Clone, Copy)]
pub struct FallbackRule {
    pub selector: &'static str,
    /// Role assigned unless a user hint matches.
    pub default_role: Role,
    /// Minimum text length (chars) to count as a message rather than UI chrome.
    pub min_len: usize,
}

/// Scraping recipe for one platform.
#[derive(Debug)]
pub struct DomProfile {
    pub platform: Platform,
    /// Selector signalling that the conversation rendered.
    pub ready_selector: &'static str,
    /// Ordered candidates; the first selector with at least one match wins.
    pub user_selectors: &'static [&'static str],
    pub assistant_selectors: &'static [&'static str],
    /// Applied to assistant messages.
    pub code_blocks: CodeBlockRule,
    /// Applied together, in order, only when both role strategies found nothing.
    pub fallbacks: &'static [FallbackRule],
    /// A fallback match that is, or sits inside, one of these is a user turn.
    pub user_hints: &'static [&'static str],
    /// Stripped from the page `<title>`.
    pub title_prefix: &'static Lazy<Regex>,
    /// Serve the mobile Safari fingerprint instead of desktop Chrome.
    pub mobile: bool,
    pub wait_until: WaitUntil,
    pub fallback_wait: Option<WaitUntil>,
    /// Pause after readiness for late client-side rendering.
    pub settle: Duration,
}

impl DomProfile {
    /// Browser navigation plan for this profile.
    #[must_use]
    pub fn navigation_plan(
        &self,
        timeout: Duration,
        settle_override: Option<Duration>,
    ) -> NavigationPlan {
        NavigationPlan {
            profile: if self.mobile { mobile_safari() } else { desktop_chrome() },
            wait_until: self.wait_until,
            fallback_wait: self.fallback_wait,
            wait_for_selector: Some(self.ready_selector.to_string()),
            timeout,
            settle: settle_override.unwrap_or(self.settle),
        }
    }
}

/// Messages and title recovered from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomExtraction {
    pub messages: Vec<ConversationMessage>,
    pub title: String,
}

/// Run `profile` against rendered HTML.
#[must_use]
pub fn extract_from_html(html: &str, profile: &DomProfile) -> DomExtraction {
    let doc = Html::parse_document(html);
    let order = document_order(&doc);
    let code_rule = CompiledCodeRule::new(&profile.code_blocks);

    let mut messages = role_messages(&doc, profile, &order, code_rule.as_ref());
    if messages.is_empty() {
        debug!(platform = %profile.platform, "No role-specific matches, trying fallback selectors");
        messages = fallback_messages(&doc, profile, &order, code_rule.as_ref());
    }

    let title = extract_title(&doc, profile, &messages);
    debug!(
        platform = %profile.platform,
        messages = messages.len(),
        title = %title,
        "DOM extraction finished"
    );

    DomExtraction { messages, title }
}

fn document_order(doc: &Html) -> HashMap<NodeId, usize> {
    doc.tree
        .root()
        .descendants()
        .enumerate()
        .map(|(i, node)| (node.id(), i))
        .collect()
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!(selector, error = %e, "Skipping unparseable selector");
            None
        }
    }
}

/// First selector in `candidates` with at least one match.
fn first_matching<'a>(doc: &'a Html, candidates: &[&str]) -> Vec<ElementRef<'a>> {
    for candidate in candidates {
        let Some(selector) = parse_selector(candidate) else {
            continue;
        };
        let found: Vec<_> = doc.select(&selector).collect();
        if !found.is_empty() {
            debug!(selector = candidate, count = found.len(), "Selector matched");
            return found;
        }
    }
    Vec::new()
}

/// Drop elements nested inside another element of the same set.
fn outermost(elements: Vec<ElementRef<'_>>) -> Vec<ElementRef<'_>> {
    let ids: HashSet<NodeId> = elements.iter().map(|e| e.id()).collect();
    elements
        .into_iter()
        .filter(|e| !e.ancestors().any(|a| ids.contains(&a.id())))
        .collect()
}

/// Drop wrappers: elements containing an element of `other`.
fn exclusive<'a>(elements: Vec<ElementRef<'a>>, other: &[ElementRef<'a>]) -> Vec<ElementRef<'a>> {
    let other_ancestors: HashSet<NodeId> = other
        .iter()
        .flat_map(|e| e.ancestors().map(|a| a.id()))
        .collect();

    elements
        .into_iter()
        .filter(|e| !other_ancestors.contains(&e.id()))
        .collect()
}

fn role_messages(
    doc: &Html,
    profile: &DomProfile,
    order: &HashMap<NodeId, usize>,
    code_rule: Option<&CompiledCodeRule>,
) -> Vec<ConversationMessage> {
    let users = outermost(first_matching(doc, profile.user_selectors));
    let assistants = outermost(first_matching(doc, profile.assistant_selectors));

    let users_kept = exclusive(users.clone(), &assistants);
    let assistants_kept = exclusive(assistants, &users);

    let mut positioned: Vec<(usize, ConversationMessage)> = users_kept
        .into_iter()
        .map(|e| (e, Role::User))
        .chain(assistants_kept.into_iter().map(|e| (e, Role::Assistant)))
        .filter_map(|(element, role)| {
            let rule = if role == Role::Assistant { code_rule } else { None };
            let content = element_content(element, rule);
            if content.is_empty() {
                return None;
            }
            let pos = order.get(&element.id()).copied().unwrap_or(usize::MAX);
            Some((pos, ConversationMessage::new(role, content)))
        })
        .collect();

    positioned.sort_by_key(|(pos, _)| *pos);
    positioned.into_iter().map(|(_, m)| m).collect()
}

fn fallback_messages(
    doc: &Html,
    profile: &DomProfile,
    order: &HashMap<NodeId, usize>,
    code_rule: Option<&CompiledCodeRule>,
) -> Vec<ConversationMessage> {
    let hints: Vec<Selector> = profile
        .user_hints
        .iter()
        .filter_map(|h| parse_selector(h))
        .collect();

    let mut candidates: Vec<(ElementRef<'_>, &FallbackRule)> = Vec::new();
    let mut seen = HashSet::new();
    for rule in profile.fallbacks {
        let Some(selector) = parse_selector(rule.selector) else {
            continue;
        };
        for element in doc.select(&selector) {
            if seen.insert(element.id()) {
                candidates.push((element, rule));
            }
        }
    }

    let ids: HashSet<NodeId> = candidates.iter().map(|(e, _)| e.id()).collect();
    let mut positioned: Vec<(usize, ConversationMessage)> = candidates
        .into_iter()
        .filter(|(e, _)| !e.ancestors().any(|a| ids.contains(&a.id())))
        .filter_map(|(element, rule)| {
            let role = if is_user_hinted(element, &hints) {
                Role::User
            } else {
                rule.default_role
            };
            let rule_for_code = if role == Role::Assistant { code_rule } else { None };
            let content = element_content(element, rule_for_code);
            if content.is_empty() || content.chars().count() < rule.min_len {
                return None;
            }
            let pos = order.get(&element.id()).copied().unwrap_or(usize::MAX);
            Some((pos, ConversationMessage::new(role, content)))
        })
        .collect();

    positioned.sort_by_key(|(pos, _)| *pos);
    positioned.into_iter().map(|(_, m)| m).collect()
}

fn is_user_hinted(element: ElementRef<'_>, hints: &[Selector]) -> bool {
    if hints.iter().any(|h| h.matches(&element)) {
        return true;
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| hints.iter().any(|h| h.matches(&a)))
}

struct CompiledCodeRule {
    container: Selector,
    code: Selector,
    label: Option<Selector>,
}

impl CompiledCodeRule {
    fn new(rule: &CodeBlockRule) -> Option<Self> {
        Some(Self {
            container: parse_selector(rule.container)?,
            code: parse_selector(rule.code)?,
            label: rule.label.and_then(parse_selector),
        })
    }

    fn encode(&self, container: ElementRef<'_>) -> String {
        let code_el = container.select(&self.code).next().unwrap_or(container);
        let code: String = code_el.text().collect();
        let code = code.trim();

        let mut classes: Vec<String> = Vec::new();
        if let Some(label) = self
            .label
            .as_ref()
            .and_then(|l| container.select(l).next())
            .map(|l| l.text().collect::<String>().trim().to_ascii_lowercase())
            .filter(|l| !l.is_empty())
        {
            classes.push(format!("language-{label}"));
        }
        for el in [code_el, container] {
            if let Some(lang) = el.value().attr("data-language").filter(|l| !l.is_empty()) {
                classes.push(format!("language-{lang}"));
            }
        }
        classes.extend(
            code_el
                .descendants()
                .filter_map(ElementRef::wrap)
                .flat_map(|e| e.value().classes())
                .map(str::to_string),
        );

        let class_refs: Vec<&str> = classes.iter().map(String::as_str).collect();
        let first_line = code.lines().next().unwrap_or_default();
        let language = detect_language(first_line, &class_refs);
        let language = if language == LanguageTag::Unknown {
            "unknown"
        } else {
            language.as_str()
        };

        encode_code_block(language, code)
    }
}

/// Visible text of a message with code blocks replaced by sentinels.
fn element_content(element: ElementRef<'_>, code_rule: Option<&CompiledCodeRule>) -> String {
    let mut raw = String::new();
    collect_text(element, code_rule, &mut raw);
    normalize_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, code_rule: Option<&CompiledCodeRule>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                if SKIPPED_TAGS.contains(&el.name()) {
                    continue;
                }
                if let Some(rule) = code_rule.filter(|r| r.container.matches(&child_el)) {
                    out.push('\n');
                    out.push_str(&rule.encode(child_el));
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_TAGS.contains(&el.name());
                if block {
                    out.push('\n');
                }
                collect_text(child_el, code_rule, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Trim every line and drop blank ones.
fn normalize_whitespace(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("static selector"));

fn extract_title(doc: &Html, profile: &DomProfile, messages: &[ConversationMessage]) -> String {
    let raw = doc
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();
    let stripped = profile.title_prefix.replace(raw.trim(), "").trim().to_string();

    let generic = default_title(profile.platform);
    let is_generic = stripped.is_empty()
        || stripped.eq_ignore_ascii_case(&generic)
        || stripped.eq_ignore_ascii_case(profile.platform.display_name())
        || stripped.eq_ignore_ascii_case(profile.platform.as_str());
    if !is_generic {
        return stripped;
    }

    messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| excerpt(&m.content, TITLE_EXCERPT_CHARS))
        .unwrap_or(generic)
}

/// First `max` chars, with `...` when truncated.
pub(crate) fn excerpt(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{cut}...")
}
