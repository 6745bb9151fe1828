//! Best-effort language detection for code blocks recovered from the DOM.
//!
//! Rules are plain ordered tables so new hints are one-line additions:
//!
//! 1. explicit `language-*` / `lang-*` class (or `data-language`, which the
//!    DOM layer passes as a `language-*` class)
//! 2. a file name in a first-line comment, matched by exact extension suffix
//! 3. syntax-highlighter token classes
//!
//! Anything else is [`LanguageTag::Unknown`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of languages the digest pipeline knows how to label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageTag {
    Bash,
    C,
    Cpp,
    CSharp,
    Css,
    Dockerfile,
    Go,
    Html,
    Java,
    JavaScript,
    Json,
    Kotlin,
    Markdown,
    Matlab,
    Php,
    PlainText,
    Python,
    R,
    Ruby,
    Rust,
    Scala,
    Sql,
    Swift,
    Toml,
    TypeScript,
    Xml,
    Yaml,
    /// An explicit label we do not recognise.
    Other,
    Unknown,
}

impl LanguageTag {
    /// Label used in the sentinel encoding.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LanguageTag::Bash => "bash",
            LanguageTag::C => "c",
            LanguageTag::Cpp => "cpp",
            LanguageTag::CSharp => "csharp",
            LanguageTag::Css => "css",
            LanguageTag::Dockerfile => "dockerfile",
            LanguageTag::Go => "go",
            LanguageTag::Html => "html",
            LanguageTag::Java => "java",
            LanguageTag::JavaScript => "javascript",
            LanguageTag::Json => "json",
            LanguageTag::Kotlin => "kotlin",
            LanguageTag::Markdown => "markdown",
            LanguageTag::Matlab => "matlab",
            LanguageTag::Php => "php",
            LanguageTag::PlainText => "text",
            LanguageTag::Python => "python",
            LanguageTag::R => "r",
            LanguageTag::Ruby => "ruby",
            LanguageTag::Rust => "rust",
            LanguageTag::Scala => "scala",
            LanguageTag::Sql => "sql",
            LanguageTag::Swift => "swift",
            LanguageTag::Toml => "toml",
            LanguageTag::TypeScript => "typescript",
            LanguageTag::Xml => "xml",
            LanguageTag::Yaml => "yaml",
            LanguageTag::Other => "other",
            LanguageTag::Unknown => "unknown",
        }
    }

    /// Resolve a language name or common alias (`js`, `py`, `c++`, `sh`, ...).
    ///
    /// Returns [`LanguageTag::Other`] for a non-empty name that is not in the
    /// table and [`LanguageTag::Unknown`] for an empty one.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            return LanguageTag::Unknown;
        }
        NAME_ALIASES
            .iter()
            .find(|(aliases, _)| aliases.contains(&name.as_str()))
            .map_or(LanguageTag::Other, |(_, tag)| *tag)
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const NAME_ALIASES: &[(&[&str], LanguageTag)] = &[
    (&["bash", "sh", "shell", "zsh", "console", "shellscript"], LanguageTag::Bash),
    (&["c", "h"], LanguageTag::C),
    (&["cpp", "c++", "cxx", "cc", "hpp"], LanguageTag::Cpp),
    (&["csharp", "cs", "c#"], LanguageTag::CSharp),
    (&["css", "scss"], LanguageTag::Css),
    (&["dockerfile", "docker"], LanguageTag::Dockerfile),
    (&["go", "golang"], LanguageTag::Go),
    (&["html", "htm", "xhtml"], LanguageTag::Html),
    (&["java"], LanguageTag::Java),
    (&["javascript", "js", "jsx", "mjs", "node"], LanguageTag::JavaScript),
    (&["json", "jsonc"], LanguageTag::Json),
    (&["kotlin", "kt", "kts"], LanguageTag::Kotlin),
    (&["markdown", "md"], LanguageTag::Markdown),
    (&["matlab"], LanguageTag::Matlab),
    (&["php"], LanguageTag::Php),
    (&["text", "plaintext", "txt", "plain"], LanguageTag::PlainText),
    (&["python", "py", "python3"], LanguageTag::Python),
    (&["r"], LanguageTag::R),
    (&["ruby", "rb"], LanguageTag::Ruby),
    (&["rust", "rs"], LanguageTag::Rust),
    (&["scala"], LanguageTag::Scala),
    (&["sql", "postgresql", "mysql", "sqlite"], LanguageTag::Sql),
    (&["swift"], LanguageTag::Swift),
    (&["toml"], LanguageTag::Toml),
    (&["typescript", "ts", "tsx"], LanguageTag::TypeScript),
    (&["xml", "svg"], LanguageTag::Xml),
    (&["yaml", "yml"], LanguageTag::Yaml),
];

/// File-extension suffixes checked against the last token of a first-line
/// comment. Matching is `ends_with` on the whole token, so `.js` never
/// matches `app.json` or `App.jsx`.
const EXTENSION_RULES: &[(&str, LanguageTag)] = &[
    (".py", LanguageTag::Python),
    (".js", LanguageTag::JavaScript),
    (".mjs", LanguageTag::JavaScript),
    (".jsx", LanguageTag::JavaScript),
    (".ts", LanguageTag::TypeScript),
    (".tsx", LanguageTag::TypeScript),
    (".java", LanguageTag::Java),
    (".cpp", LanguageTag::Cpp),
    (".cc", LanguageTag::Cpp),
    (".hpp", LanguageTag::Cpp),
    (".c", LanguageTag::C),
    (".h", LanguageTag::C),
    (".cs", LanguageTag::CSharp),
    (".go", LanguageTag::Go),
    (".rs", LanguageTag::Rust),
    (".rb", LanguageTag::Ruby),
    (".php", LanguageTag::Php),
    (".swift", LanguageTag::Swift),
    (".kt", LanguageTag::Kotlin),
    (".scala", LanguageTag::Scala),
    (".r", LanguageTag::R),
    (".m", LanguageTag::Matlab),
    (".sh", LanguageTag::Bash),
    (".bash", LanguageTag::Bash),
    (".sql", LanguageTag::Sql),
    (".html", LanguageTag::Html),
    (".css", LanguageTag::Css),
    (".xml", LanguageTag::Xml),
    (".json", LanguageTag::Json),
    (".yaml", LanguageTag::Yaml),
    (".yml", LanguageTag::Yaml),
    (".toml", LanguageTag::Toml),
    (".md", LanguageTag::Markdown),
    ("dockerfile", LanguageTag::Dockerfile),
];

/// Highlighter token classes: every listed class must be present.
const HIGHLIGHTER_RULES: &[(&[&str], LanguageTag)] = &[
    (&["hljs-meta", "hljs-keyword", "hljs-built_in"], LanguageTag::Python),
    (&["hljs-keyword", "hljs-built_in"], LanguageTag::Python),
    (&["hljs-tag", "hljs-name", "hljs-attr"], LanguageTag::Html),
    (&["hljs-attr", "hljs-string", "hljs-punctuation"], LanguageTag::Json),
    (&["token", "keyword", "macro"], LanguageTag::Rust),
];

/// Comment openers accepted before a file name on the first line.
const COMMENT_PREFIXES: &[&str] = &["#", "//", "--", "/*", "<!--", ";", "%"];

/// Infer a language from the first code line and the class names found on
/// the code element and its descendants.
#[must_use]
pub fn detect_language(first_line: &str, class_names: &[&str]) -> LanguageTag {
    if let Some(tag) = explicit_class(class_names) {
        return tag;
    }
    if let Some(tag) = from_file_comment(first_line) {
        return tag;
    }
    from_highlighter(class_names).unwrap_or(LanguageTag::Unknown)
}

fn explicit_class(class_names: &[&str]) -> Option<LanguageTag> {
    class_names.iter().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|name| !name.is_empty())
            .map(LanguageTag::from_name)
    })
}

fn from_file_comment(first_line: &str) -> Option<LanguageTag> {
    let line = first_line.trim();
    let body = COMMENT_PREFIXES
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))?;
    let token = body
        .trim()
        .trim_end_matches("-->")
        .trim_end_matches("*/")
        .split_whitespace()
        .last()?
        .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | ':' | ',' | '(' | ')' | '<' | '>'))
        .to_ascii_lowercase();

    EXTENSION_RULES
        .iter()
        .find(|(suffix, _)| token.ends_with(suffix) && token.len() > 1)
        .map(|(_, tag)| *tag)
}

fn from_highlighter(class_names: &[&str]) -> Option<LanguageTag> {
    HIGHLIGHTER_RULES
        .iter()
        .find(|(required, _)| required.iter().all(|r| class_names.contains(r)))
        .map(|(_, tag)| *tag)
}
