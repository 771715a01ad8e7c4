// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Lenient extraction of structured content from generated text.
//
// Providers wrap answers in prose and markdown fences with varying
// discipline. These helpers recover JSON payloads and code blocks without
// assuming a strict format.

use regex::Regex;
use std::sync::OnceLock;

/// A fenced code block. `path` comes from a `path=` or `file=` attribute in
/// the info string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub path: Option<String>,
    pub content: String,
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```([^\n`]*)\n(.*?)```").expect("valid fence regex")
    })
}

/// Content of the first ```json block, else of the first fence whose body
/// looks like JSON.
pub fn extract_fenced_json(text: &str) -> Option<String> {
    let blocks = extract_code_blocks(text);
    if let Some(block) = blocks
        .iter()
        .find(|b| b.language.as_deref() == Some("json"))
    {
        return Some(block.content.trim().to_string());
    }
    blocks
        .into_iter()
        .map(|b| b.content.trim().to_string())
        .find(|c| c.starts_with('{') || c.starts_with('['))
}

/// The outermost `{...}` or `[...]` span, whichever opens first.
pub fn extract_braced(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| text[start..=end].to_string())
}

/// Structured block first, then a bare JSON span.
pub fn extract_json_value(text: &str) -> Option<serde_json::Value> {
    extract_fenced_json(text)
        .and_then(|s| serde_json::from_str(&s).ok())
        .or_else(|| extract_braced(text).and_then(|s| serde_json::from_str(&s).ok()))
}

pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    fence_regex()
        .captures_iter(text)
        .map(|caps| {
            let info = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let mut language = None;
            let mut path = None;
            for token in info.split_whitespace() {
                if let Some(value) = token
                    .strip_prefix("path=")
                    .or_else(|| token.strip_prefix("file="))
                {
                    path = Some(value.trim_matches(|c| c == '"' || c == '\'').to_string());
                } else if language.is_none() {
                    language = Some(token.to_lowercase());
                }
            }
            CodeBlock {
                language,
                path,
                content: caps
                    .get(2)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            }
        })
        .collect()
}
