// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// In-tree linter and parser for generated code.
//
// Both are table driven. `RuleLinter` applies regex rules per language;
// `DelimiterParser` checks that brackets, braces, parentheses and markup
// tags balance, skipping string literals and comments.

use regex::Regex;
use tracing::warn;

use crate::domain::pipeline::Severity;
use crate::domain::tooling::{CheckOptions, LintIssue, Linter, ParseDiagnostic, SourceParser};

/// One line-oriented regex rule.
#[derive(Debug, Clone, Copy)]
pub struct TextRule {
    pub id: &'static str,
    pub pattern: &'static str,
    pub severity: Severity,
    pub message: &'static str,
    /// Languages the rule applies to; empty means all.
    pub languages: &'static [&'static str],
    /// Only applies when strict typing was requested.
    pub strict_only: bool,
}

struct CompiledRule {
    rule: TextRule,
    regex: Regex,
}

/// A compiled rule table. Rules whose pattern does not compile are dropped
/// with a warning.
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    pub fn new(rules: &[TextRule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| match Regex::new(rule.pattern) {
                Ok(regex) => Some(CompiledRule { rule: *rule, regex }),
                Err(e) => {
                    warn!(rule = rule.id, error = %e, "Dropping rule with invalid pattern");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule hit, one issue per matching line.
    pub fn scan(&self, content: &str, options: &CheckOptions) -> Vec<LintIssue> {
        let applicable: Vec<&CompiledRule> = self
            .rules
            .iter()
            .filter(|c| c.rule.languages.is_empty() || c.rule.languages.contains(&options.language.as_str()))
            .filter(|c| !c.rule.strict_only || options.strict_types)
            .collect();

        let mut issues = Vec::new();
        for (index, line) in content.lines().enumerate() {
            for compiled in &applicable {
                if compiled.regex.is_match(line) {
                    issues.push(LintIssue {
                        rule_id: compiled.rule.id.to_string(),
                        severity: compiled.rule.severity,
                        message: compiled.rule.message.to_string(),
                        line: Some(index + 1),
                    });
                }
            }
        }
        issues
    }
}

const SCRIPT: &[&str] = &["typescript", "tsx", "jsx", "javascript", "vue"];

pub const DEFAULT_LINT_RULES: &[TextRule] = &[
    TextRule {
        id: "no-explicit-any",
        pattern: r":\s*any\b|<any>|\bas any\b",
        severity: Severity::Warning,
        message: "Avoid `any` under strict typing",
        languages: &["typescript", "tsx", "vue"],
        strict_only: true,
    },
    TextRule {
        id: "no-console",
        pattern: r"\bconsole\.(log|debug|info)\(",
        severity: Severity::Warning,
        message: "Remove console output",
        languages: SCRIPT,
        strict_only: false,
    },
    TextRule {
        id: "no-debugger",
        pattern: r"^\s*debugger;?\s*$",
        severity: Severity::Error,
        message: "Remove debugger statement",
        languages: SCRIPT,
        strict_only: false,
    },
    TextRule {
        id: "no-var",
        pattern: r"^\s*var\s+\w",
        severity: Severity::Warning,
        message: "Use `const` or `let`",
        languages: SCRIPT,
        strict_only: false,
    },
    TextRule {
        id: "no-trailing-whitespace",
        pattern: r"[ \t]+$",
        severity: Severity::Info,
        message: "Trailing whitespace",
        languages: &[],
        strict_only: false,
    },
];

pub struct RuleLinter {
    table: RuleTable,
}

impl RuleLinter {
    pub fn new(rules: &[TextRule]) -> Self {
        Self {
            table: RuleTable::new(rules),
        }
    }
}

impl Default for RuleLinter {
    fn default() -> Self {
        Self::new(DEFAULT_LINT_RULES)
    }
}

impl Linter for RuleLinter {
    fn lint(&self, content: &str, options: &CheckOptions) -> Vec<LintIssue> {
        self.table.scan(content, options)
    }
}

/// Delimiter-balance parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimiterParser;

impl DelimiterParser {
    pub fn new() -> Self {
        Self
    }

    fn check_brackets(content: &str, line_comments: bool) -> Vec<ParseDiagnostic> {
        let mut stack: Vec<(char, usize)> = Vec::new();
        let mut line = 1;
        let mut chars = content.chars().peekable();
        let mut quote: Option<char> = None;

        while let Some(c) = chars.next() {
            if c == '\n' {
                line += 1;
            }
            if let Some(q) = quote {
                if c == '\\' {
                    if chars.next() == Some('\n') {
                        line += 1;
                    }
                } else if c == q {
                    quote = None;
                } else if c == '\n' && q != '`' {
                    // Unterminated single-line string; resync at end of line.
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' | '`' => quote = Some(c),
                '/' if line_comments && chars.peek() == Some(&'/') => {
                    for next in chars.by_ref() {
                        if next == '\n' {
                            line += 1;
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    let mut prev = ' ';
                    for next in chars.by_ref() {
                        if next == '\n' {
                            line += 1;
                        }
                        if prev == '*' && next == '/' {
                            break;
                        }
                        prev = next;
                    }
                }
                '(' | '[' | '{' => stack.push((c, line)),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        Some((open, opened_at)) => {
                            return vec![ParseDiagnostic {
                                message: format!("'{}' closes '{}' opened on line {}", c, open, opened_at),
                                line: Some(line),
                            }]
                        }
                        None => {
                            return vec![ParseDiagnostic {
                                message: format!("Unexpected '{}'", c),
                                line: Some(line),
                            }]
                        }
                    }
                }
                _ => {}
            }
        }

        stack
            .into_iter()
            .map(|(open, opened_at)| ParseDiagnostic {
                message: format!("Unclosed '{}'", open),
                line: Some(opened_at),
            })
            .collect()
    }

    fn check_tags(content: &str) -> Vec<ParseDiagnostic> {
        const VOID: &[&str] = &[
            "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
        ];
        let tag = tag_regex();
        let mut stack: Vec<(String, usize)> = Vec::new();
        // Script and style bodies are not markup.
        let mut raw_text: Option<String> = None;

        for (index, line) in content.lines().enumerate() {
            if let Some(name) = &raw_text {
                if line.to_lowercase().contains(&format!("</{}", name)) {
                    stack.pop();
                    raw_text = None;
                }
                continue;
            }
            for caps in tag.captures_iter(line) {
                let closing = !caps[1].is_empty();
                let name = caps[2].to_lowercase();
                let self_closing = caps[0].ends_with("/>");
                if self_closing || VOID.contains(&name.as_str()) {
                    continue;
                }
                if !closing {
                    stack.push((name, index + 1));
                    continue;
                }
                match stack.iter().rposition(|(open, _)| *open == name) {
                    Some(position) if position + 1 == stack.len() => {
                        stack.pop();
                    }
                    Some(position) => {
                        let (inner, opened_at) = &stack[position + 1];
                        return vec![ParseDiagnostic {
                            message: format!("</{}> closes before <{}> opened on line {}", name, inner, opened_at),
                            line: Some(index + 1),
                        }];
                    }
                    None => {
                        return vec![ParseDiagnostic {
                            message: format!("Unexpected </{}>", name),
                            line: Some(index + 1),
                        }]
                    }
                }
            }
            if let Some((name, opened_at)) = stack.last() {
                if *opened_at == index + 1 && (name == "script" || name == "style") {
                    raw_text = Some(name.clone());
                }
            }
        }

        stack
            .into_iter()
            .map(|(name, opened_at)| ParseDiagnostic {
                message: format!("Unclosed <{}>", name),
                line: Some(opened_at),
            })
            .collect()
    }
}

fn tag_regex() -> &'static Regex {
    static TAG: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r#"<(/?)([A-Za-z][\w-]*)(?:\s[^<>]*?)?\s*/?>"#).expect("valid tag regex")
    })
}

impl SourceParser for DelimiterParser {
    fn parse(&self, content: &str, options: &CheckOptions) -> Vec<ParseDiagnostic> {
        match options.language.as_str() {
            "html" | "vue" => Self::check_tags(content),
            "typescript" | "tsx" | "jsx" | "javascript" => Self::check_brackets(content, true),
            "scss" => Self::check_brackets(content, true),
            "css" => Self::check_brackets(content, false),
            _ => Vec::new(),
        }
    }
}
