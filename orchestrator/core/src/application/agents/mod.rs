// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Specialized Agents
//!
//! The five behaviors the pipeline runs, one per stage. Each is wrapped in an
//! [`Agent`](crate::application::lifecycle::Agent) by the orchestrator.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Stage logic (parse, analyze, map, generate, validate)

pub mod analyze;
pub mod generate;
pub mod map;
pub mod parse;
pub mod validate;

pub use analyze::{AnalyzeBehavior, StyleRules};
pub use generate::{GenerateBehavior, GenerateRequest};
pub use map::MapBehavior;
pub use parse::ParseBehavior;
pub use validate::ValidateBehavior;

use crate::domain::agent::AgentIdentity;
use crate::domain::feedback::FeedbackItem;
use crate::domain::pipeline::Stage;

/// Identity of the agent running `stage`.
pub fn stage_identity(stage: Stage) -> AgentIdentity {
    let capabilities: &[&str] = match stage {
        Stage::Parse => &["parse", "design-import"],
        Stage::Analyze => &["analyze", "pattern-detection", "style-audit"],
        Stage::Map => &["map", "component-mapping"],
        Stage::Generate => &["generate", "code-generation"],
        Stage::Validate => &["validate", "lint", "scoring"],
    };
    let name = match stage {
        Stage::Parse => "parser",
        Stage::Analyze => "analyzer",
        Stage::Map => "mapper",
        Stage::Generate => "generator",
        Stage::Validate => "validator",
    };
    AgentIdentity::new(name, capabilities.iter().copied())
}

/// One-line summary of a feedback window, for agents without tunables.
pub(crate) fn learning_note(feedback: &[FeedbackItem]) -> String {
    let failures = feedback.iter().filter(|f| !f.success).count();
    let last_error = feedback
        .iter()
        .find(|f| !f.success)
        .and_then(|f| f.payload.get("error"))
        .and_then(|e| e.as_str())
        .unwrap_or("none");
    format!(
        "{} of {} recent executions failed; latest error: {}",
        failures,
        feedback.len(),
        last_error
    )
}

/// `PascalCase` from free text; never empty, never starts with a digit.
pub(crate) fn pascal_case(text: &str) -> String {
    let mut out = String::new();
    for word in words(text) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    if out.is_empty() {
        out.push_str("Component");
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'C');
    }
    out
}

/// `camelCase` from free text.
pub(crate) fn camel_case(text: &str) -> String {
    let pascal = pascal_case(text);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => pascal,
    }
}

/// `kebab-case` from a PascalCase identifier.
pub(crate) fn kebab_case(pascal: &str) -> String {
    let mut out = String::new();
    for (i, c) in pascal.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push('-');
        }
        out.extend(c.to_lowercase());
    }
    out
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}
