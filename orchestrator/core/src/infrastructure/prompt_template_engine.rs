// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Template Engine
//!
//! Renders the prompts sent to the text-generation provider. Templates are
//! Handlebars files shipped under `templates/` and registered by name.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Turn stage data into provider prompts
//!
//! # Built-in templates
//!
//! - `classify_patterns` - free-text pattern classification fallback
//! - `component_angular`, `component_react`, `component_vue` - one component
//! - `layout` - page composing every generated component

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

use crate::domain::pipeline::Framework;

pub const CLASSIFY_PATTERNS: &str = "classify_patterns";
pub const LAYOUT: &str = "layout";

const BUILTIN_TEMPLATES: [(&str, &str); 5] = [
    (CLASSIFY_PATTERNS, include_str!("../../templates/classify_patterns.hbs")),
    ("component_angular", include_str!("../../templates/component_angular.hbs")),
    ("component_react", include_str!("../../templates/component_react.hbs")),
    ("component_vue", include_str!("../../templates/component_vue.hbs")),
    (LAYOUT, include_str!("../../templates/layout.hbs")),
];

/// Template name for a component prompt in `framework`.
pub fn component_template(framework: Framework) -> &'static str {
    match framework {
        Framework::Angular => "component_angular",
        Framework::React => "component_react",
        Framework::Vue => "component_vue",
    }
}

pub struct PromptTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl PromptTemplateEngine {
    /// Engine with every built-in template registered.
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are plain text; HTML escaping would mangle markup hints.
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, source) in BUILTIN_TEMPLATES {
            handlebars
                .register_template_string(name, source)
                .with_context(|| format!("Invalid built-in template '{}'", name))?;
        }
        Ok(Self { handlebars })
    }

    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .with_context(|| format!("Failed to render prompt template '{}'", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtins_render_with_missing_variables() {
        let engine = PromptTemplateEngine::new().unwrap();
        for framework in [Framework::Angular, Framework::React, Framework::Vue] {
            assert!(engine.render(component_template(framework), &json!({})).is_ok());
        }
        assert!(engine.render(CLASSIFY_PATTERNS, &json!({})).is_ok());
        assert!(engine.render(LAYOUT, &json!({})).is_ok());
    }

    #[test]
    fn test_component_prompt_lists_files_and_inputs() {
        let engine = PromptTemplateEngine::new().unwrap();
        let context = json!({
            "component": {
                "componentName": "PrimaryButton",
                "selector": "app-primary-button",
                "rootElement": "button",
                "patterns": ["button"],
                "inputs": [{ "name": "label", "typeName": "string", "defaultValue": "Buy" }],
                "elements": [{ "element": "span", "text": "Buy" }],
                "styles": { "border-radius": "8px" }
            },
            "options": { "styling": "scss", "strictTypes": true },
            "files": ["primary-button.component.ts", "primary-button.component.html"]
        });

        let prompt = engine.render("component_angular", &context).unwrap();
        assert!(prompt.contains("Selector: app-primary-button"));
        assert!(prompt.contains("- label: string = \"Buy\""));
        assert!(prompt.contains("- border-radius: 8px"));
        assert!(prompt.contains("- primary-button.component.html"));
        assert!(prompt.contains("<span>"));
    }

    #[test]
    fn test_unknown_template_errors() {
        let engine = PromptTemplateEngine::new().unwrap();
        let err = engine.render("component_svelte", &json!({})).unwrap_err();
        assert!(err.to_string().contains("component_svelte"));
    }
}
