// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Rule-based pattern detection
//
// Each pattern owns an ordered list of rules; a rule is a conjunction of
// conditions plus the confidence it grants. For every node the strongest
// matching rule wins, and the node is attributed only when that confidence
// is strictly above the threshold. A rule that cannot be evaluated for a
// node (missing geometry, failing custom predicate) is skipped for that
// node and logged.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::design::{FlatNode, LayoutMode, NodeType};
use crate::domain::pattern::{PatternMatch, PatternSource};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleError {
    #[error("node '{node_id}' has no {field}")]
    MissingField { node_id: String, field: &'static str },

    #[error("predicate '{name}' failed: {message}")]
    Predicate { name: String, message: String },
}

pub type PredicateFn = dyn Fn(&FlatNode) -> Result<bool, RuleError> + Send + Sync;

#[derive(Clone)]
pub enum RuleCondition {
    TypeIn(Vec<NodeType>),
    /// Any of the fragments appears in the node name (case-insensitive).
    NameContains(Vec<String>),
    HasTextChild,
    HasImageFill,
    HasStroke,
    MinChildren(usize),
    MaxChildren(usize),
    ChildTypeIn(Vec<NodeType>),
    /// At least `min` direct children share one type.
    RepeatedChildren { min: usize },
    AspectRatio { min: f64, max: f64 },
    Height { min: f64, max: f64 },
    MinCornerRadius(f64),
    Layout(LayoutMode),
    MinFontSize(f64),
    Not(Box<RuleCondition>),
    Custom { name: String, predicate: Arc<PredicateFn> },
}

impl fmt::Debug for RuleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCondition::Custom { name, .. } => write!(f, "Custom({name})"),
            RuleCondition::Not(inner) => write!(f, "Not({inner:?})"),
            RuleCondition::TypeIn(types) => write!(f, "TypeIn({types:?})"),
            RuleCondition::NameContains(names) => write!(f, "NameContains({names:?})"),
            RuleCondition::ChildTypeIn(types) => write!(f, "ChildTypeIn({types:?})"),
            RuleCondition::AspectRatio { min, max } => write!(f, "AspectRatio({min}..{max})"),
            RuleCondition::Height { min, max } => write!(f, "Height({min}..{max})"),
            other => write!(f, "{}", other.label()),
        }
    }
}

impl RuleCondition {
    pub fn name_contains<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RuleCondition::NameContains(fragments.into_iter().map(Into::into).collect())
    }

    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&FlatNode) -> Result<bool, RuleError> + Send + Sync + 'static,
    {
        RuleCondition::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RuleCondition::TypeIn(_) => "TypeIn",
            RuleCondition::NameContains(_) => "NameContains",
            RuleCondition::HasTextChild => "HasTextChild",
            RuleCondition::HasImageFill => "HasImageFill",
            RuleCondition::HasStroke => "HasStroke",
            RuleCondition::MinChildren(_) => "MinChildren",
            RuleCondition::MaxChildren(_) => "MaxChildren",
            RuleCondition::ChildTypeIn(_) => "ChildTypeIn",
            RuleCondition::RepeatedChildren { .. } => "RepeatedChildren",
            RuleCondition::AspectRatio { .. } => "AspectRatio",
            RuleCondition::Height { .. } => "Height",
            RuleCondition::MinCornerRadius(_) => "MinCornerRadius",
            RuleCondition::Layout(_) => "Layout",
            RuleCondition::MinFontSize(_) => "MinFontSize",
            RuleCondition::Not(_) => "Not",
            RuleCondition::Custom { .. } => "Custom",
        }
    }

    pub fn evaluate(&self, node: &FlatNode) -> Result<bool, RuleError> {
        let missing = |field| RuleError::MissingField {
            node_id: node.id.clone(),
            field,
        };
        Ok(match self {
            RuleCondition::TypeIn(types) => types.contains(&node.node_type),
            RuleCondition::NameContains(fragments) => {
                fragments.iter().any(|fragment| node.name_contains(fragment))
            }
            RuleCondition::HasTextChild => node.has_text_child,
            RuleCondition::HasImageFill => node.has_image_fill,
            RuleCondition::HasStroke => node.stroke_count > 0,
            RuleCondition::MinChildren(min) => node.child_count >= *min,
            RuleCondition::MaxChildren(max) => node.child_count <= *max,
            RuleCondition::ChildTypeIn(types) => {
                node.child_types.iter().any(|t| types.contains(t))
            }
            RuleCondition::RepeatedChildren { min } => {
                let mut counts: BTreeMap<NodeType, usize> = BTreeMap::new();
                for t in &node.child_types {
                    *counts.entry(*t).or_default() += 1;
                }
                counts.values().any(|count| count >= min)
            }
            RuleCondition::AspectRatio { min, max } => {
                let bounds = node.bounds.ok_or_else(|| missing("bounds"))?;
                let ratio = bounds.aspect_ratio();
                ratio >= *min && ratio <= *max
            }
            RuleCondition::Height { min, max } => {
                let bounds = node.bounds.ok_or_else(|| missing("bounds"))?;
                bounds.height >= *min && bounds.height <= *max
            }
            RuleCondition::MinCornerRadius(min) => node.corner_radius.unwrap_or(0.0) >= *min,
            RuleCondition::Layout(mode) => node.layout_mode == Some(*mode),
            RuleCondition::MinFontSize(min) => {
                node.font_size.ok_or_else(|| missing("font size"))? >= *min
            }
            RuleCondition::Not(inner) => !inner.evaluate(node)?,
            RuleCondition::Custom { predicate, .. } => predicate(node)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub name: String,
    pub confidence: f64,
    pub conditions: Vec<RuleCondition>,
}

impl PatternRule {
    pub fn new(name: impl Into<String>, confidence: f64, conditions: Vec<RuleCondition>) -> Self {
        Self {
            name: name.into(),
            confidence,
            conditions,
        }
    }

    /// All conditions must hold. Evaluation stops at the first false one.
    pub fn matches(&self, node: &FlatNode) -> Result<bool, RuleError> {
        for condition in &self.conditions {
            if !condition.evaluate(node)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Ordered rule lists keyed by pattern name.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    patterns: BTreeMap<String, Vec<PatternRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, pattern: &str, rule: PatternRule) -> Self {
        self.add_rule(pattern, rule);
        self
    }

    pub fn add_rule(&mut self, pattern: &str, rule: PatternRule) {
        self.patterns.entry(pattern.to_string()).or_default().push(rule);
    }

    pub fn pattern_names(&self) -> Vec<String> {
        self.patterns.keys().cloned().collect()
    }

    /// Evaluates every rule against every node.
    pub fn evaluate(&self, nodes: &[FlatNode], threshold: f64) -> Vec<PatternMatch> {
        let mut matches = Vec::new();
        for (pattern, rules) in &self.patterns {
            for node in nodes {
                let mut best: Option<f64> = None;
                for rule in rules {
                    match rule.matches(node) {
                        Ok(true) => {
                            if best.map_or(true, |b| rule.confidence > b) {
                                best = Some(rule.confidence);
                            }
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!(pattern = %pattern, rule = %rule.name, error = %e, "Skipping rule");
                        }
                    }
                }
                if let Some(confidence) = best.filter(|c| *c > threshold) {
                    matches.push(PatternMatch::new(
                        pattern.clone(),
                        node.id.clone(),
                        confidence,
                        PatternSource::Rule,
                    ));
                }
            }
        }
        debug!(count = matches.len(), "Rule evaluation finished");
        matches
    }

    /// Built-in rule tables.
    pub fn default_rules() -> Self {
        use RuleCondition::*;
        let containers = vec![
            NodeType::Frame,
            NodeType::Group,
            NodeType::Component,
            NodeType::Instance,
        ];

        RuleSet::new()
            // button
            .with_rule("button", PatternRule::new("named-button", 0.9, vec![
                TypeIn(containers.clone()),
                RuleCondition::name_contains(["button", "btn", "cta"]),
            ]))
            .with_rule("button", PatternRule::new("pill-with-label", 0.75, vec![
                TypeIn(containers.clone()),
                HasTextChild,
                MaxChildren(3),
                MinCornerRadius(4.0),
                AspectRatio { min: 1.5, max: 8.0 },
                Height { min: 24.0, max: 64.0 },
            ]))
            // input
            .with_rule("input", PatternRule::new("named-input", 0.9, vec![
                TypeIn(containers.clone()),
                RuleCondition::name_contains(["input", "text field", "textfield", "search"]),
            ]))
            .with_rule("input", PatternRule::new("outlined-field", 0.7, vec![
                TypeIn(containers.clone()),
                HasStroke,
                HasTextChild,
                AspectRatio { min: 3.0, max: 20.0 },
                Height { min: 28.0, max: 64.0 },
            ]))
            // card
            .with_rule("card", PatternRule::new("named-card", 0.85, vec![
                TypeIn(containers.clone()),
                RuleCondition::name_contains(["card", "tile"]),
            ]))
            .with_rule("card", PatternRule::new("rounded-panel", 0.65, vec![
                TypeIn(containers.clone()),
                MinChildren(2),
                MinCornerRadius(8.0),
                ChildTypeIn(vec![NodeType::Text]),
                AspectRatio { min: 0.4, max: 2.5 },
            ]))
            // list
            .with_rule("list", PatternRule::new("named-list", 0.85, vec![
                TypeIn(containers.clone()),
                RuleCondition::name_contains(["list", "items", "feed"]),
            ]))
            .with_rule("list", PatternRule::new("repeated-children", 0.7, vec![
                TypeIn(containers.clone()),
                Layout(LayoutMode::Vertical),
                RepeatedChildren { min: 3 },
            ]))
            // navigation
            .with_rule("navigation", PatternRule::new("named-nav", 0.9, vec![
                TypeIn(containers.clone()),
                RuleCondition::name_contains(["nav", "menu", "header", "tabs", "toolbar"]),
            ]))
            .with_rule("navigation", PatternRule::new("horizontal-links", 0.6, vec![
                TypeIn(containers),
                Layout(LayoutMode::Horizontal),
                RepeatedChildren { min: 3 },
                AspectRatio { min: 4.0, max: 100.0 },
            ]))
            // image
            .with_rule("image", PatternRule::new("image-fill", 0.9, vec![HasImageFill]))
            .with_rule("image", PatternRule::new("named-image", 0.7, vec![
                RuleCondition::name_contains(["image", "img", "photo", "avatar", "icon"]),
                Not(Box::new(HasTextChild)),
            ]))
            // heading
            .with_rule("heading", PatternRule::new("large-text", 0.8, vec![
                TypeIn(vec![NodeType::Text]),
                MinFontSize(24.0),
            ]))
            .with_rule("heading", PatternRule::new("named-title", 0.7, vec![
                TypeIn(vec![NodeType::Text]),
                RuleCondition::name_contains(["title", "heading", "headline"]),
            ]))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::design::Bounds;
    use std::collections::BTreeMap;

    pub(crate) fn node(id: &str, name: &str, node_type: NodeType) -> FlatNode {
        FlatNode {
            id: id.into(),
            name: name.into(),
            node_type,
            parent_id: None,
            depth: 0,
            path: vec![name.into()],
            child_count: 0,
            child_types: vec![],
            has_text_child: false,
            has_image_fill: false,
            text: None,
            bounds: None,
            corner_radius: None,
            layout_mode: None,
            item_spacing: None,
            paddings: vec![],
            font_size: None,
            fill_colors: vec![],
            style_refs: BTreeMap::new(),
            stroke_count: 0,
        }
    }

    #[test]
    fn test_highest_matching_rule_wins() {
        let rules = RuleSet::new()
            .with_rule("button", PatternRule::new("weak", 0.6, vec![RuleCondition::TypeIn(vec![NodeType::Frame])]))
            .with_rule("button", PatternRule::new("strong", 0.95, vec![RuleCondition::name_contains(["btn"])]))
            .with_rule("button", PatternRule::new("unmatched", 0.99, vec![RuleCondition::HasImageFill]));

        let matches = rules.evaluate(&[node("1", "Btn", NodeType::Frame)], 0.5);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].confidence, 0.95);
        assert_eq!(matches[0].source, PatternSource::Rule);
    }

    #[test]
    fn test_threshold_is_strict() {
        let rules = RuleSet::new().with_rule(
            "card",
            PatternRule::new("exact", 0.5, vec![RuleCondition::TypeIn(vec![NodeType::Frame])]),
        );
        assert!(rules.evaluate(&[node("1", "x", NodeType::Frame)], 0.5).is_empty());
        assert_eq!(rules.evaluate(&[node("1", "x", NodeType::Frame)], 0.49).len(), 1);
    }

    #[test]
    fn test_failing_rule_is_skipped_not_fatal() {
        let rules = RuleSet::new()
            .with_rule("button", PatternRule::new("geometry", 0.9, vec![RuleCondition::AspectRatio { min: 1.0, max: 5.0 }]))
            .with_rule("button", PatternRule::new("boom", 0.95, vec![RuleCondition::custom("boom", |n| {
                Err(RuleError::Predicate { name: "boom".into(), message: format!("cannot read {}", n.id) })
            })]))
            .with_rule("button", PatternRule::new("name", 0.7, vec![RuleCondition::name_contains(["button"])]));

        let matches = rules.evaluate(
            &[node("1", "Button", NodeType::Frame), node("2", "Other", NodeType::Frame)],
            0.5,
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].node_id, "1");
        assert_eq!(matches[0].confidence, 0.7);
    }

    #[test]
    fn test_default_rules_detect_common_patterns() {
        let mut button = node("b", "Checkout", NodeType::Instance);
        button.has_text_child = true;
        button.child_count = 1;
        button.child_types = vec![NodeType::Text];
        button.corner_radius = Some(6.0);
        button.bounds = Some(Bounds { x: 0.0, y: 0.0, width: 160.0, height: 40.0 });

        let mut heading = node("h", "Hero copy", NodeType::Text);
        heading.font_size = Some(32.0);

        let mut list = node("l", "Results", NodeType::Frame);
        list.layout_mode = Some(LayoutMode::Vertical);
        list.child_count = 4;
        list.child_types = vec![NodeType::Instance; 4];

        let matches = RuleSet::default_rules().evaluate(&[button, heading, list], 0.5);
        let found: Vec<(&str, &str)> = matches
            .iter()
            .map(|m| (m.pattern_name.as_str(), m.node_id.as_str()))
            .collect();
        assert!(found.contains(&("button", "b")));
        assert!(found.contains(&("heading", "h")));
        assert!(found.contains(&("list", "l")));
    }

    #[test]
    fn test_not_condition() {
        let mut n = node("1", "avatar", NodeType::Rectangle);
        let rule = PatternRule::new("r", 0.9, vec![RuleCondition::Not(Box::new(RuleCondition::HasTextChild))]);
        assert!(rule.matches(&n).unwrap());
        n.has_text_child = true;
        assert!(!rule.matches(&n).unwrap());
    }
}
