// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Analyze
//!
//! Detects UI patterns through the ensemble and audits the design for style
//! inconsistencies. Learning moves the ensemble's acceptance thresholds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::lifecycle::AgentBehavior;
use crate::application::patterns::PatternEnsemble;
use crate::domain::agent::AgentError;
use crate::domain::design::{FlatNode, NodeType};
use crate::domain::feedback::{failure_ratio, FeedbackItem};
use crate::domain::pipeline::{DesignAnalysis, EnrichedNode, ParsedDesign, Severity, StyleIssue};

/// Tunables of the style audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleRules {
    /// Spacing and padding are expected to be multiples of this.
    pub spacing_grid: f64,
    /// More distinct font sizes than this is reported as sprawl.
    pub max_font_sizes: usize,
    pub unreferenced_fill: Severity,
    pub raw_text_style: Severity,
    pub font_size_sprawl: Severity,
    pub off_grid_spacing: Severity,
}

impl Default for StyleRules {
    fn default() -> Self {
        Self {
            spacing_grid: 4.0,
            max_font_sizes: 6,
            unreferenced_fill: Severity::Info,
            raw_text_style: Severity::Warning,
            font_size_sprawl: Severity::Warning,
            off_grid_spacing: Severity::Info,
        }
    }
}

impl StyleRules {
    pub fn audit(&self, nodes: &[FlatNode]) -> Vec<StyleIssue> {
        let mut issues = Vec::new();
        let mut font_sizes = BTreeSet::new();

        for node in nodes {
            if !node.fill_colors.is_empty()
                && node.node_type != NodeType::Text
                && !node.style_refs.contains_key("fill")
            {
                issues.push(StyleIssue {
                    rule_id: "unreferenced-fill".into(),
                    node_id: Some(node.id.clone()),
                    severity: self.unreferenced_fill,
                    message: format!(
                        "'{}' uses raw fill {} instead of a shared color style",
                        node.name,
                        node.fill_colors.join(", ")
                    ),
                });
            }

            if node.node_type == NodeType::Text {
                if let Some(size) = node.font_size {
                    // Half-pixel buckets; sizes are compared, not rendered.
                    font_sizes.insert((size * 2.0).round() as i64);
                }
                if !node.style_refs.contains_key("text") {
                    issues.push(StyleIssue {
                        rule_id: "raw-text-style".into(),
                        node_id: Some(node.id.clone()),
                        severity: self.raw_text_style,
                        message: format!("Text '{}' has no shared text style", node.name),
                    });
                }
            }

            let off_grid: Vec<f64> = node
                .item_spacing
                .iter()
                .chain(node.paddings.iter())
                .copied()
                .filter(|v| !self.on_grid(*v))
                .collect();
            if !off_grid.is_empty() {
                issues.push(StyleIssue {
                    rule_id: "off-grid-spacing".into(),
                    node_id: Some(node.id.clone()),
                    severity: self.off_grid_spacing,
                    message: format!(
                        "'{}' spacing {:?} is off the {}px grid",
                        node.name, off_grid, self.spacing_grid
                    ),
                });
            }
        }

        if font_sizes.len() > self.max_font_sizes {
            issues.push(StyleIssue {
                rule_id: "font-size-sprawl".into(),
                node_id: None,
                severity: self.font_size_sprawl,
                message: format!(
                    "{} distinct font sizes in use (limit {})",
                    font_sizes.len(),
                    self.max_font_sizes
                ),
            });
        }
        issues
    }

    fn on_grid(&self, value: f64) -> bool {
        if self.spacing_grid <= 0.0 {
            return true;
        }
        let remainder = value.rem_euclid(self.spacing_grid);
        remainder < 1e-6 || (self.spacing_grid - remainder) < 1e-6
    }
}

pub struct AnalyzeBehavior {
    ensemble: Arc<PatternEnsemble>,
    style_rules: StyleRules,
}

impl AnalyzeBehavior {
    pub fn new(ensemble: Arc<PatternEnsemble>) -> Self {
        Self {
            ensemble,
            style_rules: StyleRules::default(),
        }
    }

    pub fn with_style_rules(mut self, style_rules: StyleRules) -> Self {
        self.style_rules = style_rules;
        self
    }

    pub fn ensemble(&self) -> &Arc<PatternEnsemble> {
        &self.ensemble
    }
}

#[async_trait]
impl AgentBehavior for AnalyzeBehavior {
    type Input = Arc<ParsedDesign>;
    type Output = DesignAnalysis;

    fn validate_input(&self, input: &Arc<ParsedDesign>) -> Result<(), AgentError> {
        if input.nodes.is_empty() {
            return Err(AgentError::invalid_input("nodes", "design has no nodes"));
        }
        Ok(())
    }

    async fn execute(&self, input: &Arc<ParsedDesign>) -> Result<DesignAnalysis, AgentError> {
        let patterns = self.ensemble.detect(&input.nodes).await;
        let style_issues = self.style_rules.audit(&input.nodes);

        let enriched_nodes = input
            .nodes
            .iter()
            .map(|node| EnrichedNode {
                patterns: patterns.patterns_for_node(&node.id),
                node: node.clone(),
            })
            .collect();

        debug!(
            patterns = patterns.len(),
            style_issues = style_issues.len(),
            "Design analyzed"
        );
        Ok(DesignAnalysis {
            parsed: input.clone(),
            patterns,
            style_issues,
            enriched_nodes,
        })
    }

    fn perform_learning(&self, feedback: &[FeedbackItem], learning_rate: f64) -> Result<(), AgentError> {
        let before = self.ensemble.thresholds();
        let after = before.adjusted(failure_ratio(feedback), learning_rate);
        self.ensemble.set_thresholds(after);
        info!(
            rule_before = before.rule,
            rule_after = after.rule,
            classifier_before = before.classifier,
            classifier_after = after.classifier,
            "Adjusted pattern thresholds"
        );
        Ok(())
    }
}
