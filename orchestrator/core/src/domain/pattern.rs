// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Pattern Domain Model
//
// A pattern is a named UI role ("button", "card", ...) attributed to a visual
// node with a confidence. Matches come from two sources: deterministic rules
// and a classifier. PatternResults aggregates them per pattern name.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSource {
    Rule,
    Classifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternMatch {
    pub pattern_name: String,
    pub node_id: String,
    pub confidence: f64,
    pub source: PatternSource,
}

impl PatternMatch {
    pub fn new(
        pattern_name: impl Into<String>,
        node_id: impl Into<String>,
        confidence: f64,
        source: PatternSource,
    ) -> Self {
        Self {
            pattern_name: pattern_name.into(),
            node_id: node_id.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }
}

/// Aggregate of every match contributing to one pattern name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSummary {
    pub count: usize,
    pub average_confidence: f64,
    pub node_ids: BTreeSet<String>,
    #[serde(default, skip_serializing)]
    contributions: Vec<PatternMatch>,
}

impl PatternSummary {
    fn from_contributions(contributions: Vec<PatternMatch>) -> Self {
        let node_ids: BTreeSet<String> =
            contributions.iter().map(|m| m.node_id.clone()).collect();
        let average_confidence = if contributions.is_empty() {
            0.0
        } else {
            contributions.iter().map(|m| m.confidence).sum::<f64>() / contributions.len() as f64
        };
        Self {
            count: node_ids.len(),
            average_confidence,
            node_ids,
            contributions,
        }
    }

    /// Confidence and owning source for one node. Rule matches own a node
    /// whenever one exists.
    pub fn attribution(&self, node_id: &str) -> Option<(f64, PatternSource)> {
        let mut classifier = None;
        for m in self.contributions.iter().filter(|m| m.node_id == node_id) {
            if m.source == PatternSource::Rule {
                return Some((m.confidence, PatternSource::Rule));
            }
            classifier.get_or_insert((m.confidence, PatternSource::Classifier));
        }
        classifier
    }

    pub fn contributions(&self) -> &[PatternMatch] {
        &self.contributions
    }
}

/// Per-pattern aggregation of an ensemble pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternResults {
    patterns: BTreeMap<String, PatternSummary>,
}

impl PatternResults {
    pub fn from_matches(matches: Vec<PatternMatch>) -> Self {
        Self::merge(matches, Vec::new())
    }

    /// Combines rule and classifier output.
    ///
    /// Rule patterns absorb classifier hits for the same name: new node ids
    /// are added once and every contributing confidence enters the mean.
    /// Patterns only the classifier produced are adopted as they are.
    /// Repeated `(pattern, node)` hits from one source count once, at their
    /// highest confidence.
    pub fn merge(rule_matches: Vec<PatternMatch>, classifier_matches: Vec<PatternMatch>) -> Self {
        let mut grouped: BTreeMap<String, Vec<PatternMatch>> = BTreeMap::new();
        for m in dedupe_matches(rule_matches)
            .into_iter()
            .chain(dedupe_matches(classifier_matches))
        {
            grouped.entry(m.pattern_name.clone()).or_default().push(m);
        }

        let patterns = grouped
            .into_iter()
            .map(|(name, contributions)| (name, PatternSummary::from_contributions(contributions)))
            .collect();
        Self { patterns }
    }

    pub fn get(&self, pattern_name: &str) -> Option<&PatternSummary> {
        self.patterns.get(pattern_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PatternSummary)> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Every pattern attributed to `node_id`, strongest first.
    pub fn patterns_for_node(&self, node_id: &str) -> Vec<NodePattern> {
        let mut found: Vec<NodePattern> = self
            .patterns
            .iter()
            .filter_map(|(name, summary)| {
                summary
                    .attribution(node_id)
                    .map(|(confidence, source)| NodePattern {
                        pattern_name: name.clone(),
                        confidence,
                        source,
                    })
            })
            .collect();
        found.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        found
    }

    /// Pattern name to node count, for cache keys and reports.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.patterns
            .iter()
            .map(|(name, summary)| (name.clone(), summary.count))
            .collect()
    }
}

/// Collapses repeated `(pattern, node)` pairs, keeping first-seen order and
/// the highest confidence.
pub fn dedupe_matches(matches: Vec<PatternMatch>) -> Vec<PatternMatch> {
    let mut kept: Vec<PatternMatch> = Vec::with_capacity(matches.len());
    for m in matches {
        match kept
            .iter_mut()
            .find(|k| k.pattern_name == m.pattern_name && k.node_id == m.node_id)
        {
            Some(existing) => {
                if m.confidence > existing.confidence {
                    existing.confidence = m.confidence;
                }
            }
            None => kept.push(m),
        }
    }
    kept
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePattern {
    pub pattern_name: String,
    pub confidence: f64,
    pub source: PatternSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, node: &str, confidence: f64) -> PatternMatch {
        PatternMatch::new(pattern, node, confidence, PatternSource::Rule)
    }

    fn classified(pattern: &str, node: &str, confidence: f64) -> PatternMatch {
        PatternMatch::new(pattern, node, confidence, PatternSource::Classifier)
    }

    #[test]
    fn test_rule_and_classifier_on_same_node_average() {
        let results = PatternResults::merge(
            vec![rule("button", "A", 0.9)],
            vec![classified("button", "A", 0.6)],
        );
        let button = results.get("button").unwrap();
        assert_eq!(button.count, 1);
        assert_eq!(button.node_ids.len(), 1);
        assert!((button.average_confidence - 0.75).abs() < 1e-9);
        assert_eq!(button.attribution("A"), Some((0.9, PatternSource::Rule)));
    }

    #[test]
    fn test_classifier_adds_unlisted_nodes() {
        let results = PatternResults::merge(
            vec![rule("card", "A", 0.8)],
            vec![classified("card", "B", 0.7), classified("card", "B", 0.7)],
        );
        let card = results.get("card").unwrap();
        assert_eq!(card.count, 2);
        assert!(card.node_ids.contains("B"));
        assert_eq!(card.attribution("B").map(|a| a.1), Some(PatternSource::Classifier));
    }

    #[test]
    fn test_repeated_classifier_hits_count_once() {
        let results = PatternResults::merge(
            vec![rule("button", "A", 0.9)],
            vec![classified("button", "A", 0.6), classified("button", "A", 0.6)],
        );
        let button = results.get("button").unwrap();
        assert_eq!(button.count, 1);
        assert!((button.average_confidence - 0.75).abs() < 1e-9);
        assert_eq!(button.contributions().len(), 2);
    }

    #[test]
    fn test_merge_ignores_duplicate_order() {
        let forward = PatternResults::merge(
            vec![rule("card", "A", 0.8)],
            vec![classified("card", "B", 0.5), classified("card", "B", 0.7)],
        );
        let reverse = PatternResults::merge(
            vec![rule("card", "A", 0.8)],
            vec![classified("card", "B", 0.7), classified("card", "B", 0.5)],
        );
        assert_eq!(
            forward.get("card").unwrap().average_confidence,
            reverse.get("card").unwrap().average_confidence
        );
        assert!((forward.get("card").unwrap().average_confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_classifier_only_pattern_adopted_verbatim() {
        let results = PatternResults::merge(
            vec![rule("button", "A", 0.9)],
            vec![classified("list", "L", 0.65)],
        );
        let list = results.get("list").unwrap();
        assert_eq!(list.count, 1);
        assert!((list.average_confidence - 0.65).abs() < 1e-9);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_patterns_for_node_sorted() {
        let results = PatternResults::merge(
            vec![rule("button", "A", 0.6), rule("card", "A", 0.9)],
            vec![],
        );
        let names: Vec<String> = results
            .patterns_for_node("A")
            .into_iter()
            .map(|p| p.pattern_name)
            .collect();
        assert_eq!(names, vec!["card".to_string(), "button".to_string()]);
        assert!(results.patterns_for_node("Z").is_empty());
    }

    #[test]
    fn test_serializes_as_map() {
        let results = PatternResults::from_matches(vec![rule("button", "A", 0.9)]);
        let value = serde_json::to_value(&results).unwrap();
        assert_eq!(value["button"]["count"], 1);
        assert_eq!(value["button"]["nodeIds"][0], "A");
        assert!(value["button"].get("contributions").is_none());
    }
}
