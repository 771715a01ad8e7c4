// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Pattern Detection Ensemble
//
// Rules always run. A second opinion comes from the classifier when it is
// enabled and the node set is large enough, otherwise from a free-text
// classification by the generation provider. The second opinion never fails
// the pass: any error there means it contributes nothing.

use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::patterns::classifier::{PatternClassifier, NONE_CLASS};
use crate::application::patterns::features::FeatureEncoder;
use crate::application::patterns::rules::RuleSet;
use crate::application::response_parsing::extract_json_value;
use crate::domain::config::PatternConfig;
use crate::domain::design::{FlatNode, NodeType};
use crate::domain::llm::{GenerationOptions, LLMProvider};
use crate::domain::pattern::{dedupe_matches, PatternMatch, PatternResults, PatternSource};
use crate::infrastructure::prompt_template_engine::{PromptTemplateEngine, CLASSIFY_PATTERNS};

/// Nodes sent to the provider per classification prompt.
const MAX_PROMPT_NODES: usize = 200;
/// Confidence given to a match recovered from prose without a number.
const PROSE_MATCH_CONFIDENCE: f64 = 0.7;

/// Acceptance thresholds, tuned by the Analyze agent's learning hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleThresholds {
    pub rule: f64,
    pub classifier: f64,
}

impl EnsembleThresholds {
    pub const MIN: f64 = 0.3;
    pub const MAX: f64 = 0.9;

    /// Moves both thresholds toward stricter acceptance when failures
    /// dominate, looser otherwise, by `learning_rate` of the imbalance.
    pub fn adjusted(&self, failure_ratio: f64, learning_rate: f64) -> Self {
        let delta = learning_rate * (failure_ratio - 0.5);
        Self {
            rule: (self.rule + delta).clamp(Self::MIN, Self::MAX),
            classifier: (self.classifier + delta).clamp(Self::MIN, Self::MAX),
        }
    }
}

pub struct PatternEnsemble {
    rules: RuleSet,
    encoder: FeatureEncoder,
    classifier: Option<Arc<dyn PatternClassifier>>,
    llm: Option<Arc<dyn LLMProvider>>,
    prompts: Arc<PromptTemplateEngine>,
    thresholds: RwLock<EnsembleThresholds>,
    min_classifier_nodes: usize,
    classifier_enabled: bool,
    llm_fallback: bool,
}

impl PatternEnsemble {
    pub fn new(
        rules: RuleSet,
        classifier: Option<Arc<dyn PatternClassifier>>,
        llm: Option<Arc<dyn LLMProvider>>,
        prompts: Arc<PromptTemplateEngine>,
        config: &PatternConfig,
    ) -> Self {
        Self {
            rules,
            encoder: FeatureEncoder::new(),
            classifier,
            llm,
            prompts,
            thresholds: RwLock::new(EnsembleThresholds {
                rule: config.rule_threshold,
                classifier: config.classifier_threshold,
            }),
            min_classifier_nodes: config.min_classifier_nodes,
            classifier_enabled: config.classifier_enabled,
            llm_fallback: config.llm_fallback,
        }
    }

    pub fn thresholds(&self) -> EnsembleThresholds {
        *self.thresholds.read()
    }

    pub fn set_thresholds(&self, thresholds: EnsembleThresholds) {
        *self.thresholds.write() = thresholds;
    }

    pub fn pattern_names(&self) -> Vec<String> {
        self.rules.pattern_names()
    }

    /// Runs rules plus the second opinion and merges them, rules first.
    pub async fn detect(&self, nodes: &[FlatNode]) -> PatternResults {
        let thresholds = self.thresholds();
        let candidates: Vec<FlatNode> = nodes
            .iter()
            .filter(|n| !matches!(n.node_type, NodeType::Document | NodeType::Canvas))
            .cloned()
            .collect();

        let rule_matches = self.rules.evaluate(&candidates, thresholds.rule);

        let classifier_matches = match &self.classifier {
            Some(classifier)
                if self.classifier_enabled && candidates.len() >= self.min_classifier_nodes =>
            {
                self.classify(classifier.as_ref(), &candidates, thresholds.classifier)
            }
            _ if self.llm_fallback => self.classify_with_llm(&candidates, thresholds.classifier).await,
            _ => Vec::new(),
        };

        info!(
            nodes = candidates.len(),
            rule_matches = rule_matches.len(),
            classifier_matches = classifier_matches.len(),
            "Pattern detection finished"
        );
        PatternResults::merge(rule_matches, classifier_matches)
    }

    fn classify(
        &self,
        classifier: &dyn PatternClassifier,
        nodes: &[FlatNode],
        threshold: f64,
    ) -> Vec<PatternMatch> {
        let features = self.encoder.encode_all(nodes);
        let predictions = match classifier.predict(&features) {
            Ok(predictions) => predictions,
            Err(e) => {
                warn!(error = %e, "Classifier failed; continuing with rules only");
                return Vec::new();
            }
        };
        let classes = classifier.classes();

        nodes
            .iter()
            .zip(predictions)
            .filter_map(|(node, distribution)| {
                let (best, probability) = distribution
                    .iter()
                    .copied()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
                let class = classes.get(best)?;
                (class != NONE_CLASS && probability > threshold).then(|| {
                    PatternMatch::new(class.clone(), node.id.clone(), probability, PatternSource::Classifier)
                })
            })
            .collect()
    }

    async fn classify_with_llm(&self, nodes: &[FlatNode], threshold: f64) -> Vec<PatternMatch> {
        let Some(llm) = &self.llm else {
            debug!("No generation provider for pattern classification");
            return Vec::new();
        };
        if nodes.is_empty() {
            return Vec::new();
        }

        let patterns = self.pattern_names();
        let prompt_nodes: Vec<Value> = nodes
            .iter()
            .take(MAX_PROMPT_NODES)
            .map(|n| {
                let bounds = n.bounds.unwrap_or_default();
                json!({
                    "id": n.id,
                    "node_type": n.node_type,
                    "name": n.name,
                    "child_count": n.child_count,
                    "width": bounds.width.round(),
                    "height": bounds.height.round(),
                })
            })
            .collect();
        let prompt = match self.prompts.render(
            CLASSIFY_PATTERNS,
            &json!({ "patterns": patterns, "nodes": prompt_nodes }),
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "Could not render classification prompt");
                return Vec::new();
            }
        };

        let options = GenerationOptions {
            temperature: Some(0.0),
            ..GenerationOptions::default()
        };
        let response = match llm.generate(&prompt, &options).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Free-text classification failed; continuing with rules only");
                return Vec::new();
            }
        };

        let known_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        parse_classification(&response.text, &patterns, &known_ids)
            .into_iter()
            .filter(|m| m.confidence > threshold)
            .collect()
    }
}

/// Reads a free-text classification answer.
///
/// Accepted shapes, in order: a JSON array of `{nodeId, pattern, confidence}`
/// objects or a JSON object keyed by node id (inside a fence or bare), then
/// prose lines that mention a known node id and a known pattern name.
/// Unknown node ids and pattern names are dropped.
pub fn parse_classification(
    text: &str,
    patterns: &[String],
    known_ids: &HashSet<&str>,
) -> Vec<PatternMatch> {
    let accept = |node_id: &str, pattern: &str, confidence: f64| -> Option<PatternMatch> {
        let pattern = pattern.trim().to_lowercase();
        (known_ids.contains(node_id) && patterns.iter().any(|p| *p == pattern)).then(|| {
            PatternMatch::new(pattern, node_id, confidence, PatternSource::Classifier)
        })
    };

    if let Some(value) = extract_json_value(text) {
        let matches: Vec<PatternMatch> = match &value {
            Value::Array(entries) => entries
                .iter()
                .filter_map(|entry| {
                    let node_id = str_field(entry, &["nodeId", "node_id", "id"])?;
                    let pattern = str_field(entry, &["pattern", "patternName", "pattern_name", "role"])?;
                    let confidence = entry
                        .get("confidence")
                        .and_then(Value::as_f64)
                        .unwrap_or(PROSE_MATCH_CONFIDENCE);
                    accept(node_id, pattern, confidence)
                })
                .collect(),
            Value::Object(map) => map
                .iter()
                .filter_map(|(node_id, entry)| match entry {
                    Value::String(pattern) => accept(node_id, pattern, PROSE_MATCH_CONFIDENCE),
                    Value::Object(_) => {
                        let pattern = str_field(entry, &["pattern", "patternName", "role"])?;
                        let confidence = entry
                            .get("confidence")
                            .and_then(Value::as_f64)
                            .unwrap_or(PROSE_MATCH_CONFIDENCE);
                        accept(node_id, pattern, confidence)
                    }
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        if !matches.is_empty() {
            return dedupe_matches(matches);
        }
    }

    // Line-wise key matching.
    let mut matches = Vec::new();
    for line in text.lines() {
        let lower = line.to_lowercase();
        let Some(node_id) = known_ids
            .iter()
            .filter(|id| line.contains(**id))
            .max_by_key(|id| (id.len(), **id))
        else {
            continue;
        };
        let Some(pattern) = patterns.iter().find(|p| lower.contains(p.as_str())) else {
            continue;
        };
        let confidence = line
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .filter(|token| token.contains('.'))
            .filter_map(|token| token.parse::<f64>().ok())
            .find(|v| *v > 0.0 && *v <= 1.0)
            .unwrap_or(PROSE_MATCH_CONFIDENCE);
        if let Some(m) = accept(node_id, pattern, confidence) {
            matches.push(m);
        }
    }
    dedupe_matches(matches)
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| value.get(*key).and_then(Value::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::patterns::classifier::ClassifierError;
    use crate::application::patterns::rules::tests::node;
    use crate::application::patterns::rules::{PatternRule, RuleCondition};
    use crate::domain::llm::{GenerationResponse, LLMError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClassifier {
        classes: Vec<String>,
        rows: Vec<Vec<f64>>,
    }

    impl PatternClassifier for FixedClassifier {
        fn classes(&self) -> &[String] {
            &self.classes
        }

        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ClassifierError> {
            Ok(self.rows.iter().cloned().cycle().take(features.len()).collect())
        }
    }

    struct BrokenClassifier;

    impl PatternClassifier for BrokenClassifier {
        fn classes(&self) -> &[String] {
            &[]
        }

        fn predict(&self, _features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ClassifierError> {
            Err(ClassifierError::Unavailable("model missing".into()))
        }
    }

    struct ScriptedLlm {
        reply: Result<String, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LLMProvider for ScriptedLlm {
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<GenerationResponse, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(GenerationResponse::text_only(text.clone(), "scripted")),
                Err(()) => Err(LLMError::Network("offline".into())),
            }
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn button_rules() -> RuleSet {
        RuleSet::new().with_rule(
            "button",
            PatternRule::new("named", 0.9, vec![RuleCondition::name_contains(["button"])]),
        )
    }

    fn config(min_nodes: usize) -> PatternConfig {
        PatternConfig {
            min_classifier_nodes: min_nodes,
            ..PatternConfig::default()
        }
    }

    fn prompts() -> Arc<PromptTemplateEngine> {
        Arc::new(PromptTemplateEngine::new().unwrap())
    }

    #[tokio::test]
    async fn test_classifier_merges_under_rules() {
        let classifier = Arc::new(FixedClassifier {
            classes: vec!["button".into(), "none".into()],
            rows: vec![vec![0.6001, 0.3999]],
        });
        let ensemble = PatternEnsemble::new(button_rules(), Some(classifier), None, prompts(), &config(1));

        let nodes = vec![node("A", "Buy Button", NodeType::Frame)];
        let results = ensemble.detect(&nodes).await;

        let button = results.get("button").unwrap();
        assert_eq!(button.count, 1);
        assert!((button.average_confidence - (0.9 + 0.6001) / 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_low_probability_predictions_rejected() {
        let classifier = Arc::new(FixedClassifier {
            classes: vec!["card".into(), "none".into()],
            rows: vec![vec![0.6, 0.4]],
        });
        let ensemble = PatternEnsemble::new(RuleSet::new(), Some(classifier), None, prompts(), &config(1));
        let results = ensemble.detect(&[node("A", "x", NodeType::Frame)]).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_classifier_error_degrades_to_rules() {
        let ensemble = PatternEnsemble::new(button_rules(), Some(Arc::new(BrokenClassifier)), None, prompts(), &config(1));
        let results = ensemble.detect(&[node("A", "Button", NodeType::Frame)]).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results.get("button").unwrap().average_confidence, 0.9);
    }

    #[tokio::test]
    async fn test_small_node_sets_use_llm_fallback() {
        let classifier = Arc::new(FixedClassifier {
            classes: vec!["card".into()],
            rows: vec![vec![1.0]],
        });
        let llm = Arc::new(ScriptedLlm {
            reply: Ok("```json\n[{\"nodeId\": \"B\", \"pattern\": \"button\", \"confidence\": 0.8}]\n```".into()),
            calls: AtomicUsize::new(0),
        });
        let ensemble = PatternEnsemble::new(button_rules(), Some(classifier), Some(llm.clone()), prompts(), &config(10));

        let nodes = vec![node("A", "Button", NodeType::Frame), node("B", "Go", NodeType::Frame)];
        let results = ensemble.detect(&nodes).await;

        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert!(results.get("card").is_none());
        let button = results.get("button").unwrap();
        assert_eq!(button.count, 2);
        assert!(button.node_ids.contains("B"));
    }

    #[tokio::test]
    async fn test_llm_failure_contributes_nothing() {
        let llm = Arc::new(ScriptedLlm {
            reply: Err(()),
            calls: AtomicUsize::new(0),
        });
        let ensemble = PatternEnsemble::new(button_rules(), None, Some(llm), prompts(), &config(10));
        let results = ensemble.detect(&[node("A", "Button", NodeType::Frame)]).await;
        assert_eq!(results.get("button").unwrap().count, 1);
    }

    #[test]
    fn test_parse_object_and_prose_shapes() {
        let patterns = vec!["button".to_string(), "card".to_string()];
        let ids: HashSet<&str> = ["1:2", "1:3", "1:23"].into_iter().collect();

        let object = r#"Result: {"1:2": "Button", "1:3": {"pattern": "card", "confidence": 0.9}, "9:9": "card"}"#;
        let matches = parse_classification(object, &patterns, &ids);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().any(|m| m.node_id == "1:3" && m.confidence == 0.9));

        let prose = "Node 1:23 looks like a card (0.85)\nnode 1:2 is a button\nnothing else";
        let matches = parse_classification(prose, &patterns, &ids);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].node_id, "1:23");
        assert_eq!(matches[0].confidence, 0.85);
        assert_eq!(matches[1].confidence, PROSE_MATCH_CONFIDENCE);

        assert!(parse_classification("I cannot help", &patterns, &ids).is_empty());
    }

    #[test]
    fn test_parse_collapses_repeated_nodes() {
        let patterns = vec!["button".to_string()];
        let ids: HashSet<&str> = ["A"].into_iter().collect();

        let array = r#"[{"nodeId": "A", "pattern": "button", "confidence": 0.6},
                        {"nodeId": "A", "pattern": "button", "confidence": 0.6}]"#;
        let matches = parse_classification(array, &patterns, &ids);
        assert_eq!(matches.len(), 1);

        let merged = PatternResults::merge(
            vec![PatternMatch::new("button", "A", 0.9, PatternSource::Rule)],
            matches,
        );
        let button = merged.get("button").unwrap();
        assert_eq!(button.count, 1);
        assert!((button.average_confidence - 0.75).abs() < 1e-9);

        let prose = "A is a button (0.5)\nagain, A is a button (0.7)";
        let matches = parse_classification(prose, &patterns, &ids);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].confidence, 0.7);
    }

    #[test]
    fn test_prose_equal_length_ids_pick_deterministically() {
        let patterns = vec!["card".to_string()];
        let ids: HashSet<&str> = ["1:2", "1:3"].into_iter().collect();
        for _ in 0..10 {
            let matches = parse_classification("1:2 and 1:3 are a card", &patterns, &ids);
            assert_eq!(matches.len(), 1);
            assert_eq!(matches[0].node_id, "1:3");
        }
    }

    #[test]
    fn test_threshold_adjustment_clamped() {
        let base = EnsembleThresholds { rule: 0.5, classifier: 0.6 };
        let stricter = base.adjusted(1.0, 0.2);
        assert!((stricter.rule - 0.6).abs() < 1e-9);
        let clamped = EnsembleThresholds { rule: 0.88, classifier: 0.89 }.adjusted(1.0, 1.0);
        assert_eq!(clamped.rule, EnsembleThresholds::MAX);
        let looser = base.adjusted(0.0, 1.0);
        assert_eq!(looser.rule, EnsembleThresholds::MIN);
    }
}
