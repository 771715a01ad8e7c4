// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Pattern classifiers
//
// A classifier maps feature vectors to probability distributions over its
// classes. The ensemble only cares about the trait; PrototypeClassifier is
// the in-tree implementation: one prototype vector per class and a softmax
// over negative squared distances.

use crate::application::patterns::features::{FeatureEncoder, FEATURE_WIDTH};
use crate::domain::design::NodeType;

/// Class that means "no pattern".
pub const NONE_CLASS: &str = "none";

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierError {
    #[error("expected feature vectors of width {expected}, got {actual}")]
    FeatureWidth { expected: usize, actual: usize },

    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

pub trait PatternClassifier: Send + Sync {
    /// Class labels, in the order of every returned distribution.
    fn classes(&self) -> &[String];

    /// One distribution per input vector.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ClassifierError>;
}

#[derive(Debug, Clone)]
pub struct PrototypeClassifier {
    classes: Vec<String>,
    prototypes: Vec<Vec<f64>>,
    sharpness: f64,
}

impl PrototypeClassifier {
    /// `sharpness` scales distances before the softmax; higher is more decisive.
    pub fn new(prototypes: Vec<(String, Vec<f64>)>, sharpness: f64) -> Result<Self, ClassifierError> {
        for (_, vector) in &prototypes {
            if vector.len() != FEATURE_WIDTH {
                return Err(ClassifierError::FeatureWidth {
                    expected: FEATURE_WIDTH,
                    actual: vector.len(),
                });
            }
        }
        let (classes, prototypes) = prototypes.into_iter().unzip();
        Ok(Self {
            classes,
            prototypes,
            sharpness,
        })
    }

    /// Prototypes for the built-in pattern vocabulary.
    pub fn with_default_prototypes() -> Self {
        let proto = |node_type: NodeType, structural: &[&str], names: &[&str], children: f64, aspect: f64| {
            let mut v = vec![0.0; FEATURE_WIDTH];
            v[FeatureEncoder::type_index(node_type)] = 1.0;
            for flag in structural {
                if let Some(i) = FeatureEncoder::structural_index(flag) {
                    v[i] = 1.0;
                }
            }
            for flag in names {
                if let Some(i) = FeatureEncoder::name_index(flag) {
                    v[i] = 1.0;
                }
            }
            v[FeatureEncoder::child_count_index()] = children;
            v[FeatureEncoder::aspect_ratio_index()] = aspect;
            v
        };

        let prototypes = vec![
            ("button".to_string(), proto(NodeType::Instance, &["has_children", "has_text_child", "rounded"], &["button"], 0.1, 0.3)),
            ("input".to_string(), proto(NodeType::Instance, &["has_children", "has_text_child", "has_stroke"], &["input", "field"], 0.1, 0.7)),
            ("card".to_string(), proto(NodeType::Frame, &["has_children", "has_text_child", "rounded", "layout_vertical"], &["card"], 0.4, 0.1)),
            ("list".to_string(), proto(NodeType::Frame, &["has_children", "layout_vertical"], &["list", "item"], 0.8, 0.05)),
            ("navigation".to_string(), proto(NodeType::Frame, &["has_children", "layout_horizontal"], &["nav", "menu"], 0.5, 1.0)),
            ("image".to_string(), proto(NodeType::Rectangle, &["has_image_fill"], &["image", "img"], 0.0, 0.15)),
            ("heading".to_string(), proto(NodeType::Text, &[], &["title", "heading"], 0.0, 0.5)),
            (NONE_CLASS.to_string(), proto(NodeType::Other, &[], &[], 0.0, 0.0)),
        ];
        // Every prototype is built to the fixed width above.
        let (classes, prototypes) = prototypes.into_iter().unzip();
        Self {
            classes,
            prototypes,
            sharpness: 4.0,
        }
    }
}

impl PatternClassifier for PrototypeClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ClassifierError> {
        features
            .iter()
            .map(|vector| {
                if vector.len() != FEATURE_WIDTH {
                    return Err(ClassifierError::FeatureWidth {
                        expected: FEATURE_WIDTH,
                        actual: vector.len(),
                    });
                }
                let logits: Vec<f64> = self
                    .prototypes
                    .iter()
                    .map(|p| {
                        let distance: f64 = p.iter().zip(vector).map(|(a, b)| (a - b).powi(2)).sum();
                        -self.sharpness * distance
                    })
                    .collect();
                Ok(softmax(&logits))
            })
            .collect()
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
