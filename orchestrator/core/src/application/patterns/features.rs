// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Fixed-width numeric encoding of a node for the classifier.
//
// Layout: [ type one-hot | structural flags | name flags | child count | aspect ratio ]

use crate::domain::design::{FlatNode, LayoutMode, NodeType};

const TYPE_SLOTS: usize = NodeType::ALL.len();

pub const STRUCTURAL_FLAGS: [&str; 7] = [
    "has_children",
    "has_text_child",
    "has_image_fill",
    "has_stroke",
    "rounded",
    "layout_horizontal",
    "layout_vertical",
];

pub const NAME_FLAGS: [&str; 14] = [
    "button", "btn", "input", "field", "card", "list", "item", "nav", "menu", "image", "img",
    "icon", "title", "heading",
];

/// Child counts at or above this encode as 1.0.
const CHILD_COUNT_CEILING: f64 = 10.0;
/// Aspect ratios at or above this encode as 1.0.
const ASPECT_RATIO_CEILING: f64 = 10.0;

pub const FEATURE_WIDTH: usize = TYPE_SLOTS + STRUCTURAL_FLAGS.len() + NAME_FLAGS.len() + 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn width(&self) -> usize {
        FEATURE_WIDTH
    }

    pub fn type_index(node_type: NodeType) -> usize {
        NodeType::ALL
            .iter()
            .position(|t| *t == node_type)
            .unwrap_or(TYPE_SLOTS - 1)
    }

    pub fn structural_index(flag: &str) -> Option<usize> {
        STRUCTURAL_FLAGS
            .iter()
            .position(|f| *f == flag)
            .map(|i| TYPE_SLOTS + i)
    }

    pub fn name_index(flag: &str) -> Option<usize> {
        NAME_FLAGS
            .iter()
            .position(|f| *f == flag)
            .map(|i| TYPE_SLOTS + STRUCTURAL_FLAGS.len() + i)
    }

    pub fn child_count_index() -> usize {
        FEATURE_WIDTH - 2
    }

    pub fn aspect_ratio_index() -> usize {
        FEATURE_WIDTH - 1
    }

    pub fn encode(&self, node: &FlatNode) -> Vec<f64> {
        let mut features = vec![0.0; FEATURE_WIDTH];
        features[Self::type_index(node.node_type)] = 1.0;

        let structural = [
            node.child_count > 0,
            node.has_text_child,
            node.has_image_fill,
            node.stroke_count > 0,
            node.corner_radius.unwrap_or(0.0) > 0.0,
            node.layout_mode == Some(LayoutMode::Horizontal),
            node.layout_mode == Some(LayoutMode::Vertical),
        ];
        let offset = TYPE_SLOTS;
        for (i, flag) in structural.into_iter().enumerate() {
            features[offset + i] = if flag { 1.0 } else { 0.0 };
        }

        let name = node.name.to_lowercase();
        let offset = TYPE_SLOTS + STRUCTURAL_FLAGS.len();
        for (i, fragment) in NAME_FLAGS.iter().enumerate() {
            if name.contains(fragment) {
                features[offset + i] = 1.0;
            }
        }

        features[Self::child_count_index()] =
            (node.child_count as f64 / CHILD_COUNT_CEILING).min(1.0);
        features[Self::aspect_ratio_index()] =
            (node.aspect_ratio() / ASPECT_RATIO_CEILING).clamp(0.0, 1.0);
        features
    }

    pub fn encode_all(&self, nodes: &[FlatNode]) -> Vec<Vec<f64>> {
        nodes.iter().map(|node| self.encode(node)).collect()
    }
}
