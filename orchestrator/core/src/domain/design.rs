// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Design
//!
//! Typed model of a design-tool export: a tree of visual nodes plus the
//! style and component tables that accompany it.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Node tree, flattening, component candidate discovery

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Document,
    Canvas,
    Frame,
    Group,
    Section,
    Component,
    ComponentSet,
    Instance,
    Text,
    Rectangle,
    Ellipse,
    Vector,
    Line,
    Star,
    BooleanOperation,
    #[serde(other)]
    Other,
}

impl NodeType {
    /// Fixed ordering used by feature encoding.
    pub const ALL: [NodeType; 16] = [
        NodeType::Document,
        NodeType::Canvas,
        NodeType::Frame,
        NodeType::Group,
        NodeType::Section,
        NodeType::Component,
        NodeType::ComponentSet,
        NodeType::Instance,
        NodeType::Text,
        NodeType::Rectangle,
        NodeType::Ellipse,
        NodeType::Vector,
        NodeType::Line,
        NodeType::Star,
        NodeType::BooleanOperation,
        NodeType::Other,
    ];

    pub fn is_container(self) -> bool {
        matches!(
            self,
            NodeType::Frame
                | NodeType::Group
                | NodeType::Section
                | NodeType::Component
                | NodeType::ComponentSet
                | NodeType::Instance
        )
    }

    pub fn is_component_root(self) -> bool {
        matches!(
            self,
            NodeType::Frame | NodeType::Component | NodeType::ComponentSet | NodeType::Instance
        )
    }

    pub fn is_shape(self) -> bool {
        matches!(
            self,
            NodeType::Rectangle
                | NodeType::Ellipse
                | NodeType::Vector
                | NodeType::Line
                | NodeType::Star
                | NodeType::BooleanOperation
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Width over height; 0.0 for degenerate boxes.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height <= f64::EPSILON {
            0.0
        } else {
            self.width / self.height
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    #[serde(default = "default_alpha")]
    pub a: f64,
}

fn default_alpha() -> f64 {
    1.0
}

impl Color {
    pub fn to_hex(&self) -> String {
        let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(self.r),
            channel(self.g),
            channel(self.b)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paint {
    #[serde(rename = "type")]
    pub paint_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default = "default_true")]
    pub visible: bool,
}

fn default_true() -> bool {
    true
}

impl Paint {
    pub fn is_image(&self) -> bool {
        self.paint_type.eq_ignore_ascii_case("IMAGE")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height_px: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayoutMode {
    None,
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DesignNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_bounding_box: Option<Bounds>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fills: Vec<Paint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strokes: Vec<Paint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_mode: Option<LayoutMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_spacing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_left: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_right: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_top: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_bottom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<TypeStyle>,
    /// Style-table references keyed by property ("fill", "text", ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub styles: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
}

impl DesignNode {
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(DesignNode::subtree_size).sum::<usize>()
    }

    pub fn find(&self, id: &str) -> Option<&DesignNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    fn paddings(&self) -> Vec<f64> {
        [
            self.padding_left,
            self.padding_right,
            self.padding_top,
            self.padding_bottom,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDefinition {
    #[serde(default)]
    pub key: String,
    pub name: String,
    pub style_type: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A complete design export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignDocument {
    #[serde(default)]
    pub name: String,
    pub document: DesignNode,
    #[serde(default)]
    pub styles: BTreeMap<String, StyleDefinition>,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentDefinition>,
}

/// One node of the tree with its position and the structural facts that
/// rules, features and analysis read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatNode {
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
    pub parent_id: Option<String>,
    pub depth: usize,
    /// Names from the root down to this node.
    pub path: Vec<String>,
    pub child_count: usize,
    pub child_types: Vec<NodeType>,
    pub has_text_child: bool,
    pub has_image_fill: bool,
    pub text: Option<String>,
    pub bounds: Option<Bounds>,
    pub corner_radius: Option<f64>,
    pub layout_mode: Option<LayoutMode>,
    pub item_spacing: Option<f64>,
    pub paddings: Vec<f64>,
    pub font_size: Option<f64>,
    pub fill_colors: Vec<String>,
    pub style_refs: BTreeMap<String, String>,
    pub stroke_count: usize,
}

impl FlatNode {
    fn from_node(node: &DesignNode, parent_id: Option<&str>, depth: usize, path: &[String]) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            node_type: node.node_type,
            parent_id: parent_id.map(str::to_string),
            depth,
            path: path.to_vec(),
            child_count: node.children.len(),
            child_types: node.children.iter().map(|c| c.node_type).collect(),
            has_text_child: node
                .children
                .iter()
                .any(|c| c.node_type == NodeType::Text),
            has_image_fill: node.fills.iter().any(Paint::is_image),
            text: node.characters.clone(),
            bounds: node.absolute_bounding_box,
            corner_radius: node.corner_radius,
            layout_mode: node.layout_mode,
            item_spacing: node.item_spacing,
            paddings: node.paddings(),
            font_size: node.style.as_ref().and_then(|s| s.font_size),
            fill_colors: node
                .fills
                .iter()
                .filter(|p| p.visible)
                .filter_map(|p| p.color.as_ref().map(Color::to_hex))
                .collect(),
            style_refs: node.styles.clone(),
            stroke_count: node.strokes.len(),
        }
    }

    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.bounds.map(|b| b.aspect_ratio()).unwrap_or(0.0)
    }
}

impl DesignDocument {
    pub fn node_count(&self) -> usize {
        self.document.subtree_size()
    }

    pub fn find(&self, id: &str) -> Option<&DesignNode> {
        self.document.find(id)
    }

    /// Depth-first, pre-order listing of every node.
    pub fn flatten(&self) -> Vec<FlatNode> {
        let mut out = Vec::with_capacity(self.node_count());
        let mut stack: Vec<(&DesignNode, Option<&str>, usize, Vec<String>)> =
            vec![(&self.document, None, 0, Vec::new())];

        while let Some((node, parent, depth, mut path)) = stack.pop() {
            path.push(node.name.clone());
            out.push(FlatNode::from_node(node, parent, depth, &path));
            for child in node.children.iter().rev() {
                stack.push((child, Some(node.id.as_str()), depth + 1, path.clone()));
            }
        }
        out
    }

    /// Top-level frames, components and instances of every page.
    ///
    /// Pages are the canvas children of the document root. When the export
    /// has no canvases, the root's own children are used.
    pub fn component_candidates(&self) -> Vec<&DesignNode> {
        let canvases: Vec<&DesignNode> = self
            .document
            .children
            .iter()
            .filter(|c| c.node_type == NodeType::Canvas)
            .collect();
        let parents = if canvases.is_empty() {
            vec![&self.document]
        } else {
            canvases
        };

        parents
            .into_iter()
            .flat_map(|parent| parent.children.iter())
            .filter(|node| node.visible && node.node_type.is_component_root())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> DesignDocument {
        serde_json::from_value(json!({
            "name": "Landing",
            "document": {
                "id": "0:0", "name": "Document", "type": "DOCUMENT",
                "children": [{
                    "id": "0:1", "name": "Page 1", "type": "CANVAS",
                    "children": [
                        {
                            "id": "1:1", "name": "Primary Button", "type": "COMPONENT",
                            "absoluteBoundingBox": { "x": 0.0, "y": 0.0, "width": 120.0, "height": 40.0 },
                            "cornerRadius": 8.0,
                            "fills": [{ "type": "SOLID", "color": { "r": 1.0, "g": 0.0, "b": 0.0 } }],
                            "children": [
                                { "id": "1:2", "name": "Label", "type": "TEXT", "characters": "Buy" }
                            ]
                        },
                        { "id": "2:1", "name": "Divider", "type": "LINE" }
                    ]
                }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_deserialize_and_count() {
        let doc = sample();
        assert_eq!(doc.node_count(), 5);
        assert_eq!(doc.find("1:2").map(|n| n.node_type), Some(NodeType::Text));
    }

    #[test]
    fn test_unknown_type_maps_to_other() {
        let node: DesignNode =
            serde_json::from_value(json!({ "id": "x", "type": "WASHI_TAPE" })).unwrap();
        assert_eq!(node.node_type, NodeType::Other);
    }

    #[test]
    fn test_flatten_preorder_with_parents() {
        let flat = sample().flatten();
        let ids: Vec<&str> = flat.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["0:0", "0:1", "1:1", "1:2", "2:1"]);

        let button = &flat[2];
        assert_eq!(button.parent_id.as_deref(), Some("0:1"));
        assert_eq!(button.depth, 2);
        assert!(button.has_text_child);
        assert_eq!(button.aspect_ratio(), 3.0);
        assert_eq!(button.fill_colors, vec!["#ff0000".to_string()]);
        assert_eq!(button.path.last().map(String::as_str), Some("Primary Button"));
    }

    #[test]
    fn test_component_candidates_are_top_level_roots() {
        let doc = sample();
        let candidates: Vec<&str> = doc
            .component_candidates()
            .into_iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(candidates, vec!["1:1"]);
    }
}
