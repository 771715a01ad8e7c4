// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Map: analyzed design -> one component mapping per candidate node.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::agents::{camel_case, kebab_case, learning_note, pascal_case};
use crate::application::lifecycle::AgentBehavior;
use crate::domain::agent::AgentError;
use crate::domain::design::{FlatNode, LayoutMode, NodeType};
use crate::domain::feedback::FeedbackItem;
use crate::domain::pipeline::{
    ComponentElement, ComponentInput, ComponentMapping, DesignAnalysis, MappingResult,
};

/// Selector prefix shared by every generated component.
const SELECTOR_PREFIX: &str = "app";

#[derive(Debug, Default)]
pub struct MapBehavior;

impl MapBehavior {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Root element for a component whose dominant pattern is `pattern`.
pub fn root_element(pattern: Option<&str>) -> &'static str {
    match pattern {
        Some("button") => "button",
        Some("input") => "label",
        Some("card") => "article",
        Some("list") => "ul",
        Some("navigation") => "nav",
        Some("image") => "figure",
        Some("heading") => "header",
        _ => "div",
    }
}

fn child_element(node: &FlatNode, pattern: Option<&str>) -> &'static str {
    if node.has_image_fill {
        return "img";
    }
    match (node.node_type, pattern) {
        (NodeType::Text, Some("heading")) => "h2",
        (NodeType::Text, _) => "span",
        (_, Some("button")) => "button",
        (_, Some("input")) => "input",
        (_, Some("list")) => "ul",
        (_, Some("navigation")) => "nav",
        (_, Some("image")) => "img",
        _ => "div",
    }
}

/// CSS declarations for the root node of a component.
pub fn root_styles(node: &FlatNode) -> BTreeMap<String, String> {
    let mut styles = BTreeMap::new();
    if let Some(bounds) = node.bounds {
        styles.insert("width".into(), format!("{}px", bounds.width.round()));
        styles.insert("min-height".into(), format!("{}px", bounds.height.round()));
    }
    if let Some(radius) = node.corner_radius.filter(|r| *r > 0.0) {
        styles.insert("border-radius".into(), format!("{}px", radius));
    }
    if let Some(color) = node.fill_colors.first() {
        styles.insert("background-color".into(), color.clone());
    }
    match node.layout_mode {
        Some(LayoutMode::Horizontal) | Some(LayoutMode::Vertical) => {
            styles.insert("display".into(), "flex".into());
            let direction = if node.layout_mode == Some(LayoutMode::Horizontal) {
                "row"
            } else {
                "column"
            };
            styles.insert("flex-direction".into(), direction.into());
            if let Some(gap) = node.item_spacing {
                styles.insert("gap".into(), format!("{}px", gap));
            }
        }
        _ => {}
    }
    if node.paddings.len() == 4 {
        // left, right, top, bottom -> CSS order top right bottom left
        let p = &node.paddings;
        styles.insert("padding".into(), format!("{}px {}px {}px {}px", p[2], p[1], p[3], p[0]));
    }
    styles
}

fn map_component(
    analysis: &DesignAnalysis,
    root: &FlatNode,
    component_name: String,
) -> ComponentMapping {
    let enriched = analysis.enriched(&root.id);
    let patterns: Vec<String> = enriched
        .map(|e| e.patterns.iter().map(|p| p.pattern_name.clone()).collect())
        .unwrap_or_default();

    let mut inputs = Vec::new();
    let mut input_names = HashSet::new();
    let mut elements = Vec::new();

    for node in analysis.parsed.descendants_of(&root.id) {
        let pattern = analysis
            .enriched(&node.id)
            .and_then(|e| e.primary_pattern())
            .map(str::to_string);

        if node.node_type == NodeType::Text {
            if let Some(text) = node.text.as_ref().filter(|t| !t.trim().is_empty()) {
                let base = camel_case(&node.name);
                let mut name = base.clone();
                let mut n = 2;
                while !input_names.insert(name.clone()) {
                    name = format!("{}{}", base, n);
                    n += 1;
                }
                inputs.push(ComponentInput {
                    name,
                    type_name: "string".into(),
                    default_value: Some(text.clone()),
                });
            }
        }

        elements.push(ComponentElement {
            node_id: node.id.clone(),
            element: child_element(node, pattern.as_deref()).to_string(),
            text: node.text.clone(),
            pattern,
        });
    }

    let file_stem = kebab_case(&component_name);
    ComponentMapping {
        node_id: root.id.clone(),
        selector: format!("{}-{}", SELECTOR_PREFIX, file_stem),
        root_element: root_element(patterns.first().map(String::as_str)).to_string(),
        styles: root_styles(root),
        component_name,
        file_stem,
        patterns,
        inputs,
        elements,
    }
}

#[async_trait]
impl AgentBehavior for MapBehavior {
    type Input = Arc<DesignAnalysis>;
    type Output = MappingResult;

    async fn execute(&self, input: &Arc<DesignAnalysis>) -> Result<MappingResult, AgentError> {
        let parsed = &input.parsed;
        let mut used_names = HashSet::new();
        let mut components = Vec::with_capacity(parsed.component_candidates.len());

        for candidate in &parsed.component_candidates {
            let root = parsed.node(candidate).ok_or_else(|| {
                AgentError::execution_at("Component candidate not found in design", candidate.clone())
            })?;

            let base = pascal_case(&root.name);
            let mut name = base.clone();
            let mut n = 2;
            while !used_names.insert(name.clone()) {
                name = format!("{}{}", base, n);
                n += 1;
            }
            components.push(map_component(input, root, name));
        }

        debug!(components = components.len(), "Mapped components");
        Ok(MappingResult {
            design_name: parsed.document.name.clone(),
            components,
        })
    }

    fn perform_learning(&self, feedback: &[FeedbackItem], _learning_rate: f64) -> Result<(), AgentError> {
        info!(agent = "mapper", note = %learning_note(feedback), "Recorded learning note");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::agents::ParseBehavior;
    use crate::domain::pattern::{PatternMatch, PatternResults, PatternSource};
    use crate::domain::pipeline::EnrichedNode;
    use serde_json::json;

    async fn analysis() -> Arc<DesignAnalysis> {
        let raw = json!({
            "name": "Shop",
            "document": {
                "id": "0:0", "name": "Document", "type": "DOCUMENT",
                "children": [{
                    "id": "0:1", "name": "Page", "type": "CANVAS",
                    "children": [
                        { "id": "1:1", "name": "product card", "type": "FRAME",
                          "cornerRadius": 8.0, "layoutMode": "VERTICAL", "itemSpacing": 12.0,
                          "paddingLeft": 16.0, "paddingRight": 16.0, "paddingTop": 8.0, "paddingBottom": 4.0,
                          "absoluteBoundingBox": { "x": 0.0, "y": 0.0, "width": 240.5, "height": 320.0 },
                          "fills": [{ "type": "SOLID", "color": { "r": 1.0, "g": 1.0, "b": 1.0 } }],
                          "children": [
                            { "id": "1:2", "name": "Title", "type": "TEXT", "characters": "Shoes" },
                            { "id": "1:3", "name": "Title", "type": "TEXT", "characters": "$20" },
                            { "id": "1:4", "name": "Photo", "type": "RECTANGLE",
                              "fills": [{ "type": "IMAGE" }] }
                          ] },
                        { "id": "2:1", "name": "Product Card", "type": "FRAME" }
                    ]
                }]
            }
        });
        let parsed = Arc::new(ParseBehavior::new().execute(&raw).await.unwrap());
        let patterns = PatternResults::from_matches(vec![
            PatternMatch::new("card", "1:1", 0.85, PatternSource::Rule),
            PatternMatch::new("heading", "1:2", 0.7, PatternSource::Rule),
        ]);
        let enriched_nodes = parsed
            .nodes
            .iter()
            .map(|n| EnrichedNode {
                patterns: patterns.patterns_for_node(&n.id),
                node: n.clone(),
            })
            .collect();
        Arc::new(DesignAnalysis {
            parsed,
            patterns,
            style_issues: vec![],
            enriched_nodes,
        })
    }

    #[tokio::test]
    async fn test_maps_candidates_with_unique_names() {
        let mapping = MapBehavior::new().execute(&analysis().await).await.unwrap();
        assert_eq!(mapping.design_name, "Shop");
        let names: Vec<&str> = mapping.components.iter().map(|c| c.component_name.as_str()).collect();
        assert_eq!(names, vec!["ProductCard", "ProductCard2"]);
        assert_eq!(mapping.components[1].selector, "app-product-card2");
    }

    #[tokio::test]
    async fn test_component_structure() {
        let mapping = MapBehavior::new().execute(&analysis().await).await.unwrap();
        let card = &mapping.components[0];

        assert_eq!(card.root_element, "article");
        assert_eq!(card.file_stem, "product-card");
        assert_eq!(card.patterns, vec!["card"]);

        let inputs: Vec<(&str, Option<&str>)> = card
            .inputs
            .iter()
            .map(|i| (i.name.as_str(), i.default_value.as_deref()))
            .collect();
        assert_eq!(inputs, vec![("title", Some("Shoes")), ("title2", Some("$20"))]);

        let elements: Vec<&str> = card.elements.iter().map(|e| e.element.as_str()).collect();
        assert_eq!(elements, vec!["h2", "span", "img"]);

        assert_eq!(card.styles["width"], "241px");
        assert_eq!(card.styles["flex-direction"], "column");
        assert_eq!(card.styles["gap"], "12px");
        assert_eq!(card.styles["padding"], "8px 16px 4px 16px");
        assert_eq!(card.styles["background-color"], "#ffffff");
    }
}
