// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Parse: raw design export -> typed, flattened design.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::application::agents::learning_note;
use crate::application::lifecycle::AgentBehavior;
use crate::domain::agent::AgentError;
use crate::domain::design::DesignDocument;
use crate::domain::feedback::FeedbackItem;
use crate::domain::pipeline::ParsedDesign;

#[derive(Debug, Default)]
pub struct ParseBehavior;

impl ParseBehavior {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Checks that the export has a `document` object and that every node in it
/// carries a string `id` and `type`. The error names the offending path.
pub fn validate_export(raw: &Value) -> Result<(), AgentError> {
    let Some(root) = raw.as_object() else {
        return Err(AgentError::invalid_input("$", "design export must be a JSON object"));
    };
    let Some(document) = root.get("document") else {
        return Err(AgentError::invalid_input("document", "missing"));
    };
    if !document.is_object() {
        return Err(AgentError::invalid_input("document", "must be an object"));
    }

    let mut stack: Vec<(String, &Value)> = vec![("document".to_string(), document)];
    while let Some((path, node)) = stack.pop() {
        let Some(fields) = node.as_object() else {
            return Err(AgentError::invalid_input(path, "node must be an object"));
        };
        for key in ["id", "type"] {
            match fields.get(key) {
                Some(Value::String(s)) if !s.is_empty() => {}
                Some(_) => {
                    return Err(AgentError::invalid_input(
                        format!("{}.{}", path, key),
                        "must be a non-empty string",
                    ))
                }
                None => return Err(AgentError::invalid_input(format!("{}.{}", path, key), "missing")),
            }
        }
        match fields.get("children") {
            None | Some(Value::Null) => {}
            Some(Value::Array(children)) => {
                for (i, child) in children.iter().enumerate() {
                    stack.push((format!("{}.children[{}]", path, i), child));
                }
            }
            Some(_) => {
                return Err(AgentError::invalid_input(
                    format!("{}.children", path),
                    "must be an array",
                ))
            }
        }
    }
    Ok(())
}

#[async_trait]
impl AgentBehavior for ParseBehavior {
    type Input = Value;
    type Output = ParsedDesign;

    fn validate_input(&self, input: &Value) -> Result<(), AgentError> {
        validate_export(input)
    }

    async fn execute(&self, input: &Value) -> Result<ParsedDesign, AgentError> {
        // Field-level problems the structural check does not cover.
        let document = DesignDocument::deserialize(input).map_err(|e| {
            AgentError::execution_at(format!("Malformed design: {}", e), "document")
        })?;
        let nodes = document.flatten();
        let component_candidates = document
            .component_candidates()
            .into_iter()
            .map(|node| node.id.clone())
            .collect::<Vec<_>>();
        debug!(
            design = %document.name,
            nodes = nodes.len(),
            candidates = component_candidates.len(),
            "Parsed design"
        );

        Ok(ParsedDesign {
            styles: document.styles.clone(),
            component_candidates,
            nodes,
            document,
        })
    }

    fn perform_learning(&self, feedback: &[FeedbackItem], _learning_rate: f64) -> Result<(), AgentError> {
        info!(agent = "parser", note = %learning_note(feedback), "Recorded learning note");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_export() -> Value {
        json!({
            "name": "Shop",
            "document": {
                "id": "0:0", "name": "Document", "type": "DOCUMENT",
                "children": [{
                    "id": "0:1", "name": "Page", "type": "CANVAS",
                    "children": [
                        { "id": "1:1", "name": "Buy Button", "type": "COMPONENT",
                          "children": [{ "id": "1:2", "name": "Label", "type": "TEXT", "characters": "Buy" }] },
                        { "id": "2:1", "name": "Product Card", "type": "FRAME" },
                        { "id": "3:1", "name": "Hidden", "type": "FRAME", "visible": false }
                    ]
                }]
            },
            "styles": { "S:1": { "name": "Brand/Red", "styleType": "FILL" } }
        })
    }

    #[tokio::test]
    async fn test_parses_nodes_and_candidates() {
        let parsed = ParseBehavior::new().execute(&sample_export()).await.unwrap();
        assert_eq!(parsed.nodes.len(), 6);
        assert_eq!(parsed.component_candidates, vec!["1:1", "2:1"]);
        assert_eq!(parsed.styles.len(), 1);
        assert_eq!(parsed.node("1:2").unwrap().parent_id.as_deref(), Some("1:1"));
    }

    #[test]
    fn test_validation_names_offending_node() {
        let mut raw = sample_export();
        raw["document"]["children"][0]["children"][1]
            .as_object_mut()
            .unwrap()
            .remove("type");
        let err = validate_export(&raw).unwrap_err();
        assert!(err.is_input_error());
        assert_eq!(err.target(), Some("document.children[0].children[1].type"));

        assert!(validate_export(&json!({"name": "x"})).is_err());
        assert!(validate_export(&json!([1, 2])).is_err());
        assert!(validate_export(&json!({"document": {"id": "0", "type": "DOCUMENT", "children": 3}})).is_err());
    }

    #[tokio::test]
    async fn test_malformed_fields_fail_execution() {
        let raw = json!({"document": {"id": "0", "type": "DOCUMENT", "absoluteBoundingBox": "wide"}});
        assert!(validate_export(&raw).is_ok());
        let err = ParseBehavior::new().execute(&raw).await.unwrap_err();
        assert!(!err.is_input_error());
        assert_eq!(err.target(), Some("document"));
    }
}
