// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Pipeline
//!
//! Stage payloads, conversion options and the error type of a conversion run.
//! Every stage result is immutable once produced; the orchestrator shares them
//! behind `Arc` so that cached results are handed out unchanged.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Typed hand-off between Parse, Analyze, Map, Generate and Validate

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::agent::AgentError;
use crate::domain::design::{DesignDocument, FlatNode, StyleDefinition};
use crate::domain::pattern::{NodePattern, PatternResults};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Parse,
    Analyze,
    Map,
    Generate,
    Validate,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Parse,
        Stage::Analyze,
        Stage::Map,
        Stage::Generate,
        Stage::Validate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::Analyze => "analyze",
            Stage::Map => "map",
            Stage::Generate => "generate",
            Stage::Validate => "validate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one conversion run in events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionId(pub Uuid);

impl ConversionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[default]
    Angular,
    React,
    Vue,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Angular => "angular",
            Framework::React => "react",
            Framework::Vue => "vue",
        }
    }
}

impl std::str::FromStr for Framework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "angular" => Ok(Framework::Angular),
            "react" => Ok(Framework::React),
            "vue" => Ok(Framework::Vue),
            other => Err(format!("unknown framework '{}' (angular, react, vue)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StylingApproach {
    #[default]
    Scss,
    Css,
    Tailwind,
}

impl StylingApproach {
    pub fn as_str(&self) -> &'static str {
        match self {
            StylingApproach::Scss => "scss",
            StylingApproach::Css => "css",
            StylingApproach::Tailwind => "tailwind",
        }
    }

    /// Stylesheet extension, or `None` when styles live in the markup.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            StylingApproach::Scss => Some("scss"),
            StylingApproach::Css => Some("css"),
            StylingApproach::Tailwind => None,
        }
    }
}

impl std::str::FromStr for StylingApproach {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scss" => Ok(StylingApproach::Scss),
            "css" => Ok(StylingApproach::Css),
            "tailwind" => Ok(StylingApproach::Tailwind),
            other => Err(format!("unknown styling '{}' (scss, css, tailwind)", other)),
        }
    }
}

/// Options that shape the generated code. All of them participate in the
/// generate and validate cache keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOptions {
    #[serde(default)]
    pub framework: Framework,
    #[serde(default)]
    pub styling: StylingApproach,
    #[serde(default = "default_true")]
    pub strict_types: bool,
    #[serde(default)]
    pub include_layout: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            framework: Framework::default(),
            styling: StylingApproach::default(),
            strict_types: true,
            include_layout: false,
        }
    }
}

// ============================================================================
// Stage results
// ============================================================================

/// Output of Parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDesign {
    pub document: DesignDocument,
    pub nodes: Vec<FlatNode>,
    /// Ids of the nodes that become generated components.
    pub component_candidates: Vec<String>,
    pub styles: BTreeMap<String, StyleDefinition>,
}

impl ParsedDesign {
    pub fn node(&self, id: &str) -> Option<&FlatNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a FlatNode> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.parent_id.as_deref() == Some(id))
    }

    /// Every node below `id`, in document order.
    pub fn descendants_of(&self, id: &str) -> Vec<&FlatNode> {
        let Some(root) = self.nodes.iter().position(|n| n.id == id) else {
            return Vec::new();
        };
        let depth = self.nodes[root].depth;
        self.nodes[root + 1..]
            .iter()
            .take_while(|n| n.depth > depth)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleIssue {
    pub rule_id: String,
    pub node_id: Option<String>,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedNode {
    pub node: FlatNode,
    pub patterns: Vec<NodePattern>,
}

impl EnrichedNode {
    pub fn primary_pattern(&self) -> Option<&str> {
        self.patterns.first().map(|p| p.pattern_name.as_str())
    }
}

/// Output of Analyze. Carries the parsed design forward so later stages read
/// a single input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignAnalysis {
    pub parsed: Arc<ParsedDesign>,
    pub patterns: PatternResults,
    pub style_issues: Vec<StyleIssue>,
    pub enriched_nodes: Vec<EnrichedNode>,
}

impl DesignAnalysis {
    pub fn enriched(&self, id: &str) -> Option<&EnrichedNode> {
        self.enriched_nodes.iter().find(|n| n.node.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInput {
    pub name: String,
    pub type_name: String,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentElement {
    pub node_id: String,
    pub element: String,
    pub pattern: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMapping {
    pub node_id: String,
    /// PascalCase class/function name.
    pub component_name: String,
    /// kebab-case file stem and selector.
    pub file_stem: String,
    pub selector: String,
    pub root_element: String,
    pub patterns: Vec<String>,
    pub inputs: Vec<ComponentInput>,
    pub elements: Vec<ComponentElement>,
    /// CSS declarations derived from the root node.
    pub styles: BTreeMap<String, String>,
}

/// Output of Map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResult {
    pub design_name: String,
    pub components: Vec<ComponentMapping>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFile {
    pub path: String,
    pub language: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ComponentArtifact {
    Generated {
        component_name: String,
        node_id: String,
        files: Vec<GeneratedFile>,
    },
    /// Stand-in for a component whose generation failed.
    Failed {
        component_name: String,
        node_id: String,
        error: String,
        files: Vec<GeneratedFile>,
    },
}

impl ComponentArtifact {
    pub fn component_name(&self) -> &str {
        match self {
            ComponentArtifact::Generated { component_name, .. }
            | ComponentArtifact::Failed { component_name, .. } => component_name,
        }
    }

    pub fn files(&self) -> &[GeneratedFile] {
        match self {
            ComponentArtifact::Generated { files, .. } | ComponentArtifact::Failed { files, .. } => {
                files
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ComponentArtifact::Failed { .. })
    }
}

/// Output of Generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub options: ConversionOptions,
    pub components: Vec<ComponentArtifact>,
    pub layout: Option<ComponentArtifact>,
}

impl GenerationResult {
    pub fn all_files(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.components
            .iter()
            .chain(self.layout.iter())
            .flat_map(|artifact| artifact.files().iter())
    }

    pub fn failed_count(&self) -> usize {
        self.components
            .iter()
            .chain(self.layout.iter())
            .filter(|a| a.is_failed())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub file_path: String,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub line: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationScores {
    pub syntax: f64,
    pub style: f64,
    pub responsiveness: f64,
    pub overall: f64,
}

/// Output of Validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub scores: ValidationScores,
    pub issues: Vec<ValidationIssue>,
    pub files_checked: usize,
    pub passed: bool,
}

/// Everything a full conversion produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub parsed: Arc<ParsedDesign>,
    pub analysis: Arc<DesignAnalysis>,
    pub mapping: Arc<MappingResult>,
    pub generation: Arc<GenerationResult>,
    pub validation: Arc<ValidationReport>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input at {stage}: {source}")]
    InvalidInput {
        stage: Stage,
        #[source]
        source: AgentError,
    },

    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: AgentError,
    },
}

impl PipelineError {
    pub fn from_agent(stage: Stage, source: AgentError) -> Self {
        if source.is_input_error() {
            PipelineError::InvalidInput { stage, source }
        } else {
            PipelineError::StageFailed { stage, source }
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InvalidInput { stage, .. } | PipelineError::StageFailed { stage, .. } => {
                *stage
            }
        }
    }

    pub fn agent_error(&self) -> &AgentError {
        match self {
            PipelineError::InvalidInput { source, .. }
            | PipelineError::StageFailed { source, .. } => source,
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.agent_error().target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_defaults_from_empty_payload() {
        let options: ConversionOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(options, ConversionOptions::default());
        assert!(options.strict_types);
        assert_eq!(options.framework, Framework::Angular);
    }

    #[test]
    fn test_pipeline_error_classification() {
        let input = PipelineError::from_agent(
            Stage::Parse,
            AgentError::invalid_input("document", "missing"),
        );
        assert!(matches!(input, PipelineError::InvalidInput { .. }));
        assert_eq!(input.target(), Some("document"));

        let failed =
            PipelineError::from_agent(Stage::Generate, AgentError::execution_at("x", "Button"));
        assert_eq!(failed.stage(), Stage::Generate);
        assert_eq!(failed.target(), Some("Button"));
    }

    #[test]
    fn test_artifact_serializes_with_status_tag() {
        let artifact = ComponentArtifact::Failed {
            component_name: "Card".into(),
            node_id: "1:1".into(),
            error: "boom".into(),
            files: vec![],
        };
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["componentName"], "Card");
    }
}
