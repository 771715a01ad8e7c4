// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Generate
//!
//! Renders one prompt per component mapping, asks the generation provider for
//! code and files the fenced blocks of the answer under the framework's naming
//! conventions. A component that cannot be generated becomes a
//! [`ComponentArtifact::Failed`] placeholder; the remaining components and the
//! optional page layout are still produced.
//!
//! Learning lowers the sampling temperature in proportion to the recent
//! failure share.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::lifecycle::AgentBehavior;
use crate::application::response_parsing::{extract_code_blocks, CodeBlock};
use crate::domain::agent::AgentError;
use crate::domain::events::PipelineEvent;
use crate::domain::feedback::{failure_ratio, FeedbackItem};
use crate::domain::llm::{GenerationOptions, LLMProvider};
use crate::domain::pipeline::{
    ComponentArtifact, ComponentMapping, ConversionOptions, Framework, GeneratedFile,
    GenerationResult, MappingResult,
};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::prompt_template_engine::{component_template, PromptTemplateEngine, LAYOUT};

pub const LAYOUT_NAME: &str = "PageLayout";
const LAYOUT_STEM: &str = "page-layout";
const LAYOUT_NODE_ID: &str = "layout";

/// Input of the Generate stage.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub mapping: Arc<MappingResult>,
    pub options: ConversionOptions,
}

/// A file the provider is asked to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    pub path: String,
    pub language: &'static str,
    pub required: bool,
}

impl FileSpec {
    fn new(path: String, language: &'static str, required: bool) -> Self {
        Self {
            path,
            language,
            required,
        }
    }
}

/// Files expected for a component called `name` (PascalCase) with file stem
/// `stem` (kebab-case). The first entry is the primary file.
pub fn component_files(name: &str, stem: &str, options: &ConversionOptions) -> Vec<FileSpec> {
    let stylesheet = options.styling.extension();
    let mut files = Vec::with_capacity(3);
    match options.framework {
        Framework::Angular => {
            files.push(FileSpec::new(format!("{stem}/{stem}.component.ts"), "typescript", true));
            files.push(FileSpec::new(format!("{stem}/{stem}.component.html"), "html", true));
            if let Some(ext) = stylesheet {
                files.push(FileSpec::new(format!("{stem}/{stem}.component.{ext}"), ext, false));
            }
        }
        Framework::React => {
            let (ext, language) = if options.strict_types {
                ("tsx", "tsx")
            } else {
                ("jsx", "jsx")
            };
            files.push(FileSpec::new(format!("{name}/{name}.{ext}"), language, true));
            if let Some(ext) = stylesheet {
                files.push(FileSpec::new(format!("{name}/{name}.module.{ext}"), ext, false));
            }
        }
        Framework::Vue => {
            files.push(FileSpec::new(format!("{name}.vue"), "vue", true));
        }
    }
    files
}

fn normalize_language(language: &str) -> &str {
    match language {
        "ts" => "typescript",
        "js" | "javascript" => "javascript",
        "htm" => "html",
        other => other,
    }
}

fn language_fits(block: Option<&str>, expected: &str) -> bool {
    let Some(block) = block.map(normalize_language) else {
        return false;
    };
    match expected {
        "tsx" => matches!(block, "tsx" | "typescript"),
        "jsx" => matches!(block, "jsx" | "javascript"),
        "vue" => matches!(block, "vue" | "html"),
        "scss" => matches!(block, "scss" | "css"),
        other => block == other,
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Assigns code blocks to the expected files: by path first, then by
/// language in answer order. Missing optional files come back empty.
pub fn assign_blocks(
    blocks: Vec<CodeBlock>,
    files: &[FileSpec],
    target: &str,
) -> Result<Vec<GeneratedFile>, AgentError> {
    let mut slots: Vec<Option<String>> = vec![None; files.len()];
    let mut unassigned = Vec::new();

    for block in blocks {
        let by_path = block.path.as_deref().and_then(|p| {
            (0..files.len()).find(|&i| slots[i].is_none() && basename(&files[i].path) == basename(p))
        });
        match by_path {
            Some(i) => slots[i] = Some(block.content),
            None => unassigned.push(block),
        }
    }
    for block in unassigned {
        if let Some(i) = (0..files.len())
            .find(|&i| slots[i].is_none() && language_fits(block.language.as_deref(), files[i].language))
        {
            slots[i] = Some(block.content);
        }
    }

    files
        .iter()
        .zip(slots)
        .map(|(file, content)| match content {
            Some(content) => Ok(GeneratedFile {
                path: file.path.clone(),
                language: file.language.to_string(),
                content,
            }),
            None if !file.required => Ok(GeneratedFile {
                path: file.path.clone(),
                language: file.language.to_string(),
                content: String::new(),
            }),
            None => Err(AgentError::response_parse(
                format!("no code block for {}", file.path),
                Some(target.to_string()),
            )),
        })
        .collect()
}

fn placeholder(file: &FileSpec, component_name: &str, error: &str) -> GeneratedFile {
    let note = format!("Generation failed for {}: {}", component_name, error.replace('\n', " "));
    let content = match file.language {
        "html" | "vue" => format!("<!-- {} -->\n", note),
        _ => format!("// {}\n", note),
    };
    GeneratedFile {
        path: file.path.clone(),
        language: file.language.to_string(),
        content,
    }
}

pub struct GenerateBehavior {
    llm: Arc<dyn LLMProvider>,
    prompts: Arc<PromptTemplateEngine>,
    temperature: RwLock<f32>,
    max_tokens: u32,
    event_bus: Option<EventBus>,
}

impl GenerateBehavior {
    pub fn new(llm: Arc<dyn LLMProvider>, prompts: Arc<PromptTemplateEngine>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            llm,
            prompts,
            temperature: RwLock::new(temperature.clamp(0.0, 2.0)),
            max_tokens,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn temperature(&self) -> f32 {
        *self.temperature.read()
    }

    async fn request_files(
        &self,
        template: &str,
        context: serde_json::Value,
        files: &[FileSpec],
        target: &str,
    ) -> Result<Vec<GeneratedFile>, AgentError> {
        let prompt = self
            .prompts
            .render(template, &context)
            .map_err(|e| AgentError::execution_at(format!("{:#}", e), target))?;
        let options = GenerationOptions {
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature()),
            stop_sequences: None,
        };
        let response = self.llm.generate(&prompt, &options).await?;
        assign_blocks(extract_code_blocks(&response.text), files, target)
    }

    async fn generate_component(&self, component: &ComponentMapping, options: &ConversionOptions) -> ComponentArtifact {
        let files = component_files(&component.component_name, &component.file_stem, options);
        let context = json!({
            "component": component,
            "options": options,
            "files": files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
        });

        match self
            .request_files(component_template(options.framework), context, &files, &component.component_name)
            .await
        {
            Ok(generated) => {
                debug!(component = %component.component_name, files = generated.len(), "Component generated");
                ComponentArtifact::Generated {
                    component_name: component.component_name.clone(),
                    node_id: component.node_id.clone(),
                    files: generated,
                }
            }
            Err(e) => self.failed(&component.component_name, &component.node_id, &files, &e),
        }
    }

    async fn generate_layout(
        &self,
        mapping: &MappingResult,
        components: &[ComponentArtifact],
        options: &ConversionOptions,
    ) -> ComponentArtifact {
        let files = component_files(LAYOUT_NAME, LAYOUT_STEM, options);
        let included: Vec<&ComponentMapping> = mapping
            .components
            .iter()
            .filter(|m| {
                components
                    .iter()
                    .any(|a| !a.is_failed() && a.component_name() == m.component_name)
            })
            .collect();
        let context = json!({
            "layoutName": LAYOUT_NAME,
            "designName": mapping.design_name,
            "options": options,
            "components": included,
            "files": files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
        });

        match self.request_files(LAYOUT, context, &files, LAYOUT_NAME).await {
            Ok(generated) => ComponentArtifact::Generated {
                component_name: LAYOUT_NAME.to_string(),
                node_id: LAYOUT_NODE_ID.to_string(),
                files: generated,
            },
            Err(e) => self.failed(LAYOUT_NAME, LAYOUT_NODE_ID, &files, &e),
        }
    }

    fn failed(&self, component_name: &str, node_id: &str, files: &[FileSpec], error: &AgentError) -> ComponentArtifact {
        let error = error.to_string();
        warn!(component = %component_name, node_id = %node_id, error = %error, "Component generation failed");
        if let Some(bus) = &self.event_bus {
            bus.publish_pipeline_event(PipelineEvent::ComponentGenerationFailed {
                component_name: component_name.to_string(),
                node_id: node_id.to_string(),
                error: error.clone(),
                failed_at: Utc::now(),
            });
        }
        ComponentArtifact::Failed {
            component_name: component_name.to_string(),
            node_id: node_id.to_string(),
            files: files.first().map(|f| placeholder(f, component_name, &error)).into_iter().collect(),
            error,
        }
    }
}

#[async_trait]
impl AgentBehavior for GenerateBehavior {
    type Input = GenerateRequest;
    type Output = GenerationResult;

    async fn execute(&self, input: &GenerateRequest) -> Result<GenerationResult, AgentError> {
        let mut components = Vec::with_capacity(input.mapping.components.len());
        for component in &input.mapping.components {
            components.push(self.generate_component(component, &input.options).await);
        }

        let layout = if input.options.include_layout {
            Some(self.generate_layout(&input.mapping, &components, &input.options).await)
        } else {
            None
        };

        let result = GenerationResult {
            options: input.options.clone(),
            components,
            layout,
        };
        info!(
            components = result.components.len(),
            failed = result.failed_count(),
            framework = %input.options.framework.as_str(),
            "Generation finished"
        );
        Ok(result)
    }

    fn perform_learning(&self, feedback: &[FeedbackItem], learning_rate: f64) -> Result<(), AgentError> {
        let ratio = failure_ratio(feedback);
        let mut temperature = self.temperature.write();
        let before = *temperature;
        *temperature = (before * (1.0 - (learning_rate * ratio) as f32)).clamp(0.0, 2.0);
        info!(before, after = *temperature, failure_ratio = ratio, "Adjusted sampling temperature");
        Ok(())
    }
}
