// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Pipeline Orchestrator
//!
//! Runs Parse, Analyze, Map, Generate and Validate in sequence. Before a
//! stage executes, its agent's memory is probed with a cache key derived from
//! a structural summary of the stage input plus the options the stage
//! depends on. A hit hands back the remembered `Arc` untouched.
//!
//! Cache keys are deliberately coarse: two inputs with the same summary share
//! a cached result even when they differ in detail (for example two designs
//! with the same name, root id, node count and style count).
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Stage sequencing, result caching, progress events, metrics

use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{info, warn};

use crate::application::agents::{
    stage_identity, AnalyzeBehavior, GenerateBehavior, GenerateRequest, MapBehavior, ParseBehavior,
    ValidateBehavior,
};
use crate::application::lifecycle::{Agent, AgentBehavior, AgentSettings};
use crate::application::patterns::{PatternClassifier, PatternEnsemble, PrototypeClassifier, RuleSet};
use crate::domain::agent::{AgentSnapshot, ManagedAgent};
use crate::domain::config::{AgentScope, GenerationDefaults, PatternConfig, PrismConfigManifest};
use crate::domain::events::PipelineEvent;
use crate::domain::feedback::Feedback;
use crate::domain::llm::LLMProvider;
use crate::domain::pipeline::{
    ComponentArtifact, ConversionId, ConversionOptions, ConversionResult, DesignAnalysis,
    GenerationResult, MappingResult, ParsedDesign, PipelineError, Stage, ValidationReport,
};
use crate::domain::tooling::{Linter, SourceParser};
use crate::infrastructure::agent_registry::AgentRegistry;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::prompt_template_engine::PromptTemplateEngine;
use crate::infrastructure::tooling::{DelimiterParser, RuleLinter};

// ============================================================================
// Cache keys
// ============================================================================

fn digest(stage: Stage, summary: &Value) -> String {
    let hash = Sha256::digest(summary.to_string().as_bytes());
    format!("{}:{}", stage, hex::encode(hash))
}

fn count_raw_nodes(node: &Value) -> usize {
    1 + node
        .get("children")
        .and_then(Value::as_array)
        .map(|children| children.iter().map(count_raw_nodes).sum())
        .unwrap_or(0)
}

/// Document name, root id, node count and style count.
pub fn parse_cache_key(raw: &Value) -> String {
    let document = raw.get("document");
    digest(
        Stage::Parse,
        &json!({
            "name": raw.get("name").and_then(Value::as_str).unwrap_or_default(),
            "root": document.and_then(|d| d.get("id")).and_then(Value::as_str).unwrap_or_default(),
            "nodes": document.map(count_raw_nodes).unwrap_or(0),
            "styles": raw.get("styles").and_then(Value::as_object).map(|s| s.len()).unwrap_or(0),
        }),
    )
}

/// `(id, type, child count)` of every node.
pub fn analyze_cache_key(parsed: &ParsedDesign) -> String {
    let nodes: Vec<Value> = parsed
        .nodes
        .iter()
        .map(|n| json!([n.id, n.node_type, n.child_count]))
        .collect();
    digest(Stage::Analyze, &Value::Array(nodes))
}

/// Pattern counts and component candidate ids.
pub fn map_cache_key(analysis: &DesignAnalysis) -> String {
    digest(
        Stage::Map,
        &json!({
            "patterns": analysis.patterns.counts(),
            "candidates": analysis.parsed.component_candidates,
        }),
    )
}

/// Component names and node ids plus every generation option.
pub fn generate_cache_key(mapping: &MappingResult, options: &ConversionOptions) -> String {
    let components: Vec<Value> = mapping
        .components
        .iter()
        .map(|c| json!([c.component_name, c.node_id]))
        .collect();
    digest(
        Stage::Generate,
        &json!({ "components": components, "options": options }),
    )
}

/// File count per component plus the options validation depends on.
pub fn validate_cache_key(generation: &GenerationResult) -> String {
    let files: Vec<Value> = generation
        .components
        .iter()
        .chain(generation.layout.iter())
        .map(|a| json!([a.component_name(), a.files().len()]))
        .collect();
    digest(
        Stage::Validate,
        &json!({ "files": files, "options": generation.options }),
    )
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Collaborators shared by the five agents of one orchestrator.
#[derive(Clone)]
pub struct PipelineComponents {
    pub llm: Arc<dyn LLMProvider>,
    pub classifier: Option<Arc<dyn PatternClassifier>>,
    pub prompts: Arc<PromptTemplateEngine>,
    pub linter: Arc<dyn Linter>,
    pub parser: Arc<dyn SourceParser>,
    pub patterns: PatternConfig,
    pub generation: GenerationDefaults,
    pub agents: AgentSettings,
}

impl PipelineComponents {
    /// In-tree classifier, linter and parser around `llm`.
    pub fn with_defaults(llm: Arc<dyn LLMProvider>) -> anyhow::Result<Self> {
        Ok(Self {
            llm,
            classifier: Some(Arc::new(PrototypeClassifier::with_default_prototypes())),
            prompts: Arc::new(PromptTemplateEngine::new()?),
            linter: Arc::new(RuleLinter::default()),
            parser: Arc::new(DelimiterParser::new()),
            patterns: PatternConfig::default(),
            generation: GenerationDefaults::default(),
            agents: AgentSettings::default(),
        })
    }
}

pub struct PipelineOrchestrator {
    parse: Arc<Agent<ParseBehavior>>,
    analyze: Arc<Agent<AnalyzeBehavior>>,
    map: Arc<Agent<MapBehavior>>,
    generate: Arc<Agent<GenerateBehavior>>,
    validate: Arc<Agent<ValidateBehavior>>,
    event_bus: EventBus,
}

impl PipelineOrchestrator {
    /// Builds the five agents, registers them and attaches the event bus.
    pub fn new(components: PipelineComponents, registry: Arc<AgentRegistry>, event_bus: EventBus) -> Self {
        let settings = components.agents;
        let ensemble = Arc::new(PatternEnsemble::new(
            RuleSet::default_rules(),
            components.classifier.clone(),
            Some(components.llm.clone()),
            components.prompts.clone(),
            &components.patterns,
        ));
        let observer: Arc<EventBus> = Arc::new(event_bus.clone());

        let parse = Agent::registered(stage_identity(Stage::Parse), ParseBehavior::new(), settings, registry.clone());
        let analyze = Agent::registered(
            stage_identity(Stage::Analyze),
            AnalyzeBehavior::new(ensemble),
            settings,
            registry.clone(),
        );
        let map = Agent::registered(stage_identity(Stage::Map), MapBehavior::new(), settings, registry.clone());
        let generate = Agent::registered(
            stage_identity(Stage::Generate),
            GenerateBehavior::new(
                components.llm.clone(),
                components.prompts.clone(),
                components.generation.temperature,
                components.generation.max_tokens,
            )
            .with_event_bus(event_bus.clone()),
            settings,
            registry.clone(),
        );
        let validate = Agent::registered(
            stage_identity(Stage::Validate),
            ValidateBehavior::new(components.linter.clone(), components.parser.clone()),
            settings,
            registry,
        );

        parse.attach_observer(observer.clone());
        analyze.attach_observer(observer.clone());
        map.attach_observer(observer.clone());
        generate.attach_observer(observer.clone());
        validate.attach_observer(observer);

        Self {
            parse,
            analyze,
            map,
            generate,
            validate,
            event_bus,
        }
    }

    pub fn parse_agent(&self) -> &Arc<Agent<ParseBehavior>> {
        &self.parse
    }

    pub fn analyze_agent(&self) -> &Arc<Agent<AnalyzeBehavior>> {
        &self.analyze
    }

    pub fn map_agent(&self) -> &Arc<Agent<MapBehavior>> {
        &self.map
    }

    pub fn generate_agent(&self) -> &Arc<Agent<GenerateBehavior>> {
        &self.generate
    }

    pub fn validate_agent(&self) -> &Arc<Agent<ValidateBehavior>> {
        &self.validate
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Snapshots of this orchestrator's agents, in stage order.
    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        vec![
            self.parse.snapshot(),
            self.analyze.snapshot(),
            self.map.snapshot(),
            self.generate.snapshot(),
            self.validate.snapshot(),
        ]
    }

    pub async fn parse(&self, raw: &Value) -> Result<Arc<ParsedDesign>, PipelineError> {
        self.parse_in(ConversionId::new(), raw).await
    }

    pub async fn analyze(&self, parsed: Arc<ParsedDesign>) -> Result<Arc<DesignAnalysis>, PipelineError> {
        self.analyze_in(ConversionId::new(), parsed).await
    }

    pub async fn map(&self, analysis: Arc<DesignAnalysis>) -> Result<Arc<MappingResult>, PipelineError> {
        self.map_in(ConversionId::new(), analysis).await
    }

    pub async fn generate(
        &self,
        mapping: Arc<MappingResult>,
        options: ConversionOptions,
    ) -> Result<Arc<GenerationResult>, PipelineError> {
        self.generate_in(ConversionId::new(), mapping, options).await
    }

    pub async fn validate(&self, generation: Arc<GenerationResult>) -> Result<Arc<ValidationReport>, PipelineError> {
        self.validate_in(ConversionId::new(), generation).await
    }

    /// Full conversion. The first failing stage aborts the run; component
    /// generation failures do not.
    pub async fn convert(&self, raw: &Value, options: ConversionOptions) -> Result<ConversionResult, PipelineError> {
        let conversion_id = ConversionId::new();
        let started = Instant::now();
        let design_name = raw
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info!(conversion_id = %conversion_id, design = %design_name, "Conversion started");
        self.event_bus.publish_pipeline_event(PipelineEvent::ConversionStarted {
            conversion_id,
            design_name,
            started_at: Utc::now(),
        });

        let parsed = self.parse_in(conversion_id, raw).await?;
        let analysis = self.analyze_in(conversion_id, parsed.clone()).await?;
        let mapping = self.map_in(conversion_id, analysis.clone()).await?;
        let generation = self.generate_in(conversion_id, mapping.clone(), options).await?;
        let validation = self.validate_in(conversion_id, generation.clone()).await?;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            conversion_id = %conversion_id,
            overall_score = validation.scores.overall,
            passed = validation.passed,
            failed_components = generation.failed_count(),
            duration_ms,
            "Conversion completed"
        );
        self.event_bus.publish_pipeline_event(PipelineEvent::ConversionCompleted {
            conversion_id,
            overall_score: validation.scores.overall,
            duration_ms,
            completed_at: Utc::now(),
        });

        Ok(ConversionResult {
            parsed,
            analysis,
            mapping,
            generation,
            validation,
        })
    }

    /// Unregisters the agents and drops their cached results.
    pub fn dispose(&self) {
        self.parse.dispose();
        self.analyze.dispose();
        self.map.dispose();
        self.generate.dispose();
        self.validate.dispose();
    }

    async fn parse_in(&self, id: ConversionId, raw: &Value) -> Result<Arc<ParsedDesign>, PipelineError> {
        let key = parse_cache_key(raw);
        self.run_stage(id, Stage::Parse, &self.parse, key, raw)
            .await
            .map(|(out, _)| out)
    }

    async fn analyze_in(&self, id: ConversionId, parsed: Arc<ParsedDesign>) -> Result<Arc<DesignAnalysis>, PipelineError> {
        let key = analyze_cache_key(&parsed);
        self.run_stage(id, Stage::Analyze, &self.analyze, key, &parsed)
            .await
            .map(|(out, _)| out)
    }

    async fn map_in(&self, id: ConversionId, analysis: Arc<DesignAnalysis>) -> Result<Arc<MappingResult>, PipelineError> {
        let key = map_cache_key(&analysis);
        self.run_stage(id, Stage::Map, &self.map, key, &analysis)
            .await
            .map(|(out, _)| out)
    }

    async fn generate_in(
        &self,
        id: ConversionId,
        mapping: Arc<MappingResult>,
        options: ConversionOptions,
    ) -> Result<Arc<GenerationResult>, PipelineError> {
        let key = generate_cache_key(&mapping, &options);
        let request = GenerateRequest { mapping, options };
        let (generation, cached) = self
            .run_stage(id, Stage::Generate, &self.generate, key, &request)
            .await?;

        if !cached {
            // Isolated component failures still count against the generator.
            for artifact in generation.components.iter().chain(generation.layout.iter()) {
                if let ComponentArtifact::Failed { component_name, error, .. } = artifact {
                    let feedback = Feedback::failure(json!({
                        "error": error,
                        "target": component_name,
                    }));
                    if let Err(e) = self.generate.process_feedback(feedback) {
                        warn!(component = %component_name, error = %e, "Generator learning failed");
                    }
                }
            }
        }
        Ok(generation)
    }

    async fn validate_in(&self, id: ConversionId, generation: Arc<GenerationResult>) -> Result<Arc<ValidationReport>, PipelineError> {
        let key = validate_cache_key(&generation);
        self.run_stage(id, Stage::Validate, &self.validate, key, &generation)
            .await
            .map(|(out, _)| out)
    }

    /// Cache probe, then execution. The flag is true on a cache hit.
    async fn run_stage<B: AgentBehavior>(
        &self,
        conversion_id: ConversionId,
        stage: Stage,
        agent: &Arc<Agent<B>>,
        cache_key: String,
        input: &B::Input,
    ) -> Result<(Arc<B::Output>, bool), PipelineError> {
        if let Some(hit) = agent.recall(&cache_key) {
            metrics::counter!("prism_stage_cache_hits_total", "stage" => stage.as_str()).increment(1);
            info!(conversion_id = %conversion_id, stage = %stage, "Stage cache hit");
            self.event_bus.publish_pipeline_event(PipelineEvent::StageCacheHit {
                conversion_id,
                stage,
                cache_key,
                hit_at: Utc::now(),
            });
            return Ok((hit, true));
        }

        metrics::counter!("prism_stage_cache_misses_total", "stage" => stage.as_str()).increment(1);
        self.event_bus.publish_pipeline_event(PipelineEvent::StageStarted {
            conversion_id,
            stage,
            cache_key: cache_key.clone(),
            started_at: Utc::now(),
        });

        let started = Instant::now();
        match agent.execute(input).await {
            Ok(output) => {
                let output = Arc::new(output);
                agent.remember(cache_key, output.clone());
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(conversion_id = %conversion_id, stage = %stage, duration_ms, "Stage completed");
                self.event_bus.publish_pipeline_event(PipelineEvent::StageCompleted {
                    conversion_id,
                    stage,
                    duration_ms,
                    completed_at: Utc::now(),
                });
                Ok((output, false))
            }
            Err(err) => {
                metrics::counter!("prism_stage_failures_total", "stage" => stage.as_str()).increment(1);
                let err = PipelineError::from_agent(stage, err);
                warn!(conversion_id = %conversion_id, stage = %stage, error = %err, "Stage failed");
                self.event_bus.publish_pipeline_event(PipelineEvent::StageFailed {
                    conversion_id,
                    stage,
                    error: err.agent_error().to_string(),
                    target: err.target().map(str::to_string),
                    failed_at: Utc::now(),
                });
                Err(err)
            }
        }
    }
}

impl Drop for PipelineOrchestrator {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Hands out orchestrators according to the configured agent scope: one
/// shared instance, or a fresh one (fresh agents, empty caches) per request.
pub struct PipelineFactory {
    components: PipelineComponents,
    registry: Arc<AgentRegistry>,
    event_bus: EventBus,
    scope: AgentScope,
    shared: OnceLock<Arc<PipelineOrchestrator>>,
}

impl PipelineFactory {
    pub fn new(
        components: PipelineComponents,
        registry: Arc<AgentRegistry>,
        event_bus: EventBus,
        scope: AgentScope,
    ) -> Self {
        Self {
            components,
            registry,
            event_bus,
            scope,
            shared: OnceLock::new(),
        }
    }

    /// Components from the configuration's agent, pattern and generation
    /// sections around an already resolved provider.
    pub fn from_config(
        config: &PrismConfigManifest,
        llm: Arc<dyn LLMProvider>,
        registry: Arc<AgentRegistry>,
        event_bus: EventBus,
    ) -> anyhow::Result<Self> {
        let mut components = PipelineComponents::with_defaults(llm)?;
        if !config.spec.patterns.classifier_enabled {
            components.classifier = None;
        }
        components.patterns = config.spec.patterns.clone();
        components.generation = config.spec.generation.clone();
        components.agents = AgentSettings::from(&config.spec.agents);
        Ok(Self::new(components, registry, event_bus, config.spec.agents.agent_scope))
    }

    pub fn scope(&self) -> AgentScope {
        self.scope
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Default options from the generation section.
    pub fn default_options(&self) -> ConversionOptions {
        self.components.generation.conversion_options()
    }

    pub fn orchestrator(&self) -> Arc<PipelineOrchestrator> {
        match self.scope {
            AgentScope::Shared => self
                .shared
                .get_or_init(|| Arc::new(self.build()))
                .clone(),
            AgentScope::PerRequest => Arc::new(self.build()),
        }
    }

    fn build(&self) -> PipelineOrchestrator {
        PipelineOrchestrator::new(self.components.clone(), self.registry.clone(), self.event_bus.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::{PatternMatch, PatternResults, PatternSource};

    fn raw(name: &str, leaf: &str) -> Value {
        json!({
            "name": name,
            "document": {
                "id": "0:0", "type": "DOCUMENT",
                "children": [{ "id": "1:1", "type": "FRAME", "name": leaf }]
            }
        })
    }

    #[test]
    fn test_parse_key_is_lossy_but_structural() {
        // Same summary, different detail: same key.
        assert_eq!(parse_cache_key(&raw("Shop", "A")), parse_cache_key(&raw("Shop", "B")));
        assert_ne!(parse_cache_key(&raw("Shop", "A")), parse_cache_key(&raw("Blog", "A")));
        assert!(parse_cache_key(&raw("Shop", "A")).starts_with("parse:"));
        // Garbage still yields a key.
        assert!(parse_cache_key(&json!(42)).starts_with("parse:"));
    }

    #[test]
    fn test_generate_key_tracks_options() {
        let mapping = MappingResult {
            design_name: "Shop".into(),
            components: vec![],
        };
        let angular = generate_cache_key(&mapping, &ConversionOptions::default());
        let layout = generate_cache_key(
            &mapping,
            &ConversionOptions {
                include_layout: true,
                ..ConversionOptions::default()
            },
        );
        assert_ne!(angular, layout);
        assert_eq!(angular, generate_cache_key(&mapping, &ConversionOptions::default()));
    }

    #[test]
    fn test_map_key_uses_pattern_counts() {
        let parsed: ParsedDesign = ParsedDesign {
            document: serde_json::from_value(json!({"document": {"id": "0", "type": "DOCUMENT"}})).unwrap(),
            nodes: vec![],
            component_candidates: vec!["1".into()],
            styles: Default::default(),
        };
        let analysis = |confidence: f64| DesignAnalysis {
            parsed: Arc::new(parsed.clone()),
            patterns: PatternResults::from_matches(vec![PatternMatch::new("card", "1", confidence, PatternSource::Rule)]),
            style_issues: vec![],
            enriched_nodes: vec![],
        };
        // Confidence is not part of the summary.
        assert_eq!(map_cache_key(&analysis(0.9)), map_cache_key(&analysis(0.6)));
    }
}
