// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end pipeline behaviour: stage caching, component failure isolation
//! and progress events.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use prism_core::application::pipeline::{PipelineComponents, PipelineOrchestrator};
use prism_core::domain::agent::AgentStatus;
use prism_core::domain::events::PipelineEvent;
use prism_core::domain::llm::{GenerationOptions, GenerationResponse, LLMError, LLMProvider};
use prism_core::domain::pipeline::{ComponentArtifact, ConversionOptions, PipelineError, Stage};
use prism_core::infrastructure::event_bus::{DomainEvent, EventBus};
use prism_core::infrastructure::AgentRegistry;

/// Answers every prompt with an Angular component unless the prompt names
/// `fail_on`.
struct ScriptedLlm {
    fail_on: Option<&'static str>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(fail_on: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            fail_on,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<GenerationResponse, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(name) = self.fail_on {
            if prompt.contains(name) {
                return Err(LLMError::Provider("upstream timeout".into()));
            }
        }
        Ok(GenerationResponse::text_only(
            "```typescript\nimport { Component, Input } from '@angular/core';\n\n@Component({ selector: 'app-x', templateUrl: './x.component.html' })\nexport class X {\n  @Input() label = '';\n}\n```\n\
             ```html\n<section class=\"x\">\n  <span>{{ label }}</span>\n</section>\n```\n\
             ```scss\n.x {\n  display: flex;\n  max-width: 100%;\n}\n```",
            "scripted",
        ))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

fn orchestrator(llm: Arc<ScriptedLlm>) -> (PipelineOrchestrator, Arc<AgentRegistry>, EventBus) {
    let mut components = PipelineComponents::with_defaults(llm).unwrap();
    // Keep the model out of pattern detection so call counts only reflect generation.
    components.patterns.llm_fallback = false;
    let registry = Arc::new(AgentRegistry::new());
    let bus = EventBus::with_default_capacity();
    let orchestrator = PipelineOrchestrator::new(components, registry.clone(), bus.clone());
    (orchestrator, registry, bus)
}

fn frame(id: &str, name: &str, label: &str) -> Value {
    json!({
        "id": id, "name": name, "type": "FRAME",
        "layoutMode": "HORIZONTAL", "itemSpacing": 8.0,
        "absoluteBoundingBox": { "x": 0.0, "y": 0.0, "width": 320.0, "height": 48.0 },
        "children": [{ "id": format!("{}-t", id), "name": "Label", "type": "TEXT", "characters": label }]
    })
}

fn storefront() -> Value {
    json!({
        "name": "Storefront",
        "document": {
            "id": "0:0", "name": "Document", "type": "DOCUMENT",
            "children": [{
                "id": "0:1", "name": "Home", "type": "CANVAS",
                "children": [
                    frame("1:1", "Header", "Shop"),
                    frame("2:1", "Product Tile", "Sneakers"),
                    frame("3:1", "Checkout Bar", "Pay now"),
                ]
            }]
        },
        "styles": {}
    })
}

fn drain(receiver: &mut prism_core::infrastructure::event_bus::EventReceiver) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        if let DomainEvent::Pipeline(event) = event {
            events.push(event);
        }
    }
    events
}

#[tokio::test]
async fn test_second_conversion_is_served_from_memory() {
    let llm = ScriptedLlm::new(None);
    let (orchestrator, _registry, _bus) = orchestrator(llm.clone());

    let first = orchestrator.convert(&storefront(), ConversionOptions::default()).await.unwrap();
    assert_eq!(llm.calls(), 3);

    let second = orchestrator.convert(&storefront(), ConversionOptions::default()).await.unwrap();
    assert_eq!(llm.calls(), 3, "cached generation must not call the model again");
    assert!(Arc::ptr_eq(&first.parsed, &second.parsed));
    assert!(Arc::ptr_eq(&first.generation, &second.generation));
    assert!(Arc::ptr_eq(&first.validation, &second.validation));
}

#[tokio::test]
async fn test_changed_options_miss_generate_cache() {
    let llm = ScriptedLlm::new(None);
    let (orchestrator, _registry, _bus) = orchestrator(llm.clone());

    let first = orchestrator.convert(&storefront(), ConversionOptions::default()).await.unwrap();
    let loose = ConversionOptions {
        strict_types: false,
        ..ConversionOptions::default()
    };
    let second = orchestrator.convert(&storefront(), loose).await.unwrap();

    assert!(Arc::ptr_eq(&first.mapping, &second.mapping));
    assert!(!Arc::ptr_eq(&first.generation, &second.generation));
    assert_eq!(llm.calls(), 6);
}

#[tokio::test]
async fn test_failing_component_becomes_placeholder() {
    let llm = ScriptedLlm::new(Some("CheckoutBar"));
    let (orchestrator, _registry, bus) = orchestrator(llm);
    let mut events = bus.subscribe();

    let result = orchestrator.convert(&storefront(), ConversionOptions::default()).await.unwrap();
    let generation = &result.generation;

    assert_eq!(generation.components.len(), 3);
    assert_eq!(generation.failed_count(), 1);
    match &generation.components[2] {
        ComponentArtifact::Failed { component_name, error, files, .. } => {
            assert_eq!(component_name, "CheckoutBar");
            assert!(error.contains("upstream timeout"));
            assert!(!files.is_empty());
        }
        other => panic!("expected placeholder, got {:?}", other),
    }
    assert!(!generation.components[0].is_failed());
    assert!(!generation.components[1].is_failed());

    assert!(result
        .validation
        .issues
        .iter()
        .any(|issue| issue.rule_id == "generation-failed"));

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::ComponentGenerationFailed { component_name, .. } if component_name == "CheckoutBar"
    )));
}

#[tokio::test]
async fn test_isolated_failure_feeds_generator_learning() {
    let llm = ScriptedLlm::new(Some("CheckoutBar"));
    let (orchestrator, _registry, _bus) = orchestrator(llm);

    orchestrator.convert(&storefront(), ConversionOptions::default()).await.unwrap();

    let generator = orchestrator.generate_agent();
    let feedback = generator.feedback_items();
    assert_eq!(feedback.len(), 2);
    assert!(!feedback[0].success, "newest item is the component failure");
    assert!(feedback[1].success);

    // 1 / (1 + e^-0.1) weighted success is below the default 0.7 threshold.
    assert_eq!(generator.state().version, 1);
    assert!(generator.behavior().temperature() < 0.2);
}

#[tokio::test]
async fn test_invalid_export_aborts_before_any_stage_work() {
    let llm = ScriptedLlm::new(None);
    let (orchestrator, _registry, _bus) = orchestrator(llm.clone());

    let err = orchestrator
        .convert(&json!({ "name": "Broken", "document": { "id": "0:0", "children": [] } }), ConversionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidInput { stage: Stage::Parse, .. }));
    assert_eq!(err.target(), Some("document.type"));
    assert!(orchestrator.parse_agent().feedback_items().is_empty());
    assert_eq!(orchestrator.parse_agent().state().status, AgentStatus::Idle);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_progress_events_in_stage_order() {
    let llm = ScriptedLlm::new(None);
    let (orchestrator, _registry, bus) = orchestrator(llm);
    let mut receiver = bus.subscribe();

    orchestrator.convert(&storefront(), ConversionOptions::default()).await.unwrap();
    let events = drain(&mut receiver);

    assert!(matches!(events.first(), Some(PipelineEvent::ConversionStarted { .. })));
    assert!(matches!(events.last(), Some(PipelineEvent::ConversionCompleted { .. })));
    let completed: Vec<Stage> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StageCompleted { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        completed,
        vec![Stage::Parse, Stage::Analyze, Stage::Map, Stage::Generate, Stage::Validate]
    );

    orchestrator.convert(&storefront(), ConversionOptions::default()).await.unwrap();
    let hits = drain(&mut receiver)
        .into_iter()
        .filter(|e| matches!(e, PipelineEvent::StageCacheHit { .. }))
        .count();
    assert_eq!(hits, 5);
}

#[tokio::test]
async fn test_agents_register_and_unregister_with_orchestrator() {
    let llm = ScriptedLlm::new(None);
    let (orchestrator, registry, _bus) = orchestrator(llm);

    let names: Vec<String> = registry.snapshots().into_iter().map(|s| s.name).collect();
    for expected in ["parser", "analyzer", "mapper", "generator", "validator"] {
        assert!(names.iter().any(|n| n == expected), "missing {}", expected);
    }

    drop(orchestrator);
    assert!(registry.is_empty());
}
