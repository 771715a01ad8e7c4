// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Agent lifecycle, registry and learning observed from outside the crate.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use prism_core::application::lifecycle::{Agent, AgentBehavior, AgentSettings};
use prism_core::domain::agent::{AgentError, AgentIdentity, AgentStatus};
use prism_core::domain::events::{AgentLifecycleEvent, LearningEvent};
use prism_core::domain::feedback::{failure_ratio, FeedbackItem};
use prism_core::infrastructure::event_bus::{DomainEvent, EventBus};
use prism_core::infrastructure::AgentRegistry;

/// Upper-cases text; fails on inputs starting with '!'. Learning records the
/// failure share it was shown.
#[derive(Default)]
struct Shouter {
    seen_failure_ratios: Mutex<Vec<f64>>,
}

#[async_trait]
impl AgentBehavior for Shouter {
    type Input = String;
    type Output = String;

    fn validate_input(&self, input: &String) -> Result<(), AgentError> {
        if input.is_empty() {
            return Err(AgentError::invalid_input("input", "empty"));
        }
        Ok(())
    }

    async fn execute(&self, input: &String) -> Result<String, AgentError> {
        if input.starts_with('!') {
            return Err(AgentError::execution_at("refusing to shout", input.clone()));
        }
        Ok(input.to_uppercase())
    }

    fn perform_learning(&self, feedback: &[FeedbackItem], _learning_rate: f64) -> Result<(), AgentError> {
        self.seen_failure_ratios.lock().push(failure_ratio(feedback));
        Ok(())
    }
}

fn drain(receiver: &mut prism_core::infrastructure::event_bus::EventReceiver) -> Vec<DomainEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_failures_trigger_learning_and_events() {
    let bus = EventBus::with_default_capacity();
    let registry = Arc::new(AgentRegistry::with_event_bus(bus.clone()));
    let mut receiver = bus.subscribe();

    let agent = Agent::registered(
        AgentIdentity::new("shouter", ["text"]),
        Shouter::default(),
        AgentSettings::default(),
        registry.clone(),
    );
    agent.attach_observer(Arc::new(bus.clone()));

    for _ in 0..10 {
        assert_eq!(agent.execute(&"hi".to_string()).await.unwrap(), "HI");
    }
    assert_eq!(agent.state().version, 0);

    let err = agent.execute(&"!no".to_string()).await.unwrap_err();
    assert_eq!(err.target(), Some("!no"));

    // Newest failure weighs 1.0 against ten decayed successes: still above 0.7.
    assert_eq!(agent.state().version, 0);
    assert!(agent.state().success_rate > 0.7);

    for _ in 0..3 {
        let _ = agent.execute(&"!again".to_string()).await;
    }
    let state = agent.state();
    assert!(state.version >= 1);
    assert_eq!(state.status, AgentStatus::Idle);
    assert!(!agent.behavior().seen_failure_ratios.lock().is_empty());

    let events = drain(&mut receiver);
    assert!(events.iter().any(|e| matches!(
        e,
        DomainEvent::AgentLifecycle(AgentLifecycleEvent::AgentRegistered { name, .. }) if name == "shouter"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        DomainEvent::AgentLifecycle(AgentLifecycleEvent::StateChanged { to: AgentStatus::Processing, .. })
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, DomainEvent::Learning(LearningEvent::LearningCompleted { .. }))));
}

#[tokio::test]
async fn test_rejected_input_leaves_no_trace() {
    let agent = Agent::new(AgentIdentity::new("shouter", ["text"]), Shouter::default(), AgentSettings::default());

    let err = agent.execute(&String::new()).await.unwrap_err();
    assert!(err.is_input_error());
    assert!(agent.feedback_items().is_empty());
    assert_eq!(agent.state().last_execution_time, None);
    assert_eq!(agent.state().success_rate, 1.0);
}

#[tokio::test]
async fn test_memory_evicts_least_used_result() {
    let settings = AgentSettings {
        memory_capacity: 2,
        ..AgentSettings::default()
    };
    let agent = Agent::new(AgentIdentity::new("shouter", ["text"]), Shouter::default(), settings);

    agent.remember("a", Arc::new("A".to_string()));
    agent.remember("b", Arc::new("B".to_string()));
    assert!(agent.recall("a").is_some());
    agent.remember("c", Arc::new("C".to_string()));

    assert_eq!(agent.memory_size(), 2);
    assert!(agent.recall("b").is_none());
    assert_eq!(agent.recall("a").as_deref().map(String::as_str), Some("A"));
    assert!(agent.recall("c").is_some());
}

#[test]
fn test_registry_ignores_duplicate_registration() {
    let registry = Arc::new(AgentRegistry::new());
    let agent = Agent::registered(
        AgentIdentity::new("shouter", ["text"]),
        Shouter::default(),
        AgentSettings::default(),
        registry.clone(),
    );

    assert!(!registry.register(agent.clone()));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.find_by_name("SHOUT").len(), 1);

    agent.dispose();
    assert!(registry.is_empty());
}
