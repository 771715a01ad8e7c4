// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Agent Lifecycle
//!
//! The wrapper every pipeline agent runs inside. A specialized agent only
//! supplies an [`AgentBehavior`]; [`Agent`] owns its state record, bounded
//! memory and feedback loop and enforces the state machine:
//!
//! ```text
//! Idle -> Processing -> Idle            (success)
//! Idle -> Processing -> Error -> Idle   (failure, error re-raised)
//! Idle -> Learning   -> Idle            (feedback rate below threshold)
//! Idle -> Learning   -> Error -> Idle   (learning hook failed)
//! ```
//!
//! Whatever happens, including the future being dropped mid-execution,
//! the agent comes back to `Idle`.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Shared execution, feedback and learning contract

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::agent::{
    AgentError, AgentIdentity, AgentSnapshot, AgentState, AgentStatus, ManagedAgent,
};
use crate::domain::config::AgentsConfig;
use crate::domain::feedback::{Feedback, FeedbackItem, FeedbackLoop};
use crate::domain::memory::BoundedMemory;
use crate::infrastructure::agent_registry::AgentRegistry;

/// Domain logic of a specialized agent.
#[async_trait]
pub trait AgentBehavior: Send + Sync + 'static {
    type Input: Send + Sync;
    type Output: Send + Sync + 'static;

    /// Rejects malformed input before the lifecycle starts. Errors from here
    /// are returned as-is and are not recorded as feedback.
    fn validate_input(&self, _input: &Self::Input) -> Result<(), AgentError> {
        Ok(())
    }

    async fn execute(&self, input: &Self::Input) -> Result<Self::Output, AgentError>;

    /// Adjusts internal tunables from the recorded outcomes (newest first).
    fn perform_learning(&self, feedback: &[FeedbackItem], learning_rate: f64)
        -> Result<(), AgentError>;
}

/// Receives lifecycle notifications from agents it is attached to.
pub trait AgentObserver: Send + Sync {
    fn state_changed(&self, identity: &AgentIdentity, from: AgentStatus, state: &AgentState);

    fn learning_completed(&self, _identity: &AgentIdentity, _state: &AgentState, _feedback_count: usize) {}

    fn learning_failed(&self, _identity: &AgentIdentity, _error: &AgentError) {}
}

/// Sizes and thresholds of one agent's memory and feedback loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSettings {
    pub memory_capacity: usize,
    pub feedback_capacity: usize,
    pub learning_rate: f64,
    pub threshold: f64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            memory_capacity: 100,
            feedback_capacity: 100,
            learning_rate: 0.1,
            threshold: 0.7,
        }
    }
}

impl From<&AgentsConfig> for AgentSettings {
    fn from(config: &AgentsConfig) -> Self {
        Self {
            memory_capacity: config.memory_capacity,
            feedback_capacity: config.feedback_capacity,
            learning_rate: config.learning_rate,
            threshold: config.threshold,
        }
    }
}

pub struct Agent<B: AgentBehavior> {
    identity: AgentIdentity,
    behavior: B,
    state: Mutex<AgentState>,
    memory: Mutex<BoundedMemory<Arc<B::Output>>>,
    feedback: Mutex<FeedbackLoop>,
    observers: RwLock<Vec<Arc<dyn AgentObserver>>>,
    registry: Option<Arc<AgentRegistry>>,
}

impl<B: AgentBehavior> Agent<B> {
    pub fn new(identity: AgentIdentity, behavior: B, settings: AgentSettings) -> Self {
        Self {
            identity,
            behavior,
            state: Mutex::new(AgentState::new()),
            memory: Mutex::new(BoundedMemory::new(settings.memory_capacity)),
            feedback: Mutex::new(FeedbackLoop::new(
                settings.feedback_capacity,
                settings.learning_rate,
                settings.threshold,
            )),
            observers: RwLock::new(Vec::new()),
            registry: None,
        }
    }

    /// Builds the agent and registers it. `dispose` removes it again.
    pub fn registered(
        identity: AgentIdentity,
        behavior: B,
        settings: AgentSettings,
        registry: Arc<AgentRegistry>,
    ) -> Arc<Self> {
        let mut agent = Self::new(identity, behavior, settings);
        agent.registry = Some(registry.clone());
        let agent = Arc::new(agent);
        registry.register(agent.clone());
        agent
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn state(&self) -> AgentState {
        self.state.lock().clone()
    }

    pub fn attach_observer(&self, observer: Arc<dyn AgentObserver>) {
        self.observers.write().push(observer);
    }

    /// Runs the behavior under the lifecycle contract.
    pub async fn execute(&self, input: &B::Input) -> Result<B::Output, AgentError> {
        self.behavior.validate_input(input)?;

        self.transition(|s| {
            s.status = AgentStatus::Processing;
            s.last_execution_time = Some(Utc::now());
        });
        let _idle = scopeguard::guard((), |_| {
            self.transition(|s| s.status = AgentStatus::Idle);
        });

        let started = Instant::now();
        match self.behavior.execute(input).await {
            Ok(output) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                debug!(agent = %self.identity.name, duration_ms, "Execution succeeded");
                if let Err(e) = self.process_feedback(Feedback::success(json!({
                    "durationMs": duration_ms,
                }))) {
                    warn!(agent = %self.identity.name, error = %e, "Learning after successful execution failed");
                }
                Ok(output)
            }
            Err(err) => {
                warn!(agent = %self.identity.name, error = %err, "Execution failed");
                if let Err(e) = self.process_feedback(Feedback::failure(json!({
                    "error": err.to_string(),
                    "target": err.target(),
                }))) {
                    warn!(agent = %self.identity.name, error = %e, "Learning after failed execution failed");
                }
                self.transition(|s| s.status = AgentStatus::Error);
                Err(err)
            }
        }
    }

    /// Records an outcome and learns synchronously when the weighted success
    /// rate falls below the threshold.
    pub fn process_feedback(&self, feedback: Feedback) -> Result<(), AgentError> {
        // Lock order: feedback, then state.
        let (rate, should_learn, from, state) = {
            let mut feedback_loop = self.feedback.lock();
            feedback_loop.add_feedback(feedback);
            let rate = feedback_loop.success_rate();
            let mut state = self.state.lock();
            let from = state.transition(|s| s.success_rate = rate);
            (rate, feedback_loop.should_learn(), from, state.clone())
        };
        for observer in self.observers.read().iter() {
            observer.state_changed(&self.identity, from, &state);
        }

        if should_learn {
            info!(agent = %self.identity.name, success_rate = rate, "Success rate below threshold; learning");
            self.learn()?;
        }
        Ok(())
    }

    /// One learning cycle over the current feedback window.
    pub fn learn(&self) -> Result<(), AgentError> {
        self.transition(|s| s.status = AgentStatus::Learning);
        let _idle = scopeguard::guard((), |_| {
            self.transition(|s| s.status = AgentStatus::Idle);
        });

        let (items, learning_rate) = {
            let feedback_loop = self.feedback.lock();
            (feedback_loop.items(), feedback_loop.learning_rate())
        };
        if items.is_empty() {
            debug!(agent = %self.identity.name, "No feedback to learn from");
            return Ok(());
        }

        match self.behavior.perform_learning(&items, learning_rate) {
            Ok(()) => {
                let state = {
                    let mut state = self.state.lock();
                    state.transition(|s| {
                        s.last_learning_time = Some(Utc::now());
                        s.version += 1;
                    });
                    state.clone()
                };
                metrics::counter!("prism_agent_learning_cycles_total", "agent" => self.identity.name.clone())
                    .increment(1);
                info!(agent = %self.identity.name, version = state.version, feedback_count = items.len(), "Learning cycle completed");
                for observer in self.observers.read().iter() {
                    observer.learning_completed(&self.identity, &state, items.len());
                }
                Ok(())
            }
            Err(err) => {
                warn!(agent = %self.identity.name, error = %err, "Learning cycle failed");
                self.transition(|s| s.status = AgentStatus::Error);
                for observer in self.observers.read().iter() {
                    observer.learning_failed(&self.identity, &err);
                }
                Err(err)
            }
        }
    }

    pub fn remember(&self, key: impl Into<String>, value: Arc<B::Output>) {
        self.memory.lock().put(key, value);
    }

    pub fn recall(&self, key: &str) -> Option<Arc<B::Output>> {
        self.memory.lock().get(key).cloned()
    }

    pub fn memory_size(&self) -> usize {
        self.memory.lock().size()
    }

    pub fn feedback_items(&self) -> Vec<FeedbackItem> {
        self.feedback.lock().items()
    }

    /// Unregisters the agent, empties its memory and detaches observers.
    /// Calling it again has no further effect.
    pub fn dispose(&self) {
        if let Some(registry) = &self.registry {
            registry.unregister(&self.identity.id);
        }
        self.memory.lock().clear();
        self.observers.write().clear();
        debug!(agent = %self.identity.name, "Agent disposed");
    }

    fn transition(&self, change: impl FnOnce(&mut AgentState)) {
        let (from, state) = {
            let mut state = self.state.lock();
            let from = state.transition(change);
            (from, state.clone())
        };
        for observer in self.observers.read().iter() {
            observer.state_changed(&self.identity, from, &state);
        }
    }
}

impl<B: AgentBehavior> ManagedAgent for Agent<B> {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot::from_parts(&self.identity, &self.state.lock())
    }
}
