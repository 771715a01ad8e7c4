// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// In-memory event streaming on a tokio broadcast channel. Agents publish
// their state transitions through it (it is an AgentObserver), and the
// pipeline publishes stage progress. Events are lost when nobody listens.

use crate::application::lifecycle::AgentObserver;
use crate::domain::agent::{AgentError, AgentIdentity, AgentState, AgentStatus};
use crate::domain::events::{AgentLifecycleEvent, LearningEvent, PipelineEvent};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    AgentLifecycle(AgentLifecycleEvent),
    Learning(LearningEvent),
    Pipeline(PipelineEvent),
}

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Capacity is how many events are buffered before slow receivers lag.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_agent_event(&self, event: AgentLifecycleEvent) {
        self.publish(DomainEvent::AgentLifecycle(event));
    }

    pub fn publish_learning_event(&self, event: LearningEvent) {
        self.publish(DomainEvent::Learning(event));
    }

    pub fn publish_pipeline_event(&self, event: PipelineEvent) {
        self.publish(DomainEvent::Pipeline(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }
}

impl AgentObserver for EventBus {
    fn state_changed(&self, identity: &AgentIdentity, from: AgentStatus, state: &AgentState) {
        self.publish_agent_event(AgentLifecycleEvent::StateChanged {
            agent_id: identity.id,
            name: identity.name.clone(),
            from,
            to: state.status,
            success_rate: state.success_rate,
            version: state.version,
            changed_at: state.updated_at,
        });
    }

    fn learning_completed(&self, identity: &AgentIdentity, state: &AgentState, feedback_count: usize) {
        self.publish_learning_event(LearningEvent::LearningCompleted {
            agent_id: identity.id,
            version: state.version,
            feedback_count,
            completed_at: state.last_learning_time.unwrap_or_else(Utc::now),
        });
    }

    fn learning_failed(&self, identity: &AgentIdentity, error: &AgentError) {
        self.publish_learning_event(LearningEvent::LearningFailed {
            agent_id: identity.id,
            error: error.to_string(),
            failed_at: Utc::now(),
        });
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_change_is_published() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();
        let identity = AgentIdentity::new("parser", ["parse"]);
        let mut state = AgentState::new();
        state.transition(|s| s.status = AgentStatus::Processing);

        bus.state_changed(&identity, AgentStatus::Idle, &state);

        match receiver.recv().await.unwrap() {
            DomainEvent::AgentLifecycle(AgentLifecycleEvent::StateChanged { from, to, name, .. }) => {
                assert_eq!(from, AgentStatus::Idle);
                assert_eq!(to, AgentStatus::Processing);
                assert_eq!(name, "parser");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_try_recv_empty() {
        let bus = EventBus::new(4);
        let mut receiver = bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
