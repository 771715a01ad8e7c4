// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Agent Registry - process-wide directory of live agents
//
// Created by the composition root and handed to whatever builds agents.
// All mutations go through one write lock, so a duplicate id can never be
// stored and a rejected re-registration leaves the existing entry in place.

use crate::domain::agent::{AgentId, AgentSnapshot, ManagedAgent};
use crate::domain::events::AgentLifecycleEvent;
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<AgentId, Arc<dyn ManagedAgent>>>,
    event_bus: Option<EventBus>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(event_bus: EventBus) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            event_bus: Some(event_bus),
        }
    }

    /// Adds `agent` unless its id is already present. Returns whether it was added.
    pub fn register(&self, agent: Arc<dyn ManagedAgent>) -> bool {
        let identity = agent.identity().clone();
        {
            let mut agents = self.agents.write();
            if agents.contains_key(&identity.id) {
                warn!(
                    agent_id = %identity.id,
                    name = %identity.name,
                    "Agent already registered; ignoring duplicate registration"
                );
                return false;
            }
            agents.insert(identity.id, agent);
        }

        info!(agent_id = %identity.id, name = %identity.name, "Registered agent");
        if let Some(bus) = &self.event_bus {
            bus.publish_agent_event(AgentLifecycleEvent::AgentRegistered {
                agent_id: identity.id,
                name: identity.name,
                registered_at: Utc::now(),
            });
        }
        true
    }

    pub fn unregister(&self, id: &AgentId) -> bool {
        let removed = self.agents.write().remove(id).is_some();
        if removed {
            info!(agent_id = %id, "Unregistered agent");
            if let Some(bus) = &self.event_bus {
                bus.publish_agent_event(AgentLifecycleEvent::AgentUnregistered {
                    agent_id: *id,
                    unregistered_at: Utc::now(),
                });
            }
        } else {
            debug!(agent_id = %id, "Unregister requested for unknown agent");
        }
        removed
    }

    pub fn get(&self, id: &AgentId) -> Option<Arc<dyn ManagedAgent>> {
        self.agents.read().get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn ManagedAgent>> {
        self.agents.read().values().cloned().collect()
    }

    /// Agents whose name contains `fragment`, ignoring case.
    pub fn find_by_name(&self, fragment: &str) -> Vec<Arc<dyn ManagedAgent>> {
        let needle = fragment.to_lowercase();
        self.agents
            .read()
            .values()
            .filter(|agent| agent.identity().name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Health view of every agent, ordered by name.
    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        let mut snapshots: Vec<AgentSnapshot> =
            self.all().iter().map(|agent| agent.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }

    pub fn clear(&self) {
        let mut agents = self.agents.write();
        let count = agents.len();
        agents.clear();
        info!(count, "Cleared agent registry");
    }
}
