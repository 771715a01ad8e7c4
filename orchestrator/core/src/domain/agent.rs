// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Agent
//!
//! Identity, lifecycle state and error types shared by every pipeline agent.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Agent identity and the state record mutated by the lifecycle wrapper

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::domain::llm::LLMError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable identity of an agent. Used as the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: AgentId,
    pub name: String,
    pub capabilities: BTreeSet<String>,
}

impl AgentIdentity {
    pub fn new<I, S>(name: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: AgentId::new(),
            name: name.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Processing,
    Learning,
    Error,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Processing => "processing",
            AgentStatus::Learning => "learning",
            AgentStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Mutable lifecycle record of one agent.
///
/// Only the lifecycle wrapper writes to this record, and every write goes
/// through [`AgentState::transition`] so `updated_at` always reflects the
/// latest change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub status: AgentStatus,
    pub last_execution_time: Option<DateTime<Utc>>,
    pub last_learning_time: Option<DateTime<Utc>>,
    pub success_rate: f64,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            status: AgentStatus::Idle,
            last_execution_time: None,
            last_learning_time: None,
            success_rate: 1.0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies `change` and stamps `updated_at`. Returns the previous status.
    pub fn transition(&mut self, change: impl FnOnce(&mut AgentState)) -> AgentStatus {
        let previous = self.status;
        change(self);
        self.success_rate = self.success_rate.clamp(0.0, 1.0);
        self.updated_at = Utc::now();
        previous
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health view of an agent, as exposed by the registry and the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    pub capabilities: BTreeSet<String>,
    pub status: AgentStatus,
    pub success_rate: f64,
    pub version: u64,
    pub last_execution_time: Option<DateTime<Utc>>,
    pub last_learning_time: Option<DateTime<Utc>>,
}

impl AgentSnapshot {
    pub fn from_parts(identity: &AgentIdentity, state: &AgentState) -> Self {
        Self {
            id: identity.id,
            name: identity.name.clone(),
            capabilities: identity.capabilities.clone(),
            status: state.status,
            success_rate: state.success_rate,
            version: state.version,
            last_execution_time: state.last_execution_time,
            last_learning_time: state.last_learning_time,
        }
    }
}

/// What the registry needs to know about an agent, independent of the
/// agent's input and output types.
pub trait ManagedAgent: Send + Sync {
    fn identity(&self) -> &AgentIdentity;

    fn snapshot(&self) -> AgentSnapshot;
}

/// Errors raised by agent execution and learning.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Rejected before any work started. Never recorded as feedback.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("{message}")]
    Execution {
        message: String,
        target: Option<String>,
    },

    #[error("Could not interpret generated response: {message}")]
    ResponseParse {
        message: String,
        target: Option<String>,
    },

    #[error("Generation capability failed: {0}")]
    Generation(#[from] LLMError),

    #[error("Learning failed: {0}")]
    Learning(String),
}

impl AgentError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            target: None,
        }
    }

    pub fn execution_at(message: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            target: Some(target.into()),
        }
    }

    pub fn response_parse(message: impl Into<String>, target: Option<String>) -> Self {
        Self::ResponseParse {
            message: message.into(),
            target,
        }
    }

    /// The file, node or component the error refers to, when known.
    pub fn target(&self) -> Option<&str> {
        match self {
            AgentError::InvalidInput { field, .. } => Some(field.as_str()),
            AgentError::Execution { target, .. } | AgentError::ResponseParse { target, .. } => {
                target.as_deref()
            }
            AgentError::Generation(_) | AgentError::Learning(_) => None,
        }
    }

    pub fn is_input_error(&self) -> bool {
        matches!(self, AgentError::InvalidInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_idle() {
        let state = AgentState::new();
        assert_eq!(state.status, AgentStatus::Idle);
        assert_eq!(state.version, 0);
        assert_eq!(state.success_rate, 1.0);
        assert!(state.last_execution_time.is_none());
    }

    #[test]
    fn test_transition_stamps_updated_at() {
        let mut state = AgentState::new();
        let before = state.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        let previous = state.transition(|s| s.status = AgentStatus::Processing);
        assert_eq!(previous, AgentStatus::Idle);
        assert_eq!(state.status, AgentStatus::Processing);
        assert!(state.updated_at > before);
    }

    #[test]
    fn test_transition_clamps_success_rate() {
        let mut state = AgentState::new();
        state.transition(|s| s.success_rate = 1.7);
        assert_eq!(state.success_rate, 1.0);
    }

    #[test]
    fn test_identity_capabilities() {
        let identity = AgentIdentity::new("parser", ["parse", "flatten"]);
        assert!(identity.has_capability("parse"));
        assert!(!identity.has_capability("generate"));
    }

    #[test]
    fn test_error_target() {
        let err = AgentError::execution_at("boom", "button-1");
        assert_eq!(err.target(), Some("button-1"));
        assert!(!err.is_input_error());
        assert!(AgentError::invalid_input("document", "missing").is_input_error());
    }
}
