// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::{AgentId, AgentStatus};
use crate::domain::pipeline::{ConversionId, Stage};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentLifecycleEvent {
    AgentRegistered {
        agent_id: AgentId,
        name: String,
        registered_at: DateTime<Utc>,
    },
    AgentUnregistered {
        agent_id: AgentId,
        unregistered_at: DateTime<Utc>,
    },
    StateChanged {
        agent_id: AgentId,
        name: String,
        from: AgentStatus,
        to: AgentStatus,
        success_rate: f64,
        version: u64,
        changed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LearningEvent {
    LearningCompleted {
        agent_id: AgentId,
        version: u64,
        feedback_count: usize,
        completed_at: DateTime<Utc>,
    },
    LearningFailed {
        agent_id: AgentId,
        error: String,
        failed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    ConversionStarted {
        conversion_id: ConversionId,
        design_name: String,
        started_at: DateTime<Utc>,
    },
    StageStarted {
        conversion_id: ConversionId,
        stage: Stage,
        cache_key: String,
        started_at: DateTime<Utc>,
    },
    StageCacheHit {
        conversion_id: ConversionId,
        stage: Stage,
        cache_key: String,
        hit_at: DateTime<Utc>,
    },
    StageCompleted {
        conversion_id: ConversionId,
        stage: Stage,
        duration_ms: u64,
        completed_at: DateTime<Utc>,
    },
    StageFailed {
        conversion_id: ConversionId,
        stage: Stage,
        error: String,
        target: Option<String>,
        failed_at: DateTime<Utc>,
    },
    ComponentGenerationFailed {
        component_name: String,
        node_id: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
    ConversionCompleted {
        conversion_id: ConversionId,
        overall_score: f64,
        duration_ms: u64,
        completed_at: DateTime<Utc>,
    },
}
