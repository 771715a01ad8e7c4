// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod agents;
pub mod lifecycle;
pub mod patterns;
pub mod pipeline;
pub mod response_parsing;

pub use lifecycle::{Agent, AgentBehavior, AgentObserver, AgentSettings};
pub use pipeline::{PipelineComponents, PipelineFactory, PipelineOrchestrator};
