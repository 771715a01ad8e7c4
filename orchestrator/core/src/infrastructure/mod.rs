// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_registry;
pub mod design_source;
pub mod event_bus;
pub mod llm;
pub mod prompt_template_engine;
pub mod tooling;

pub use agent_registry::AgentRegistry;
pub use design_source::FileDesignSource;
pub use event_bus::EventBus;
pub use llm::ProviderRegistry;
