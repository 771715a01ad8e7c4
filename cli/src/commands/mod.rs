// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Prism CLI

pub mod config;
pub mod convert;
pub mod serve;

pub use self::config::ConfigCommand;
pub use self::convert::ConvertArgs;

use anyhow::{Context, Result};
use std::sync::Arc;

use prism_core::application::pipeline::PipelineFactory;
use prism_core::domain::config::PrismConfigManifest;
use prism_core::infrastructure::{AgentRegistry, EventBus, ProviderRegistry};

/// Provider, registry and event bus wired into a factory, as configured.
pub(crate) fn build_factory(config: &PrismConfigManifest) -> Result<Arc<PipelineFactory>> {
    let providers =
        ProviderRegistry::from_config(&config.spec).context("Failed to initialize LLM providers")?;
    let event_bus = EventBus::with_default_capacity();
    let registry = Arc::new(AgentRegistry::with_event_bus(event_bus.clone()));
    let factory = PipelineFactory::from_config(config, providers.default_provider(), registry, event_bus)
        .context("Failed to build pipeline")?;
    Ok(Arc::new(factory))
}
