// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry
//
// Builds the configured provider adapters and selects the one code generation
// runs against. Calls are passed straight through: no retries, no fallback.

use crate::domain::config::{LLMProviderConfig, PrismConfigSpec};
use crate::domain::llm::{GenerationOptions, GenerationResponse, LLMError, LLMProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;

/// Stand-in used when no provider is configured. Every call fails with
/// `LLMError::NotConfigured`, which surfaces as a per-component generation
/// failure rather than a startup error.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredProvider;

#[async_trait]
impl LLMProvider for UnconfiguredProvider {
    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        Err(LLMError::NotConfigured)
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        Err(LLMError::NotConfigured)
    }
}

/// Registry of enabled providers, keyed by configured name
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LLMProvider>>,
    default_provider: Option<String>,
}

impl ProviderRegistry {
    /// Create provider registry from configuration
    pub fn from_config(config: &PrismConfigSpec) -> anyhow::Result<Self> {
        let mut providers = HashMap::new();
        let mut first_enabled = None;

        for provider_config in &config.llm_providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            match Self::create_provider(provider_config) {
                Ok(provider) => {
                    info!(
                        provider = %provider_config.name,
                        model = %provider_config.model,
                        "Initialized LLM provider"
                    );
                    first_enabled.get_or_insert_with(|| provider_config.name.clone());
                    providers.insert(provider_config.name.clone(), provider);
                }
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", provider_config.name, e);
                }
            }
        }

        let default_provider = match &config.llm_selection.default_provider {
            Some(name) if providers.contains_key(name) => Some(name.clone()),
            Some(name) => {
                anyhow::bail!("Default provider '{}' is not configured or not enabled", name)
            }
            None => first_enabled,
        };

        if providers.is_empty() {
            warn!("No LLM providers configured - code generation will fail per component");
        }

        Ok(Self {
            providers,
            default_provider,
        })
    }

    fn create_provider(config: &LLMProviderConfig) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let api_key = Self::resolve_api_key(&config.api_key)?;

        let provider: Arc<dyn LLMProvider> = match config.provider_type.as_str() {
            "openai" | "openai-compatible" => Arc::new(OpenAIAdapter::new(
                config.name.clone(),
                config.endpoint.clone(),
                api_key,
                config.model.clone(),
            )),
            "ollama" => Arc::new(OllamaAdapter::new(
                config.name.clone(),
                config.endpoint.clone(),
                config.model.clone(),
            )),
            other => anyhow::bail!("Unsupported provider type: {}", other),
        };

        Ok(provider)
    }

    /// Resolve API key from config (supports "env:VAR_NAME" syntax)
    fn resolve_api_key(key: &Option<String>) -> anyhow::Result<String> {
        match key.as_deref() {
            Some(k) => match k.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name)
                    .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
                None => Ok(k.to_string()),
            },
            // Local providers without auth
            None => Ok(String::new()),
        }
    }

    pub fn default_provider_name(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LLMProvider>> {
        self.providers.get(name).cloned()
    }

    /// The provider generation runs against, or [`UnconfiguredProvider`].
    pub fn default_provider(&self) -> Arc<dyn LLMProvider> {
        self.default_provider
            .as_deref()
            .and_then(|name| self.get(name))
            .unwrap_or_else(|| Arc::new(UnconfiguredProvider))
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check health of all providers
    pub async fn health_check_all(&self) -> HashMap<String, Result<(), LLMError>> {
        let mut results = HashMap::new();
        for (name, provider) in &self.providers {
            info!("Health checking provider: {}", name);
            results.insert(name.clone(), provider.health_check().await);
        }
        results
    }
}
