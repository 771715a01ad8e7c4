// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Prism Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Agent memory, feedback and learning parameters
// - Pattern ensemble thresholds
// - Text-generation providers
// - Default conversion options
// - Network and observability settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::pipeline::{ConversionOptions, Framework, StylingApproach};

pub const API_VERSION: &str = "prism.dev/v1";
pub const KIND: &str = "PrismConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrismConfigManifest {
    /// API version (must be "prism.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "PrismConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: PrismConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrismConfigSpec {
    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub patterns: PatternConfig,

    #[serde(default)]
    pub llm_providers: Vec<LLMProviderConfig>,

    #[serde(default)]
    pub llm_selection: LLMSelection,

    #[serde(default)]
    pub generation: GenerationDefaults,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// How agent instances relate to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentScope {
    /// Fresh agents per conversion; no state shared between requests.
    #[default]
    PerRequest,
    /// One set of agents for the process; caches persist across requests.
    Shared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_capacity")]
    pub memory_capacity: usize,

    #[serde(default = "default_capacity")]
    pub feedback_capacity: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Learning starts when the weighted success rate drops below this.
    #[serde(default = "default_learning_threshold")]
    pub threshold: f64,

    #[serde(default)]
    pub agent_scope: AgentScope,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            memory_capacity: default_capacity(),
            feedback_capacity: default_capacity(),
            learning_rate: default_learning_rate(),
            threshold: default_learning_threshold(),
            agent_scope: AgentScope::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    #[serde(default = "default_rule_threshold")]
    pub rule_threshold: f64,

    #[serde(default = "default_classifier_threshold")]
    pub classifier_threshold: f64,

    /// Smallest node set handed to the classifier.
    #[serde(default = "default_min_classifier_nodes")]
    pub min_classifier_nodes: usize,

    #[serde(default = "default_true")]
    pub classifier_enabled: bool,

    /// Ask the generation provider when the classifier is not used.
    #[serde(default = "default_true")]
    pub llm_fallback: bool,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            rule_threshold: default_rule_threshold(),
            classifier_threshold: default_classifier_threshold(),
            min_classifier_nodes: default_min_classifier_nodes(),
            classifier_enabled: true,
            llm_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Unique provider name (e.g., "ollama-local", "openai")
    pub name: String,

    /// "openai", "ollama" or "openai-compatible"
    #[serde(rename = "type")]
    pub provider_type: String,

    pub endpoint: String,

    /// API key (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub model: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LLMSelection {
    /// Provider used for generation; first enabled provider when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default)]
    pub framework: Framework,

    #[serde(default)]
    pub styling: StylingApproach,

    #[serde(default = "default_true")]
    pub strict_types: bool,

    #[serde(default)]
    pub include_layout: bool,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            framework: Framework::default(),
            styling: StylingApproach::default(),
            strict_types: true,
            include_layout: false,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl GenerationDefaults {
    pub fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions {
            framework: self.framework,
            styling: self.styling,
            strict_types: self.strict_types,
            include_layout: self.include_layout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> usize {
    100
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_learning_threshold() -> f64 {
    0.7
}

fn default_rule_threshold() -> f64 {
    0.5
}

fn default_classifier_threshold() -> f64 {
    0.6
}

fn default_min_classifier_nodes() -> usize {
    10
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9091
}

impl Default for PrismConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "prism".to_string(),
                version: None,
                labels: None,
            },
            spec: PrismConfigSpec::default(),
        }
    }
}

impl PrismConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. PRISM_CONFIG_PATH environment variable
    /// 2. ./prism-config.yaml
    /// 3. ~/.prism/config.yaml
    /// 4. /etc/prism/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("PRISM_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./prism-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".prism").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/prism/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration from an explicit path, else by discovery, else defaults.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment overrides for container deployments.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PRISM_AGENT_SCOPE") {
            match val.to_lowercase().as_str() {
                "shared" => self.spec.agents.agent_scope = AgentScope::Shared,
                "per_request" | "per-request" => {
                    self.spec.agents.agent_scope = AgentScope::PerRequest
                }
                _ => tracing::warn!(
                    "Invalid value for PRISM_AGENT_SCOPE: '{}'. Expected shared/per_request. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("PRISM_LLM_PROVIDER") {
            tracing::info!("Environment override: PRISM_LLM_PROVIDER={}", val);
            self.spec.llm_selection.default_provider = Some(val);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let agents = &self.spec.agents;
        if agents.memory_capacity == 0 {
            anyhow::bail!("spec.agents.memory_capacity must be at least 1");
        }
        if agents.feedback_capacity == 0 {
            anyhow::bail!("spec.agents.feedback_capacity must be at least 1");
        }
        if !(0.0..=1.0).contains(&agents.learning_rate) {
            anyhow::bail!("spec.agents.learning_rate must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&agents.threshold) {
            anyhow::bail!("spec.agents.threshold must be within [0, 1]");
        }

        let patterns = &self.spec.patterns;
        for (field, value) in [
            ("rule_threshold", patterns.rule_threshold),
            ("classifier_threshold", patterns.classifier_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("spec.patterns.{} must be within [0, 1]", field);
            }
        }

        for provider in &self.spec.llm_providers {
            if provider.name.is_empty() {
                anyhow::bail!("LLM provider name cannot be empty");
            }
            if provider.endpoint.is_empty() {
                anyhow::bail!("LLM provider endpoint cannot be empty for: {}", provider.name);
            }
            if provider.model.is_empty() {
                anyhow::bail!("LLM provider model cannot be empty for: {}", provider.name);
            }
        }

        if let Some(default_provider) = &self.spec.llm_selection.default_provider {
            if !self
                .spec
                .llm_providers
                .iter()
                .any(|p| &p.name == default_provider)
            {
                anyhow::bail!(
                    "Default provider '{}' not found in llm_providers",
                    default_provider
                );
            }
        }

        Ok(())
    }
}
