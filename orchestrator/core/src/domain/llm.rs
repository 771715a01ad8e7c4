// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Boundary of the text-generation capability used by code generation and by
//! the free-text pattern classification fallback.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Provider-neutral generation interface

// Implementations live in infrastructure/llm/. Calls are never retried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Domain interface for text-generation providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for `prompt`
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError>;

    /// Check if provider is reachable
    async fn health_check(&self) -> Result<(), LLMError>;
}

/// Options for a single generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,

    /// Sequences that stop generation
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(4096),
            temperature: Some(0.2),
            stop_sequences: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Generated text
    pub text: String,

    /// Token usage stats
    pub usage: TokenUsage,

    /// Provider type (e.g., "openai", "ollama")
    pub provider: String,

    /// Model used
    pub model: String,

    /// Why generation stopped
    pub finish_reason: FinishReason,
}

impl GenerationResponse {
    /// Response with no usage accounting, for providers that do not report it.
    pub fn text_only(text: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
            provider: provider.into(),
            model: String::new(),
            finish_reason: FinishReason::Stop,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason why generation stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural completion
    Stop,

    /// Hit max_tokens limit
    Length,

    /// Blocked by content filter
    ContentFilter,
}

/// Errors that can occur during generation
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No generation provider configured")]
    NotConfigured,
}
