// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Text-generation provider adapters.
//
// Each adapter translates between the domain `LLMProvider` interface and one
// external API. The registry picks the provider the pipeline generates with.

pub mod ollama;
pub mod openai;
pub mod registry;

pub use registry::{ProviderRegistry, UnconfiguredProvider};
