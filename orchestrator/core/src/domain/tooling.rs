// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// External Collaborator Interfaces
//
// Boundaries of the capabilities the pipeline consumes but does not own:
// importing a design export, and the linter/parser pair used by validation.
// Implementations live in infrastructure/.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::pipeline::Severity;

/// Options forwarded to the linter and parser for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOptions {
    /// Language of the content ("typescript", "html", "scss", ...).
    pub language: String,
    pub strict_types: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintIssue {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseDiagnostic {
    pub message: String,
    pub line: Option<usize>,
}

pub trait Linter: Send + Sync {
    fn lint(&self, content: &str, options: &CheckOptions) -> Vec<LintIssue>;
}

pub trait SourceParser: Send + Sync {
    /// Returns parse errors; an empty list means the content parsed.
    fn parse(&self, content: &str, options: &CheckOptions) -> Vec<ParseDiagnostic>;
}

#[derive(Debug, thiserror::Error)]
pub enum DesignSourceError {
    #[error("Design not found: {0}")]
    NotFound(String),

    #[error("Failed to read design '{reference}': {message}")]
    Io { reference: String, message: String },

    #[error("Design '{reference}' is not valid JSON: {message}")]
    Malformed { reference: String, message: String },
}

/// Imports a design export (node tree plus style tables) as raw JSON.
#[async_trait]
pub trait DesignSource: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<serde_json::Value, DesignSourceError>;
}
