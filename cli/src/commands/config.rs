// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use prism_core::domain::config::PrismConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./prism-config.yaml)
        #[arg(short, long, default_value = "./prism-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = PrismConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. PRISM_CONFIG_PATH: {}",
            std::env::var("PRISM_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./prism-config.yaml");
        println!("  4. ~/.prism/config.yaml");
        println!("  5. /etc/prism/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{} {}", "Configuration:".bold(), config.metadata.name);
    println!();

    println!("{}", "Agents:".bold());
    println!("  Scope: {:?}", spec.agents.agent_scope);
    println!("  Memory capacity: {}", spec.agents.memory_capacity);
    println!("  Feedback capacity: {}", spec.agents.feedback_capacity);
    println!("  Learning rate: {}", spec.agents.learning_rate);
    println!("  Threshold: {}", spec.agents.threshold);
    println!();

    println!("{}", "Patterns:".bold());
    println!("  Rule threshold: {}", spec.patterns.rule_threshold);
    println!(
        "  Classifier: {} (threshold {}, min nodes {})",
        if spec.patterns.classifier_enabled { "enabled" } else { "disabled" },
        spec.patterns.classifier_threshold,
        spec.patterns.min_classifier_nodes
    );
    println!("  LLM fallback: {}", spec.patterns.llm_fallback);
    println!();

    println!("{}", "LLM Providers:".bold());
    if spec.llm_providers.is_empty() {
        println!("  {}", "(none configured)".dimmed());
    }
    for provider in &spec.llm_providers {
        let state = if provider.enabled { "".normal() } else { " disabled".dimmed() };
        println!("  {} ({}){}", provider.name.bold(), provider.provider_type, state);
        println!("    Endpoint: {}", provider.endpoint);
        println!("    Model: {}", provider.model);
    }
    println!(
        "  Default provider: {}",
        spec.llm_selection.default_provider.as_deref().unwrap_or("(first enabled)")
    );
    println!();

    let generation = &spec.generation;
    println!("{}", "Generation defaults:".bold());
    println!("  Framework: {}", generation.framework.as_str());
    println!("  Styling: {}", generation.styling.as_str());
    println!("  Strict types: {}", generation.strict_types);
    println!("  Include layout: {}", generation.include_layout);
    println!("  Temperature: {}", generation.temperature);
    println!();

    println!("{}", "Network:".bold());
    println!("  Listen: {}:{}", spec.network.bind_address, spec.network.port);

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = PrismConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    tokio::fs::write(&output, sample)
        .await
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_config_validates_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        for examples in [false, true] {
            let path = dir.path().join(format!("prism-config-{}.yaml", examples));
            generate(path.clone(), examples).await.unwrap();
            assert!(path.exists());
            validate(Some(path)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_validate_reports_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        tokio::fs::write(&path, "spec: [not, a, mapping").await.unwrap();
        assert!(validate(Some(path)).await.is_err());
    }

    #[test]
    fn test_sample_configs_are_valid() {
        for sample in [
            include_str!("../../templates/config-minimal.yaml"),
            include_str!("../../templates/config-with-examples.yaml"),
        ] {
            let config = prism_core::domain::config::PrismConfigManifest::from_yaml_str(sample).unwrap();
            config.validate().unwrap();
        }
    }
}
