// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

//! One-shot conversion of a design export file

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::info;

use prism_core::domain::config::PrismConfigManifest;
use prism_core::domain::events::PipelineEvent;
use prism_core::domain::pipeline::{
    ComponentArtifact, ConversionOptions, ConversionResult, Framework, Severity, StylingApproach,
};
use prism_core::domain::tooling::DesignSource;
use prism_core::infrastructure::event_bus::{DomainEvent, EventBusError, EventReceiver};
use prism_core::infrastructure::FileDesignSource;

#[derive(Args)]
pub struct ConvertArgs {
    /// Design export (JSON)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Target framework (angular, react, vue)
    #[arg(short, long)]
    pub framework: Option<Framework>,

    /// Styling approach (scss, css, tailwind)
    #[arg(short, long)]
    pub styling: Option<StylingApproach>,

    /// Also generate a layout composing every component
    #[arg(long)]
    pub layout: bool,

    /// Do not request strict typing
    #[arg(long)]
    pub loose_types: bool,

    /// Output directory
    #[arg(short, long, default_value = "./generated")]
    pub out: PathBuf,

    /// Also write the full conversion result as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

impl ConvertArgs {
    fn options(&self, defaults: ConversionOptions) -> ConversionOptions {
        ConversionOptions {
            framework: self.framework.unwrap_or(defaults.framework),
            styling: self.styling.unwrap_or(defaults.styling),
            strict_types: defaults.strict_types && !self.loose_types,
            include_layout: defaults.include_layout || self.layout,
        }
    }
}

pub async fn run(args: ConvertArgs, config: PrismConfigManifest) -> Result<()> {
    let factory = super::build_factory(&config)?;
    let options = args.options(factory.default_options());

    let design = FileDesignSource::new()
        .fetch(&args.file.to_string_lossy())
        .await
        .context("Failed to import design")?;

    info!(
        file = %args.file.display(),
        framework = options.framework.as_str(),
        styling = options.styling.as_str(),
        "Converting design"
    );

    let mut progress = factory.event_bus().subscribe();
    let result = factory
        .orchestrator()
        .convert(&design, options)
        .await
        .map_err(|e| match e.target() {
            Some(target) => anyhow::anyhow!("{} (at {})", e, target),
            None => anyhow::anyhow!("{}", e),
        });
    print_progress(&mut progress);
    let result = result?;

    let written = write_files(&result, &args.out).await?;
    if let Some(report) = &args.report {
        let json = serde_json::to_string_pretty(&result)?;
        tokio::fs::write(report, json)
            .await
            .with_context(|| format!("Failed to write report to {:?}", report))?;
    }

    print_summary(&result, written, &args.out);
    Ok(())
}

async fn write_files(result: &ConversionResult, out: &Path) -> Result<usize> {
    let mut written = 0;
    for file in result.generation.all_files() {
        let path = out.join(&file.path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        tokio::fs::write(&path, &file.content)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        written += 1;
    }
    Ok(written)
}

/// Prints the stage events buffered during the run.
fn print_progress(receiver: &mut EventReceiver) {
    loop {
        match receiver.try_recv() {
            Ok(DomainEvent::Pipeline(event)) => {
                if let Some(line) = progress_line(&event) {
                    println!("{}", line);
                }
            }
            Ok(_) | Err(EventBusError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

fn progress_line(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::StageCacheHit { stage, .. } => {
            Some(format!("  {} {} (cached)", "↺".cyan(), stage.as_str()))
        }
        PipelineEvent::StageCompleted { stage, duration_ms, .. } => {
            Some(format!("  {} {} {}ms", "✓".green(), stage.as_str(), duration_ms))
        }
        PipelineEvent::StageFailed { stage, error, .. } => {
            Some(format!("  {} {}: {}", "✗".red(), stage.as_str(), error))
        }
        _ => None,
    }
}

fn print_summary(result: &ConversionResult, written: usize, out: &Path) {
    let generation = &result.generation;
    for artifact in generation.components.iter().chain(generation.layout.iter()) {
        match artifact {
            ComponentArtifact::Generated { component_name, files, .. } => {
                println!("  {} {} ({} files)", "✓".green(), component_name, files.len());
            }
            ComponentArtifact::Failed { component_name, error, .. } => {
                println!("  {} {}: {}", "✗".red(), component_name, error.dimmed());
            }
        }
    }
    println!();

    let validation = &result.validation;
    for issue in &validation.issues {
        let severity = match issue.severity {
            Severity::Error => "error".red(),
            Severity::Warning => "warning".yellow(),
            Severity::Info => "info".dimmed(),
        };
        let line = issue.line.map(|l| format!(":{}", l)).unwrap_or_default();
        println!("  {} {}{} [{}] {}", severity, issue.file_path, line, issue.rule_id, issue.message);
    }

    let scores = validation.scores;
    println!(
        "Scores: syntax {:.2}  style {:.2}  responsiveness {:.2}  overall {:.2}",
        scores.syntax, scores.style, scores.responsiveness, scores.overall
    );

    let verdict = if validation.passed {
        "✓ Validation passed".green()
    } else {
        "✗ Validation below threshold".yellow()
    };
    println!("{}", verdict);
    println!("{} files written to {}", written, out.display());
}
