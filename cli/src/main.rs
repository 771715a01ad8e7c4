// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Prism CLI
//!
//! The `prism` binary converts design exports into UI component source.
//!
//! ## Commands
//!
//! - `prism serve` - Run the HTTP API
//! - `prism convert <FILE>` - Run the pipeline once and write the files
//! - `prism config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use prism_core::domain::config::{ObservabilityConfig, PrismConfigManifest};

mod commands;

use commands::{ConfigCommand, ConvertArgs};

/// Prism - turn design exports into framework components
#[derive(Parser)]
#[command(name = "prism")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "PRISM_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP API port (default: from configuration)
    #[arg(long, global = true, env = "PRISM_PORT")]
    port: Option<u16>,

    /// HTTP API host (default: from configuration)
    #[arg(long, global = true, env = "PRISM_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "PRISM_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    #[command(name = "serve")]
    Serve,

    /// Convert a design export file
    #[command(name = "convert")]
    Convert(ConvertArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let command = match cli.command {
        // Config commands report their own load errors.
        Some(Commands::Config { command }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            return commands::config::handle_command(command, cli.config).await;
        }
        Some(command) => command,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    };

    let mut config = PrismConfigManifest::load_or_default(cli.config)
        .context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let level = cli
        .log_level
        .unwrap_or_else(|| config.spec.observability.logging.level.clone());
    init_logging(&level, &config.spec.observability.logging.format)?;
    init_metrics(&config.spec.observability)?;

    if let Some(host) = cli.host {
        config.spec.network.bind_address = host;
    }
    if let Some(port) = cli.port {
        config.spec.network.port = port;
    }

    match command {
        Commands::Serve => commands::serve::run(config).await,
        Commands::Convert(args) => commands::convert::run(args, config).await,
        Commands::Config { .. } => Ok(()),
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

fn init_metrics(observability: &ObservabilityConfig) -> Result<()> {
    if !observability.metrics.enabled {
        return Ok(());
    }
    let addr = SocketAddr::from(([0, 0, 0, 0], observability.metrics.port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus metrics listening on {}", addr);
    Ok(())
}
