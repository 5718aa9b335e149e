// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Conduit CLI
//!
//! The `conduit` binary hosts an orchestrator and a set of demo agents on an
//! in-process event bus and routes requests through them.
//!
//! ## Commands
//!
//! - `conduit chat "<message>"` - Extract an intent from free text and route it
//! - `conduit route "<intent>"` - Route an explicit intent
//! - `conduit agents` - List registered agents, capabilities and subscriptions
//! - `conduit config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use conduit_core::domain::config::{LogFormat, MetricsConfig, OrchestratorConfigManifest};
use conduit_orchestrator::commands::{self, AgentsArgs, ChatArgs, ConfigCommand, RouteArgs};

/// Conduit - intent-routed event dispatch
#[derive(Parser)]
#[command(name = "conduit")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CONDUIT_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long, global = true, env = "CONDUIT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json_logs: bool,

    /// Return simulated results instead of waiting for agents
    #[arg(long, global = true)]
    test_mode: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a natural-language request
    #[command(name = "chat")]
    Chat(ChatArgs),

    /// Route an explicit intent
    #[command(name = "route")]
    Route(RouteArgs),

    /// List agents and capabilities
    #[command(name = "agents")]
    Agents(AgentsArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = OrchestratorConfigManifest::load_or_default(cli.config.clone())
        .context("Failed to load configuration")?;
    if cli.test_mode {
        config.spec.orchestrator.test_mode = true;
    }

    let observability = &config.spec.observability;
    let level = cli.log_level.as_deref().unwrap_or(&observability.log_level);
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        observability.log_format
    };
    init_logging(level, format)?;

    if let Some(metrics) = observability.metrics.as_ref().filter(|m| m.enabled) {
        init_metrics(metrics)?;
    }

    match cli.command {
        Some(Commands::Chat(args)) => commands::route::chat(args, config).await,
        Some(Commands::Route(args)) => commands::route::route(args, config).await,
        Some(Commands::Agents(args)) => commands::agents::list(args, config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}

/// Install the Prometheus exporter with its own HTTP listener
fn init_metrics(config: &MetricsConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid metrics address {}:{}", config.bind_address, config.port))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}
