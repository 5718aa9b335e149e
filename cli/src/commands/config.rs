// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use conduit_core::domain::config::OrchestratorConfigManifest;

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
        /// Output path (default: ./conduit-config.yaml)
        #[arg(short, long, default_value = "./conduit-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples),
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = OrchestratorConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. CONDUIT_CONFIG_PATH: {}",
            std::env::var("CONDUIT_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./conduit-config.yaml");
        println!("  4. ~/.conduit/config.yaml");
        println!("  5. /etc/conduit/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    let orchestrator = &config.spec.orchestrator;
    println!("{}", "Orchestrator:".bold());
    println!("  ID: {}", orchestrator.id);
    println!("  Test mode: {}", orchestrator.test_mode);
    println!("  Response timeout: {:?}", orchestrator.response_timeout);
    println!("  Late response grace: {:?}", orchestrator.late_response_grace);
    println!();

    println!("{}", "Event Bus:".bold());
    println!("  Mode: {:?}", config.spec.bus.mode);
    println!("  Transport: {:?}", config.spec.bus.transport);
    println!();

    println!("{}", "Intent Extraction:".bold());
    match &config.spec.ai {
        Some(ai) if ai.enabled => {
            println!("  {} ({})", ai.model.bold(), ai.provider_type);
            println!("    Endpoint: {}", ai.endpoint);
        }
        _ => println!("  keyword matching (no AI provider)"),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OrchestratorConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

pub fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
