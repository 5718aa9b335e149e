// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Routing commands
//!
//! Commands: chat (free text), route (explicit intent)

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use conduit_core::application::{RouteOutcome, RouteStatus};
use conduit_core::domain::config::OrchestratorConfigManifest;
use conduit_core::domain::event::Payload;

use crate::embedded::EmbeddedRuntime;

#[derive(Args)]
pub struct ChatArgs {
    /// Natural-language request
    #[arg(value_name = "MESSAGE")]
    pub message: String,

    #[command(flatten)]
    pub common: RouteOptions,
}

#[derive(Args)]
pub struct RouteArgs {
    /// Intent to route, matched exactly against registered capabilities
    #[arg(value_name = "INTENT")]
    pub intent: String,

    #[command(flatten)]
    pub common: RouteOptions,
}

#[derive(Args)]
pub struct RouteOptions {
    /// Context entries as key=value (value parsed as JSON when possible)
    #[arg(short = 'C', long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn chat(args: ChatArgs, config: OrchestratorConfigManifest) -> Result<()> {
    let context = parse_context(&args.common.context)?;
    let runtime = EmbeddedRuntime::start(&config).await?;

    let result = runtime.orchestrator().chat(&args.message, context).await;
    runtime.shutdown().await?;

    let outcome = result.context("Routing failed")?;
    print_outcome(&outcome, args.common.json)
}

pub async fn route(args: RouteArgs, config: OrchestratorConfigManifest) -> Result<()> {
    let context = parse_context(&args.common.context)?;
    let runtime = EmbeddedRuntime::start(&config).await?;

    let result = runtime.orchestrator().route_intent(&args.intent, context).await;
    runtime.shutdown().await?;

    let outcome = result.context("Routing failed")?;
    print_outcome(&outcome, args.common.json)
}

/// Parse `key=value` pairs. Values that parse as JSON keep their type.
pub fn parse_context(entries: &[String]) -> Result<Payload> {
    let mut context = Payload::new();
    for entry in entries {
        let (key, raw) = entry
            .split_once('=')
            .with_context(|| format!("Invalid context entry '{}', expected KEY=VALUE", entry))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Invalid context entry '{}', key is empty", entry);
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        context.insert(key.to_string(), value);
    }
    Ok(context)
}

fn print_outcome(outcome: &RouteOutcome, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    let status = match outcome.status {
        RouteStatus::Completed => outcome.status.as_str().green(),
        RouteStatus::Error => outcome.status.as_str().red(),
        RouteStatus::Timeout => outcome.status.as_str().yellow(),
    };

    println!("{} {}", "Status:".bold(), status);
    println!("  Agent: {}", outcome.selected_agent);
    println!("  Intent: {}", outcome.intent);
    println!("  Routing key: {}", outcome.routing_key);
    println!("  Correlation ID: {}", outcome.correlation_id.dimmed());
    println!();
    println!("{}", outcome.message);

    Ok(())
}
