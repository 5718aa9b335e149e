// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! List the agents and capabilities of the embedded runtime

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use conduit_core::domain::config::OrchestratorConfigManifest;
use conduit_core::domain::registry::CapabilityRegistry;

use crate::embedded::EmbeddedRuntime;

#[derive(Args)]
pub struct AgentsArgs {
    /// Also list bus subscriptions
    #[arg(long)]
    pub subscriptions: bool,
}

pub async fn list(args: AgentsArgs, config: OrchestratorConfigManifest) -> Result<()> {
    let runtime = EmbeddedRuntime::start(&config).await?;

    println!("{}", "Agents:".bold());
    for status in runtime.registry().list_agents().await? {
        println!(
            "  {} ({}) - {} (load {:.2})",
            status.id.bold(),
            status.agent_type,
            status.status.to_string().green(),
            status.load_factor
        );
        if let Some(agent) = runtime.agents().iter().find(|a| a.id() == status.id) {
            for capability in agent.capabilities() {
                println!(
                    "    {} v{} → {}",
                    capability.name,
                    capability.version,
                    capability.routing_keys.join(", ")
                );
                for intent in &capability.intents {
                    println!("      - {}", intent.dimmed());
                }
            }
        }
    }

    if args.subscriptions {
        println!();
        println!("{}", "Subscriptions:".bold());
        for subscription in runtime.bus().subscriptions() {
            println!(
                "  {} {} {} [{}]",
                subscription.id,
                subscription.filter.event_type,
                subscription.filter.subject.as_deref().unwrap_or("*"),
                subscription.label.as_deref().unwrap_or(subscription.target)
            );
        }
    }

    runtime.shutdown().await
}
