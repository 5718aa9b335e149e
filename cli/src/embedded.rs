// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Embedded runtime
//!
//! Wires a bus, a registry, an intent extractor, the orchestrator and the
//! demo agents in-process from an [`OrchestratorConfigManifest`].

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use conduit_core::application::{
    AiIntentExtractor, IntentExtractor, KeywordIntentExtractor, Orchestrator, OrchestratorSettings,
};
use conduit_core::domain::config::{OrchestratorConfigManifest, TransportKind};
use conduit_core::domain::registry::CapabilityRegistry;
use conduit_core::infrastructure::event_bus::EventBus;
use conduit_core::infrastructure::llm::provider_from_config;
use conduit_core::infrastructure::registry::InMemoryCapabilityRegistry;
use conduit_core::infrastructure::transport::InMemoryTransport;
use conduit_sdk::AgentHandle;

use crate::demo;

pub struct EmbeddedRuntime {
    bus: EventBus,
    registry: Arc<dyn CapabilityRegistry>,
    orchestrator: Orchestrator,
    agents: Vec<AgentHandle>,
}

impl EmbeddedRuntime {
    pub async fn start(config: &OrchestratorConfigManifest) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;

        let bus_config = &config.spec.bus;
        let bus = match bus_config.transport {
            TransportKind::None => EventBus::new(bus_config.mode),
            TransportKind::InMemory => EventBus::with_transport(
                bus_config.mode,
                Arc::new(InMemoryTransport::new(bus_config.transport_capacity)),
            ),
        };

        let registry: Arc<dyn CapabilityRegistry> = Arc::new(InMemoryCapabilityRegistry::new());

        let extractor: Arc<dyn IntentExtractor> = match provider_from_config(config.spec.ai.as_ref())
            .context("Failed to initialize AI provider")?
        {
            Some(provider) => Arc::new(AiIntentExtractor::new(provider)),
            None => Arc::new(KeywordIntentExtractor::new()),
        };

        let agents = demo::activate_all(&bus, registry.clone())
            .await
            .context("Failed to activate demo agents")?;

        let orchestrator = Orchestrator::new(
            bus.clone(),
            registry.clone(),
            extractor,
            OrchestratorSettings::from(&config.spec.orchestrator),
        );

        info!(
            mode = ?bus_config.mode,
            agents = agents.len(),
            test_mode = config.spec.orchestrator.test_mode,
            "Embedded runtime started"
        );

        Ok(Self {
            bus,
            registry,
            orchestrator,
            agents,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<dyn CapabilityRegistry> {
        &self.registry
    }

    pub fn agents(&self) -> &[AgentHandle] {
        &self.agents
    }

    pub async fn shutdown(self) -> Result<()> {
        for agent in &self.agents {
            agent.stop().await?;
        }
        info!("Embedded runtime stopped");
        Ok(())
    }
}
