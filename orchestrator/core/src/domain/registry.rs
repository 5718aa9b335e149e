// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Capability Registry Interface
//!
//! Maps capability declarations to the running agents that publish them, and
//! to the intents and routing keys each declaration advertises. Two agents
//! may reuse a capability name with different intents or routing keys; those
//! are distinct declarations and are never merged.
//!
//! Implementations must be safe to call concurrently: several agents may be
//! activating at once while the orchestrator is discovering. The in-memory
//! implementation lives in `crate::infrastructure::registry`.

use async_trait::async_trait;

use crate::domain::capability::{AgentRegistration, AgentState, AgentStatus, Capability};

#[async_trait]
pub trait CapabilityRegistry: Send + Sync {
    /// Register (or re-register) an agent and its capabilities
    async fn register_agent(&self, registration: AgentRegistration) -> Result<(), RegistryError>;

    async fn deregister_agent(&self, agent_id: &str) -> Result<(), RegistryError>;

    /// All distinct capability declarations, in discovery order
    async fn list_capabilities(&self) -> Result<Vec<Capability>, RegistryError>;

    /// Ids of the agents publishing exactly this declaration, in discovery order
    async fn agents_with_capability(&self, capability: &Capability) -> Result<Vec<String>, RegistryError>;

    async fn agent_status(&self, agent_id: &str) -> Result<Option<AgentStatus>, RegistryError>;

    async fn list_agents(&self) -> Result<Vec<AgentStatus>, RegistryError>;

    async fn update_status(&self, agent_id: &str, state: AgentState) -> Result<(), RegistryError>;

    /// Refresh `last_activity` and report the agent's current load
    async fn record_activity(&self, agent_id: &str, load_factor: f64) -> Result<(), RegistryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}
