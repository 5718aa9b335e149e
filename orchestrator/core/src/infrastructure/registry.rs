// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// In-Memory Capability Registry
//
// Registration order is the discovery order: capabilities are listed in the
// order their agents first registered. Identical declarations published by
// several agents are listed once; a shared name with different intents or
// routing keys is listed per agent. Re-registering an agent replaces its entry
// in place without moving it.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::capability::{AgentRegistration, AgentState, AgentStatus, Capability};
use crate::domain::registry::{CapabilityRegistry, RegistryError};

struct RegistryEntry {
    registration: AgentRegistration,
    status: AgentStatus,
}

#[derive(Clone, Default)]
pub struct InMemoryCapabilityRegistry {
    entries: Arc<RwLock<Vec<RegistryEntry>>>,
}

impl InMemoryCapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(registration: &AgentRegistration) -> Result<(), RegistryError> {
        if registration.id.trim().is_empty() {
            return Err(RegistryError::InvalidRegistration(
                "agent id must not be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for capability in &registration.capabilities {
            if capability.name.trim().is_empty() {
                return Err(RegistryError::InvalidRegistration(format!(
                    "agent '{}' declares a capability without a name",
                    registration.id
                )));
            }
            if !names.insert(capability.name.as_str()) {
                return Err(RegistryError::InvalidRegistration(format!(
                    "agent '{}' declares capability '{}' more than once",
                    registration.id, capability.name
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CapabilityRegistry for InMemoryCapabilityRegistry {
    async fn register_agent(&self, registration: AgentRegistration) -> Result<(), RegistryError> {
        Self::validate(&registration)?;

        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.registration.id == registration.id) {
            Some(existing) => {
                debug!(agent_id = %registration.id, "Re-registering agent");
                existing.status.agent_type = registration.agent_type.clone();
                existing.status.last_activity = Utc::now();
                existing.registration = registration;
            }
            None => {
                info!(
                    agent_id = %registration.id,
                    capabilities = registration.capabilities.len(),
                    "Agent registered"
                );
                let status = AgentStatus {
                    id: registration.id.clone(),
                    agent_type: registration.agent_type.clone(),
                    status: AgentState::Starting,
                    load_factor: 0.0,
                    last_activity: Utc::now(),
                };
                entries.push(RegistryEntry {
                    registration,
                    status,
                });
            }
        }
        Ok(())
    }

    async fn deregister_agent(&self, agent_id: &str) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        let pos = entries
            .iter()
            .position(|e| e.registration.id == agent_id)
            .ok_or_else(|| RegistryError::NotFound(agent_id.to_string()))?;
        entries.remove(pos);
        info!(agent_id = %agent_id, "Agent deregistered");
        Ok(())
    }

    async fn list_capabilities(&self) -> Result<Vec<Capability>, RegistryError> {
        let entries = self.entries.read();
        let mut capabilities: Vec<Capability> = Vec::new();
        for entry in entries.iter() {
            for capability in &entry.registration.capabilities {
                if !capabilities.contains(capability) {
                    capabilities.push(capability.clone());
                }
            }
        }
        Ok(capabilities)
    }

    async fn agents_with_capability(&self, capability: &Capability) -> Result<Vec<String>, RegistryError> {
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .filter(|e| e.registration.capabilities.contains(capability))
            .map(|e| e.registration.id.clone())
            .collect())
    }

    async fn agent_status(&self, agent_id: &str) -> Result<Option<AgentStatus>, RegistryError> {
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .find(|e| e.registration.id == agent_id)
            .map(|e| e.status.clone()))
    }

    async fn list_agents(&self) -> Result<Vec<AgentStatus>, RegistryError> {
        let entries = self.entries.read();
        Ok(entries.iter().map(|e| e.status.clone()).collect())
    }

    async fn update_status(&self, agent_id: &str, state: AgentState) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.registration.id == agent_id)
            .ok_or_else(|| RegistryError::NotFound(agent_id.to_string()))?;
        debug!(agent_id = %agent_id, from = %entry.status.status, to = %state, "Agent state change");
        entry.status.status = state;
        entry.status.last_activity = Utc::now();
        Ok(())
    }

    async fn record_activity(&self, agent_id: &str, load_factor: f64) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.registration.id == agent_id)
            .ok_or_else(|| RegistryError::NotFound(agent_id.to_string()))?;
        entry.status.load_factor = load_factor.clamp(0.0, 1.0);
        entry.status.last_activity = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(id: &str, capabilities: Vec<Capability>) -> AgentRegistration {
        AgentRegistration {
            id: id.to_string(),
            agent_type: "test".to_string(),
            capabilities,
        }
    }

    #[tokio::test]
    async fn test_identical_declarations_listed_once() {
        let registry = InMemoryCapabilityRegistry::new();
        let policy = Capability::new("policy").with_intent("policy check").with_routing_key("policy.request");
        registry
            .register_agent(registration("policy-a", vec![policy.clone()]))
            .await
            .unwrap();
        registry
            .register_agent(registration("policy-b", vec![policy.clone(), Capability::new("audit")]))
            .await
            .unwrap();

        let capabilities = registry.list_capabilities().await.unwrap();
        let names: Vec<&str> = capabilities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["policy", "audit"]);

        assert_eq!(
            registry.agents_with_capability(&policy).await.unwrap(),
            vec!["policy-a", "policy-b"]
        );
        assert!(registry
            .agents_with_capability(&Capability::new("nothing"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_shared_name_keeps_each_agents_declaration() {
        let registry = InMemoryCapabilityRegistry::new();
        let own = Capability::new("policy")
            .with_intent("policy check")
            .with_routing_key("orchestrator.policy");
        let delegated = Capability::new("policy")
            .with_intent("policy check")
            .with_intent("evaluate policy")
            .with_routing_key("policy.request");
        registry.register_agent(registration("orchestrator", vec![own.clone()])).await.unwrap();
        registry.register_agent(registration("policy-agent", vec![delegated.clone()])).await.unwrap();

        let capabilities = registry.list_capabilities().await.unwrap();
        assert_eq!(capabilities, vec![own.clone(), delegated.clone()]);

        assert_eq!(registry.agents_with_capability(&own).await.unwrap(), vec!["orchestrator"]);
        assert_eq!(
            registry.agents_with_capability(&delegated).await.unwrap(),
            vec!["policy-agent"]
        );
    }

    #[tokio::test]
    async fn test_reregistration_replaces_in_place() {
        let registry = InMemoryCapabilityRegistry::new();
        registry.register_agent(registration("a", vec![Capability::new("one")])).await.unwrap();
        registry.register_agent(registration("b", vec![Capability::new("two")])).await.unwrap();
        registry.update_status("a", AgentState::Running).await.unwrap();

        registry.register_agent(registration("a", vec![Capability::new("three")])).await.unwrap();

        let agents = registry.list_agents().await.unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].id, "a");
        assert_eq!(agents[0].status, AgentState::Running);

        let names: Vec<String> = registry
            .list_capabilities()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["three", "two"]);
    }

    #[tokio::test]
    async fn test_invalid_registrations_rejected() {
        let registry = InMemoryCapabilityRegistry::new();
        let err = registry
            .register_agent(registration("", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRegistration(_)));

        let err = registry
            .register_agent(registration("a", vec![Capability::new("x"), Capability::new("x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRegistration(_)));
        assert!(registry.list_agents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_tracking() {
        let registry = InMemoryCapabilityRegistry::new();
        registry.register_agent(registration("a", vec![])).await.unwrap();

        let status = registry.agent_status("a").await.unwrap().unwrap();
        assert_eq!(status.status, AgentState::Starting);

        registry.record_activity("a", 1.7).await.unwrap();
        let status = registry.agent_status("a").await.unwrap().unwrap();
        assert_eq!(status.load_factor, 1.0);

        assert!(matches!(
            registry.update_status("ghost", AgentState::Running).await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(registry.agent_status("ghost").await.unwrap().is_none());

        registry.deregister_agent("a").await.unwrap();
        assert!(registry.agent_status("a").await.unwrap().is_none());
        assert!(registry.deregister_agent("a").await.is_err());
    }
}
