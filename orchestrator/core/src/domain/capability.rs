// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Capability advertisement and registry-side agent status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, versioned declaration of intents an agent understands and the
/// routing keys it listens on for them. Never mutated after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Phrases this capability understands
    #[serde(default)]
    pub intents: Vec<String>,

    /// Subjects the agent listens on for this capability
    #[serde(default)]
    pub routing_keys: Vec<String>,

    #[serde(default)]
    pub input_types: Vec<String>,

    #[serde(default)]
    pub output_types: Vec<String>,

    #[serde(default = "default_version")]
    pub version: String,
}

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            intents: Vec::new(),
            routing_keys: Vec::new(),
            input_types: Vec::new(),
            output_types: Vec::new(),
            version: default_version(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intents.push(intent.into());
        self
    }

    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_keys.push(routing_key.into());
        self
    }

    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_types.push(input_type.into());
        self
    }

    pub fn with_output_type(mut self, output_type: impl Into<String>) -> Self {
        self.output_types.push(output_type.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Case-insensitive, whitespace-trimmed exact match against any declared
    /// intent. No partial or fuzzy matching.
    pub fn matches_intent(&self, intent: &str) -> bool {
        let wanted = normalize_intent(intent);
        self.intents
            .iter()
            .any(|declared| normalize_intent(declared) == wanted)
    }
}

pub fn normalize_intent(intent: &str) -> String {
    intent.trim().to_lowercase()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Coarse lifecycle state of a running agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Starting,
    Running,
    Stopped,
    Failed,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentState::Starting => "starting",
            AgentState::Running => "running",
            AgentState::Stopped => "stopped",
            AgentState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Registry-side view of an agent. Read-only from the orchestrator's
/// perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub id: String,
    #[serde(rename = "type")]
    pub agent_type: String,
    pub status: AgentState,
    pub load_factor: f64,
    pub last_activity: DateTime<Utc>,
}

/// Everything an agent hands to the registry when it joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub id: String,
    pub agent_type: String,
    pub capabilities: Vec<Capability>,
}

impl AgentRegistration {
    /// Every routing key referenced by any declared capability, first-seen
    /// order, without duplicates.
    pub fn routing_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for capability in &self.capabilities {
            for key in &capability.routing_keys {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }
}
