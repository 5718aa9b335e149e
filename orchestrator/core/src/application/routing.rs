// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Routing result types and the pure selection helpers used by the
//! [`Orchestrator`](crate::application::orchestrator::Orchestrator).

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::domain::envelope::{ERROR_KEY, MESSAGE_KEY, STATUS_KEY};
use crate::domain::event::Payload;
use crate::domain::llm::AiError;
use crate::domain::registry::RegistryError;

/// Routing key used when nothing more specific can be resolved
pub const CATCH_ALL_ROUTING_KEY: &str = "agent.request";

/// Substring heuristics applied to the intent text when no capability of the
/// selected agent matches. Checked in order; first hit wins.
const FALLBACK_ROUTING_KEYS: &[(&str, &str)] = &[
    ("policy", "policy.request"),
    ("deploy", "deployment.request"),
    ("application", "application.request"),
    ("service", "service.request"),
    ("environment", "environment.request"),
    ("release", "release.request"),
];

const DEFAULT_SUCCESS_MESSAGE: &str = "Request processed successfully";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    Completed,
    Error,
    Timeout,
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Completed => "completed",
            RouteStatus::Error => "error",
            RouteStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one routed request. Exactly one per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOutcome {
    pub status: RouteStatus,
    pub selected_agent: String,
    pub intent: String,
    pub routing_key: String,
    pub correlation_id: String,
    pub request_id: String,
    pub message: String,
    /// Payload of the consumed response, if one arrived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_payload: Option<Payload>,
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("Capability discovery failed: {0}")]
    Discovery(#[from] RegistryError),

    #[error("No agent found for intent '{intent}'")]
    NoAgentFound { intent: String },

    #[error("Could not determine an intent for message '{message}'")]
    IntentNotUnderstood { message: String },

    #[error("Intent extraction failed: {0}")]
    Ai(#[from] AiError),
}

/// Stable first-seen dedup, then drop the caller's own id.
pub fn select_candidates(agent_ids: Vec<String>, self_id: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    agent_ids
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .filter(|id| id != self_id)
        .collect()
}

/// Heuristic routing key derived from the intent text alone.
pub fn fallback_routing_key(intent: &str) -> &'static str {
    let intent = intent.to_lowercase();
    FALLBACK_ROUTING_KEYS
        .iter()
        .find(|(needle, _)| intent.contains(needle))
        .map(|(_, key)| *key)
        .unwrap_or(CATCH_ALL_ROUTING_KEY)
}

/// Classify a response payload and pull a human-readable summary out of it.
pub fn summarize_response(payload: &Payload) -> (RouteStatus, String) {
    let is_error = payload.get(STATUS_KEY).and_then(Value::as_str) == Some("error");
    let status = if is_error {
        RouteStatus::Error
    } else {
        RouteStatus::Completed
    };

    let text = |key: &str| payload.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());

    let message = match (text("decision"), text("reasoning")) {
        (Some(decision), Some(reasoning)) => format!("Decision: {}. {}", decision, reasoning),
        _ => text(MESSAGE_KEY)
            .or_else(|| if is_error { text(ERROR_KEY) } else { None })
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string()),
    };

    (status, message)
}
