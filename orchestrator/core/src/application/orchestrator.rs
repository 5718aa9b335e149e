// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Orchestrator - intent routing and the request/response correlation protocol
//!
//! `route_intent` turns "an intent was determined" into "exactly one agent
//! processed it and we have its answer, or we know we don't":
//!
//! 1. discover capabilities whose intents match exactly (trimmed, case-insensitive)
//! 2. dedup the implementing agents, drop the orchestrator itself
//! 3. pick the first candidate and resolve its routing key
//! 4. open a single-slot waiter filtered on a fresh correlation id
//! 5. emit the request and wait, bounded by `response_timeout`
//!
//! Discovery failures and "no agent" are errors. A timeout or an agent-side
//! error is a regular [`RouteOutcome`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::intent::IntentExtractor;
use crate::application::routing::{
    fallback_routing_key, select_candidates, summarize_response, RouteOutcome, RouteStatus,
    RoutingError,
};
use crate::domain::capability::Capability;
use crate::domain::config::OrchestratorSettingsConfig;
use crate::domain::envelope::RequestEnvelope;
use crate::domain::event::{Event, EventType, Payload};
use crate::domain::registry::CapabilityRegistry;
use crate::infrastructure::event_bus::{EventBus, EventFilter, SubscriptionId};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Participant id used as `source` and excluded from candidate agents
    pub id: String,
    /// Emit the request but synthesize the result instead of waiting
    pub test_mode: bool,
    pub response_timeout: Duration,
    /// How long a timed-out waiter subscription lingers for stragglers
    pub late_response_grace: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            id: "orchestrator".to_string(),
            test_mode: false,
            response_timeout: Duration::from_secs(30),
            late_response_grace: Duration::from_secs(30),
        }
    }
}

impl From<&OrchestratorSettingsConfig> for OrchestratorSettings {
    fn from(config: &OrchestratorSettingsConfig) -> Self {
        Self {
            id: config.id.clone(),
            test_mode: config.test_mode,
            response_timeout: config.response_timeout,
            late_response_grace: config.late_response_grace,
        }
    }
}

pub struct Orchestrator {
    bus: EventBus,
    registry: Arc<dyn CapabilityRegistry>,
    extractor: Arc<dyn IntentExtractor>,
    settings: OrchestratorSettings,
    sequence: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        bus: EventBus,
        registry: Arc<dyn CapabilityRegistry>,
        extractor: Arc<dyn IntentExtractor>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            bus,
            registry,
            extractor,
            settings,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Every intent currently advertised, first-seen order, normalized.
    pub async fn known_intents(&self) -> Result<Vec<String>, RoutingError> {
        let capabilities = self.registry.list_capabilities().await?;
        let mut intents: Vec<String> = Vec::new();
        for capability in &capabilities {
            for intent in &capability.intents {
                let intent = crate::domain::capability::normalize_intent(intent);
                if !intents.contains(&intent) {
                    intents.push(intent);
                }
            }
        }
        Ok(intents)
    }

    /// Free-text entry point: extract intent and parameters, then route.
    /// Keys in `context` override extracted parameters.
    pub async fn chat(&self, message: &str, context: Payload) -> Result<RouteOutcome, RoutingError> {
        let known_intents = self.known_intents().await?;
        let intent = self.extractor.extract_intent(message, &known_intents).await?;
        if intent.trim().is_empty() {
            return Err(RoutingError::IntentNotUnderstood {
                message: message.to_string(),
            });
        }

        let mut merged = self.extractor.extract_parameters(message, &intent).await?;
        merged.extend(context);

        self.route_intent(&intent, merged).await
    }

    pub async fn route_intent(&self, intent: &str, context: Payload) -> Result<RouteOutcome, RoutingError> {
        let capabilities = self.registry.list_capabilities().await?;

        let mut discovered = Vec::new();
        for capability in capabilities.iter().filter(|c| c.matches_intent(intent)) {
            discovered.extend(self.registry.agents_with_capability(capability).await?);
        }

        let candidates = select_candidates(discovered, &self.settings.id);
        let selected_agent = match candidates.into_iter().next() {
            Some(agent) => agent,
            None => {
                metrics::counter!("conduit_routes_total", "status" => "no_agent").increment(1);
                return Err(RoutingError::NoAgentFound {
                    intent: intent.to_string(),
                });
            }
        };

        let routing_key = self.resolve_routing_key(&capabilities, intent, &selected_agent).await;
        let correlation_id = self.next_token("corr");
        let request_id = self.next_token("req");

        info!(
            intent = %intent,
            agent = %selected_agent,
            routing_key = %routing_key,
            correlation_id = %correlation_id,
            "Routing intent"
        );

        // The waiter exists before the request is emitted
        let (subscription, mut waiter) = self.bus.subscribe_channel(
            EventFilter::for_type(EventType::Response).with_correlation_id(correlation_id.clone()),
            1,
        );

        let request = RequestEnvelope {
            correlation_id: correlation_id.clone(),
            request_id: Some(request_id.clone()),
            intent: Some(intent.to_string()),
            context,
            source_agent: Some(self.settings.id.clone()),
            body: Payload::new(),
        };
        self.bus
            .emit(EventType::Request, self.settings.id.clone(), routing_key.clone(), request.into_payload())
            .await;

        let mut outcome = RouteOutcome {
            status: RouteStatus::Completed,
            selected_agent,
            intent: intent.to_string(),
            routing_key,
            correlation_id,
            request_id,
            message: String::new(),
            response_payload: None,
        };

        if self.settings.test_mode {
            self.bus.unsubscribe(subscription);
            outcome.message = format!(
                "Simulated routing to {} for intent '{}' via {}",
                outcome.selected_agent, outcome.intent, outcome.routing_key
            );
            return Ok(self.finish(outcome));
        }

        match self.await_response(&mut waiter).await {
            Some(response) => {
                self.bus.unsubscribe(subscription);
                let (status, message) = summarize_response(&response.payload);
                outcome.status = status;
                outcome.message = message;
                outcome.response_payload = Some(response.payload);
            }
            None => {
                warn!(
                    agent = %outcome.selected_agent,
                    correlation_id = %outcome.correlation_id,
                    "No response within {:?}",
                    self.settings.response_timeout
                );
                self.retire_later(subscription);
                outcome.status = RouteStatus::Timeout;
                outcome.message = format!(
                    "Agent {} did not respond within {}s (correlation id {})",
                    outcome.selected_agent,
                    self.settings.response_timeout.as_secs(),
                    outcome.correlation_id
                );
            }
        }

        Ok(self.finish(outcome))
    }

    async fn await_response(&self, waiter: &mut mpsc::Receiver<Event>) -> Option<Event> {
        match tokio::time::timeout(self.settings.response_timeout, waiter.recv()).await {
            Ok(Some(event)) => Some(event),
            Ok(None) => {
                debug!("Response waiter closed before a response arrived");
                None
            }
            Err(_) => None,
        }
    }

    /// First declared routing key of a matching capability published by
    /// `agent` itself, otherwise the heuristic table. Never fails.
    async fn resolve_routing_key(&self, capabilities: &[Capability], intent: &str, agent: &str) -> String {
        for capability in capabilities.iter().filter(|c| c.matches_intent(intent)) {
            let implementers = match self.registry.agents_with_capability(capability).await {
                Ok(implementers) => implementers,
                Err(e) => {
                    warn!(capability = %capability.name, "Routing key lookup failed: {}", e);
                    continue;
                }
            };
            if implementers.iter().any(|id| id == agent) {
                if let Some(key) = capability.routing_keys.first() {
                    return key.clone();
                }
            }
        }

        let key = fallback_routing_key(intent);
        warn!(intent = %intent, agent = %agent, routing_key = %key, "Using heuristic routing key");
        key.to_string()
    }

    /// Leave the waiter subscription in place for a grace period so a late
    /// response is absorbed, then remove it.
    fn retire_later(&self, subscription: SubscriptionId) {
        let bus = self.bus.clone();
        let grace = self.settings.late_response_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            bus.unsubscribe(subscription);
        });
    }

    fn finish(&self, outcome: RouteOutcome) -> RouteOutcome {
        metrics::counter!("conduit_routes_total", "status" => outcome.status.as_str()).increment(1);
        info!(
            status = %outcome.status,
            agent = %outcome.selected_agent,
            correlation_id = %outcome.correlation_id,
            "Route finished"
        );
        outcome
    }

    fn next_token(&self, prefix: &str) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}", prefix, nanos, seq)
    }
}
