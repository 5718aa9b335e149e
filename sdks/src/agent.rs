// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent Runtime Shell
//!
//! Two-phase construction:
//!
//! 1. [`AgentBuilder`] assembles an immutable [`AgentConfig`]. Pure, no I/O.
//! 2. [`AgentConfig::activate`] registers the agent, subscribes one handler per
//!    distinct routing key and returns an [`AgentHandle`].
//!
//! Every routed request goes through the same pipeline: run the user handler
//! (errors and panics become an error response), carry `correlation_id` and
//! `request_id` forward, fill in the envelope, emit the response.

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use conduit_core::domain::capability::{AgentRegistration, AgentState, Capability};
use conduit_core::domain::envelope::ErrorEnvelope;
use conduit_core::domain::event::{new_event_id, Event, EventType, CORRELATION_ID_KEY, REQUEST_ID_KEY};
use conduit_core::domain::registry::{CapabilityRegistry, RegistryError};
use conduit_core::infrastructure::event_bus::{EventBus, EventFilter, EventHandler, SubscriptionId};

use crate::handler::{AgentContext, AgentEventHandler};

const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid agent configuration: {0}")]
    InvalidConfig(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

pub struct AgentBuilder {
    id: String,
    agent_type: String,
    capabilities: Vec<Capability>,
    capacity: usize,
    handler: Option<Arc<dyn AgentEventHandler>>,
}

impl AgentBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent_type: "generic".to_string(),
            capabilities: Vec::new(),
            capacity: DEFAULT_CAPACITY,
            handler: None,
        }
    }

    pub fn agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.agent_type = agent_type.into();
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Concurrent requests considered full load
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn handler<H>(mut self, handler: H) -> Self
    where
        H: AgentEventHandler + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<AgentConfig, AgentError> {
        if self.id.trim().is_empty() {
            return Err(AgentError::InvalidConfig("agent id must not be empty".to_string()));
        }
        let handler = self
            .handler
            .ok_or_else(|| AgentError::InvalidConfig(format!("agent '{}' has no handler", self.id)))?;

        let mut names = HashSet::new();
        for capability in &self.capabilities {
            if !names.insert(capability.name.as_str()) {
                return Err(AgentError::InvalidConfig(format!(
                    "agent '{}' declares capability '{}' more than once",
                    self.id, capability.name
                )));
            }
        }

        Ok(AgentConfig {
            registration: AgentRegistration {
                id: self.id,
                agent_type: self.agent_type,
                capabilities: self.capabilities,
            },
            capacity: self.capacity.max(1),
            handler,
        })
    }
}

/// Immutable, validated agent definition. Nothing is registered or
/// subscribed until [`AgentConfig::activate`].
#[derive(Clone)]
pub struct AgentConfig {
    registration: AgentRegistration,
    capacity: usize,
    handler: Arc<dyn AgentEventHandler>,
}

impl AgentConfig {
    pub fn id(&self) -> &str {
        &self.registration.id
    }

    pub fn registration(&self) -> &AgentRegistration {
        &self.registration
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register with the registry, subscribe, and mark the agent running.
    /// A registration failure aborts activation.
    pub async fn activate(
        self,
        bus: EventBus,
        registry: Arc<dyn CapabilityRegistry>,
    ) -> Result<AgentHandle, AgentError> {
        registry.register_agent(self.registration.clone()).await?;

        let handle = AgentHandle {
            shared: Arc::new(AgentShared {
                context: AgentContext {
                    agent_id: self.registration.id.clone(),
                    bus,
                    registry,
                },
                config: self,
                state: Mutex::new(AgentState::Starting),
                subscriptions: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                processed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        };
        handle.start().await?;
        Ok(handle)
    }
}

struct AgentShared {
    config: AgentConfig,
    context: AgentContext,
    state: Mutex<AgentState>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    in_flight: AtomicUsize,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time health snapshot of an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentHealth {
    pub id: String,
    pub state: AgentState,
    pub in_flight: usize,
    pub load_factor: f64,
    pub processed: u64,
    pub failed: u64,
    pub subscriptions: usize,
}

/// Running agent. The agent stays subscribed until [`AgentHandle::stop`].
#[derive(Clone)]
pub struct AgentHandle {
    shared: Arc<AgentShared>,
}

impl AgentHandle {
    pub fn id(&self) -> &str {
        self.shared.config.id()
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.shared.config.registration.capabilities
    }

    pub fn status(&self) -> AgentState {
        *self.shared.state.lock()
    }

    /// Subscribe to every declared routing key. No-op when already running.
    pub async fn start(&self) -> Result<(), AgentError> {
        if self.status() == AgentState::Running {
            return Ok(());
        }

        let bus = &self.shared.context.bus;
        let ids: Vec<SubscriptionId> = self
            .shared
            .config
            .registration
            .routing_keys()
            .into_iter()
            .map(|key| {
                let label = format!("{}:{}", self.id(), key);
                bus.subscribe_filtered(
                    EventFilter::routing_key(key),
                    Some(label),
                    Arc::new(RoutedRequestHandler {
                        shared: self.shared.clone(),
                    }),
                )
            })
            .collect();

        let count = ids.len();
        self.shared.subscriptions.lock().extend(ids);

        if let Err(e) = self
            .shared
            .context
            .registry
            .update_status(self.id(), AgentState::Running)
            .await
        {
            self.unsubscribe_all();
            *self.shared.state.lock() = AgentState::Failed;
            return Err(e.into());
        }
        *self.shared.state.lock() = AgentState::Running;
        info!(agent_id = %self.id(), routing_keys = count, "Agent started");
        Ok(())
    }

    /// Unsubscribe from the bus and mark the agent stopped.
    pub async fn stop(&self) -> Result<(), AgentError> {
        self.unsubscribe_all();
        *self.shared.state.lock() = AgentState::Stopped;
        self.shared
            .context
            .registry
            .update_status(self.id(), AgentState::Stopped)
            .await?;
        info!(agent_id = %self.id(), "Agent stopped");
        Ok(())
    }

    pub fn health(&self) -> AgentHealth {
        let in_flight = self.shared.in_flight.load(Ordering::SeqCst);
        AgentHealth {
            id: self.id().to_string(),
            state: self.status(),
            in_flight,
            load_factor: self.shared.load_factor(in_flight),
            processed: self.shared.processed.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
            subscriptions: self.shared.subscriptions.lock().len(),
        }
    }

    /// Run one event through the pipeline and emit the response, if any.
    /// Returns the emitted response.
    pub async fn process_event(&self, event: Event) -> Option<Event> {
        self.shared.process_event(event).await
    }

    fn unsubscribe_all(&self) {
        let ids: Vec<SubscriptionId> = self.shared.subscriptions.lock().drain(..).collect();
        for id in ids {
            self.shared.context.bus.unsubscribe(id);
        }
    }
}

impl AgentShared {
    fn load_factor(&self, in_flight: usize) -> f64 {
        (in_flight as f64 / self.config.capacity as f64).min(1.0)
    }

    async fn process_event(&self, event: Event) -> Option<Event> {
        let agent_id = self.context.agent_id.as_str();
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.report_load(in_flight).await;

        debug!(agent_id = %agent_id, event_id = %event.id, subject = %event.subject, "Processing request");

        let outcome = AssertUnwindSafe(self.config.handler.handle(self.context.clone(), event.clone()))
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(Ok(response)) => {
                self.processed.fetch_add(1, Ordering::SeqCst);
                response
            }
            Ok(Err(e)) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                warn!(agent_id = %agent_id, event_id = %event.id, "Handler failed: {:#}", e);
                Some(Event::response(
                    ErrorEnvelope::new(format!("{:#}", e)).with_code("handler_error").into_payload(),
                ))
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                warn!(agent_id = %agent_id, event_id = %event.id, "Handler panicked");
                Some(Event::response(
                    ErrorEnvelope::new(format!("agent '{}' panicked while handling the request", agent_id))
                        .with_code("handler_panic")
                        .into_payload(),
                ))
            }
        };

        let in_flight = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        self.report_load(in_flight).await;

        let Some(mut response) = response else {
            warn!(agent_id = %agent_id, event_id = %event.id, "Handler produced no response");
            return None;
        };

        for key in [CORRELATION_ID_KEY, REQUEST_ID_KEY] {
            if !response.payload.contains_key(key) {
                if let Some(value) = event.payload.get(key) {
                    response.payload.insert(key.to_string(), value.clone());
                }
            }
        }
        fill_envelope(&mut response, agent_id);

        metrics::counter!("conduit_agent_responses_total", "agent" => agent_id.to_string()).increment(1);
        Some(self.context.bus.emit_event(response).await)
    }

    async fn report_load(&self, in_flight: usize) {
        if let Err(e) = self
            .context
            .registry
            .record_activity(&self.context.agent_id, self.load_factor(in_flight))
            .await
        {
            debug!(agent_id = %self.context.agent_id, "Failed to record activity: {}", e);
        }
    }
}

fn fill_envelope(response: &mut Event, agent_id: &str) {
    if response.event_type != EventType::Response {
        warn!(
            agent_id = %agent_id,
            event_type = %response.event_type,
            "Handler returned a non-response event; emitting it as a response"
        );
        response.event_type = EventType::Response;
    }
    if response.id.is_empty() {
        response.id = new_event_id();
    }
    if response.source.is_empty() {
        response.source = agent_id.to_string();
    }
    if response.timestamp == 0 {
        response.timestamp = Utc::now().timestamp();
    }
}

/// Bus subscription target for one routing key of one agent.
struct RoutedRequestHandler {
    shared: Arc<AgentShared>,
}

#[async_trait::async_trait]
impl EventHandler for RoutedRequestHandler {
    async fn handle(&self, event: Event) -> anyhow::Result<()> {
        self.shared.process_event(event).await;
        Ok(())
    }
}
