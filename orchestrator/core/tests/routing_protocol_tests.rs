// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use conduit_core::application::{
    KeywordIntentExtractor, Orchestrator, OrchestratorSettings, RouteStatus, RoutingError,
};
use conduit_core::domain::capability::{AgentRegistration, AgentState, AgentStatus, Capability};
use conduit_core::domain::event::{DispatchMode, Event, EventType, Payload, CORRELATION_ID_KEY};
use conduit_core::domain::registry::{CapabilityRegistry, RegistryError};
use conduit_core::infrastructure::event_bus::EventBus;
use conduit_core::infrastructure::registry::InMemoryCapabilityRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

async fn register(registry: &InMemoryCapabilityRegistry, id: &str, capability: Capability) {
    registry
        .register_agent(AgentRegistration {
            id: id.to_string(),
            agent_type: "test".to_string(),
            capabilities: vec![capability],
        })
        .await
        .unwrap();
}

fn orchestrator(bus: &EventBus, registry: &InMemoryCapabilityRegistry, settings: OrchestratorSettings) -> Orchestrator {
    Orchestrator::new(
        bus.clone(),
        Arc::new(registry.clone()),
        Arc::new(KeywordIntentExtractor::new()),
        settings,
    )
}

fn live(timeout: Duration) -> OrchestratorSettings {
    OrchestratorSettings {
        response_timeout: timeout,
        late_response_grace: Duration::from_millis(50),
        ..Default::default()
    }
}

fn test_mode() -> OrchestratorSettings {
    OrchestratorSettings {
        test_mode: true,
        ..Default::default()
    }
}

fn deploy_capability() -> Capability {
    Capability::new("deployment")
        .with_intent("deploy application")
        .with_routing_key("deployment.request")
}

/// Responder that answers every request on `routing_key` with the given
/// payloads, in order, each carrying the request's correlation id.
fn respond_with(bus: &EventBus, agent_id: &'static str, routing_key: &str, replies: Vec<Value>) {
    let responder_bus = bus.clone();
    bus.subscribe_to_routing_key(routing_key, move |request: Event| {
        let bus = responder_bus.clone();
        let replies = replies.clone();
        async move {
            let correlation_id = request.correlation_id().unwrap_or_default().to_string();
            for reply in replies {
                let mut payload: Payload = reply.as_object().cloned().unwrap_or_default();
                payload.insert(CORRELATION_ID_KEY.to_string(), json!(correlation_id));
                bus.emit(EventType::Response, agent_id, "", payload).await;
            }
            anyhow::Ok(())
        }
    });
}

#[tokio::test]
async fn test_deploy_application_in_test_mode() {
    let bus = EventBus::new(DispatchMode::Sync);
    let registry = InMemoryCapabilityRegistry::new();
    register(&registry, "deployment-agent", deploy_capability()).await;
    let orchestrator = orchestrator(&bus, &registry, test_mode());

    let started = std::time::Instant::now();
    let outcome = orchestrator
        .route_intent("deploy application", Payload::new())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(outcome.status, RouteStatus::Completed);
    assert_eq!(outcome.selected_agent, "deployment-agent");
    assert_eq!(outcome.routing_key, "deployment.request");
    assert!(outcome.message.contains("deployment-agent"));
}

#[tokio::test]
async fn test_unknown_intent_is_no_agent_error() {
    let bus = EventBus::new(DispatchMode::Sync);
    let registry = InMemoryCapabilityRegistry::new();
    register(&registry, "deployment-agent", deploy_capability()).await;
    let orchestrator = orchestrator(&bus, &registry, test_mode());

    let err = orchestrator
        .route_intent("launch rocket", Payload::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RoutingError::NoAgentFound { .. }));
    assert!(err.to_string().contains("launch rocket"));
}

#[tokio::test]
async fn test_partial_intent_does_not_match() {
    let bus = EventBus::new(DispatchMode::Sync);
    let registry = InMemoryCapabilityRegistry::new();
    register(&registry, "deployment-agent", deploy_capability()).await;
    let orchestrator = orchestrator(&bus, &registry, test_mode());

    assert!(orchestrator.route_intent("deploy", Payload::new()).await.is_err());
}

#[tokio::test]
async fn test_timeout_names_agent_and_correlation_id() {
    let bus = EventBus::new(DispatchMode::Async);
    let registry = InMemoryCapabilityRegistry::new();
    register(&registry, "deployment-agent", deploy_capability()).await;
    let orchestrator = orchestrator(&bus, &registry, live(Duration::from_millis(100)));

    let outcome = orchestrator
        .route_intent("deploy application", Payload::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, RouteStatus::Timeout);
    assert_eq!(outcome.selected_agent, "deployment-agent");
    assert!(outcome.correlation_id.starts_with("corr-"));
    assert!(outcome.message.contains(&outcome.correlation_id));
    assert!(outcome.response_payload.is_none());

    // Waiter lingers for the grace period, then goes away
    assert_eq!(bus.subscriber_count(&EventType::Response), 1);
    let mut late = Payload::new();
    late.insert(CORRELATION_ID_KEY.to_string(), json!(outcome.correlation_id));
    bus.emit(EventType::Response, "deployment-agent", "", late).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bus.subscriber_count(&EventType::Response), 0);
}

/// Delegates to the in-memory registry and records every implementer lookup
/// by capability name.
struct LookupRecordingRegistry {
    inner: InMemoryCapabilityRegistry,
    lookups: parking_lot::Mutex<Vec<String>>,
}

impl LookupRecordingRegistry {
    fn take_lookups(&self) -> Vec<String> {
        std::mem::take(&mut *self.lookups.lock())
    }
}

#[async_trait::async_trait]
impl CapabilityRegistry for LookupRecordingRegistry {
    async fn register_agent(&self, r: AgentRegistration) -> Result<(), RegistryError> {
        self.inner.register_agent(r).await
    }
    async fn deregister_agent(&self, id: &str) -> Result<(), RegistryError> {
        self.inner.deregister_agent(id).await
    }
    async fn list_capabilities(&self) -> Result<Vec<Capability>, RegistryError> {
        self.inner.list_capabilities().await
    }
    async fn agents_with_capability(&self, c: &Capability) -> Result<Vec<String>, RegistryError> {
        self.lookups.lock().push(c.name.clone());
        self.inner.agents_with_capability(c).await
    }
    async fn agent_status(&self, id: &str) -> Result<Option<AgentStatus>, RegistryError> {
        self.inner.agent_status(id).await
    }
    async fn list_agents(&self) -> Result<Vec<AgentStatus>, RegistryError> {
        self.inner.list_agents().await
    }
    async fn update_status(&self, id: &str, s: AgentState) -> Result<(), RegistryError> {
        self.inner.update_status(id, s).await
    }
    async fn record_activity(&self, id: &str, l: f64) -> Result<(), RegistryError> {
        self.inner.record_activity(id, l).await
    }
}

#[tokio::test]
async fn test_policy_check_selects_first_registered_agent() {
    let bus = EventBus::new(DispatchMode::Sync);
    let registry = InMemoryCapabilityRegistry::new();
    register(
        &registry,
        "policy-agent-a",
        Capability::new("policy-a").with_intent("policy check").with_routing_key("policy.a.request"),
    )
    .await;
    register(
        &registry,
        "policy-agent-b",
        Capability::new("policy-b").with_intent("Policy Check").with_routing_key("policy.b.request"),
    )
    .await;
    let recording = Arc::new(LookupRecordingRegistry {
        inner: registry,
        lookups: parking_lot::Mutex::new(Vec::new()),
    });
    let orchestrator = Orchestrator::new(
        bus.clone(),
        recording.clone(),
        Arc::new(KeywordIntentExtractor::new()),
        test_mode(),
    );

    for _ in 0..3 {
        let outcome = orchestrator.route_intent("policy check", Payload::new()).await.unwrap();
        assert_eq!(outcome.selected_agent, "policy-agent-a");
        assert_eq!(outcome.routing_key, "policy.a.request");

        // Discovery looks up both; key resolution stops at the selected agent's
        // capability and never consults policy-b
        assert_eq!(recording.take_lookups(), vec!["policy-a", "policy-b", "policy-a"]);
    }
}

#[tokio::test]
async fn test_response_completes_route() {
    let bus = EventBus::new(DispatchMode::Async);
    let registry = InMemoryCapabilityRegistry::new();
    register(
        &registry,
        "policy-agent",
        Capability::new("policy").with_intent("policy check").with_routing_key("policy.request"),
    )
    .await;
    respond_with(
        &bus,
        "policy-agent",
        "policy.request",
        vec![json!({ "status": "success", "decision": "approved", "reasoning": "no violations" })],
    );
    let orchestrator = orchestrator(&bus, &registry, live(Duration::from_secs(5)));

    let outcome = orchestrator.route_intent("policy check", Payload::new()).await.unwrap();

    assert_eq!(outcome.status, RouteStatus::Completed);
    assert_eq!(outcome.message, "Decision: approved. no violations");
    let payload = outcome.response_payload.unwrap();
    assert_eq!(payload[CORRELATION_ID_KEY], json!(outcome.correlation_id));
    assert_eq!(bus.subscriber_count(&EventType::Response), 0);
}

#[tokio::test]
async fn test_agent_error_is_an_outcome_not_a_failure() {
    let bus = EventBus::new(DispatchMode::Sync);
    let registry = InMemoryCapabilityRegistry::new();
    register(&registry, "deployment-agent", deploy_capability()).await;
    respond_with(
        &bus,
        "deployment-agent",
        "deployment.request",
        vec![json!({ "status": "error", "error": "cluster unreachable" })],
    );
    let orchestrator = orchestrator(&bus, &registry, live(Duration::from_secs(5)));

    let outcome = orchestrator
        .route_intent("deploy application", Payload::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, RouteStatus::Error);
    assert_eq!(outcome.message, "cluster unreachable");
}

#[tokio::test]
async fn test_duplicate_responses_consumed_once() {
    let bus = EventBus::new(DispatchMode::Sync);
    let registry = InMemoryCapabilityRegistry::new();
    register(&registry, "deployment-agent", deploy_capability()).await;
    respond_with(
        &bus,
        "deployment-agent",
        "deployment.request",
        vec![
            json!({ "status": "success", "message": "first" }),
            json!({ "status": "success", "message": "second" }),
        ],
    );
    let orchestrator = orchestrator(&bus, &registry, live(Duration::from_secs(5)));

    let outcome = orchestrator
        .route_intent("deploy application", Payload::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, RouteStatus::Completed);
    assert_eq!(outcome.message, "first");
}

#[tokio::test]
async fn test_foreign_correlation_ids_are_ignored() {
    let bus = EventBus::new(DispatchMode::Sync);
    let registry = InMemoryCapabilityRegistry::new();
    register(&registry, "deployment-agent", deploy_capability()).await;

    // A stray response for an unknown correlation id, then the real one
    let responder_bus = bus.clone();
    bus.subscribe_to_routing_key("deployment.request", move |request: Event| {
        let bus = responder_bus.clone();
        async move {
            let mut stray = Payload::new();
            stray.insert(CORRELATION_ID_KEY.to_string(), json!("corr-unknown"));
            stray.insert("message".to_string(), json!("stray"));
            bus.emit(EventType::Response, "someone", "", stray).await;

            let mut real = Payload::new();
            real.insert(
                CORRELATION_ID_KEY.to_string(),
                json!(request.correlation_id().unwrap_or_default()),
            );
            real.insert("message".to_string(), json!("deployed"));
            bus.emit(EventType::Response, "deployment-agent", "", real).await;
            anyhow::Ok(())
        }
    });
    let orchestrator = orchestrator(&bus, &registry, live(Duration::from_secs(5)));

    let outcome = orchestrator
        .route_intent("deploy application", Payload::new())
        .await
        .unwrap();
    assert_eq!(outcome.message, "deployed");

    // No waiter is outstanding; a late stray is a silent no-op
    let mut stray = Payload::new();
    stray.insert(CORRELATION_ID_KEY.to_string(), json!(outcome.correlation_id));
    bus.emit(EventType::Response, "deployment-agent", "", stray).await;
    assert_eq!(bus.subscriber_count(&EventType::Response), 0);
}

#[tokio::test]
async fn test_discovery_failure_propagates() {
    use async_trait::async_trait;

    struct DownRegistry;

    #[async_trait]
    impl CapabilityRegistry for DownRegistry {
        async fn register_agent(&self, _r: AgentRegistration) -> Result<(), RegistryError> {
            Err(RegistryError::Unavailable("down".into()))
        }
        async fn deregister_agent(&self, _id: &str) -> Result<(), RegistryError> {
            Err(RegistryError::Unavailable("down".into()))
        }
        async fn list_capabilities(&self) -> Result<Vec<Capability>, RegistryError> {
            Err(RegistryError::Unavailable("down".into()))
        }
        async fn agents_with_capability(&self, _c: &Capability) -> Result<Vec<String>, RegistryError> {
            Err(RegistryError::Unavailable("down".into()))
        }
        async fn agent_status(&self, _id: &str) -> Result<Option<AgentStatus>, RegistryError> {
            Err(RegistryError::Unavailable("down".into()))
        }
        async fn list_agents(&self) -> Result<Vec<AgentStatus>, RegistryError> {
            Err(RegistryError::Unavailable("down".into()))
        }
        async fn update_status(&self, _id: &str, _s: AgentState) -> Result<(), RegistryError> {
            Err(RegistryError::Unavailable("down".into()))
        }
        async fn record_activity(&self, _id: &str, _l: f64) -> Result<(), RegistryError> {
            Err(RegistryError::Unavailable("down".into()))
        }
    }

    let orchestrator = Orchestrator::new(
        EventBus::new(DispatchMode::Sync),
        Arc::new(DownRegistry),
        Arc::new(KeywordIntentExtractor::new()),
        test_mode(),
    );

    let err = orchestrator
        .route_intent("deploy application", Payload::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RoutingError::Discovery(RegistryError::Unavailable(_))));
}
