// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use conduit_core::domain::event::Event;
use conduit_core::domain::registry::CapabilityRegistry;
use conduit_core::infrastructure::event_bus::EventBus;
use std::future::Future;
use std::sync::Arc;

/// What a handler can reach while processing a request.
#[derive(Clone)]
pub struct AgentContext {
    pub agent_id: String,
    pub bus: EventBus,
    pub registry: Arc<dyn CapabilityRegistry>,
}

/// Domain logic of an agent.
///
/// Return `Ok(Some(response))` to answer, `Ok(None)` to stay silent. Errors
/// (and panics) are turned into a standardized error response by the shell.
#[async_trait]
pub trait AgentEventHandler: Send + Sync {
    async fn handle(&self, ctx: AgentContext, event: Event) -> anyhow::Result<Option<Event>>;
}

#[async_trait]
impl<F, Fut> AgentEventHandler for F
where
    F: Fn(AgentContext, Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<Event>>> + Send + 'static,
{
    async fn handle(&self, ctx: AgentContext, event: Event) -> anyhow::Result<Option<Event>> {
        (self)(ctx, event).await
    }
}
