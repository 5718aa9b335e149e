// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for bus events
//
// In-process dispatcher with an optional pluggable transport. Every emitted
// event is first forwarded to the transport (topic = event type), then handed
// to every local subscription registered for that event type whose filter
// matches.
//
// Subscriptions are values: an EventFilter (type, optional subject, optional
// correlation id) plus a target (a handler or an mpsc channel). They can be
// listed and cancelled individually.
//
// Locking: the per-type subscription map sits behind a RwLock. Dispatch takes
// the read lock only long enough to snapshot the list, so handlers may
// subscribe or emit without deadlocking.

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::domain::event::{DispatchMode, Event, EventType, Payload};
use crate::infrastructure::transport::Transport;

/// Callback invoked for every matching event
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> EventHandler for F
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: Event) -> anyhow::Result<()> {
        (self)(event).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Which events a subscription receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFilter {
    pub event_type: EventType,
    /// Exact subject (routing key) match when set
    pub subject: Option<String>,
    /// Exact `correlation_id` payload match when set
    pub correlation_id: Option<String>,
}

impl EventFilter {
    pub fn for_type(event_type: EventType) -> Self {
        Self {
            event_type,
            subject: None,
            correlation_id: None,
        }
    }

    /// Requests addressed to one routing key
    pub fn routing_key(routing_key: impl Into<String>) -> Self {
        Self::for_type(EventType::Request).with_subject(routing_key)
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if event.event_type != self.event_type {
            return false;
        }
        if let Some(subject) = &self.subject {
            if &event.subject != subject {
                return false;
            }
        }
        if let Some(correlation_id) = &self.correlation_id {
            if event.correlation_id() != Some(correlation_id.as_str()) {
                return false;
            }
        }
        true
    }
}

enum SubscriptionTarget {
    Handler(Arc<dyn EventHandler>),
    Channel(mpsc::Sender<Event>),
}

struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    label: Option<String>,
    target: SubscriptionTarget,
}

/// Inspectable view of a registered subscription
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub filter: EventFilter,
    pub label: Option<String>,
    pub target: &'static str,
}

struct BusInner {
    mode: DispatchMode,
    transport: Option<Arc<dyn Transport>>,
    subscriptions: RwLock<HashMap<EventType, Vec<Arc<Subscription>>>>,
    next_id: AtomicU64,
}

/// Event bus shared by the orchestrator and every agent. Cloning is cheap and
/// every clone refers to the same subscription table.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

static SHARED_DEFAULT: OnceLock<EventBus> = OnceLock::new();

impl EventBus {
    pub fn new(mode: DispatchMode) -> Self {
        Self::build(mode, None)
    }

    pub fn with_transport(mode: DispatchMode, transport: Arc<dyn Transport>) -> Self {
        Self::build(mode, Some(transport))
    }

    fn build(mode: DispatchMode, transport: Option<Arc<dyn Transport>>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                mode,
                transport,
                subscriptions: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Process-wide asynchronous bus for convenience wiring. Routing code
    /// always receives its bus explicitly.
    pub fn shared_default() -> EventBus {
        SHARED_DEFAULT
            .get_or_init(|| EventBus::new(DispatchMode::Async))
            .clone()
    }

    pub fn mode(&self) -> DispatchMode {
        self.inner.mode
    }

    /// Invoke `handler` for every event of `event_type`
    pub fn subscribe<H>(&self, event_type: EventType, handler: H) -> SubscriptionId
    where
        H: EventHandler + 'static,
    {
        self.subscribe_filtered(EventFilter::for_type(event_type), None, Arc::new(handler))
    }

    /// Invoke `handler` for request events whose subject equals `routing_key`.
    /// Requests for other subjects are ignored by this subscription.
    pub fn subscribe_to_routing_key<H>(&self, routing_key: &str, handler: H) -> SubscriptionId
    where
        H: EventHandler + 'static,
    {
        self.subscribe_filtered(
            EventFilter::routing_key(routing_key),
            Some(routing_key.to_string()),
            Arc::new(handler),
        )
    }

    pub fn subscribe_filtered(
        &self,
        filter: EventFilter,
        label: Option<String>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        self.insert(filter, label, SubscriptionTarget::Handler(handler))
    }

    /// Deliver matching events into a bounded channel. A full channel drops
    /// the event with a warning.
    pub fn subscribe_channel(
        &self,
        filter: EventFilter,
        capacity: usize,
    ) -> (SubscriptionId, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.insert(filter, None, SubscriptionTarget::Channel(tx));
        (id, rx)
    }

    fn insert(&self, filter: EventFilter, label: Option<String>, target: SubscriptionTarget) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let event_type = filter.event_type.clone();
        debug!(subscription = %id, event_type = %event_type, subject = ?filter.subject, "Subscribing");

        let subscription = Arc::new(Subscription {
            id,
            filter,
            label,
            target,
        });
        self.inner
            .subscriptions
            .write()
            .entry(event_type)
            .or_default()
            .push(subscription);
        id
    }

    /// Remove one subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.inner.subscriptions.write();
        for list in subscriptions.values_mut() {
            if let Some(pos) = list.iter().position(|s| s.id == id) {
                list.remove(pos);
                debug!(subscription = %id, "Unsubscribed");
                return true;
            }
        }
        false
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let subscriptions = self.inner.subscriptions.read();
        let mut infos: Vec<SubscriptionInfo> = subscriptions
            .values()
            .flatten()
            .map(|s| SubscriptionInfo {
                id: s.id,
                filter: s.filter.clone(),
                label: s.label.clone(),
                target: match s.target {
                    SubscriptionTarget::Handler(_) => "handler",
                    SubscriptionTarget::Channel(_) => "channel",
                },
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Get the number of subscriptions for an event type
    pub fn subscriber_count(&self, event_type: &EventType) -> usize {
        self.inner
            .subscriptions
            .read()
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Build an event and emit it. Returns the emitted event.
    pub async fn emit(
        &self,
        event_type: EventType,
        source: impl Into<String>,
        subject: impl Into<String>,
        payload: Payload,
    ) -> Event {
        let event = Event::new(event_type, source, subject, payload);
        self.emit_event(event).await
    }

    /// Emit a fully built event. A missing `id` or `timestamp` is filled in.
    pub async fn emit_event(&self, mut event: Event) -> Event {
        if event.id.is_empty() {
            event.id = crate::domain::event::new_event_id();
        }
        if event.timestamp == 0 {
            event.timestamp = chrono::Utc::now().timestamp();
        }

        metrics::counter!("conduit_bus_events_emitted_total", "type" => event.event_type.to_string())
            .increment(1);

        if let Some(transport) = &self.inner.transport {
            self.forward_to_transport(transport.as_ref(), &event).await;
        }

        // Snapshot under the read lock, dispatch outside it
        let snapshot: Vec<Arc<Subscription>> = self
            .inner
            .subscriptions
            .read()
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();

        if snapshot.is_empty() {
            debug!(event_type = %event.event_type, subject = %event.subject, "No subscribers for event");
            return event;
        }

        for subscription in snapshot {
            if !subscription.filter.matches(&event) {
                continue;
            }
            match &subscription.target {
                SubscriptionTarget::Channel(tx) => deliver_to_channel(subscription.id, tx, &event),
                SubscriptionTarget::Handler(handler) => match self.inner.mode {
                    DispatchMode::Sync => {
                        run_handler(subscription.id, handler.clone(), event.clone()).await;
                    }
                    DispatchMode::Async => {
                        tokio::spawn(run_handler(subscription.id, handler.clone(), event.clone()));
                    }
                },
            }
        }

        event
    }

    async fn forward_to_transport(&self, transport: &dyn Transport, event: &Event) {
        let data = match serde_json::to_vec(event) {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                error!(event_id = %event.id, "Failed to serialize event for transport: {}", e);
                return;
            }
        };
        if let Err(e) = transport.publish(event.event_type.as_str(), data).await {
            warn!(event_id = %event.id, "Transport publish failed, dispatching locally only: {}", e);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DispatchMode::default())
    }
}

fn deliver_to_channel(id: SubscriptionId, tx: &mpsc::Sender<Event>, event: &Event) {
    match tx.try_send(event.clone()) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(subscription = %id, event_id = %event.id, "Subscription channel full, dropping event");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!(subscription = %id, event_id = %event.id, "Subscription channel closed, dropping event");
        }
    }
}

/// Run one handler, containing both errors and panics.
async fn run_handler(id: SubscriptionId, handler: Arc<dyn EventHandler>, event: Event) {
    let event_id = event.id.clone();
    match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            metrics::counter!("conduit_bus_handler_failures_total", "kind" => "error").increment(1);
            warn!(subscription = %id, event_id = %event_id, "Event handler failed: {:#}", e);
        }
        Err(_) => {
            metrics::counter!("conduit_bus_handler_failures_total", "kind" => "panic").increment(1);
            error!(subscription = %id, event_id = %event_id, "Event handler panicked");
        }
    }
}
