// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Bus Event Model
//!
//! [`Event`] is the only message type carried by the
//! [`EventBus`](crate::infrastructure::event_bus::EventBus). Its wire shape is
//! JSON-oriented:
//!
//! ```text
//! {
//!   "type": "request" | "response" | "broadcast" | "notify",
//!   "source": "<participant id>",
//!   "subject": "<routing key>",
//!   "payload": { "correlation_id"?: "...", "request_id"?: "...", ... },
//!   "timestamp": 1767225600,
//!   "id": "<uuid>"
//! }
//! ```
//!
//! Two payload keys are protocol-significant: `correlation_id` ties a response
//! to exactly one outstanding request, `request_id` is propagated for tracing
//! but never matched on.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Open mapping of string keys to JSON values carried by every event.
pub type Payload = serde_json::Map<String, Value>;

/// Payload key linking a response to the request that triggered it.
pub const CORRELATION_ID_KEY: &str = "correlation_id";

/// Payload key carrying the idempotency / tracing token of a request.
pub const REQUEST_ID_KEY: &str = "request_id";

/// Kind of an event. Serialized as its lowercase name; unknown names
/// round-trip through [`EventType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Request,
    Response,
    Broadcast,
    Notify,
    Custom(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Request => "request",
            EventType::Response => "response",
            EventType::Broadcast => "broadcast",
            EventType::Notify => "notify",
            EventType::Custom(name) => name.as_str(),
        }
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "request" => EventType::Request,
            "response" => EventType::Response,
            "broadcast" => EventType::Broadcast,
            "notify" => EventType::Notify,
            _ => EventType::Custom(value),
        }
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        EventType::from(value.to_string())
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Identifier of the emitting participant
    pub source: String,

    /// Routing key / topic
    pub subject: String,

    #[serde(default)]
    pub payload: Payload,

    /// Unix seconds at emission time
    pub timestamp: i64,

    /// Globally unique per event instance
    pub id: String,
}

impl Event {
    /// Build a new event, stamping a fresh `id` and the current `timestamp`.
    pub fn new(
        event_type: EventType,
        source: impl Into<String>,
        subject: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            event_type,
            source: source.into(),
            subject: subject.into(),
            payload,
            timestamp: Utc::now().timestamp(),
            id: new_event_id(),
        }
    }

    /// A response envelope with every field unset except the payload.
    ///
    /// Missing envelope fields are filled in by the agent runtime before the
    /// response is emitted.
    pub fn response(payload: Payload) -> Self {
        Self {
            event_type: EventType::Response,
            source: String::new(),
            subject: String::new(),
            payload,
            timestamp: 0,
            id: String::new(),
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.payload.get(CORRELATION_ID_KEY).and_then(Value::as_str)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.payload.get(REQUEST_ID_KEY).and_then(Value::as_str)
    }

    pub fn is_type(&self, event_type: &EventType) -> bool {
        &self.event_type == event_type
    }
}

/// How a bus instance runs its handlers, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Handlers run in sequence before `emit` returns
    Sync,
    /// Each handler runs on its own task; `emit` returns immediately
    #[default]
    Async,
}

impl std::str::FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sync" => Ok(DispatchMode::Sync),
            "async" => Ok(DispatchMode::Async),
            other => Err(format!("unknown dispatch mode '{}'", other)),
        }
    }
}

pub fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let mut payload = Payload::new();
        payload.insert(CORRELATION_ID_KEY.to_string(), json!("corr-1"));

        let event = Event::new(EventType::Request, "orchestrator", "deployment.request", payload);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "request");
        assert_eq!(value["source"], "orchestrator");
        assert_eq!(value["subject"], "deployment.request");
        assert_eq!(value["payload"]["correlation_id"], "corr-1");
        assert!(value["timestamp"].as_i64().unwrap() > 0);
        assert!(!value["id"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_custom_event_type_survives_parsing() {
        let raw = r#"{"type":"audit","source":"a","subject":"s","payload":{},"timestamp":1,"id":"x"}"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event_type, EventType::Custom("audit".to_string()));
        assert_eq!(serde_json::to_value(&event).unwrap()["type"], "audit");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Event::new(EventType::Notify, "a", "s", Payload::new());
        let b = Event::new(EventType::Notify, "a", "s", Payload::new());
        assert_ne!(a.id, b.id);
        assert_eq!(a.correlation_id(), None);
    }
}
