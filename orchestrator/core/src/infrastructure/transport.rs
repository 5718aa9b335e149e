// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Bus Transport - pluggable wire backend behind the event bus
//
// The bus forwards every emitted event to its transport (if any) as
// `publish(topic = event type, bytes = JSON)` before dispatching locally.
// A transport only has to satisfy publish/subscribe on opaque bytes.
//
// For now: in-memory broadcast fan-out per topic (events lost on restart,
// no replay). A broker-backed transport plugs in behind the same trait.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, topic: &str, data: Bytes) -> Result<(), TransportError>;

    async fn subscribe(&self, topic: &str) -> Result<TransportReceiver, TransportError>;
}

/// Receiver for the raw bytes published on one topic
pub struct TransportReceiver {
    topic: String,
    receiver: broadcast::Receiver<Bytes>,
}

impl TransportReceiver {
    pub fn new(topic: impl Into<String>, receiver: broadcast::Receiver<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            receiver,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Receive the next message (waits until one is available)
    pub async fn recv(&mut self) -> Result<Bytes, TransportError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => TransportError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!(topic = %self.topic, "Transport receiver lagged by {} messages", n);
                TransportError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<Bytes, TransportError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => TransportError::Empty,
            broadcast::error::TryRecvError::Closed => TransportError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!(topic = %self.topic, "Transport receiver lagged by {} messages", n);
                TransportError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is closed")]
    Closed,

    #[error("No messages available")]
    Empty,

    #[error("Receiver lagged by {0} messages (messages were dropped)")]
    Lagged(u64),

    #[error("Publish failed: {0}")]
    Publish(String),
}

/// Per-topic tokio broadcast fan-out.
pub struct InMemoryTransport {
    capacity: usize,
    topics: RwLock<HashMap<String, broadcast::Sender<Bytes>>>,
}

impl InMemoryTransport {
    /// Capacity is the per-topic buffer before slow receivers start lagging
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: RwLock::new(HashMap::new()),
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, topic: &str, data: Bytes) -> Result<(), TransportError> {
        let sender = self.topics.read().get(topic).cloned();

        match sender {
            Some(sender) => {
                // send() only fails when nobody is listening
                let delivered = sender.send(data).unwrap_or(0);
                debug!(topic = %topic, receivers = delivered, "Published to transport");
            }
            None => debug!(topic = %topic, "No transport subscribers for topic"),
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<TransportReceiver, TransportError> {
        let mut topics = self.topics.write();
        let sender = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(TransportReceiver::new(topic, sender.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_topic_subscribers_only() {
        let transport = InMemoryTransport::new(8);
        let mut requests = transport.subscribe("request").await.unwrap();
        let mut responses = transport.subscribe("response").await.unwrap();

        transport
            .publish("request", Bytes::from_static(b"{\"n\":1}"))
            .await
            .unwrap();

        assert_eq!(requests.recv().await.unwrap(), Bytes::from_static(b"{\"n\":1}"));
        assert!(matches!(responses.try_recv(), Err(TransportError::Empty)));
        assert_eq!(transport.subscriber_count("request"), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let transport = InMemoryTransport::default();
        assert!(transport.publish("notify", Bytes::new()).await.is_ok());
        assert_eq!(transport.subscriber_count("notify"), 0);
    }

    #[tokio::test]
    async fn test_slow_receiver_lags() {
        let transport = InMemoryTransport::new(1);
        let mut receiver = transport.subscribe("broadcast").await.unwrap();

        transport.publish("broadcast", Bytes::from_static(b"1")).await.unwrap();
        transport.publish("broadcast", Bytes::from_static(b"2")).await.unwrap();

        assert!(matches!(receiver.recv().await, Err(TransportError::Lagged(1))));
        assert_eq!(receiver.recv().await.unwrap(), Bytes::from_static(b"2"));
    }
}
