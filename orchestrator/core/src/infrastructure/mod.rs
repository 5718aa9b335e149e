// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod transport;
pub mod registry;
pub mod llm;

pub use event_bus::{EventBus, EventFilter, EventHandler, SubscriptionId, SubscriptionInfo};
pub use registry::InMemoryCapabilityRegistry;
pub use transport::{InMemoryTransport, Transport, TransportError};
