// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Conduit Rust SDK
//!
//! Build agents that join the Conduit event bus: declare capabilities, supply
//! a handler, activate against a bus and a registry.
//!
//! ```no_run
//! use conduit_sdk::prelude::*;
//!
//! # async fn run(bus: EventBus, registry: std::sync::Arc<dyn CapabilityRegistry>) -> anyhow::Result<()> {
//! let agent = AgentBuilder::new("deployment-agent")
//!     .agent_type("deployment")
//!     .capability(
//!         Capability::new("deployment")
//!             .with_intent("deploy application")
//!             .with_routing_key("deployment.request"),
//!     )
//!     .handler(|_ctx: AgentContext, request: Event| async move {
//!         let app = require_str(&request.payload, "app_name")?.to_string();
//!         anyhow::Ok(Some(success_response(&request, format!("Deployed {}", app), Payload::new())))
//!     })
//!     .build()?
//!     .activate(bus, registry)
//!     .await?;
//! # let _ = agent;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod handler;
pub mod response;

pub use agent::{AgentBuilder, AgentConfig, AgentError, AgentHandle, AgentHealth};
pub use handler::{AgentContext, AgentEventHandler};
pub use response::{clarification_response, error_response, success_response};

pub mod prelude {
    pub use crate::agent::{AgentBuilder, AgentConfig, AgentError, AgentHandle, AgentHealth};
    pub use crate::handler::{AgentContext, AgentEventHandler};
    pub use crate::response::{clarification_response, error_response, success_response};
    pub use conduit_core::domain::capability::{AgentState, Capability};
    pub use conduit_core::domain::envelope::{
        optional_object, optional_str, optional_value, require_object, require_str, require_value,
        PayloadError, RequestEnvelope,
    };
    pub use conduit_core::domain::event::{Event, EventType, Payload};
    pub use conduit_core::domain::registry::CapabilityRegistry;
    pub use conduit_core::infrastructure::event_bus::EventBus;
}
