// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod intent;
pub mod routing;
pub mod orchestrator;

// Re-export use cases for convenience
pub use intent::{AiIntentExtractor, IntentExtractor, KeywordIntentExtractor};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use routing::{RouteOutcome, RouteStatus, RoutingError};
