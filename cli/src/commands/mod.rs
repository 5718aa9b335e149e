// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Conduit CLI

pub mod agents;
pub mod config;
pub mod route;

pub use self::agents::AgentsArgs;
pub use self::config::ConfigCommand;
pub use self::route::{ChatArgs, RouteArgs};
