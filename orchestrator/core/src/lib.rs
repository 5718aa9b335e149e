// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Conduit Orchestrator Core
//!
//! Intent-routed event dispatch: an event bus, the agent capability registry
//! contract, and the orchestrator that routes an intent to exactly one agent
//! and correlates its response.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, routing use cases and their in-process adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
