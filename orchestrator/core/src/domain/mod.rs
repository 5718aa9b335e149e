// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Bus events, typed payload envelopes, capabilities and the registry and AI
//! provider interfaces.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and contracts with no I/O

pub mod event;
pub mod envelope;
pub mod capability;
pub mod registry;
pub mod llm;
pub mod config;
