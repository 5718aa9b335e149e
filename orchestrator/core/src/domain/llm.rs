// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// AI Provider Domain Interface (Anti-Corruption Layer)
//
// The orchestrator treats the AI provider as a black box that turns a system
// prompt and a user prompt into text. It is used to extract an intent string
// and to parse natural-language parameters; prompt content and provider
// failure modes stay outside the routing core.
//
// Implementations in infrastructure/llm/ directory.

use async_trait::async_trait;

#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn call(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AiError>;

    /// Check if provider is healthy and accessible
    async fn health_check(&self) -> Result<(), AiError>;
}

/// Errors that can occur during AI provider calls
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider not configured")]
    NotConfigured,
}
