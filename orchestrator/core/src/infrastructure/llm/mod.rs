// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// AI Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain AiProvider interface and an
// external API.

pub mod openai;

pub use openai::OpenAICompatibleProvider;

use std::sync::Arc;
use tracing::info;

use crate::domain::config::AiProviderConfig;
use crate::domain::llm::AiProvider;

/// Build the configured provider. Disabled or absent config yields `None`.
pub fn provider_from_config(
    config: Option<&AiProviderConfig>,
) -> anyhow::Result<Option<Arc<dyn AiProvider>>> {
    let config = match config {
        Some(config) if config.enabled => config,
        Some(_) => {
            info!("AI provider disabled, using keyword intent extraction");
            return Ok(None);
        }
        None => return Ok(None),
    };

    match config.provider_type.as_str() {
        "openai" | "openai-compatible" => {
            let api_key = config.resolve_api_key()?;
            info!(endpoint = %config.endpoint, model = %config.model, "Initializing AI provider");
            Ok(Some(Arc::new(OpenAICompatibleProvider::new(
                config.endpoint.clone(),
                api_key,
                config.model.clone(),
            ))))
        }
        other => anyhow::bail!("Unsupported AI provider type: {}", other),
    }
}
