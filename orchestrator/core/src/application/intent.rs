// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Intent Extraction - natural language to (intent, parameters)
//
// The orchestrator never interprets free text itself. An IntentExtractor maps
// a message onto one of the intents currently advertised in the registry and
// pulls structured parameters out of it. Two implementations:
//
// - AiIntentExtractor: asks an AiProvider
// - KeywordIntentExtractor: offline, longest known intent contained in the text

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::capability::normalize_intent;
use crate::domain::event::Payload;
use crate::domain::llm::{AiError, AiProvider};

#[async_trait]
pub trait IntentExtractor: Send + Sync {
    /// Returns the normalized intent, or an empty string when nothing fits
    async fn extract_intent(&self, message: &str, known_intents: &[String]) -> Result<String, AiError>;

    async fn extract_parameters(&self, message: &str, intent: &str) -> Result<Payload, AiError>;
}

const INTENT_SYSTEM_PROMPT: &str = "You classify user requests for an agent platform. \
Reply with exactly one intent copied from the list of known intents, and nothing else. \
If no intent fits, reply with an empty line.";

const PARAMETER_SYSTEM_PROMPT: &str = "You extract parameters from user requests for an agent platform. \
Reply with a single JSON object mapping parameter names to values. \
Use snake_case keys. Reply with {} when there are no parameters.";

pub struct AiIntentExtractor {
    provider: Arc<dyn AiProvider>,
}

impl AiIntentExtractor {
    pub fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl IntentExtractor for AiIntentExtractor {
    async fn extract_intent(&self, message: &str, known_intents: &[String]) -> Result<String, AiError> {
        let catalog = known_intents
            .iter()
            .map(|intent| format!("- {}", intent))
            .collect::<Vec<_>>()
            .join("\n");
        let user_prompt = format!("Known intents:\n{}\n\nRequest: {}", catalog, message);

        let reply = self.provider.call(INTENT_SYSTEM_PROMPT, &user_prompt).await?;
        let intent = clean_intent(&reply);
        debug!(intent = %intent, "Extracted intent");
        Ok(intent)
    }

    async fn extract_parameters(&self, message: &str, intent: &str) -> Result<Payload, AiError> {
        let user_prompt = format!("Intent: {}\nRequest: {}", intent, message);
        let reply = self.provider.call(PARAMETER_SYSTEM_PROMPT, &user_prompt).await?;

        match parse_json_object(&reply) {
            Some(parameters) => Ok(parameters),
            None => {
                warn!(intent = %intent, "AI reply did not contain a JSON object, ignoring parameters");
                Ok(Payload::new())
            }
        }
    }
}

/// Picks the longest known intent that occurs in the message.
#[derive(Debug, Default, Clone)]
pub struct KeywordIntentExtractor;

impl KeywordIntentExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IntentExtractor for KeywordIntentExtractor {
    async fn extract_intent(&self, message: &str, known_intents: &[String]) -> Result<String, AiError> {
        let haystack = message.to_lowercase();
        let best = known_intents
            .iter()
            .map(|intent| normalize_intent(intent))
            .filter(|intent| !intent.is_empty() && haystack.contains(intent.as_str()))
            .fold(None::<String>, |best, candidate| match best {
                Some(current) if current.len() >= candidate.len() => Some(current),
                _ => Some(candidate),
            });
        Ok(best.unwrap_or_default())
    }

    async fn extract_parameters(&self, _message: &str, _intent: &str) -> Result<Payload, AiError> {
        Ok(Payload::new())
    }
}

fn clean_intent(reply: &str) -> String {
    let first_line = reply.trim().lines().next().unwrap_or_default();
    let unquoted = first_line
        .trim()
        .trim_start_matches("- ")
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim_end_matches('.');
    normalize_intent(unquoted)
}

fn parse_json_object(reply: &str) -> Option<Payload> {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&unfenced[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
