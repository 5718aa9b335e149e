// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI-Compatible AI Provider Adapter
//
// Anti-Corruption Layer for the chat completions API. Works with OpenAI and
// with compatible servers (LM Studio, vLLM, etc.)

use crate::domain::llm::{AiError, AiProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct OpenAICompatibleProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAICompatibleProvider {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.api_key)
        }
    }
}

#[async_trait]
impl AiProvider for OpenAICompatibleProvider {
    async fn call(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            // Extraction wants deterministic output
            temperature: 0.0,
        };

        let response = self
            .authorized(self.client.post(self.url("chat/completions")))
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 401 || status == 403 {
                AiError::Authentication(error_text)
            } else if status == 429 {
                AiError::RateLimit
            } else if status == 404 {
                AiError::ModelNotFound(self.model.clone())
            } else {
                AiError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Provider(format!("Failed to parse response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AiError::Provider("No response from model".into()))
    }

    async fn health_check(&self) -> Result<(), AiError> {
        let response = self
            .authorized(self.client.get(self.url("models")))
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(AiError::Authentication("Invalid API key".into()))
        } else {
            Err(AiError::Network(format!("HTTP {}", response.status())))
        }
    }
}
