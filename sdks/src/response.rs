// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Response builders for agent handlers.
//!
//! Every builder copies `correlation_id` and `request_id` from the request so
//! the orchestrator can match the answer.

use conduit_core::domain::envelope::{ErrorEnvelope, ResponseEnvelope, ResponseStatus};
use conduit_core::domain::event::{Event, Payload};
use serde_json::Value;

/// Key listing the fields a clarification response is asking for
pub const MISSING_FIELDS_KEY: &str = "missing_fields";

pub fn success_response(request: &Event, message: impl Into<String>, body: Payload) -> Event {
    respond(request, ResponseStatus::Success, Some(message.into()), body)
}

pub fn error_response(request: &Event, error: impl Into<String>) -> Event {
    let mut envelope = ErrorEnvelope::new(error);
    envelope.correlation_id = request.correlation_id().map(str::to_string);
    envelope.request_id = request.request_id().map(str::to_string);
    Event::response(envelope.into_payload())
}

/// Ask the caller for more input instead of guessing.
pub fn clarification_response(request: &Event, question: impl Into<String>, missing_fields: &[&str]) -> Event {
    let mut body = Payload::new();
    body.insert(
        MISSING_FIELDS_KEY.to_string(),
        Value::Array(missing_fields.iter().map(|f| Value::String(f.to_string())).collect()),
    );
    respond(request, ResponseStatus::ClarificationNeeded, Some(question.into()), body)
}

fn respond(request: &Event, status: ResponseStatus, message: Option<String>, body: Payload) -> Event {
    let envelope = ResponseEnvelope {
        status,
        correlation_id: request.correlation_id().map(str::to_string),
        request_id: request.request_id().map(str::to_string),
        message,
        body,
    };
    Event::response(envelope.into_payload())
}
