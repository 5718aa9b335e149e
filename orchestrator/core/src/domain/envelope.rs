// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Typed Payload Envelopes
//!
//! Events carry an open [`Payload`] map. Rather than type-asserting individual
//! keys at every call site, request and response payloads are lifted into a
//! small closed set of envelopes:
//!
//! | Envelope | Required keys | Notes |
//! |----------|---------------|-------|
//! | [`RequestEnvelope`] | `correlation_id` | `intent`, `context`, `request_id`, `source_agent` optional |
//! | [`ResponseEnvelope`] | `status` | any other keys land in `body` |
//! | [`ErrorEnvelope`] | `error` | always serialized with `status: "error"` |
//!
//! Accessors fail with a named [`PayloadError`] instead of coercing silently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::event::{Payload, CORRELATION_ID_KEY, REQUEST_ID_KEY};

pub const STATUS_KEY: &str = "status";
pub const MESSAGE_KEY: &str = "message";
pub const ERROR_KEY: &str = "error";
pub const INTENT_KEY: &str = "intent";
pub const CONTEXT_KEY: &str = "context";
pub const SOURCE_AGENT_KEY: &str = "source_agent";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Field '{field}' has wrong type (expected {expected})")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Read a required string field.
pub fn require_str<'a>(payload: &'a Payload, key: &str) -> Result<&'a str, PayloadError> {
    match payload.get(key) {
        None | Some(Value::Null) => Err(PayloadError::MissingField(key.to_string())),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(PayloadError::WrongType {
            field: key.to_string(),
            expected: "string",
        }),
    }
}

/// Read an optional string field. Present-but-not-a-string is still an error.
pub fn optional_str<'a>(payload: &'a Payload, key: &str) -> Result<Option<&'a str>, PayloadError> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(PayloadError::WrongType {
            field: key.to_string(),
            expected: "string",
        }),
    }
}

pub fn require_object<'a>(payload: &'a Payload, key: &str) -> Result<&'a Payload, PayloadError> {
    match payload.get(key) {
        None | Some(Value::Null) => Err(PayloadError::MissingField(key.to_string())),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(PayloadError::WrongType {
            field: key.to_string(),
            expected: "object",
        }),
    }
}

pub fn optional_object<'a>(payload: &'a Payload, key: &str) -> Result<Option<&'a Payload>, PayloadError> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(PayloadError::WrongType {
            field: key.to_string(),
            expected: "object",
        }),
    }
}

pub fn require_value<'a>(payload: &'a Payload, key: &str) -> Result<&'a Value, PayloadError> {
    payload
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| PayloadError::MissingField(key.to_string()))
}

pub fn optional_value<'a>(payload: &'a Payload, key: &str) -> Option<&'a Value> {
    payload.get(key).filter(|v| !v.is_null())
}

/// Outcome reported by an agent in its response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
    ClarificationNeeded,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "success",
            ResponseStatus::Error => "error",
            ResponseStatus::ClarificationNeeded => "clarification_needed",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(ResponseStatus::Success),
            "error" => Some(ResponseStatus::Error),
            "clarification_needed" => Some(ResponseStatus::ClarificationNeeded),
            _ => None,
        }
    }
}

/// Request payload emitted by the orchestrator toward an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub correlation_id: String,
    pub request_id: Option<String>,
    pub intent: Option<String>,
    pub context: Payload,
    pub source_agent: Option<String>,
    /// Any keys not covered above
    pub body: Payload,
}

impl RequestEnvelope {
    pub fn from_payload(payload: &Payload) -> Result<Self, PayloadError> {
        let correlation_id = require_str(payload, CORRELATION_ID_KEY)?.to_string();
        let request_id = optional_str(payload, REQUEST_ID_KEY)?.map(str::to_string);
        let intent = optional_str(payload, INTENT_KEY)?.map(str::to_string);
        let context = optional_object(payload, CONTEXT_KEY)?.cloned().unwrap_or_default();
        let source_agent = optional_str(payload, SOURCE_AGENT_KEY)?.map(str::to_string);

        let body = without_keys(
            payload,
            &[CORRELATION_ID_KEY, REQUEST_ID_KEY, INTENT_KEY, CONTEXT_KEY, SOURCE_AGENT_KEY],
        );

        Ok(Self {
            correlation_id,
            request_id,
            intent,
            context,
            source_agent,
            body,
        })
    }

    pub fn into_payload(self) -> Payload {
        let mut payload = self.body;
        payload.insert(CORRELATION_ID_KEY.to_string(), Value::String(self.correlation_id));
        if let Some(request_id) = self.request_id {
            payload.insert(REQUEST_ID_KEY.to_string(), Value::String(request_id));
        }
        if let Some(intent) = self.intent {
            payload.insert(INTENT_KEY.to_string(), Value::String(intent));
        }
        payload.insert(CONTEXT_KEY.to_string(), Value::Object(self.context));
        if let Some(source_agent) = self.source_agent {
            payload.insert(SOURCE_AGENT_KEY.to_string(), Value::String(source_agent));
        }
        payload
    }
}

/// Response payload produced by an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub status: ResponseStatus,
    pub correlation_id: Option<String>,
    pub request_id: Option<String>,
    pub message: Option<String>,
    pub body: Payload,
}

impl ResponseEnvelope {
    pub fn new(status: ResponseStatus) -> Self {
        Self {
            status,
            correlation_id: None,
            request_id: None,
            message: None,
            body: Payload::new(),
        }
    }

    pub fn from_payload(payload: &Payload) -> Result<Self, PayloadError> {
        let raw_status = require_str(payload, STATUS_KEY)?;
        let status = ResponseStatus::parse(raw_status).ok_or_else(|| PayloadError::InvalidValue {
            field: STATUS_KEY.to_string(),
            reason: format!("unknown status '{}'", raw_status),
        })?;

        Ok(Self {
            status,
            correlation_id: optional_str(payload, CORRELATION_ID_KEY)?.map(str::to_string),
            request_id: optional_str(payload, REQUEST_ID_KEY)?.map(str::to_string),
            message: optional_str(payload, MESSAGE_KEY)?.map(str::to_string),
            body: without_keys(
                payload,
                &[STATUS_KEY, CORRELATION_ID_KEY, REQUEST_ID_KEY, MESSAGE_KEY],
            ),
        })
    }

    pub fn into_payload(self) -> Payload {
        let mut payload = self.body;
        payload.insert(STATUS_KEY.to_string(), Value::String(self.status.as_str().to_string()));
        if let Some(message) = self.message {
            payload.insert(MESSAGE_KEY.to_string(), Value::String(message));
        }
        insert_correlation(&mut payload, self.correlation_id, self.request_id);
        payload
    }
}

/// Standardized error payload. The shell synthesizes one whenever a handler
/// fails or panics.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: Option<String>,
    pub correlation_id: Option<String>,
    pub request_id: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            correlation_id: None,
            request_id: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn from_payload(payload: &Payload) -> Result<Self, PayloadError> {
        Ok(Self {
            error: require_str(payload, ERROR_KEY)?.to_string(),
            code: optional_str(payload, "code")?.map(str::to_string),
            correlation_id: optional_str(payload, CORRELATION_ID_KEY)?.map(str::to_string),
            request_id: optional_str(payload, REQUEST_ID_KEY)?.map(str::to_string),
        })
    }

    pub fn into_payload(self) -> Payload {
        let mut payload = Payload::new();
        payload.insert(STATUS_KEY.to_string(), Value::String(ResponseStatus::Error.as_str().to_string()));
        payload.insert(MESSAGE_KEY.to_string(), Value::String(self.error.clone()));
        payload.insert(ERROR_KEY.to_string(), Value::String(self.error));
        if let Some(code) = self.code {
            payload.insert("code".to_string(), Value::String(code));
        }
        insert_correlation(&mut payload, self.correlation_id, self.request_id);
        payload
    }
}

fn insert_correlation(payload: &mut Payload, correlation_id: Option<String>, request_id: Option<String>) {
    if let Some(correlation_id) = correlation_id {
        payload.insert(CORRELATION_ID_KEY.to_string(), Value::String(correlation_id));
    }
    if let Some(request_id) = request_id {
        payload.insert(REQUEST_ID_KEY.to_string(), Value::String(request_id));
    }
}

fn without_keys(payload: &Payload, keys: &[&str]) -> Payload {
    payload
        .iter()
        .filter(|(k, _)| !keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_accessors_name_the_failure() {
        let p = payload(json!({ "name": "svc", "replicas": 3, "labels": {"tier": "web"} }));

        assert_eq!(require_str(&p, "name").unwrap(), "svc");
        assert_eq!(
            require_str(&p, "missing"),
            Err(PayloadError::MissingField("missing".to_string()))
        );
        assert_eq!(
            require_str(&p, "replicas"),
            Err(PayloadError::WrongType { field: "replicas".to_string(), expected: "string" })
        );
        assert_eq!(optional_str(&p, "missing").unwrap(), None);
        assert!(optional_str(&p, "replicas").is_err());
        assert_eq!(require_object(&p, "labels").unwrap()["tier"], "web");
        assert!(require_value(&p, "replicas").is_ok());
        assert!(optional_value(&p, "missing").is_none());
    }

    #[test]
    fn test_request_envelope_requires_correlation_id() {
        let err = RequestEnvelope::from_payload(&payload(json!({ "intent": "deploy application" })));
        assert_eq!(err, Err(PayloadError::MissingField("correlation_id".to_string())));
    }

    #[test]
    fn test_request_envelope_separates_body() {
        let p = payload(json!({
            "correlation_id": "corr-1",
            "request_id": "req-1",
            "intent": "deploy application",
            "context": { "application": "billing" },
            "source_agent": "orchestrator",
            "dry_run": true
        }));

        let envelope = RequestEnvelope::from_payload(&p).unwrap();
        assert_eq!(envelope.correlation_id, "corr-1");
        assert_eq!(envelope.context["application"], "billing");
        assert_eq!(envelope.body.len(), 1);
        assert_eq!(envelope.body["dry_run"], true);
    }

    #[test]
    fn test_error_envelope_always_carries_error_status() {
        let mut envelope = ErrorEnvelope::new("boom").with_code("HANDLER_FAILED");
        envelope.correlation_id = Some("corr-9".to_string());
        let p = envelope.into_payload();

        assert_eq!(p["status"], "error");
        assert_eq!(p["error"], "boom");
        assert_eq!(p["correlation_id"], "corr-9");

        let parsed = ResponseEnvelope::from_payload(&p).unwrap();
        assert_eq!(parsed.status, ResponseStatus::Error);
        assert_eq!(parsed.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_unknown_response_status_is_invalid() {
        let err = ResponseEnvelope::from_payload(&payload(json!({ "status": "maybe" }))).unwrap_err();
        assert!(matches!(err, PayloadError::InvalidValue { .. }));
    }
}
