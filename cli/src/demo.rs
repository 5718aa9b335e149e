// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Demo agents hosted by the embedded runtime.
//!
//! Small but real handlers that exercise the whole protocol: success,
//! clarification, and policy decisions with reasoning.

use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use conduit_sdk::prelude::*;

pub const DEPLOYMENT_AGENT_ID: &str = "deployment-agent";
pub const POLICY_AGENT_ID: &str = "policy-agent";
pub const APPLICATION_AGENT_ID: &str = "application-agent";

/// Activate every demo agent against the given bus and registry.
pub async fn activate_all(bus: &EventBus, registry: Arc<dyn CapabilityRegistry>) -> Result<Vec<AgentHandle>> {
    let configs = vec![deployment_agent()?, policy_agent()?, application_agent()?];

    let mut handles = Vec::with_capacity(configs.len());
    for config in configs {
        handles.push(config.activate(bus.clone(), registry.clone()).await?);
    }
    Ok(handles)
}

pub fn deployment_agent() -> Result<AgentConfig, AgentError> {
    AgentBuilder::new(DEPLOYMENT_AGENT_ID)
        .agent_type("deployment")
        .capability(
            Capability::new("deployment")
                .with_description("Deploys applications to an environment")
                .with_intent("deploy application")
                .with_intent("deploy service")
                .with_routing_key("deployment.request")
                .with_input_type("app_name")
                .with_output_type("deployment_id"),
        )
        .handler(|_ctx: AgentContext, request: Event| async move { handle_deployment(&request) })
        .build()
}

pub fn policy_agent() -> Result<AgentConfig, AgentError> {
    AgentBuilder::new(POLICY_AGENT_ID)
        .agent_type("policy")
        .capability(
            Capability::new("policy")
                .with_description("Evaluates requests against platform policy")
                .with_intent("policy check")
                .with_intent("evaluate policy")
                .with_routing_key("policy.request")
                .with_output_type("decision"),
        )
        .handler(|_ctx: AgentContext, request: Event| async move { handle_policy(&request) })
        .build()
}

pub fn application_agent() -> Result<AgentConfig, AgentError> {
    AgentBuilder::new(APPLICATION_AGENT_ID)
        .agent_type("application")
        .capability(
            Capability::new("application")
                .with_description("Creates and describes application records")
                .with_intent("create application")
                .with_intent("describe application")
                .with_routing_key("application.request"),
        )
        .handler(|_ctx: AgentContext, request: Event| async move { handle_application(&request) })
        .build()
}

fn handle_deployment(request: &Event) -> Result<Option<Event>> {
    let envelope = RequestEnvelope::from_payload(&request.payload)?;
    let Some(app) = optional_str(&envelope.context, "app_name")? else {
        return Ok(Some(clarification_response(
            request,
            "Which application should be deployed?",
            &["app_name"],
        )));
    };
    let environment = optional_str(&envelope.context, "environment")?.unwrap_or("staging");

    let mut body = Payload::new();
    body.insert("deployment_id".into(), json!(Uuid::new_v4().to_string()));
    body.insert("app_name".into(), json!(app));
    body.insert("environment".into(), json!(environment));
    Ok(Some(success_response(
        request,
        format!("Deployed {} to {}", app, environment),
        body,
    )))
}

fn handle_policy(request: &Event) -> Result<Option<Event>> {
    let envelope = RequestEnvelope::from_payload(&request.payload)?;
    let environment = optional_str(&envelope.context, "environment")?.unwrap_or("staging");
    let approved_by = optional_str(&envelope.context, "approved_by")?;

    let (decision, reasoning) = match (environment, approved_by) {
        ("production", None) => ("denied", "production changes require an approved_by field".to_string()),
        ("production", Some(approver)) => ("approved", format!("production change approved by {}", approver)),
        (env, _) => ("approved", format!("no policy restricts changes in {}", env)),
    };

    let mut body = Payload::new();
    body.insert("decision".into(), Value::String(decision.to_string()));
    body.insert("reasoning".into(), Value::String(reasoning));
    Ok(Some(success_response(request, format!("Policy {}", decision), body)))
}

fn handle_application(request: &Event) -> Result<Option<Event>> {
    let envelope = RequestEnvelope::from_payload(&request.payload)?;
    let name = match optional_str(&envelope.context, "app_name")? {
        Some(name) => name,
        None => {
            return Ok(Some(clarification_response(
                request,
                "What is the application called?",
                &["app_name"],
            )))
        }
    };

    let describing = envelope
        .intent
        .as_deref()
        .is_some_and(|intent| intent.trim().eq_ignore_ascii_case("describe application"));
    let message = if describing {
        format!("Application {} is registered", name)
    } else {
        format!("Application {} created", name)
    };

    let mut body = Payload::new();
    body.insert("app_name".into(), json!(name));
    Ok(Some(success_response(request, message, body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(intent: &str, context: Value) -> Event {
        let payload = json!({
            "correlation_id": "corr-1",
            "request_id": "req-1",
            "intent": intent,
            "context": context,
        });
        Event::new(
            EventType::Request,
            "orchestrator",
            "any.request",
            payload.as_object().cloned().unwrap(),
        )
    }

    #[test]
    fn test_deployment_asks_for_app_name() {
        let response = handle_deployment(&request("deploy application", json!({})))
            .unwrap()
            .unwrap();
        assert_eq!(response.payload["status"], "clarification_needed");
        assert_eq!(response.correlation_id(), Some("corr-1"));
    }

    #[test]
    fn test_deployment_defaults_to_staging() {
        let response = handle_deployment(&request("deploy application", json!({ "app_name": "billing" })))
            .unwrap()
            .unwrap();
        assert_eq!(response.payload["status"], "success");
        assert_eq!(response.payload["message"], "Deployed billing to staging");
    }

    #[test]
    fn test_policy_denies_unapproved_production() {
        let response = handle_policy(&request("policy check", json!({ "environment": "production" })))
            .unwrap()
            .unwrap();
        assert_eq!(response.payload["decision"], "denied");

        let response = handle_policy(&request(
            "policy check",
            json!({ "environment": "production", "approved_by": "alice" }),
        ))
        .unwrap()
        .unwrap();
        assert_eq!(response.payload["decision"], "approved");
    }

    #[test]
    fn test_application_describe() {
        let response = handle_application(&request("describe application", json!({ "app_name": "billing" })))
            .unwrap()
            .unwrap();
        assert_eq!(response.payload["message"], "Application billing is registered");
    }
}
