//! Workflow-automation platform adapter.
//!
//! Wraps automation engines that execute multi-step workflows in response
//! to a query.

use async_trait::async_trait;
use conflux_abstraction::{
    ExecutionContext, PlatformAdapter, PlatformError, PlatformReply, UnifiedQueryRequest,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error};

/// Adapter for workflow-automation platforms.
#[derive(Debug, Clone)]
pub struct AutomationAdapter {
    /// Platform identifier used in routing and diagnostics.
    id: String,
    /// Base URL of the workflow API.
    base_url: String,
    /// Optional bearer token.
    api_key: Option<String>,
    /// HTTP client for making requests.
    client: Client,
}

impl AutomationAdapter {
    /// Creates an adapter for the workflow API at `base_url`.
    #[must_use]
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            api_key: None,
            client: Client::new(),
        }
    }

    /// Sets the bearer token used for authentication.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn transport_error(&self, e: &reqwest::Error) -> PlatformError {
        if e.is_timeout() {
            PlatformError::Timeout { platform: self.id.clone() }
        } else if e.is_connect() {
            PlatformError::Unavailable {
                platform: self.id.clone(),
                message: format!("connection failed: {}", e),
            }
        } else {
            PlatformError::Unavailable {
                platform: self.id.clone(),
                message: format!("network error: {}", e),
            }
        }
    }

    fn status_error(&self, status: reqwest::StatusCode, body: &str) -> PlatformError {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            PlatformError::RateLimited { platform: self.id.clone() }
        } else if status.is_client_error() {
            PlatformError::Rejected {
                platform: self.id.clone(),
                reason: format!("{}: {}", status, body),
            }
        } else {
            PlatformError::Unavailable {
                platform: self.id.clone(),
                message: format!("{}: {}", status, body),
            }
        }
    }
}

// Workflow API request/response structures
#[derive(Serialize)]
struct WorkflowRequest<'a> {
    query: &'a str,
    context: &'a [String],
    priority: String,
    metadata: &'a HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct WorkflowResponse {
    final_output: String,
    #[serde(default)]
    next_actions: Vec<String>,
    #[serde(default)]
    steps_executed: u32,
    #[serde(default)]
    confidence: Option<f64>,
}

#[async_trait]
impl PlatformAdapter for AutomationAdapter {
    fn name(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "multi-step-automation".to_string(),
            "workflow-execution".to_string(),
            "notification-delivery".to_string(),
        ]
    }

    async fn execute(
        &self,
        request: &UnifiedQueryRequest,
        ctx: &ExecutionContext,
    ) -> Result<PlatformReply, PlatformError> {
        debug!(
            platform = %self.id,
            priority = %request.priority,
            "AutomationAdapter executing workflow"
        );

        let url = format!("{}/workflows/execute", self.base_url);
        let body = WorkflowRequest {
            query: &request.query,
            context: &request.context,
            priority: request.priority.to_string(),
            metadata: &request.metadata,
        };

        let mut builder = self.client.post(&url).json(&body).timeout(ctx.timeout);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            error!(platform = %self.id, error = %e, "Workflow request failed");
            self.transport_error(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body =
                response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            error!(platform = %self.id, status = %status, "Workflow API returned error status");
            return Err(self.status_error(status, &body));
        }

        let parsed: WorkflowResponse = response.json().await.map_err(|e| {
            error!(platform = %self.id, error = %e, "Failed to parse workflow response");
            PlatformError::Serialization(format!("failed to parse response: {}", e))
        })?;

        Ok(PlatformReply::new(parsed.final_output)
            .with_confidence(parsed.confidence.unwrap_or(0.85))
            .with_next_actions(parsed.next_actions)
            .with_metadata("steps_executed", serde_json::json!(parsed.steps_executed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_include_automation() {
        let adapter = AutomationAdapter::new("automation", "http://localhost:5678/api/v1");
        assert!(adapter.capabilities().contains(&"multi-step-automation".to_string()));
    }

    #[test]
    fn test_workflow_response_parsing_defaults() {
        let parsed: WorkflowResponse =
            serde_json::from_str(r#"{"final_output": "done"}"#).unwrap();
        assert_eq!(parsed.final_output, "done");
        assert_eq!(parsed.steps_executed, 0);
        assert!(parsed.next_actions.is_empty());
        assert!(parsed.confidence.is_none());
    }

    #[test]
    fn test_status_error_mapping() {
        let adapter = AutomationAdapter::new("automation", "http://localhost:5678/api/v1");
        assert!(matches!(
            adapter.status_error(reqwest::StatusCode::SERVICE_UNAVAILABLE, "maintenance"),
            PlatformError::Unavailable { .. }
        ));
        assert!(matches!(
            adapter.status_error(reqwest::StatusCode::UNPROCESSABLE_ENTITY, "bad workflow"),
            PlatformError::Rejected { .. }
        ));
    }
}
