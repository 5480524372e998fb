//! Knowledge-base platform adapter.
//!
//! Wraps conversational knowledge-base services that expose a chat-style
//! query endpoint over HTTP.

use async_trait::async_trait;
use conflux_abstraction::{
    ExecutionContext, PlatformAdapter, PlatformError, PlatformReply, ResponseFormat,
    SourceCitation, UnifiedQueryRequest,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Adapter for conversational knowledge-base platforms.
#[derive(Debug, Clone)]
pub struct KnowledgeAdapter {
    /// Platform identifier used in routing and diagnostics.
    id: String,
    /// Base URL of the knowledge-base API.
    base_url: String,
    /// Optional bearer token.
    api_key: Option<String>,
    /// HTTP client for making requests.
    client: Client,
}

impl KnowledgeAdapter {
    /// Creates an adapter for the knowledge-base API at `base_url`.
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

// Knowledge-base API request/response structures
#[derive(Serialize)]
struct KnowledgeQueryRequest<'a> {
    query: &'a str,
    context: &'a [String],
    language: &'a str,
    response_mode: &'static str,
}

#[derive(Deserialize)]
struct KnowledgeQueryResponse {
    answer: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    citations: Vec<KnowledgeCitation>,
    #[serde(default)]
    suggested_actions: Vec<String>,
}

#[derive(Deserialize)]
struct KnowledgeCitation {
    title: String,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl PlatformAdapter for KnowledgeAdapter {
    fn name(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "knowledge-retrieval".to_string(),
            "document-qa".to_string(),
            "conversational".to_string(),
            "multi-language".to_string(),
        ]
    }

    async fn execute(
        &self,
        request: &UnifiedQueryRequest,
        ctx: &ExecutionContext,
    ) -> Result<PlatformReply, PlatformError> {
        debug!(
            platform = %self.id,
            query_len = request.query.len(),
            "KnowledgeAdapter executing query"
        );

        let url = format!("{}/chat/messages", self.base_url);
        let response_mode = match request.response_format {
            ResponseFormat::Streaming => "streaming",
            _ => "blocking",
        };
        let body = KnowledgeQueryRequest {
            query: &request.query,
            context: &request.context,
            language: &request.language,
            response_mode,
        };

        let mut builder = self.client.post(&url).json(&body).timeout(ctx.timeout);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            error!(platform = %self.id, error = %e, "Knowledge-base request failed");
            self.transport_error(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body =
                response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            error!(platform = %self.id, status = %status, "Knowledge-base returned error status");
            return Err(self.status_error(status, &body));
        }

        let parsed: KnowledgeQueryResponse = response.json().await.map_err(|e| {
            error!(platform = %self.id, error = %e, "Failed to parse knowledge-base response");
            PlatformError::Serialization(format!("failed to parse response: {}", e))
        })?;

        let sources = parsed
            .citations
            .into_iter()
            .map(|c| SourceCitation {
                title: c.title,
                snippet: c.excerpt,
                score: c.score.clamp(0.0, 1.0),
                uri: c.url,
            })
            .collect();

        Ok(PlatformReply::new(parsed.answer)
            .with_confidence(parsed.confidence.unwrap_or(0.75))
            .with_sources(sources)
            .with_next_actions(parsed.suggested_actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_include_knowledge_retrieval() {
        let adapter = KnowledgeAdapter::new("kb", "http://localhost:3000/api/v1");
        assert!(adapter.capabilities().contains(&"knowledge-retrieval".to_string()));
        assert_eq!(adapter.name(), "kb");
    }

    #[test]
    fn test_status_error_mapping() {
        let adapter = KnowledgeAdapter::new("kb", "http://localhost:3000/api/v1");

        let rate_limited =
            adapter.status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(rate_limited, PlatformError::RateLimited { .. }));
        assert!(rate_limited.is_retryable());

        let rejected = adapter.status_error(reqwest::StatusCode::BAD_REQUEST, "bad input");
        assert!(matches!(rejected, PlatformError::Rejected { .. }));
        assert!(!rejected.is_retryable());

        let unavailable =
            adapter.status_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(unavailable, PlatformError::Unavailable { .. }));
        assert!(unavailable.is_retryable());
    }

    #[test]
    fn test_response_parsing_defaults() {
        let parsed: KnowledgeQueryResponse =
            serde_json::from_str(r#"{"answer": "42"}"#).unwrap();
        assert_eq!(parsed.answer, "42");
        assert!(parsed.confidence.is_none());
        assert!(parsed.citations.is_empty());
        assert!(parsed.suggested_actions.is_empty());
    }
}
