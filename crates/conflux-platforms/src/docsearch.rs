//! Document-retrieval platform adapter.
//!
//! Wraps enterprise retrieval services that expose a passage-search
//! endpoint. The service returns scored chunks; the adapter synthesizes a
//! reply from the best matches.

use async_trait::async_trait;
use conflux_abstraction::{
    ExecutionContext, PlatformAdapter, PlatformError, PlatformReply, SourceCitation,
    UnifiedQueryRequest,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Default number of passages requested per query.
const DEFAULT_TOP_K: u32 = 10;
/// Minimum similarity for a passage to be considered.
const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Adapter for document-retrieval platforms.
#[derive(Debug, Clone)]
pub struct DocSearchAdapter {
    /// Platform identifier used in routing and diagnostics.
    id: String,
    /// Base URL of the retrieval API.
    base_url: String,
    /// Optional bearer token.
    api_key: Option<String>,
    /// HTTP client for making requests.
    client: Client,
}

impl DocSearchAdapter {
    /// Creates an adapter for the retrieval API at `base_url`.
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

    /// Requested passage count, honoring the caller's `max_sources` hint.
    fn top_k(request: &UnifiedQueryRequest) -> u32 {
        request
            .metadata
            .get("max_sources")
            .and_then(serde_json::Value::as_u64)
            .map_or(DEFAULT_TOP_K, |n| (n as u32).min(20))
    }

    /// Builds a reply from retrieved chunks.
    ///
    /// An empty result set is a valid answer (low confidence), not an
    /// error: the query was served, the corpus had nothing relevant.
    fn synthesize_reply(&self, chunks: Vec<RetrievedChunk>) -> PlatformReply {
        if chunks.is_empty() {
            return PlatformReply::new(
                "No relevant documents were found for this query.",
            )
            .with_confidence(0.0)
            .with_metadata("chunks_analyzed", serde_json::json!(0));
        }

        let avg_score =
            chunks.iter().map(|c| c.score).sum::<f64>() / chunks.len() as f64;
        let best = &chunks[0];
        let answer = format!(
            "Based on {} matched passages: {}",
            chunks.len(),
            best.content
        );

        let count = chunks.len();
        let sources = chunks
            .into_iter()
            .map(|c| SourceCitation {
                title: c.document_name,
                snippet: c.content,
                score: c.score.clamp(0.0, 1.0),
                uri: c.url,
            })
            .collect();

        PlatformReply::new(answer)
            .with_confidence(avg_score)
            .with_sources(sources)
            .with_metadata("chunks_analyzed", serde_json::json!(count))
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

// Retrieval API request/response structures
#[derive(Serialize)]
struct RetrievalRequest<'a> {
    question: &'a str,
    top_k: u32,
    similarity_threshold: f64,
    rerank: bool,
    language: &'a str,
}

#[derive(Deserialize)]
struct RetrievalResponse {
    #[serde(default)]
    chunks: Vec<RetrievedChunk>,
}

#[derive(Deserialize)]
struct RetrievedChunk {
    document_name: String,
    content: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl PlatformAdapter for DocSearchAdapter {
    fn name(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "document-search".to_string(),
            "hybrid-retrieval".to_string(),
            "document-qa".to_string(),
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
            "DocSearchAdapter executing retrieval"
        );

        let url = format!("{}/retrieval", self.base_url);
        let body = RetrievalRequest {
            question: &request.query,
            top_k: Self::top_k(request),
            similarity_threshold: SIMILARITY_THRESHOLD,
            rerank: true,
            language: &request.language,
        };

        let mut builder = self.client.post(&url).json(&body).timeout(ctx.timeout);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            error!(platform = %self.id, error = %e, "Retrieval request failed");
            self.transport_error(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body =
                response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            error!(platform = %self.id, status = %status, "Retrieval returned error status");
            return Err(self.status_error(status, &body));
        }

        let parsed: RetrievalResponse = response.json().await.map_err(|e| {
            error!(platform = %self.id, error = %e, "Failed to parse retrieval response");
            PlatformError::Serialization(format!("failed to parse response: {}", e))
        })?;

        Ok(self.synthesize_reply(parsed.chunks))
    }
}
